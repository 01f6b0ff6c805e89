//! Recursive separator-cascading text splitter
//!
//! Segments are returned as contiguous spans of the source text. Separators
//! are kept at the start of the piece that follows them, so span offsets stay
//! in the same (untrimmed, byte) offset space the page indexer uses.

use crate::config::ChunkConfig;
use std::collections::VecDeque;
use std::ops::Range;

/// Separators tried coarsest first; the empty separator splits per character
pub const SEPARATORS: &[&str] = &[
    "\n\n\n", "\n\n", "\n", ". ", "! ", "? ", "; ", ", ", "\u{200b}", " ", "",
];

/// A raw (untrimmed) segment of the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Byte offset of the segment in the source text
    pub start: usize,
    pub text: &'a str,
}

impl Segment<'_> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// Splits text into bounded, overlapping segments
#[derive(Debug, Clone)]
pub struct TextSplitter {
    max_chars: usize,
    overlap_chars: usize,
    separators: Vec<&'static str>,
}

impl TextSplitter {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            overlap_chars,
            separators: SEPARATORS.to_vec(),
        }
    }

    pub fn from_config(config: &ChunkConfig) -> Self {
        Self::new(config.max_chars, config.overlap_chars())
    }

    /// Split text into segments, in source order
    pub fn split<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        self.split_spans(text)
            .into_iter()
            .map(|span| Segment {
                start: span.start,
                text: &text[span],
            })
            .collect()
    }

    /// Split text into byte ranges of the source
    pub fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.is_empty() {
            return Vec::new();
        }
        self.split_range(text, 0..text.len(), &self.separators)
    }

    fn split_range(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[&'static str],
    ) -> Vec<Range<usize>> {
        let piece = &text[range.clone()];

        // Coarsest separator present in this piece; finer ones are kept for recursion
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&'static str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if piece.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let splits = split_keep_separator(piece, separator)
            .into_iter()
            .map(|r| (r.start + range.start)..(r.end + range.start));

        let mut final_spans = Vec::new();
        let mut good: Vec<Range<usize>> = Vec::new();

        for split in splits {
            if char_len(text, &split) < self.max_chars {
                good.push(split);
                continue;
            }

            if !good.is_empty() {
                final_spans.extend(self.merge(text, &good));
                good.clear();
            }

            if finer.is_empty() {
                final_spans.push(split);
            } else {
                final_spans.extend(self.split_range(text, split, finer));
            }
        }

        if !good.is_empty() {
            final_spans.extend(self.merge(text, &good));
        }

        final_spans
    }

    /// Greedily merge adjacent small splits up to `max_chars`, carrying up to
    /// `overlap_chars` of trailing splits into the next segment
    fn merge(&self, text: &str, splits: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut merged = Vec::new();
        let mut current: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(text, split);

            if total + len > self.max_chars && !current.is_empty() {
                push_joined(text, &current, &mut merged);

                while total > self.overlap_chars || (total + len > self.max_chars && total > 0) {
                    match current.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }

            current.push_back((split.clone(), len));
            total += len;
        }

        push_joined(text, &current, &mut merged);
        merged
    }
}

/// Join contiguous splits into one span; whitespace-only spans are dropped
fn push_joined(
    text: &str,
    current: &VecDeque<(Range<usize>, usize)>,
    out: &mut Vec<Range<usize>>,
) {
    let (Some((first, _)), Some((last, _))) = (current.front(), current.back()) else {
        return;
    };
    let span = first.start..last.end;
    if !text[span.clone()].trim().is_empty() {
        out.push(span);
    }
}

/// Split on a literal separator, keeping it at the start of the following piece
fn split_keep_separator(piece: &str, separator: &str) -> Vec<Range<usize>> {
    if separator.is_empty() {
        return piece
            .char_indices()
            .map(|(i, c)| i..i + c.len_utf8())
            .collect();
    }

    let mut spans = Vec::new();
    let mut start = 0;
    for (pos, _) in piece.match_indices(separator) {
        if pos > start {
            spans.push(start..pos);
        }
        start = pos;
    }
    if start < piece.len() {
        spans.push(start..piece.len());
    }
    spans
}

fn char_len(text: &str, span: &Range<usize>) -> usize {
    text[span.clone()].chars().count()
}
