//! Chat command implementation

use super::query::location;
use crate::app::App;
use crate::error::Result;
use crate::rag::{ChatOptions, ChatReply};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use uuid::Uuid;

/// Send one message in a chat session, starting a new session when none is given
pub async fn cmd_chat(
    app: &App,
    session_id: Option<&str>,
    message: &str,
    options: &ChatOptions,
) -> Result<ChatReply> {
    let session_id = session_id
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    app.chat.send(&session_id, message, options).await
}

/// Forget a session and its messages
pub async fn cmd_clear_chat(app: &App, session_id: &str) -> Result<()> {
    app.db.delete_chat_session(session_id).await?;
    info!("Cleared chat session {}", session_id);
    Ok(())
}

/// Read messages from stdin until EOF or `/quit`, replying to each in one session
pub async fn run_chat_repl(app: &App, session_id: Option<&str>, options: &ChatOptions) -> Result<()> {
    let session_id = session_id
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    println!("Chat session {} (type /quit to leave)", session_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "/quit" {
            break;
        }

        let reply = app.chat.send(&session_id, message, options).await?;
        print_chat_reply(&reply);
    }

    Ok(())
}

pub fn print_chat_reply(reply: &ChatReply) {
    println!("\n{}", reply.message);

    let cited: Vec<_> = reply
        .sources
        .iter()
        .filter(|s| reply.cited.contains(&s.chunk_id))
        .collect();
    if !cited.is_empty() {
        println!();
        for source in cited {
            println!("  [ID:{}] {}", source.chunk_id, location(&source.filename, source.page));
        }
    }
}
