//! Line-oriented terminal chat on top of [`ChatClient`].

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use chatrelay_client::{ChatClient, ClientError, Conversation, Sender, stats};
use log::debug;
use tokio::io::{AsyncBufReadExt, BufReader};

const PROMPT: &str = "> ";

pub async fn run(client: Arc<ChatClient>) -> Result<()> {
    let mut stdout = io::stdout();
    if let Some(greeting) = client.snapshot().messages().first() {
        writeln!(stdout, "{}", greeting.content)?;
    }
    if let Some(chat_id) = client.chat_id() {
        writeln!(stdout, "(continuing chat {})", chat_id)?;
    }
    writeln!(stdout, "Type a message, or /quit to leave.")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(stdout, "{}", PROMPT)?;
        stdout.flush()?;

        let Some(line) = lines.next_line().await.context("reading stdin")? else {
            writeln!(stdout)?;
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            _ => {}
        }

        exchange(&client, line).await?;
    }
    Ok(())
}

/// Send one message and echo the reply as it streams.
async fn exchange(client: &ChatClient, line: &str) -> Result<()> {
    let mut updates = client.subscribe();
    updates.borrow_and_update();

    let mut shown = String::new();
    let send = client.send(line);
    tokio::pin!(send);

    let result = loop {
        tokio::select! {
            result = &mut send => break result,
            changed = updates.changed() => {
                if changed.is_err() {
                    break send.await;
                }
                let conversation = updates.borrow_and_update().clone();
                echo_reply(&conversation, &mut shown)?;
            }
        }
    };

    let conversation = client.snapshot();
    echo_reply(&conversation, &mut shown)?;
    println!();

    match result {
        Ok(message) if message.has_stats() => {
            let summary =
                stats::describe_message(message.processing_info.as_ref(), message.cache_info.as_ref());
            if !summary.is_empty() {
                println!("  [{}]", summary);
            }
        }
        Ok(_) => {}
        Err(ClientError::EmptyMessage) => {}
        Err(e) => debug!("Reply failed: {}", e),
    }
    Ok(())
}

/// Print whatever the latest assistant message gained since the last call.
fn echo_reply(conversation: &Conversation, shown: &mut String) -> io::Result<()> {
    let Some(reply) = conversation
        .messages()
        .iter()
        .rev()
        .find(|m| m.sender == Sender::Assistant)
    else {
        return Ok(());
    };

    let mut stdout = io::stdout();
    if let Some(delta) = reply.content.strip_prefix(shown.as_str()) {
        write!(stdout, "{}", delta)?;
    } else {
        // Content was replaced, e.g. by the apology text.
        write!(stdout, "\n{}", reply.content)?;
    }
    stdout.flush()?;
    shown.clone_from(&reply.content);
    Ok(())
}
