//! `multichat history [QUERY]`: saved conversations from the active backend.

use std::error::Error;

use crate::cli::AppContext;
use crate::core::conversation::{search_conversations, Conversation};

pub async fn show_history(context: &AppContext, query: Option<&str>) -> Result<(), Box<dyn Error>> {
    let conversations = context.gateway.list_conversations().await;
    let source = if context.gateway.is_remote_active() {
        "account"
    } else {
        "this device"
    };

    let lines = match query {
        Some(query) => search_lines(&conversations, query),
        None => listing_lines(&conversations),
    };
    if lines.is_empty() {
        match query {
            Some(query) => println!("No conversations mention \"{query}\"."),
            None => println!("No saved conversations on {source}."),
        }
        return Ok(());
    }

    for line in lines {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn listing_lines(conversations: &[Conversation]) -> Vec<String> {
    conversations
        .iter()
        .map(|conversation| {
            format!(
                "{}  {:<30}  {} messages",
                conversation.updated_at.format("%Y-%m-%d %H:%M"),
                conversation.title,
                conversation.messages.len()
            )
        })
        .collect()
}

pub(crate) fn search_lines(conversations: &[Conversation], query: &str) -> Vec<String> {
    search_conversations(conversations, query)
        .into_iter()
        .map(|hit| match hit.message_id {
            None => format!("{} (title)", hit.title),
            Some(_) => format!("{}: {}", hit.title, hit.snippet),
        })
        .collect()
}
