//! Multi-turn assistant conversation with an optional JSON transcript

use buildora_core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::prompt;
use crate::types::{ChatMessage, Role};

/// Prior turns of one assistant conversation
///
/// Only completed exchanges are recorded: a turn that failed or was cancelled
/// leaves the history as it was.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    turns: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of completed user/assistant exchanges
    pub fn exchanges(&self) -> usize {
        self.turns.iter().filter(|m| m.role == Role::Assistant).count()
    }

    /// Messages for the next request
    pub fn request(&self, input: &str) -> Vec<ChatMessage> {
        prompt::chat(&self.turns, input)
    }

    /// Append a finished exchange
    pub fn record(&mut self, input: &str, reply: impl Into<String>) {
        self.turns.push(ChatMessage::user(input.trim()));
        self.turns.push(ChatMessage::assistant(reply));
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Load a transcript, starting empty when the file does not exist yet
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No transcript yet, starting a new conversation");
                Ok(Self::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_string_pretty(self)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_carry_prior_exchanges() {
        let mut conversation = Conversation::new();
        conversation.record("a counter", "=== index.html ===\n<p>0</p>");
        conversation.record(" make it red ", "=== style.css ===\np{color:red}");
        assert_eq!(conversation.exchanges(), 2);

        let messages = conversation.request("add a reset button");
        let texts: Vec<(Role, &str)> = messages[1..]
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            texts,
            vec![
                (Role::User, "a counter"),
                (Role::Assistant, "=== index.html ===\n<p>0</p>"),
                (Role::User, "make it red"),
                (Role::Assistant, "=== style.css ===\np{color:red}"),
                (Role::User, "add a reset button"),
            ]
        );

        conversation.clear();
        assert_eq!(conversation.request("hi").len(), 2);
    }

    #[tokio::test]
    async fn test_transcript_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats/site.json");

        assert!(Conversation::load(&path).await.unwrap().is_empty());

        let mut conversation = Conversation::new();
        conversation.record("hello", "Hi there");
        conversation.save(&path).await.unwrap();

        let loaded = Conversation::load(&path).await.unwrap();
        assert_eq!(loaded, conversation);
    }
}
