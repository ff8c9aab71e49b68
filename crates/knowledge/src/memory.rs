//! Conversation memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used in prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, append-only history of a session's turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a question and its answer.
    pub fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, question));
        self.turns.push(Turn::new(Role::Assistant, answer));
    }

    /// At most the `n` most recent turns, oldest first, starting on a user
    /// turn so no answer appears without its question.
    pub fn window(&self, n: usize) -> &[Turn] {
        let mut skip = self.turns.len().saturating_sub(n);
        while self.turns.get(skip).is_some_and(|turn| turn.role != Role::User) {
            skip += 1;
        }
        &self.turns[skip..]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_exchange_order() {
        let mut memory = ConversationMemory::new();
        memory.push_exchange("What is X?", "A resistor.");

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.turns()[0].role, Role::User);
        assert_eq!(memory.turns()[1].text, "A resistor.");
        assert!(memory.turns()[0].timestamp <= memory.turns()[1].timestamp);
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let mut memory = ConversationMemory::new();
        for i in 0..5 {
            memory.push_exchange(format!("q{i}"), format!("a{i}"));
        }

        let window = memory.window(4);
        let texts: Vec<&str> = window.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q3", "a3", "q4", "a4"]);
        assert_eq!(memory.window(100).len(), 10);
        assert!(memory.window(0).is_empty());
    }

    #[test]
    fn test_odd_window_starts_on_question() {
        let mut memory = ConversationMemory::new();
        for i in 0..5 {
            memory.push_exchange(format!("q{i}"), format!("a{i}"));
        }

        let texts: Vec<&str> = memory.window(3).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q4", "a4"]);
        assert!(memory.window(1).is_empty());
    }

    #[test]
    fn test_clear() {
        let mut memory = ConversationMemory::new();
        memory.push_exchange("q", "a");
        memory.clear();
        assert!(memory.is_empty());
    }
}
