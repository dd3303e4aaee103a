use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MESSAGE_LOG_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Info,
    Success,
    Warning,
    Error,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMessage {
    pub kind: MessageKind,
    pub text: String,
}

/// Bounded, non-blocking channel for player-facing feedback. Oldest entries
/// are dropped first.
#[derive(Debug, Clone)]
pub struct MessageLog {
    capacity: usize,
    entries: VecDeque<GameMessage>,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MESSAGE_LOG_CAPACITY)
    }
}

impl MessageLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, kind: MessageKind, text: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(GameMessage {
            kind,
            text: text.into(),
        });
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(MessageKind::Info, text);
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.push(MessageKind::Success, text);
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        self.push(MessageKind::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(MessageKind::Error, text);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameMessage> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&GameMessage> {
        self.entries.back()
    }

    pub fn drain_into(&mut self, out: &mut Vec<GameMessage>) {
        out.extend(self.entries.drain(..));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_newest_entries_up_to_capacity() {
        let mut log = MessageLog::with_capacity(3);
        for index in 0..5 {
            log.info(format!("m{index}"));
        }
        let texts = log.iter().map(|m| m.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn drain_empties_log() {
        let mut log = MessageLog::default();
        log.error("Not enough money.");
        log.success("Added 1x 'wood' to backpack. Total: 1");
        let mut out = Vec::new();
        log.drain_into(&mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, MessageKind::Error);
        assert!(log.is_empty());
    }
}
