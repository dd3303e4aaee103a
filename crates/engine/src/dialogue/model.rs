use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actions::Action;

pub const START_STATE: &str = "start";

/// Entity id used for hints raised outside any conversation.
pub const SYSTEM_ENTITY_ID: &str = "game_system";
pub const HINT_DISMISS_TEXT: &str = "Got it.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Condition {
    #[serde(rename_all = "camelCase")]
    QuestStatus { quest_id: String, status: String },
    #[serde(rename_all = "camelCase")]
    HasItem {
        item_id: String,
        #[serde(default = "default_quantity")]
        quantity: u32,
    },
}

fn default_quantity() -> u32 {
    1
}

/// All conditions must hold (an empty list always matches).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicRule {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub target_state: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueOption {
    pub text: String,
    /// `None` closes, as does the terminal sentinel.
    pub next_state: Option<String>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueNode {
    pub text: String,
    pub options: Vec<DialogueOption>,
}

impl DialogueNode {
    pub fn is_terminal(&self) -> bool {
        self.options.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialogueGraph {
    nodes: BTreeMap<String, DialogueNode>,
}

impl DialogueGraph {
    pub fn new(nodes: BTreeMap<String, DialogueNode>) -> Self {
        Self { nodes }
    }

    pub fn node(&self, state_id: &str) -> Option<&DialogueNode> {
        self.nodes.get(state_id)
    }

    pub fn contains(&self, state_id: &str) -> bool {
        self.nodes.contains_key(state_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DialogueNode)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Authored conversation for one entity id.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityScript {
    pub id: String,
    pub name: Option<String>,
    pub dialogue: DialogueGraph,
    pub logic: Vec<LogicRule>,
}

impl EntityScript {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

pub type ScriptBook = BTreeMap<String, EntityScript>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_deserialize_from_tagged_json() {
        let raw = r#"[
            {"type": "questStatus", "questId": "chickenQuest", "status": "accepted"},
            {"type": "hasItem", "itemId": "chicken"}
        ]"#;
        let conditions: Vec<Condition> = serde_json::from_str(raw).expect("parse");
        assert_eq!(
            conditions,
            vec![
                Condition::QuestStatus {
                    quest_id: "chickenQuest".to_string(),
                    status: "accepted".to_string()
                },
                Condition::HasItem {
                    item_id: "chicken".to_string(),
                    quantity: 1
                },
            ]
        );
        assert!(serde_json::from_str::<Condition>(r#"{"type": "moonPhase"}"#).is_err());
    }
}
