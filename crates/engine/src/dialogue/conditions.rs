use crate::config::MissingQuestPolicy;
use crate::sim::{Backpack, QuestState};

use super::model::{Condition, LogicRule};

/// Read-only view of the state conditions look at.
#[derive(Clone, Copy)]
pub struct ConditionFacts<'a> {
    pub quests: &'a QuestState,
    pub backpack: &'a Backpack,
    pub missing_quest_policy: &'a MissingQuestPolicy,
}

impl ConditionFacts<'_> {
    pub fn holds(&self, condition: &Condition) -> bool {
        match condition {
            Condition::QuestStatus { quest_id, status } => match self.quests.status(quest_id) {
                Some(current) => current == status,
                None => match self.missing_quest_policy {
                    MissingQuestPolicy::Fail => false,
                    MissingQuestPolicy::MatchUnset { sentinel } => sentinel == status,
                },
            },
            Condition::HasItem { item_id, quantity } => self.backpack.has(item_id, *quantity),
        }
    }

    /// Stops at the first failing condition. `on_check` sees every
    /// condition evaluated.
    pub fn rule_matches(&self, rule: &LogicRule, mut on_check: impl FnMut(&Condition, bool)) -> bool {
        rule.conditions.iter().all(|condition| {
            let holds = self.holds(condition);
            on_check(condition, holds);
            holds
        })
    }
}
