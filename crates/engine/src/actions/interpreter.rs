use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::sim::{MapSet, MessageLog, PlayerState, QuestState, RemovedEntities};

use super::action::{Action, ActionParseError};
use super::registry::ActionId;

/// A transient system dialogue raised by an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemHint {
    pub message: String,
    pub next_state: String,
}

/// Everything an action may touch. Built fresh per call by the owner of
/// the state so there is a single writer.
pub struct ActionContext<'a> {
    pub player: &'a mut PlayerState,
    pub quests: &'a mut QuestState,
    pub maps: &'a mut MapSet,
    pub removed_entities: &'a mut RemovedEntities,
    pub messages: &'a mut MessageLog,
    pub hints: &'a mut Vec<SystemHint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOutcome {
    pub id: ActionId,
    pub success: bool,
}

/// Runs every action in order. A failure is reported and the rest still run.
pub fn apply_actions(actions: &[Action], ctx: &mut ActionContext<'_>) -> Vec<ActionOutcome> {
    actions
        .iter()
        .map(|action| ActionOutcome {
            id: action.id(),
            success: apply_action(action, ctx),
        })
        .collect()
}

/// Lowers and applies an untyped `{id, params}` pair. Parse failures are
/// reported like any other failed action.
pub fn apply_raw_action(id: &str, params: &Map<String, Value>, ctx: &mut ActionContext<'_>) -> bool {
    match Action::parse(id, params) {
        Ok(action) => apply_action(&action, ctx),
        Err(error) => {
            warn!(action = id, error = %error, "action_rejected");
            match error {
                ActionParseError::UnknownAction { .. } | ActionParseError::RawCodeRejected => {
                    ctx.messages.warning(format!("Action '{id}' is not available."));
                }
                _ => ctx.messages.error(format!("Action '{id}' could not run: {error}")),
            }
            false
        }
    }
}

pub fn apply_action(action: &Action, ctx: &mut ActionContext<'_>) -> bool {
    let success = match action {
        Action::None => true,
        Action::AddItemToBackpack { item, quantity } => {
            let total = ctx.player.backpack.add(item, *quantity);
            ctx.messages
                .success(format!("Added {quantity}x '{item}' to backpack. Total: {total}"));
            true
        }
        Action::RemoveItemFromBackpack { item, quantity } => {
            match ctx.player.backpack.remove(item, *quantity) {
                Ok(()) => {
                    ctx.messages
                        .info(format!("Removed {quantity}x '{item}' from backpack."));
                    true
                }
                Err(held) => {
                    ctx.messages.error(format!(
                        "Not enough '{item}' in backpack. Need {quantity}, have {held}"
                    ));
                    false
                }
            }
        }
        Action::HasItem { item, quantity } => ctx.player.backpack.has(item, *quantity),
        Action::ChangeQuestState {
            quest_id,
            new_state,
        } => {
            if ctx.quests.set_status(quest_id, new_state.as_str()) {
                ctx.messages
                    .info(format!("Quest '{quest_id}' state changed to '{new_state}'."));
                true
            } else {
                ctx.messages
                    .warning(format!("Quest '{quest_id}' not found. Cannot change state."));
                false
            }
        }
        Action::GainXp { amounts, skills } => gain_xp(amounts, skills, ctx),
        Action::RemoveEntity { map_id, entity_id } => {
            match ctx.maps.get_mut(map_id) {
                Some(map) => {
                    map.remove_entity(entity_id);
                    ctx.removed_entities
                        .entry(map_id.clone())
                        .or_default()
                        .insert(entity_id.clone());
                    ctx.messages
                        .info(format!("Removed entity '{entity_id}' from map '{map_id}'."));
                }
                None => {
                    ctx.messages.warning(format!(
                        "Map '{map_id}' not found. Cannot remove entity '{entity_id}'."
                    ));
                }
            }
            true
        }
        Action::BoostStat { stat, amount } => {
            let value = ctx.player.boost_stat(*stat, *amount);
            ctx.messages
                .success(format!("{} changed by {amount}. Now: {value}", stat.as_str()));
            true
        }
        Action::ShowGameSystemHint {
            message,
            next_state,
        } => {
            ctx.hints.push(SystemHint {
                message: message.clone(),
                next_state: next_state.clone(),
            });
            true
        }
        Action::AddMoney { amount } => {
            ctx.player.money = ctx.player.money.saturating_add(*amount);
            ctx.messages.success(format!(
                "Gained ${amount}. Current money: ${}",
                ctx.player.money
            ));
            true
        }
        Action::SpendMoney { amount } => {
            if ctx.player.spend_money(*amount) {
                ctx.messages.info(format!(
                    "Spent ${amount}. Remaining money: ${}",
                    ctx.player.money
                ));
                true
            } else {
                ctx.messages.error(format!(
                    "Not enough money. Need ${amount}, have ${}",
                    ctx.player.money
                ));
                false
            }
        }
        Action::RestoreEnergy { amount } => {
            let energy = ctx.player.restore_energy(*amount);
            ctx.messages.success(format!(
                "Restored {amount} energy. Current energy: {energy}"
            ));
            true
        }
    };

    if success {
        debug!(action = action.id().as_str(), "action_applied");
    } else {
        warn!(action = action.id().as_str(), "action_failed");
    }
    success
}

fn gain_xp(amounts: &[u32], skills: &[String], ctx: &mut ActionContext<'_>) -> bool {
    if amounts.len() != skills.len() {
        warn!(
            amounts = amounts.len(),
            skills = skills.len(),
            "gain_xp_length_mismatch"
        );
        ctx.messages
            .error("XP amounts and skills must have the same number of entries.");
        return false;
    }

    for (amount, skill_id) in amounts.iter().zip(skills) {
        let Some(levels) = ctx.player.gain_skill_xp(skill_id, *amount) else {
            warn!(skill = %skill_id, "gain_xp_unknown_skill");
            continue;
        };
        ctx.messages
            .info(format!("You gained {amount} XP in {skill_id}!"));
        for level in levels {
            ctx.messages
                .success(format!("Your {skill_id} skill improved to Level {level}!"));
        }
    }
    true
}
