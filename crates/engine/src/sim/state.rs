use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::grid::TileCoord;
use super::movement::MovementController;

pub const ENDURANCE_SKILL: &str = "endurance";
pub const ENDURANCE_MAX_ENERGY_BONUS: u32 = 10;
pub const DEFAULT_XP_TO_NEXT_LEVEL: u32 = 100;

/// Entities removed at play time, keyed by map id. Persisted as map overrides.
pub type RemovedEntities = BTreeMap<String, BTreeSet<String>>;

/// Quest id to free-form status. Only ids present here can be changed by
/// actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestState {
    statuses: BTreeMap<String, String>,
}

impl QuestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, quest_id: impl Into<String>, status: impl Into<String>) {
        self.statuses.insert(quest_id.into(), status.into());
    }

    pub fn status(&self, quest_id: &str) -> Option<&str> {
        self.statuses.get(quest_id).map(String::as_str)
    }

    pub fn contains(&self, quest_id: &str) -> bool {
        self.statuses.contains_key(quest_id)
    }

    /// Returns false when `quest_id` was never registered.
    pub fn set_status(&mut self, quest_id: &str, status: impl Into<String>) -> bool {
        match self.statuses.get_mut(quest_id) {
            Some(slot) => {
                *slot = status.into();
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.statuses
            .iter()
            .map(|(id, status)| (id.as_str(), status.as_str()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.statuses.keys().map(String::as_str)
    }
}

impl FromIterator<(String, String)> for QuestState {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            statuses: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Backpack {
    items: BTreeMap<String, u32>,
}

impl Backpack {
    pub fn quantity(&self, item_id: &str) -> u32 {
        self.items.get(item_id).copied().unwrap_or(0)
    }

    pub fn has(&self, item_id: &str, quantity: u32) -> bool {
        self.quantity(item_id) >= quantity
    }

    /// Returns the new total.
    pub fn add(&mut self, item_id: &str, quantity: u32) -> u32 {
        let slot = self.items.entry(item_id.to_string()).or_insert(0);
        *slot = slot.saturating_add(quantity);
        *slot
    }

    /// Removes `quantity`, dropping the entry at zero. On shortfall nothing
    /// changes and the held amount is returned as the error.
    pub fn remove(&mut self, item_id: &str, quantity: u32) -> Result<(), u32> {
        let held = self.quantity(item_id);
        if held < quantity || held == 0 {
            return Err(held);
        }
        let remaining = held - quantity;
        if remaining == 0 {
            self.items.remove(item_id);
        } else {
            self.items.insert(item_id.to_string(), remaining);
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.items.iter().map(|(id, qty)| (id.as_str(), *qty))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<(String, u32)> for Backpack {
    fn from_iter<T: IntoIterator<Item = (String, u32)>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().filter(|(_, qty)| *qty > 0).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Skill {
    pub level: u32,
    pub xp: u32,
    pub xp_to_next_level: u32,
}

impl Default for Skill {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            xp_to_next_level: DEFAULT_XP_TO_NEXT_LEVEL,
        }
    }
}

impl Skill {
    /// Adds xp and cascades level-ups; each threshold grows by half, rounded
    /// down, and always by at least one. Returns every level reached, in order.
    pub fn gain(&mut self, amount: u32) -> Vec<u32> {
        self.xp = self.xp.saturating_add(amount);
        let mut reached = Vec::new();
        loop {
            let threshold = self.xp_to_next_level.max(1);
            if self.xp < threshold {
                break;
            }
            self.level = self.level.saturating_add(1);
            self.xp -= threshold;
            self.xp_to_next_level = next_threshold(threshold);
            reached.push(self.level);
        }
        reached
    }
}

fn next_threshold(threshold: u32) -> u32 {
    let grown = (u64::from(threshold) * 3 / 2).max(u64::from(threshold) + 1);
    u32::try_from(grown).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStat {
    Hp,
    MaxHp,
    Energy,
    MaxEnergy,
}

impl PlayerStat {
    pub const ALL: [PlayerStat; 4] = [Self::Hp, Self::MaxHp, Self::Energy, Self::MaxEnergy];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hp => "hp",
            Self::MaxHp => "maxHp",
            Self::Energy => "energy",
            Self::MaxEnergy => "maxEnergy",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stat| stat.as_str() == raw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerState {
    pub position: TileCoord,
    #[serde(skip)]
    pub movement: MovementController,
    pub backpack: Backpack,
    pub skills: BTreeMap<String, Skill>,
    pub money: u64,
    pub energy: u32,
    pub max_energy: u32,
    pub hp: u32,
    pub max_hp: u32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            position: TileCoord::new(0, 0),
            movement: MovementController::default(),
            backpack: Backpack::default(),
            skills: BTreeMap::new(),
            money: 0,
            energy: 100,
            max_energy: 100,
            hp: 100,
            max_hp: 100,
        }
    }
}

impl PlayerState {
    /// Adds a signed delta, saturating at zero. Returns the new value.
    pub fn boost_stat(&mut self, stat: PlayerStat, amount: i64) -> u32 {
        let slot = match stat {
            PlayerStat::Hp => &mut self.hp,
            PlayerStat::MaxHp => &mut self.max_hp,
            PlayerStat::Energy => &mut self.energy,
            PlayerStat::MaxEnergy => &mut self.max_energy,
        };
        let next = (*slot as i64).saturating_add(amount).clamp(0, u32::MAX as i64);
        *slot = next as u32;
        *slot
    }

    /// Returns the new energy value.
    pub fn restore_energy(&mut self, amount: u32) -> u32 {
        self.energy = self.energy.saturating_add(amount).min(self.max_energy);
        self.energy
    }

    /// `None` if the skill is unknown. Applies per-skill level-up effects.
    pub fn gain_skill_xp(&mut self, skill_id: &str, amount: u32) -> Option<Vec<u32>> {
        let skill = self.skills.get_mut(skill_id)?;
        let reached = skill.gain(amount);
        if skill_id == ENDURANCE_SKILL {
            for _ in &reached {
                self.max_energy = self.max_energy.saturating_add(ENDURANCE_MAX_ENERGY_BONUS);
                self.energy = self.max_energy;
            }
        }
        Some(reached)
    }

    pub fn spend_money(&mut self, amount: u64) -> bool {
        if self.money < amount {
            return false;
        }
        self.money -= amount;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_level_up_carries_remainder() {
        let mut skill = Skill {
            level: 1,
            xp: 90,
            xp_to_next_level: 100,
        };
        assert_eq!(skill.gain(20), vec![2]);
        assert_eq!(
            skill,
            Skill {
                level: 2,
                xp: 10,
                xp_to_next_level: 150,
            }
        );
    }

    #[test]
    fn tiny_thresholds_still_grow() {
        let mut skill = Skill {
            level: 1,
            xp: 0,
            xp_to_next_level: 1,
        };
        let reached = skill.gain(u32::MAX);
        assert!(reached.len() < 64, "{} level-ups", reached.len());
        assert!(skill.xp < skill.xp_to_next_level);
        assert_eq!(skill.level as usize, 1 + reached.len());

        let mut zero = Skill {
            level: 1,
            xp: 0,
            xp_to_next_level: 0,
        };
        assert_eq!(zero.gain(3), vec![2, 3]);
        assert_eq!(zero.xp_to_next_level, 3);
    }

    #[test]
    fn large_gain_cascades_level_ups() {
        let mut skill = Skill::default();
        // 100 + 150 + 225 = 475
        assert_eq!(skill.gain(500), vec![2, 3, 4]);
        assert_eq!(skill.xp, 25);
        assert_eq!(skill.xp_to_next_level, 337);
    }

    #[test]
    fn zero_threshold_does_not_spin() {
        let mut skill = Skill {
            level: 0,
            xp: 0,
            xp_to_next_level: 0,
        };
        let reached = skill.gain(3);
        assert_eq!(reached, vec![1, 2, 3]);
        assert_eq!(skill.xp, 0);
    }

    #[test]
    fn endurance_level_up_raises_and_refills_energy() {
        let mut player = PlayerState {
            energy: 40,
            max_energy: 100,
            ..PlayerState::default()
        };
        player
            .skills
            .insert(ENDURANCE_SKILL.to_string(), Skill::default());
        let reached = player.gain_skill_xp(ENDURANCE_SKILL, 100).expect("known skill");
        assert_eq!(reached, vec![2]);
        assert_eq!(player.max_energy, 110);
        assert_eq!(player.energy, 110);
        assert!(player.gain_skill_xp("juggling", 10).is_none());
    }

    #[test]
    fn backpack_remove_rejects_shortfall_and_drops_empty_entries() {
        let mut backpack = [("wood".to_string(), 2)].into_iter().collect::<Backpack>();
        assert_eq!(backpack.remove("wood", 3), Err(2));
        assert_eq!(backpack.quantity("wood"), 2);

        assert_eq!(backpack.remove("wood", 2), Ok(()));
        assert!(backpack.is_empty());
        assert_eq!(backpack.remove("stone", 1), Err(0));
    }

    #[test]
    fn quest_status_changes_only_for_registered_ids() {
        let mut quests = QuestState::new();
        quests.register("q1", "not_started");
        assert!(quests.set_status("q1", "accepted"));
        assert_eq!(quests.status("q1"), Some("accepted"));
        assert!(!quests.set_status("q2", "accepted"));
        assert!(!quests.contains("q2"));
    }

    #[test]
    fn stats_clamp_and_saturate() {
        let mut player = PlayerState {
            energy: 95,
            max_energy: 100,
            ..PlayerState::default()
        };
        assert_eq!(player.restore_energy(20), 100);
        assert_eq!(player.boost_stat(PlayerStat::Hp, -500), 0);
        assert_eq!(player.boost_stat(PlayerStat::MaxHp, 15), 115);
        assert_eq!(PlayerStat::parse("maxEnergy"), Some(PlayerStat::MaxEnergy));
        assert_eq!(PlayerStat::parse("mana"), None);
    }
}
