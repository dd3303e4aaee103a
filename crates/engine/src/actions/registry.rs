use serde::Serialize;
use serde_json::{json, Map, Value};

/// Id of the raw-code action older content may still carry. Never executed.
pub const RAW_CODE_ACTION_ID: &str = "customAction";

pub const QUEST_STATUS_CHOICES: [&str; 5] =
    ["not_started", "accepted", "in_progress", "completed", "rewarded"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionId {
    None,
    AddItemToBackpack,
    RemoveItemFromBackpack,
    HasItem,
    ChangeQuestState,
    GainXp,
    RemoveEntity,
    BoostStat,
    ShowGameSystemHint,
    AddMoney,
    SpendMoney,
    RestoreEnergy,
}

impl ActionId {
    pub const ALL: [ActionId; 12] = [
        Self::None,
        Self::AddItemToBackpack,
        Self::RemoveItemFromBackpack,
        Self::HasItem,
        Self::ChangeQuestState,
        Self::GainXp,
        Self::RemoveEntity,
        Self::BoostStat,
        Self::ShowGameSystemHint,
        Self::AddMoney,
        Self::SpendMoney,
        Self::RestoreEnergy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::AddItemToBackpack => "addItemToBackpack",
            Self::RemoveItemFromBackpack => "removeItemFromBackpack",
            Self::HasItem => "hasItem",
            Self::ChangeQuestState => "changeQuestState",
            Self::GainXp => "gainXp",
            Self::RemoveEntity => "removeEntity",
            Self::BoostStat => "boostStat",
            Self::ShowGameSystemHint => "showGameSystemHint",
            Self::AddMoney => "addMoney",
            Self::SpendMoney => "spendMoney",
            Self::RestoreEnergy => "restoreEnergy",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == raw)
    }

    pub fn descriptor(self) -> &'static ActionDescriptor {
        match self {
            Self::None => &NONE,
            Self::AddItemToBackpack => &ADD_ITEM,
            Self::RemoveItemFromBackpack => &REMOVE_ITEM,
            Self::HasItem => &HAS_ITEM,
            Self::ChangeQuestState => &CHANGE_QUEST_STATE,
            Self::GainXp => &GAIN_XP,
            Self::RemoveEntity => &REMOVE_ENTITY,
            Self::BoostStat => &BOOST_STAT,
            Self::ShowGameSystemHint => &SHOW_HINT,
            Self::AddMoney => &ADD_MONEY,
            Self::SpendMoney => &SPEND_MONEY,
            Self::RestoreEnergy => &RESTORE_ENERGY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "list(number)")]
    NumberList,
    #[serde(rename = "list(string)")]
    StringList,
    #[serde(rename = "select")]
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Number(f64),
    Text(&'static str),
}

impl ParamDefault {
    fn to_json(self) -> Value {
        match self {
            Self::Number(value) => json!(value),
            Self::Text(value) => json!(value),
        }
    }
}

/// Where a select/list parameter draws its choices from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSource {
    Fixed(&'static [&'static str]),
    QuestIds,
    SkillIds,
    MapIds,
    StatNames,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub param_type: ParamType,
    pub label: &'static str,
    pub default: Option<ParamDefault>,
    pub options: Option<OptionSource>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionDescriptor {
    pub id: ActionId,
    pub label: &'static str,
    pub parameters: &'static [ParamSpec],
}

impl ActionDescriptor {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|param| param.name == name)
    }
}

/// Live ids used to expand dynamic option lists.
#[derive(Debug, Clone, Default)]
pub struct OptionContext {
    pub quest_ids: Vec<String>,
    pub skill_ids: Vec<String>,
    pub map_ids: Vec<String>,
}

impl OptionContext {
    fn resolve(&self, source: OptionSource) -> Vec<String> {
        match source {
            OptionSource::Fixed(values) => values.iter().map(ToString::to_string).collect(),
            OptionSource::QuestIds => self.quest_ids.clone(),
            OptionSource::SkillIds => self.skill_ids.clone(),
            OptionSource::MapIds => self.map_ids.clone(),
            OptionSource::StatNames => crate::sim::PlayerStat::ALL
                .iter()
                .map(|stat| stat.as_str().to_string())
                .collect(),
        }
    }
}

/// `id -> {label, parameters: [{name, type, label, default?, options?}]}`.
pub fn registry_document(context: &OptionContext) -> Value {
    let mut document = Map::new();
    for id in ActionId::ALL {
        let descriptor = id.descriptor();
        let parameters = descriptor
            .parameters
            .iter()
            .map(|param| {
                let mut entry = Map::new();
                entry.insert("name".to_string(), json!(param.name));
                entry.insert("type".to_string(), json!(param.param_type));
                entry.insert("label".to_string(), json!(param.label));
                if let Some(default) = param.default {
                    entry.insert("default".to_string(), default.to_json());
                }
                if let Some(source) = param.options {
                    entry.insert("options".to_string(), json!(context.resolve(source)));
                }
                Value::Object(entry)
            })
            .collect::<Vec<_>>();
        document.insert(
            id.as_str().to_string(),
            json!({ "label": descriptor.label, "parameters": parameters }),
        );
    }
    Value::Object(document)
}

const fn text(name: &'static str, label: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        param_type: ParamType::Text,
        label,
        default: None,
        options: None,
    }
}

const fn number(name: &'static str, label: &'static str, default: f64) -> ParamSpec {
    ParamSpec {
        name,
        param_type: ParamType::Number,
        label,
        default: Some(ParamDefault::Number(default)),
        options: None,
    }
}

const fn select(name: &'static str, label: &'static str, options: OptionSource) -> ParamSpec {
    ParamSpec {
        name,
        param_type: ParamType::Select,
        label,
        default: None,
        options: Some(options),
    }
}

static NONE: ActionDescriptor = ActionDescriptor {
    id: ActionId::None,
    label: "None",
    parameters: &[],
};

static ADD_ITEM: ActionDescriptor = ActionDescriptor {
    id: ActionId::AddItemToBackpack,
    label: "Add Item to Backpack",
    parameters: &[text("item", "Item ID"), number("quantity", "Quantity", 1.0)],
};

static REMOVE_ITEM: ActionDescriptor = ActionDescriptor {
    id: ActionId::RemoveItemFromBackpack,
    label: "Remove Item from Backpack",
    parameters: &[text("item", "Item ID"), number("quantity", "Quantity", 1.0)],
};

static HAS_ITEM: ActionDescriptor = ActionDescriptor {
    id: ActionId::HasItem,
    label: "Check if Item in Backpack",
    parameters: &[text("item", "Item ID"), number("quantity", "Quantity", 1.0)],
};

static CHANGE_QUEST_STATE: ActionDescriptor = ActionDescriptor {
    id: ActionId::ChangeQuestState,
    label: "Change Quest Status",
    parameters: &[
        select("questId", "Quest ID", OptionSource::QuestIds),
        select(
            "newState",
            "New Status",
            OptionSource::Fixed(&QUEST_STATUS_CHOICES),
        ),
    ],
};

static GAIN_XP: ActionDescriptor = ActionDescriptor {
    id: ActionId::GainXp,
    label: "Gain Experience Points",
    parameters: &[
        ParamSpec {
            name: "amounts",
            param_type: ParamType::NumberList,
            label: "XP Amounts",
            default: None,
            options: None,
        },
        ParamSpec {
            name: "skills",
            param_type: ParamType::StringList,
            label: "Skills",
            default: None,
            options: Some(OptionSource::SkillIds),
        },
    ],
};

static REMOVE_ENTITY: ActionDescriptor = ActionDescriptor {
    id: ActionId::RemoveEntity,
    label: "Remove Entity from Map",
    parameters: &[
        select("mapId", "Map ID", OptionSource::MapIds),
        text("entityId", "Entity ID"),
    ],
};

static BOOST_STAT: ActionDescriptor = ActionDescriptor {
    id: ActionId::BoostStat,
    label: "Boost Player Stat",
    parameters: &[
        select("stat", "Stat Name", OptionSource::StatNames),
        number("amount", "Amount", 0.0),
    ],
};

static SHOW_HINT: ActionDescriptor = ActionDescriptor {
    id: ActionId::ShowGameSystemHint,
    label: "Show Game System Hint",
    parameters: &[
        text("message", "Message Text"),
        ParamSpec {
            name: "nextState",
            param_type: ParamType::Text,
            label: "Next Dialogue State (optional)",
            default: Some(ParamDefault::Text("end")),
            options: None,
        },
    ],
};

static ADD_MONEY: ActionDescriptor = ActionDescriptor {
    id: ActionId::AddMoney,
    label: "Add Money",
    parameters: &[number("amount", "Amount", 0.0)],
};

static SPEND_MONEY: ActionDescriptor = ActionDescriptor {
    id: ActionId::SpendMoney,
    label: "Spend Money",
    parameters: &[number("amount", "Amount", 0.0)],
};

static RESTORE_ENERGY: ActionDescriptor = ActionDescriptor {
    id: ActionId::RestoreEnergy,
    label: "Restore Energy",
    parameters: &[number("amount", "Amount", 0.0)],
};
