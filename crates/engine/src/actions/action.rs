use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::sim::PlayerStat;

use super::registry::{ActionId, ParamDefault, ParamSpec, RAW_CODE_ACTION_ID};

pub const DEFAULT_HINT_NEXT_STATE: &str = "end";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionParseError {
    #[error("unknown action id '{id}'")]
    UnknownAction { id: String },
    #[error("raw code actions ('customAction') are not supported")]
    RawCodeRejected,
    #[error("action '{action}' is missing required parameter '{param}'")]
    MissingParam {
        action: &'static str,
        param: &'static str,
    },
    #[error("action '{action}' parameter '{param}': {reason}")]
    InvalidParam {
        action: &'static str,
        param: &'static str,
        reason: String,
    },
}

/// One entry of the closed action registry with its typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    AddItemToBackpack { item: String, quantity: u32 },
    RemoveItemFromBackpack { item: String, quantity: u32 },
    HasItem { item: String, quantity: u32 },
    ChangeQuestState { quest_id: String, new_state: String },
    /// Parallel lists; a length mismatch is kept so it fails when applied.
    GainXp { amounts: Vec<u32>, skills: Vec<String> },
    RemoveEntity { map_id: String, entity_id: String },
    BoostStat { stat: PlayerStat, amount: i64 },
    ShowGameSystemHint { message: String, next_state: String },
    AddMoney { amount: u64 },
    SpendMoney { amount: u64 },
    RestoreEnergy { amount: u32 },
}

impl Action {
    pub fn id(&self) -> ActionId {
        match self {
            Self::None => ActionId::None,
            Self::AddItemToBackpack { .. } => ActionId::AddItemToBackpack,
            Self::RemoveItemFromBackpack { .. } => ActionId::RemoveItemFromBackpack,
            Self::HasItem { .. } => ActionId::HasItem,
            Self::ChangeQuestState { .. } => ActionId::ChangeQuestState,
            Self::GainXp { .. } => ActionId::GainXp,
            Self::RemoveEntity { .. } => ActionId::RemoveEntity,
            Self::BoostStat { .. } => ActionId::BoostStat,
            Self::ShowGameSystemHint { .. } => ActionId::ShowGameSystemHint,
            Self::AddMoney { .. } => ActionId::AddMoney,
            Self::SpendMoney { .. } => ActionId::SpendMoney,
            Self::RestoreEnergy { .. } => ActionId::RestoreEnergy,
        }
    }

    /// Lowers an authored `{id, params}` pair. Missing parameters with a
    /// registry default take that default.
    pub fn parse(id: &str, params: &Map<String, Value>) -> Result<Self, ActionParseError> {
        if id == RAW_CODE_ACTION_ID {
            return Err(ActionParseError::RawCodeRejected);
        }
        let action_id = ActionId::parse(id).ok_or_else(|| ActionParseError::UnknownAction {
            id: id.to_string(),
        })?;
        let reader = ParamReader {
            action_id,
            params,
        };

        let action = match action_id {
            ActionId::None => Self::None,
            ActionId::AddItemToBackpack => Self::AddItemToBackpack {
                item: reader.text("item")?,
                quantity: reader.count("quantity")?,
            },
            ActionId::RemoveItemFromBackpack => Self::RemoveItemFromBackpack {
                item: reader.text("item")?,
                quantity: reader.count("quantity")?,
            },
            ActionId::HasItem => Self::HasItem {
                item: reader.text("item")?,
                quantity: reader.count("quantity")?,
            },
            ActionId::ChangeQuestState => Self::ChangeQuestState {
                quest_id: reader.text("questId")?,
                new_state: reader.text("newState")?,
            },
            ActionId::GainXp => Self::GainXp {
                amounts: reader
                    .number_list("amounts")?
                    .into_iter()
                    .map(|value| non_negative_u32(action_id, "amounts", value))
                    .collect::<Result<Vec<_>, _>>()?,
                skills: reader.string_list("skills")?,
            },
            ActionId::RemoveEntity => Self::RemoveEntity {
                map_id: reader.text("mapId")?,
                entity_id: reader.text("entityId")?,
            },
            ActionId::BoostStat => {
                let raw = reader.text("stat")?;
                let stat = PlayerStat::parse(&raw).ok_or_else(|| ActionParseError::InvalidParam {
                    action: action_id.as_str(),
                    param: "stat",
                    reason: format!("unknown stat '{raw}'"),
                })?;
                Self::BoostStat {
                    stat,
                    amount: reader.integer("amount")?,
                }
            }
            ActionId::ShowGameSystemHint => Self::ShowGameSystemHint {
                message: reader.text("message")?,
                next_state: reader.text("nextState")?,
            },
            ActionId::AddMoney => Self::AddMoney {
                amount: reader.amount("amount")?,
            },
            ActionId::SpendMoney => Self::SpendMoney {
                amount: reader.amount("amount")?,
            },
            ActionId::RestoreEnergy => Self::RestoreEnergy {
                amount: reader.count("amount")?,
            },
        };
        Ok(action)
    }

    /// Authored `{id, params}` form.
    pub fn to_json(&self) -> Value {
        let params = match self {
            Self::None => json!({}),
            Self::AddItemToBackpack { item, quantity }
            | Self::RemoveItemFromBackpack { item, quantity }
            | Self::HasItem { item, quantity } => json!({ "item": item, "quantity": quantity }),
            Self::ChangeQuestState {
                quest_id,
                new_state,
            } => json!({ "questId": quest_id, "newState": new_state }),
            Self::GainXp { amounts, skills } => json!({ "amounts": amounts, "skills": skills }),
            Self::RemoveEntity { map_id, entity_id } => {
                json!({ "mapId": map_id, "entityId": entity_id })
            }
            Self::BoostStat { stat, amount } => json!({ "stat": stat.as_str(), "amount": amount }),
            Self::ShowGameSystemHint {
                message,
                next_state,
            } => json!({ "message": message, "nextState": next_state }),
            Self::AddMoney { amount } | Self::SpendMoney { amount } => json!({ "amount": amount }),
            Self::RestoreEnergy { amount } => json!({ "amount": amount }),
        };
        json!({ "id": self.id().as_str(), "params": params })
    }
}

struct ParamReader<'a> {
    action_id: ActionId,
    params: &'a Map<String, Value>,
}

impl ParamReader<'_> {
    fn spec(&self, name: &'static str) -> Option<&'static ParamSpec> {
        self.action_id.descriptor().param(name)
    }

    fn invalid(&self, param: &'static str, reason: impl Into<String>) -> ActionParseError {
        ActionParseError::InvalidParam {
            action: self.action_id.as_str(),
            param,
            reason: reason.into(),
        }
    }

    fn missing(&self, param: &'static str) -> ActionParseError {
        ActionParseError::MissingParam {
            action: self.action_id.as_str(),
            param,
        }
    }

    fn raw(&self, name: &'static str) -> Option<Value> {
        match self.params.get(name) {
            Some(Value::Null) | None => self
                .spec(name)
                .and_then(|spec| spec.default)
                .map(|default| match default {
                    ParamDefault::Number(value) => json!(value),
                    ParamDefault::Text(value) => json!(value),
                }),
            Some(value) => Some(value.clone()),
        }
    }

    fn text(&self, name: &'static str) -> Result<String, ActionParseError> {
        match self.raw(name) {
            Some(Value::String(value)) => Ok(value),
            Some(Value::Number(value)) => Ok(value.to_string()),
            Some(other) => Err(self.invalid(name, format!("expected text, got {other}"))),
            None => Err(self.missing(name)),
        }
    }

    fn number(&self, name: &'static str) -> Result<f64, ActionParseError> {
        let value = self.raw(name).ok_or_else(|| self.missing(name))?;
        number_from_value(&value)
            .ok_or_else(|| self.invalid(name, format!("expected number, got {value}")))
    }

    fn integer(&self, name: &'static str) -> Result<i64, ActionParseError> {
        let value = self.number(name)?;
        if value.fract() != 0.0 || !value.is_finite() {
            return Err(self.invalid(name, format!("expected a whole number, got {value}")));
        }
        Ok(value as i64)
    }

    fn count(&self, name: &'static str) -> Result<u32, ActionParseError> {
        non_negative_u32(self.action_id, name, self.number(name)?)
    }

    fn amount(&self, name: &'static str) -> Result<u64, ActionParseError> {
        let value = self.integer(name)?;
        u64::try_from(value).map_err(|_| {
            self.invalid(name, format!("expected a non-negative amount, got {value}"))
        })
    }

    fn number_list(&self, name: &'static str) -> Result<Vec<f64>, ActionParseError> {
        self.list(name)?
            .iter()
            .map(|value| {
                number_from_value(value).ok_or_else(|| {
                    self.invalid(name, format!("expected number entries, got {value}"))
                })
            })
            .collect()
    }

    fn string_list(&self, name: &'static str) -> Result<Vec<String>, ActionParseError> {
        self.list(name)?
            .into_iter()
            .map(|value| match value {
                Value::String(text) => Ok(text),
                other => Err(self.invalid(name, format!("expected text entries, got {other}"))),
            })
            .collect()
    }

    /// Lists may be authored as arrays or as comma-separated text.
    fn list(&self, name: &'static str) -> Result<Vec<Value>, ActionParseError> {
        match self.raw(name) {
            Some(Value::Array(values)) => Ok(values),
            Some(Value::String(text)) => Ok(text
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(|entry| Value::String(entry.to_string()))
                .collect()),
            Some(Value::Number(value)) => Ok(vec![Value::Number(value)]),
            Some(other) => Err(self.invalid(name, format!("expected a list, got {other}"))),
            None => Err(self.missing(name)),
        }
    }
}

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn non_negative_u32(
    action_id: ActionId,
    param: &'static str,
    value: f64,
) -> Result<u32, ActionParseError> {
    if !value.is_finite() || value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(ActionParseError::InvalidParam {
            action: action_id.as_str(),
            param,
            reason: format!("expected a non-negative whole number, got {value}"),
        });
    }
    Ok(value as u32)
}
