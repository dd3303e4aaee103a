mod action;
mod interpreter;
mod registry;

pub use action::{Action, ActionParseError, DEFAULT_HINT_NEXT_STATE};
pub use interpreter::{
    apply_action, apply_actions, apply_raw_action, ActionContext, ActionOutcome, SystemHint,
};
pub use registry::{
    registry_document, ActionDescriptor, ActionId, OptionContext, OptionSource, ParamDefault,
    ParamSpec, ParamType, QUEST_STATUS_CHOICES, RAW_CODE_ACTION_ID,
};
