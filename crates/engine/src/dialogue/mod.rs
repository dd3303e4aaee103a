mod conditions;
mod engine;
mod model;
mod preview;

pub use conditions::ConditionFacts;
pub use engine::{
    ChoiceReport, DialogueEngine, DialogueInputError, DialogueObserver, DialogueSettings,
    DialogueView, NoopDialogueObserver,
};
pub use model::{
    Condition, DialogueGraph, DialogueNode, DialogueOption, EntityScript, LogicRule, ScriptBook,
    HINT_DISMISS_TEXT, START_STATE, SYSTEM_ENTITY_ID,
};
pub use preview::{DialoguePreview, PreviewSnapshot, TraceEvent, TraceRecorder};
