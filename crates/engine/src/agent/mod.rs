mod console;
mod perception;

pub use console::{
    tokenize_line, AgentCommand, CommandParseError, CommandRegistry, CommandSpec, LocalAction,
    ParsedCommand,
};
pub use perception::{perceive, Interactable, NpcView, Perception, PlayerView, TransitionView};
