use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::persistence::DEFAULT_SAVE_SLOT;
use crate::sim::TileCoord;

/// Commands that act on the world. The runner owning the world applies them.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentCommand {
    Click { cell: TileCoord },
    Choose { option_index: usize },
    Close,
    Wait { ticks: u32 },
    Perceive,
    Registry,
    Exec { action_id: String, params: Map<String, Value> },
    Save { slot: String },
    Load { slot: String },
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocalAction {
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedCommand {
    Local(LocalAction),
    World(AgentCommand),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}. usage: {usage}")]
pub struct CommandParseError {
    pub reason: String,
    pub usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &str) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.to_string(),
        }
    }
}

/// Parsers get the tokens after the command name and the raw text they came
/// from (for arguments such as JSON that must not be tokenized).
type ParseFn = dyn Fn(&[String], &str) -> Result<ParsedCommand, CommandParseError> + Send + Sync;
type BuiltinParse = fn(&[String], &str) -> Result<ParsedCommand, CommandParseError>;

pub struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

pub struct CommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let builtins: [(&str, &str, &str, BuiltinParse); 11] = [
            ("help", "List commands", "", parse_help),
            ("click", "Click a cell of the active map", "<x:u32> <y:u32>", parse_click),
            ("choose", "Pick a dialogue option", "<index:usize>", parse_choose),
            ("close", "Close the open dialogue", "", parse_close),
            ("wait", "Advance fixed ticks", "[ticks:u32]", parse_wait),
            ("perceive", "Print a perception snapshot", "", parse_perceive),
            ("registry", "Print the action registry", "", parse_registry),
            ("exec", "Apply an action", "<action_id> [params:json]", parse_exec),
            ("save", "Write a save slot", "[slot]", parse_save),
            ("load", "Restore a save slot", "[slot]", parse_load),
            ("quit", "Stop the session", "", parse_quit),
        ];
        let mut registry = Self::new();
        for (name, help, arg_schema, parse) in builtins {
            // Names above are distinct and non-empty.
            let _ = registry.register(name, help, arg_schema, parse);
        }
        registry
    }

    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[String], &str) -> Result<ParsedCommand, CommandParseError> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name.insert(lower, self.specs.len() - 1);
        Ok(())
    }

    pub fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let index = self.lookup_by_lower_name.get(&input_name.to_ascii_lowercase())?;
        self.specs.get(*index)
    }

    /// Registration order.
    pub fn iter_specs_in_order(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.specs.iter().map(|spec| {
            (
                spec.name.as_str(),
                spec.help.as_str(),
                spec.arg_schema.as_str(),
            )
        })
    }

    pub fn help_lines(&self) -> Vec<String> {
        self.iter_specs_in_order()
            .map(|(name, help, arg_schema)| {
                if arg_schema.is_empty() {
                    format!("{name} - {help}")
                } else {
                    format!("{name} {arg_schema} - {help}")
                }
            })
            .collect()
    }

    /// `Ok(None)` for blank lines and `#` comments.
    pub fn parse_line(&self, raw_line: &str) -> Result<Option<ParsedCommand>, CommandParseError> {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (trimmed, ""),
        };
        let Some(spec) = self.lookup(name) else {
            return Err(CommandParseError::new(
                format!("unknown command '{name}'"),
                "help",
            ));
        };
        let args = tokenize_line(rest).map_err(|reason| CommandParseError::new(reason, "help"))?;
        (spec.parse)(&args, rest).map(Some)
    }
}

pub fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            // Inside quotes a backslash keeps the next char literal.
            '\\' if in_quotes => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            _ => {
                current.push(ch);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_help(args: &[String], _: &str) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(ParsedCommand::Local(LocalAction::Help))
}

fn parse_click(args: &[String], _: &str) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "click <x> <y>";
    let [x, y] = args else {
        return Err(CommandParseError::new(
            "expected exactly two arguments <x> <y>",
            USAGE,
        ));
    };
    let coordinate = |raw: &String, axis: &str| {
        raw.parse::<u32>().map_err(|_| {
            CommandParseError::new(format!("invalid {axis} coordinate '{raw}' (expected u32)"), USAGE)
        })
    };
    Ok(ParsedCommand::World(AgentCommand::Click {
        cell: TileCoord::new(coordinate(x, "x")?, coordinate(y, "y")?),
    }))
}

fn parse_choose(args: &[String], _: &str) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "choose <index>";
    let [index] = args else {
        return Err(CommandParseError::new("expected exactly one argument <index>", USAGE));
    };
    let option_index = index.parse::<usize>().map_err(|_| {
        CommandParseError::new(format!("invalid option index '{index}' (expected usize)"), USAGE)
    })?;
    Ok(ParsedCommand::World(AgentCommand::Choose { option_index }))
}

fn parse_close(args: &[String], _: &str) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "close")?;
    Ok(ParsedCommand::World(AgentCommand::Close))
}

fn parse_wait(args: &[String], _: &str) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "wait [ticks]";
    let ticks = match args {
        [] => 1,
        [raw] => raw.parse::<u32>().map_err(|_| {
            CommandParseError::new(format!("invalid tick count '{raw}' (expected u32)"), USAGE)
        })?,
        _ => return Err(CommandParseError::new("expected at most one argument", USAGE)),
    };
    Ok(ParsedCommand::World(AgentCommand::Wait { ticks }))
}

fn parse_perceive(args: &[String], _: &str) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "perceive")?;
    Ok(ParsedCommand::World(AgentCommand::Perceive))
}

fn parse_registry(args: &[String], _: &str) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "registry")?;
    Ok(ParsedCommand::World(AgentCommand::Registry))
}

fn parse_exec(args: &[String], raw: &str) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "exec <action_id> [params:json]";
    let Some(action_id) = args.first() else {
        return Err(CommandParseError::new("missing required argument <action_id>", USAGE));
    };
    let json = raw
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or("");
    let params = if json.is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(params)) => params,
            Ok(_) => return Err(CommandParseError::new("params must be a JSON object", USAGE)),
            Err(error) => {
                return Err(CommandParseError::new(format!("invalid params JSON: {error}"), USAGE))
            }
        }
    };
    Ok(ParsedCommand::World(AgentCommand::Exec {
        action_id: action_id.clone(),
        params,
    }))
}

fn parse_save(args: &[String], _: &str) -> Result<ParsedCommand, CommandParseError> {
    let slot = optional_slot(args, "save [slot]")?;
    Ok(ParsedCommand::World(AgentCommand::Save { slot }))
}

fn parse_load(args: &[String], _: &str) -> Result<ParsedCommand, CommandParseError> {
    let slot = optional_slot(args, "load [slot]")?;
    Ok(ParsedCommand::World(AgentCommand::Load { slot }))
}

fn parse_quit(args: &[String], _: &str) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(ParsedCommand::World(AgentCommand::Quit))
}

fn optional_slot(args: &[String], usage: &str) -> Result<String, CommandParseError> {
    match args {
        [] => Ok(DEFAULT_SAVE_SLOT.to_string()),
        [slot] => Ok(slot.clone()),
        _ => Err(CommandParseError::new("expected at most one argument [slot]", usage)),
    }
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError::new("unexpected extra arguments", usage))
    }
}
