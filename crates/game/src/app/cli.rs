use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CliCommand {
    Help,
    Run(RunOptions),
    Validate,
    Preview {
        entity_id: String,
        choices: Vec<usize>,
    },
    Registry,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RunOptions {
    /// Read commands from this file instead of stdin.
    pub(crate) script: Option<PathBuf>,
    pub(crate) save_dir: Option<PathBuf>,
    /// Advance the clock by wall time between commands.
    pub(crate) realtime: bool,
}

pub(crate) fn parse_args<I>(args: I) -> Result<CliCommand, String>
where
    I: IntoIterator<Item = String>,
{
    let args = args.into_iter().collect::<Vec<_>>();
    let Some(command) = args.first() else {
        return Ok(CliCommand::Run(RunOptions::default()));
    };
    let rest = &args[1..];

    match command.as_str() {
        "-h" | "--help" | "help" => Ok(CliCommand::Help),
        "run" => parse_run(rest).map(CliCommand::Run),
        "validate" => {
            if !rest.is_empty() {
                return Err("validate takes no arguments".to_string());
            }
            Ok(CliCommand::Validate)
        }
        "registry" => {
            if !rest.is_empty() {
                return Err("registry takes no arguments".to_string());
            }
            Ok(CliCommand::Registry)
        }
        "preview" => {
            let entity_id = rest
                .first()
                .ok_or_else(|| "preview requires an entity id".to_string())?
                .clone();
            let choices = rest[1..]
                .iter()
                .map(|raw| {
                    raw.parse::<usize>()
                        .map_err(|_| format!("invalid choice '{raw}' (expected option index)"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CliCommand::Preview { entity_id, choices })
        }
        other => Err(format!("unknown subcommand '{other}'")),
    }
}

fn parse_run(args: &[String]) -> Result<RunOptions, String> {
    let mut options = RunOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--script" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --script".to_string())?;
                options.script = Some(PathBuf::from(value));
                index += 2;
            }
            "--save-dir" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --save-dir".to_string())?;
                options.save_dir = Some(PathBuf::from(value));
                index += 2;
            }
            "--realtime" => {
                options.realtime = true;
                index += 1;
            }
            other => return Err(format!("unknown run argument '{other}'")),
        }
    }
    if options.realtime && options.script.is_some() {
        return Err("--realtime cannot be combined with --script".to_string());
    }
    Ok(options)
}

pub(crate) fn usage_text() -> String {
    [
        "game - headless tile RPG session runner",
        "",
        "Usage:",
        "  game [run] [--script <file>] [--save-dir <dir>] [--realtime]",
        "  game validate",
        "  game preview <entity_id> [option_index...]",
        "  game registry",
        "",
        "Environment:",
        "  ATELIER_ROOT          project root (default: detected from executable)",
        "  ATELIER_ENABLED_MODS  comma-separated mod ids, overrides session.json",
        "  RUST_LOG              log filter (default: info)",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliCommand, String> {
        parse_args(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn no_arguments_runs_on_stdin() {
        assert_eq!(parse(&[]), Ok(CliCommand::Run(RunOptions::default())));
    }

    #[test]
    fn run_accepts_script_and_save_dir() {
        let parsed = parse(&["run", "--script", "demo.txt", "--save-dir", "/tmp/s"]);
        assert_eq!(
            parsed,
            Ok(CliCommand::Run(RunOptions {
                script: Some(PathBuf::from("demo.txt")),
                save_dir: Some(PathBuf::from("/tmp/s")),
                realtime: false,
            }))
        );
        assert!(parse(&["run", "--script"]).is_err());
        assert!(parse(&["run", "--script", "a", "--realtime"]).is_err());
        assert!(parse(&["run", "--bogus"]).is_err());
    }

    #[test]
    fn preview_parses_choice_indices() {
        assert_eq!(
            parse(&["preview", "old_man", "0", "1"]),
            Ok(CliCommand::Preview {
                entity_id: "old_man".to_string(),
                choices: vec![0, 1],
            })
        );
        assert!(parse(&["preview"]).is_err());
        assert!(parse(&["preview", "old_man", "x"]).is_err());
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert_eq!(
            parse(&["fly"]),
            Err("unknown subcommand 'fly'".to_string())
        );
        assert_eq!(parse(&["validate"]), Ok(CliCommand::Validate));
        assert_eq!(parse(&["--help"]), Ok(CliCommand::Help));
    }
}
