mod bootstrap;
mod cli;
mod session;
mod tools;

use std::process::ExitCode;

use tracing::error;

use self::cli::CliCommand;

pub(crate) fn run() -> ExitCode {
    let command = match cli::parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("{}", cli::usage_text());
            return ExitCode::from(2);
        }
    };
    if matches!(command, CliCommand::Help) {
        println!("{}", cli::usage_text());
        return ExitCode::SUCCESS;
    }

    bootstrap::init_tracing();
    let boot = match bootstrap::boot() {
        Ok(boot) => boot,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        CliCommand::Help => Ok(()),
        CliCommand::Run(options) => session::run_session(&boot, options),
        CliCommand::Validate => tools::run_validate(&boot),
        CliCommand::Preview { entity_id, choices } => {
            tools::run_preview(&boot, &entity_id, &choices)
        }
        CliCommand::Registry => tools::run_registry(&boot),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command_failed");
            ExitCode::FAILURE
        }
    }
}
