use engine::config::ConfigError;
use engine::content::ContentLoadError;
use engine::{resolve_app_paths, AppPaths, SessionConfig, StartupError};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

const ENABLED_MODS_ENV_VAR: &str = "ATELIER_ENABLED_MODS";

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Content(#[from] ContentLoadError),
    #[error("failed to read command script {path}: {source}")]
    Script {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error on {stream}: {source}")]
    Io {
        stream: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("no entity script with id '{0}'")]
    UnknownEntity(String),
    #[error("content has {0} validation error(s)")]
    InvalidContent(usize),
}

/// Resolved root plus the session config every subcommand runs with.
pub(crate) struct Boot {
    pub(crate) paths: AppPaths,
    pub(crate) config: SessionConfig,
}

pub(crate) fn boot() -> Result<Boot, AppError> {
    info!("=== Atelier Startup ===");
    let paths = resolve_app_paths()?;
    let mut config = SessionConfig::load_or_default(&paths.session_config_path())?;
    if let Some(mods) = parse_enabled_mods_from_env() {
        config.enabled_mods = mods;
    }
    info!(
        root = %paths.root.display(),
        enabled_mods = ?config.enabled_mods,
        target_tps = config.target_tps,
        "session_configured"
    );
    Ok(Boot { paths, config })
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr so stdout carries only the line protocol.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn parse_enabled_mods_from_env() -> Option<Vec<String>> {
    std::env::var(ENABLED_MODS_ENV_VAR)
        .ok()
        .map(|raw| split_mod_list(&raw))
}

fn split_mod_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod_list_trims_and_skips_empty_entries() {
        assert_eq!(
            split_mod_list(" extra_npcs, ,harbor ,"),
            vec!["extra_npcs".to_string(), "harbor".to_string()]
        );
        assert!(split_mod_list("").is_empty());
    }
}
