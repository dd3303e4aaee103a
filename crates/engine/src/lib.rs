use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod actions;
pub mod agent;
pub mod config;
pub mod content;
pub mod dialogue;
pub mod persistence;
pub mod sim;
pub mod world;

pub use actions::{
    apply_action, apply_actions, apply_raw_action, registry_document, Action, ActionContext,
    ActionId, ActionOutcome, ActionParseError, OptionContext, SystemHint,
};
pub use agent::{perceive, AgentCommand, CommandParseError, CommandRegistry, ParsedCommand, Perception};
pub use config::{ConfigError, MissingQuestPolicy, SessionConfig, SESSION_CONFIG_FILE};
pub use content::{check_content, load_content, ContentBundle, ContentLoadError, ValidationReport};
pub use dialogue::{
    DialogueEngine, DialogueInputError, DialoguePreview, DialogueSettings, DialogueView,
};
pub use persistence::{FileSaveStore, PersistenceError, SaveDocument, SaveStore};
pub use sim::{FixedStepClock, GridMap, PathFinder, PlayerState, QuestState, TileCoord};
pub use world::{ClickOutcome, GameWorld, RestoreError, TickReport};

pub const ROOT_ENV_VAR: &str = "ATELIER_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub base_content_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub saves_dir: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            base_content_dir: root.join("assets").join("base"),
            mods_dir: root.join("mods"),
            saves_dir: root.join("saves"),
            root,
        }
    }

    pub fn session_config_path(&self) -> PathBuf {
        self.root.join("assets").join(SESSION_CONFIG_FILE)
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "{env_var} is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf, env_var: &'static str },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/atelier\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Finds the project root from `ATELIER_ROOT` or by walking up from the
/// running executable.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    Ok(AppPaths::from_root(resolve_root()?))
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot {
                    path: normalized,
                    env_var: ROOT_ENV_VAR,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml_and_crates_or_assets() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path();
        assert!(!is_repo_marker(root));

        fs::write(root.join("Cargo.toml"), "[workspace]").expect("write manifest");
        assert!(!is_repo_marker(root));

        fs::create_dir_all(root.join("assets")).expect("mkdir assets");
        assert!(is_repo_marker(root));
    }

    #[test]
    fn app_paths_hang_off_the_root() {
        let paths = AppPaths::from_root("/srv/atelier");
        assert_eq!(paths.base_content_dir, Path::new("/srv/atelier/assets/base"));
        assert_eq!(paths.mods_dir, Path::new("/srv/atelier/mods"));
        assert_eq!(paths.saves_dir, Path::new("/srv/atelier/saves"));
        assert_eq!(
            paths.session_config_path(),
            Path::new("/srv/atelier/assets/session.json")
        );
    }
}
