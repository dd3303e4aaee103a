use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::AppPaths;

use super::types::ContentLoadError;

pub const BASE_MOD_ID: &str = "base";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSource {
    pub mod_id: String,
    pub load_index: u32,
    pub dir: PathBuf,
}

/// Base content first, then enabled mods in the order given. Later sources
/// override earlier ones id by id.
pub fn discover_content_sources(
    app_paths: &AppPaths,
    enabled_mods: &[String],
) -> Result<Vec<ContentSource>, ContentLoadError> {
    let mut seen = HashSet::<String>::new();
    let mut sources = vec![ContentSource {
        mod_id: BASE_MOD_ID.to_string(),
        load_index: 0,
        dir: app_paths.base_content_dir.clone(),
    }];

    for (idx, mod_id) in enabled_mods.iter().enumerate() {
        let trimmed = mod_id.trim();
        if trimmed.is_empty() {
            return Err(ContentLoadError::EmptyEnabledMod);
        }
        if trimmed == BASE_MOD_ID || !seen.insert(trimmed.to_string()) {
            return Err(ContentLoadError::DuplicateEnabledMod {
                mod_id: trimmed.to_string(),
            });
        }
        let dir = app_paths.mods_dir.join(trimmed);
        if !dir.is_dir() {
            return Err(ContentLoadError::EnabledModMissing {
                mod_id: trimmed.to_string(),
                expected_dir: dir,
            });
        }
        sources.push(ContentSource {
            mod_id: trimmed.to_string(),
            load_index: (idx + 1) as u32,
            dir,
        });
    }

    Ok(sources)
}

/// `*.json` files directly inside `dir`, sorted by file name. A missing
/// directory yields nothing.
pub(crate) fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>, ContentLoadError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|source| ContentLoadError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ContentLoadError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && is_json_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
