mod discovery;
mod hashing;
mod loader;
mod types;
mod validate;

pub use discovery::{discover_content_sources, ContentSource, BASE_MOD_ID};
pub use hashing::{content_fingerprint, sha256_hex};
pub use loader::{check_content, load_content, lower_content, read_sources, CheckedContent};
pub use types::{
    ContentBundle, ContentLoadError, RawAction, RawContent, RawEntityScript, RawMap, RawNode,
    RawOption, RawTileTable, RawTiles, RawWorld, WorldSeed, ENTITIES_DIR, MAPS_DIR, TILES_FILE,
    WORLD_FILE,
};
pub use validate::{validate_content, ContentValidationError, ValidationCode, ValidationReport};
