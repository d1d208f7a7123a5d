//! Default locations for the model cache.

use std::env;
use std::path::PathBuf;

/// Environment variable overriding the model cache directory.
pub const MODEL_DIR_ENV: &str = "MACTA_MODEL_DIR";

/// Returns the default model cache directory.
///
/// Uses `MACTA_MODEL_DIR` when set, otherwise `~/.macta/models`, falling back
/// to `.macta/models` under the working directory when `HOME` is unset.
pub fn default_model_dir() -> PathBuf {
    if let Ok(dir) = env::var(MODEL_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    let base = env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    base.join(".macta").join("models")
}
