//! Atomic JSON persistence shared by the file-backed stores.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Writes `value` as pretty JSON using write-then-rename.
///
/// Readers observe either the previous file or the complete new one.
pub fn write_json_atomic<T, E>(path: &Path, value: &T) -> Result<(), E>
where
    T: Serialize,
    E: From<std::io::Error> + From<serde_json::Error>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    let temp_file = path.with_extension("json.tmp");
    fs::write(&temp_file, content)?;
    fs::rename(&temp_file, path)?;
    Ok(())
}

/// Reads a JSON file.
pub fn read_json<T, E>(path: &Path) -> Result<T, E>
where
    T: DeserializeOwned,
    E: From<std::io::Error> + From<serde_json::Error>,
{
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
