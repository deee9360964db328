//! Stable local player identity, generated once and kept in a small file.

use std::{
    env, fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use tracing::{info, warn};
use uuid::Uuid;

use crate::state::game::PlayerId;

/// Default file holding the identity, relative to the working directory.
const DEFAULT_IDENTITY_PATH: &str = ".kana_clash_player_id";
/// Environment variable that overrides [`DEFAULT_IDENTITY_PATH`].
const IDENTITY_PATH_ENV: &str = "KANA_CLASH_IDENTITY_PATH";

/// Resolve the identity file location taking the environment override into account.
pub fn identity_path() -> PathBuf {
    env::var_os(IDENTITY_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_IDENTITY_PATH))
}

/// Read the identity stored at `path`, creating a fresh UUID v4 when the file is missing
/// or unreadable as a UUID.
pub fn load_or_create(path: &Path) -> io::Result<PlayerId> {
    match fs::read_to_string(path) {
        Ok(contents) => match Uuid::parse_str(contents.trim()) {
            Ok(id) => return Ok(id),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "identity file is corrupt; generating a new player id"
                );
            }
        },
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    let id = Uuid::new_v4();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, id.to_string())?;
    info!(path = %path.display(), player_id = %id, "created local player identity");
    Ok(id)
}
