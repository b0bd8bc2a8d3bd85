//! JSON file token store
//!
//! Writes go to a sibling `.tmp` file which is then renamed over the
//! target, so a crash never leaves a half-written token file behind.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use heatmapp_common::auth::{StoredTokens, TokenStore, TokenStoreError};
use tracing::debug;

/// [`TokenStore`] persisting the pair as JSON at a fixed path
///
/// A missing file reads as an empty pair. Writing an empty pair removes
/// the file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remove(&self) -> Result<(), TokenStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed token file");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error("removing", &self.path, &err)),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn read(&self) -> Result<StoredTokens, TokenStoreError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StoredTokens::default()),
            Err(err) => return Err(io_error("reading", &self.path, &err)),
        };

        serde_json::from_slice(&contents).map_err(|err| {
            TokenStoreError(format!("malformed token file {}: {err}", self.path.display()))
        })
    }

    fn write(&self, tokens: &StoredTokens) -> Result<(), TokenStoreError> {
        if tokens.is_empty() {
            return self.remove();
        }

        let json = serde_json::to_vec(tokens)
            .map_err(|err| TokenStoreError(format!("serializing tokens: {err}")))?;

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| io_error("creating", parent, &err))?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = open_private(&temp_path).map_err(|err| io_error("creating", &temp_path, &err))?;
        file.write_all(&json).map_err(|err| io_error("writing", &temp_path, &err))?;
        file.sync_all().map_err(|err| io_error("syncing", &temp_path, &err))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|err| io_error("replacing", &self.path, &err))?;
        debug!(path = %self.path.display(), "Persisted tokens");
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

fn io_error(action: &str, path: &Path, err: &std::io::Error) -> TokenStoreError {
    TokenStoreError(format!("{action} {}: {err}", path.display()))
}
