//! JSON file store: one pretty-printed snapshot per user under a directory.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use progression_engine::{ProgressionSnapshot, ProgressionStore};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("invalid user id `{0}`")]
    InvalidUserId(String),
    #[error("storage error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("user id pattern: {0}")]
    Pattern(regex::Error),
}

fn user_id_pattern() -> Result<&'static Regex, FileStoreError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.@-]{0,127}$"))
        .as_ref()
        .map_err(|err| FileStoreError::Pattern(err.clone()))
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, FileStoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| FileStoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, user_id: &str) -> Result<PathBuf, FileStoreError> {
        if !user_id_pattern()?.is_match(user_id) || user_id.contains("..") {
            return Err(FileStoreError::InvalidUserId(user_id.to_string()));
        }
        Ok(self.root.join(format!("{user_id}.json")))
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> FileStoreError + '_ {
    move |source| FileStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_staged(staging: &Path, target: &Path, payload: &[u8]) -> Result<(), FileStoreError> {
    let mut file = fs::File::create(staging).map_err(io_error(staging))?;
    file.write_all(payload).map_err(io_error(staging))?;
    file.sync_all().map_err(io_error(staging))?;
    drop(file);
    fs::rename(staging, target).map_err(io_error(target))
}

impl ProgressionStore for FileStore {
    type Error = FileStoreError;

    fn load(&self, user_id: &str) -> Result<Option<ProgressionSnapshot>, Self::Error> {
        let path = self.snapshot_path(user_id)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&path)(err)),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, user_id: &str, snapshot: &ProgressionSnapshot) -> Result<(), Self::Error> {
        let path = self.snapshot_path(user_id)?;
        let payload = serde_json::to_vec_pretty(snapshot)?;

        // Write beside the target and rename so readers never see a torn file.
        let staging = path.with_extension("json.tmp");
        if let Err(err) = write_staged(&staging, &path, &payload) {
            if let Err(cleanup) = fs::remove_file(&staging)
                && cleanup.kind() != io::ErrorKind::NotFound
            {
                log::warn!("could not remove {}: {cleanup}", staging.display());
            }
            return Err(err);
        }
        log::debug!("saved progression for {user_id} to {}", path.display());
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<(), Self::Error> {
        let path = self.snapshot_path(user_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&path)(err)),
        }
    }
}
