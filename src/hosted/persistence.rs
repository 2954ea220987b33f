// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session mirror file.
//!
//! Keeps the current hosted session on disk between runs. Writes go to a
//! temporary sibling first and are renamed into place.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::identity::BackendSession;

#[derive(Debug, thiserror::Error)]
pub enum SessionFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SessionFileResult<T> = Result<T, SessionFileError>;

/// JSON file holding at most one [`BackendSession`].
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored session, or `None` if the file does not exist.
    pub fn load(&self) -> SessionFileResult<Option<BackendSession>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let session = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(session))
    }

    /// Write the session (atomic write via rename).
    pub fn save(&self, session: &BackendSession) -> SessionFileResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, session)?;
            writer.flush()?;
        }

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Remove the file. A missing file is not an error.
    pub fn delete(&self) -> SessionFileResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::identity::{DisplayMetadata, Principal};

    fn session() -> BackendSession {
        BackendSession {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
            principal: Principal {
                id: "user-1".into(),
                email: Some("a@b.com".into()),
                metadata: DisplayMetadata {
                    full_name: Some("Asha".into()),
                    avatar_url: None,
                },
            },
        }
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        assert!(file.load().unwrap().is_none());
        file.delete().unwrap();
    }

    #[test]
    fn save_creates_parents_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("nested/dir/session.json"));

        file.save(&session()).unwrap();

        assert_eq!(file.load().unwrap(), Some(session()));
        assert!(!file.path().with_extension("tmp").exists());
    }

    #[test]
    fn delete_removes_session() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        file.save(&session()).unwrap();

        file.delete().unwrap();

        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = SessionFile::new(path).load().unwrap_err();
        assert!(matches!(err, SessionFileError::Serialization(_)));
    }
}
