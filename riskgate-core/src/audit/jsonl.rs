//! JSON Lines audit file.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{AuditError, AuditRecord, AuditSink};

/// Append-only JSONL audit file, created owner-read/write only.
pub struct JsonlAuditLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlAuditLog {
    /// Open (or create) the audit file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| AuditError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&path).map_err(open_err)?;

        tracing::debug!(path = %path.display(), "audit log opened");
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditLog {
    fn audit_request(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut guard = self.file.lock();
        let file = guard.as_mut().ok_or(AuditError::Closed)?;
        file.write_all(&line).map_err(AuditError::Write)?;
        file.flush().map_err(AuditError::Write)
    }

    fn close(&self) -> Result<(), AuditError> {
        // Dropping the handle closes it; a second close is a no-op.
        if let Some(file) = self.file.lock().take() {
            file.sync_all().map_err(AuditError::Write)?;
            tracing::debug!(path = %self.path.display(), "audit log closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for JsonlAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlAuditLog")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
