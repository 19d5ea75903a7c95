use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::procurement::domain::ApplicationId;

#[derive(Debug, thiserror::Error)]
pub enum DocumentStoreError {
    #[error("document storage io failure at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("document storage unavailable: {0}")]
    Unavailable(String),
}

/// Byte storage for uploaded files. Metadata lives on the application record.
pub trait DocumentStore: Send + Sync {
    /// Persist `bytes` and return the path recorded as `filePath`.
    fn put(
        &self,
        application_id: &ApplicationId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, DocumentStoreError>;

    /// Remove a stored file. Missing files are not an error.
    fn delete(&self, file_path: &str) -> Result<(), DocumentStoreError>;
}

/// Stores uploads under `<root>/<application id>/<file name>`.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl DocumentStore for FsDocumentStore {
    fn put(
        &self,
        application_id: &ApplicationId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, DocumentStoreError> {
        let directory = self.root.join(&application_id.0);
        fs::create_dir_all(&directory).map_err(|source| DocumentStoreError::Io {
            path: directory.display().to_string(),
            source,
        })?;

        let path = directory.join(file_name);
        fs::write(&path, bytes).map_err(|source| DocumentStoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path.display().to_string())
    }

    fn delete(&self, file_path: &str) -> Result<(), DocumentStoreError> {
        match fs::remove_file(file_path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(DocumentStoreError::Io {
                path: file_path.to_string(),
                source,
            }),
        }
    }
}

/// Keeps uploads in memory; used by the demo and tests.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        match self.blobs.lock() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        }
    }

    pub fn contents(&self, file_path: &str) -> Option<Vec<u8>> {
        match self.blobs.lock() {
            Ok(guard) => guard.get(file_path).cloned(),
            Err(poisoned) => poisoned.into_inner().get(file_path).cloned(),
        }
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn put(
        &self,
        application_id: &ApplicationId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, DocumentStoreError> {
        let path = format!("memory://{}/{}", application_id.0, file_name);
        let mut guard = self
            .blobs
            .lock()
            .map_err(|_| DocumentStoreError::Unavailable("blob mutex poisoned".to_string()))?;
        guard.insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    fn delete(&self, file_path: &str) -> Result<(), DocumentStoreError> {
        let mut guard = self
            .blobs
            .lock()
            .map_err(|_| DocumentStoreError::Unavailable("blob mutex poisoned".to_string()))?;
        guard.remove(file_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_store_writes_under_application_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FsDocumentStore::new(dir.path());
        let application_id = ApplicationId("app-1".to_string());

        let path = store
            .put(&application_id, "1700000000000-abc.pdf", b"%PDF-1.4")
            .expect("write succeeds");

        assert!(path.ends_with("1700000000000-abc.pdf"));
        assert_eq!(fs::read(&path).expect("read back"), b"%PDF-1.4");

        store.delete(&path).expect("delete succeeds");
        assert!(!std::path::Path::new(&path).exists());
        store.delete(&path).expect("deleting twice is harmless");
    }
}
