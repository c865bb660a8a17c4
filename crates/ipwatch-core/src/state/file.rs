// # File Address Store
//
// File-based implementation of AddressStore.
//
// ## Purpose
//
// Keeps the last known address across process restarts. Every run of the
// one-shot binary starts by reading this file.
//
// ## Durability
//
// - Atomic writes: the record is written to a temporary file, fsynced, then
//   renamed over the real file
// - A missing file means "never recorded" and is not an error
// - A corrupt file is a read error; it is never silently reset, since that
//   would make the next run report a first-time change
//
// ## File Format
//
// ```json
// {
//   "ip_address": "203.0.113.9",
//   "checked_at": "2025-01-09T12:00:00Z"
// }
// ```

use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::traits::address_store::{AddressStore, PersistedAddressRecord};

/// Name of the record file inside the storage directory
pub const RECORD_FILE_NAME: &str = "last_known_ip_address.json";

/// File-based address store
///
/// # Example
///
/// ```rust,no_run
/// use ipwatch_core::state::FileAddressStore;
/// use ipwatch_core::traits::AddressStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileAddressStore::new("/var/lib/dynamic-ip-watcher").await?;
///
///     store.save_address("203.0.113.9".parse()?).await?;
///     assert_eq!(store.last_known_address().await?, Some("203.0.113.9".parse()?));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileAddressStore {
    path: PathBuf,
}

impl FileAddressStore {
    /// Open a store in `directory`, creating the directory if needed
    pub async fn new<P: AsRef<Path>>(directory: P) -> Result<Self, Error> {
        let directory = directory.as_ref();

        if !directory.as_os_str().is_empty() && !directory.exists() {
            fs::create_dir_all(directory).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create storage directory {}: {}",
                    directory.display(),
                    e
                ))
            })?;
        }

        Ok(Self {
            path: directory.join(RECORD_FILE_NAME),
        })
    }

    /// Path of the record file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the temporary file used for atomic writes
    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    async fn write_record(&self, record: &PersistedAddressRecord) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| Error::store(format!("Failed to serialize address record: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(&json).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Address record written to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl AddressStore for FileAddressStore {
    async fn load_record(&self) -> Result<Option<PersistedAddressRecord>, Error> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No address record at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::store(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let record = serde_json::from_str(&content).map_err(|e| {
            Error::store(format!(
                "Failed to parse {}: {}. The file may be corrupted.",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(record))
    }

    async fn save_address(&self, address: Ipv4Addr) -> Result<(), Error> {
        self.write_record(&PersistedAddressRecord::new(address)).await
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_basic() {
        let dir = tempdir().unwrap();
        let store = FileAddressStore::new(dir.path()).await.unwrap();

        // Initially empty
        assert_eq!(store.last_known_address().await.unwrap(), None);

        let ip: Ipv4Addr = "203.0.113.9".parse().unwrap();
        store.save_address(ip).await.unwrap();

        assert_eq!(store.last_known_address().await.unwrap(), Some(ip));
        assert!(store.path().exists());
        assert!(!store.temp_path().exists());

        // Reopen and verify persistence
        let reopened = FileAddressStore::new(dir.path()).await.unwrap();
        assert_eq!(reopened.last_known_address().await.unwrap(), Some(ip));
    }

    #[tokio::test]
    async fn test_file_store_overwrites_in_place() {
        let dir = tempdir().unwrap();
        let store = FileAddressStore::new(dir.path()).await.unwrap();

        for i in 0..10 {
            let ip = Ipv4Addr::new(198, 51, 100, i);
            store.save_address(ip).await.unwrap();
        }

        let record = store.load_record().await.unwrap().unwrap();
        assert_eq!(record.address, Ipv4Addr::new(198, 51, 100, 9));

        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1, "only the record file should remain");
    }

    #[tokio::test]
    async fn test_file_store_corruption_is_read_error() {
        let dir = tempdir().unwrap();
        let store = FileAddressStore::new(dir.path()).await.unwrap();

        fs::write(store.path(), b"corrupted json data").await.unwrap();

        let err = store.last_known_address().await.unwrap_err();
        assert!(matches!(err, Error::Store(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_file_store_reads_existing_format() {
        let dir = tempdir().unwrap();
        let store = FileAddressStore::new(dir.path()).await.unwrap();

        fs::write(
            store.path(),
            br#"{"ip_address":"192.0.2.44","checked_at":"2024-03-02T10:11:12.5-05:00"}"#,
        )
        .await
        .unwrap();

        assert_eq!(
            store.last_known_address().await.unwrap(),
            Some(Ipv4Addr::new(192, 0, 2, 44))
        );
    }

    #[tokio::test]
    async fn test_file_store_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("var").join("lib").join("ipwatch");

        let store = FileAddressStore::new(&nested).await.unwrap();
        store.save_address(Ipv4Addr::new(192, 0, 2, 1)).await.unwrap();

        assert!(nested.join(RECORD_FILE_NAME).exists());
    }
}
