//! On-disk tier: one payload file plus one sidecar record per key.
//!
//! Writes are split in two phases. [`DiskTier::stage()`] writes both files
//! to unique tmp paths (async, cancellable, invisible to readers), and
//! [`StagedWrite::commit()`] renames them into place synchronously. A
//! cancelled store therefore leaves at most stray `.tmp` files behind.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

const METADATA_DIR: &str = "metadata";

/// Sidecar record persisted next to each payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub key: String,
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Keyed file store rooted at one directory.
#[derive(Debug)]
pub struct DiskTier {
    dir: PathBuf,
    metadata_dir: PathBuf,
    tmp_seq: AtomicU64,
}

impl DiskTier {
    /// Open (creating if needed) the tier at `dir`.
    pub async fn open(dir: PathBuf) -> io::Result<Self> {
        let metadata_dir = dir.join(METADATA_DIR);
        tokio::fs::create_dir_all(&metadata_dir).await?;
        let tier = Self {
            dir,
            metadata_dir,
            tmp_seq: AtomicU64::new(0),
        };
        tier.remove_stale_tmp().await?;
        Ok(tier)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Payload path for `key`.
    pub fn data_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", file_stem(key)))
    }

    /// Sidecar record path for `key`.
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.metadata_dir.join(format!("{}.json", file_stem(key)))
    }

    /// Read a payload. `Ok(None)` if the file does not exist.
    pub async fn read(&self, key: &str) -> io::Result<Option<Bytes>> {
        match tokio::fs::read(self.data_path(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write payload and record to tmp files without publishing them.
    pub async fn stage(&self, record: &EntryRecord, payload: &[u8]) -> io::Result<StagedWrite> {
        let record_json = serde_json::to_vec(record).map_err(io::Error::other)?;
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);

        let data_path = self.data_path(&record.key);
        let record_path = self.record_path(&record.key);
        let staged = StagedWrite {
            data_tmp: tmp_path(&data_path, seq),
            data_path,
            record_tmp: tmp_path(&record_path, seq),
            record_path,
            committed: false,
        };

        self.write_tmp(&staged.data_tmp, payload).await?;
        self.write_tmp(&staged.record_tmp, &record_json).await?;
        Ok(staged)
    }

    /// Write one tmp file, recreating the layout once if it went missing
    /// (an interrupted [`reset()`](Self::reset) can leave it half-deleted).
    async fn write_tmp(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        match tokio::fs::write(path, contents).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&self.metadata_dir).await?;
                tokio::fs::write(path, contents).await
            }
            other => other,
        }
    }

    /// Delete payload and record for `key`. Missing files are not an error.
    pub fn remove(&self, key: &str) -> io::Result<()> {
        remove_if_exists(&self.record_path(key))?;
        remove_if_exists(&self.data_path(key))
    }

    /// Load every readable sidecar record. Corrupt records are deleted along
    /// with their payload.
    pub async fn load_records(&self) -> io::Result<Vec<EntryRecord>> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.metadata_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = tokio::fs::read(&path)
                .await
                .map_err(|e| e.to_string())
                .and_then(|raw| {
                    serde_json::from_slice::<EntryRecord>(&raw).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn!(path = %path.display(), %error, "dropping corrupt cache record");
                    let _ = remove_if_exists(&path);
                    if let Some(stem) = path.file_stem() {
                        let _ = remove_if_exists(&self.dir.join(stem).with_extension("bin"));
                    }
                }
            }
        }
        Ok(records)
    }

    /// Remove everything and recreate the directory layout.
    ///
    /// The layout is recreated even when removal fails part way.
    pub async fn reset(&self) -> io::Result<()> {
        let removed = match tokio::fs::remove_dir_all(&self.dir).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        };
        let recreated = tokio::fs::create_dir_all(&self.metadata_dir).await;
        removed.and(recreated)
    }

    /// Delete tmp files left by writers from other processes (a crash
    /// between stage and commit). Our own in-flight writes are skipped.
    async fn remove_stale_tmp(&self) -> io::Result<()> {
        let own_pid = std::process::id().to_string();
        for dir in [&self.dir, &self.metadata_dir] {
            let mut entries = tokio::fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                let Some(stem) = name.strip_suffix(".tmp") else { continue };
                // `<file>.<pid>.<seq>`
                if stem.rsplit('.').nth(1) == Some(own_pid.as_str()) {
                    continue;
                }
                debug!(file = name, "removing stale cache tmp file");
                if let Err(e) = remove_if_exists(&entry.path()) {
                    warn!(file = name, error = %e, "failed to remove stale cache tmp file");
                }
            }
        }
        Ok(())
    }

    /// Total bytes on disk (payloads, records and stray tmp files).
    pub async fn usage(&self) -> io::Result<u64> {
        let mut total = 0;
        for dir in [&self.dir, &self.metadata_dir] {
            let mut entries = tokio::fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                if metadata.is_file() {
                    total += metadata.len();
                }
            }
        }
        Ok(total)
    }
}

/// Tmp files written by [`DiskTier::stage()`], waiting to be published.
///
/// Dropping an uncommitted write deletes the tmp files.
#[derive(Debug)]
pub struct StagedWrite {
    data_tmp: PathBuf,
    data_path: PathBuf,
    record_tmp: PathBuf,
    record_path: PathBuf,
    committed: bool,
}

impl StagedWrite {
    /// Publish both files. Payload first: a record never points at a
    /// missing or older payload once this returns.
    pub fn commit(mut self) -> io::Result<()> {
        std::fs::rename(&self.data_tmp, &self.data_path)?;
        std::fs::rename(&self.record_tmp, &self.record_path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.data_tmp);
            let _ = std::fs::remove_file(&self.record_tmp);
        }
    }
}

/// Stable, filesystem-safe name for a key.
///
/// SHA-256 rather than `DefaultHasher`: names must stay the same across
/// processes for the disk tier to survive restarts.
pub fn file_stem(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

fn tmp_path(path: &Path, seq: u64) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.{seq}.tmp", std::process::id()));
    path.with_file_name(name)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
