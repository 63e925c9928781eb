// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Last-artifact store.
//
// Holds exactly one scan result. A new result is fully written before it is
// installed, and installing it is a single pointer swap under the slot's
// lock, so readers see either the old artifact or the new one. In disk mode
// the file of the replaced artifact is deleted once the swap is done.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{Local, Utc};
use scanwerk_core::config::{StorageConfig, StorageMode};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{ArtifactId, ArtifactLocation, ScanArtifact};
use scanwerk_document::{EncodedImage, hash_bytes, verify_hash};
use tracing::{debug, info, instrument, warn};

/// How often a reader retries after the file it was about to read was
/// replaced by a newer scan.
const READ_RETRIES: usize = 3;

/// An artifact and its encoded bytes.
#[derive(Debug, Clone)]
pub struct StoredScan {
    pub artifact: Arc<ScanArtifact>,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug)]
struct Slot {
    artifact: Arc<ScanArtifact>,
    /// Present in memory mode; disk mode reads the file back on demand.
    bytes: Option<Arc<[u8]>>,
}

#[derive(Debug)]
enum Backing {
    Memory,
    Disk(PathBuf),
}

/// Owner of the most recent scan result.
///
/// All methods are synchronous. Disk mode does file I/O, so async callers
/// should use `tokio::task::spawn_blocking`.
#[derive(Debug)]
pub struct ArtifactStore {
    backing: Backing,
    slot: RwLock<Option<Arc<Slot>>>,
    /// Serialises writers so file names stay unique.
    writer: Mutex<()>,
}

impl ArtifactStore {
    /// A store that keeps the encoded bytes in memory.
    pub fn in_memory() -> Self {
        Self::with_backing(Backing::Memory)
    }

    /// A store that writes each artifact into `dir`, creating it if needed.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn on_disk(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!("artifact directory ready");
        Ok(Self::with_backing(Backing::Disk(dir)))
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.mode {
            StorageMode::Memory => Ok(Self::in_memory()),
            StorageMode::Disk => Self::on_disk(&config.path),
        }
    }

    fn with_backing(backing: Backing) -> Self {
        Self {
            backing,
            slot: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Directory artifacts are written to, if any.
    pub fn directory(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Memory => None,
            Backing::Disk(dir) => Some(dir),
        }
    }

    /// Store `encoded` and make it the last artifact.
    #[instrument(skip_all, fields(bytes = encoded.bytes.len()))]
    pub fn put(&self, encoded: EncodedImage) -> Result<Arc<ScanArtifact>> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let created_at = Utc::now();
        let stem = created_at
            .with_timezone(&Local)
            .format("scan-%Y%m%d%H%M%S")
            .to_string();
        let sha256 = hash_bytes(&encoded.bytes);
        let size = encoded.bytes.len() as u64;

        let (file_name, location, bytes) = match &self.backing {
            Backing::Memory => (
                format!("{stem}.png"),
                ArtifactLocation::Memory,
                Some(Arc::<[u8]>::from(encoded.bytes)),
            ),
            Backing::Disk(dir) => {
                let path = unique_path(dir, &stem);
                write_atomically(&path, &encoded.bytes)?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("{stem}.png"));
                (file_name, ArtifactLocation::Disk { path }, None)
            }
        };

        let artifact = Arc::new(ScanArtifact {
            id: ArtifactId::new(),
            width: encoded.width,
            height: encoded.height,
            created_at,
            file_name,
            content_type: encoded.content_type.to_owned(),
            size,
            sha256,
            location,
        });

        let slot = Arc::new(Slot {
            artifact: Arc::clone(&artifact),
            bytes,
        });
        let previous = self
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(slot);

        info!(id = %artifact.id, file = %artifact.file_name, "artifact stored");
        if let Some(previous) = previous {
            remove_replaced(&previous.artifact.location);
        }
        Ok(artifact)
    }

    /// Metadata of the last artifact, if a scan has completed.
    pub fn latest(&self) -> Option<Arc<ScanArtifact>> {
        self.snapshot().map(|slot| Arc::clone(&slot.artifact))
    }

    /// The last artifact with its bytes.
    ///
    /// Bytes read back from disk are checked against the stored digest.
    pub fn load_latest(&self) -> Result<Option<StoredScan>> {
        let mut retries = 0;
        loop {
            let Some(slot) = self.snapshot() else {
                return Ok(None);
            };
            match read_bytes(&slot) {
                Ok(bytes) => {
                    return Ok(Some(StoredScan {
                        artifact: Arc::clone(&slot.artifact),
                        bytes,
                    }));
                }
                Err(ScanwerkError::Storage(e))
                    if e.kind() == std::io::ErrorKind::NotFound
                        && retries < READ_RETRIES
                        && self.superseded(&slot) =>
                {
                    retries += 1;
                    debug!(id = %slot.artifact.id, "artifact replaced while reading, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Whether a newer artifact has been installed since `slot` was taken.
    fn superseded(&self, slot: &Arc<Slot>) -> bool {
        self.snapshot()
            .is_some_and(|current| !Arc::ptr_eq(&current, slot))
    }

    fn snapshot(&self) -> Option<Arc<Slot>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn read_bytes(slot: &Slot) -> Result<Arc<[u8]>> {
    match (&slot.bytes, &slot.artifact.location) {
        (Some(bytes), _) => Ok(Arc::clone(bytes)),
        (None, ArtifactLocation::Disk { path }) => {
            let data = fs::read(path)?;
            verify_hash(&data, &slot.artifact.sha256)?;
            debug!(path = %path.display(), "artifact read back from disk");
            Ok(Arc::from(data))
        }
        (None, ArtifactLocation::Memory) => Ok(Arc::from(Vec::new())),
    }
}

/// Delete the file of an artifact that is no longer the last one.
fn remove_replaced(location: &ArtifactLocation) {
    let ArtifactLocation::Disk { path } = location else {
        return;
    };
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "replaced artifact removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove replaced artifact"),
    }
}

/// `dir/stem.png`, or `dir/stem-N.png` when scans land within one second.
fn unique_path(dir: &Path, stem: &str) -> PathBuf {
    let mut path = dir.join(format!("{stem}.png"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}-{n}.png"));
        n += 1;
    }
    path
}

/// Write to a temporary sibling, then rename over `path`.
fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("png.part");
    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result.map_err(ScanwerkError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(bytes: &[u8]) -> EncodedImage {
        EncodedImage {
            width: 2,
            height: 1,
            content_type: "image/png",
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn empty_store_has_nothing() {
        let store = ArtifactStore::in_memory();
        assert!(store.latest().is_none());
        assert!(store.load_latest().expect("load").is_none());
    }

    #[test]
    fn memory_store_returns_the_stored_bytes() {
        let store = ArtifactStore::in_memory();
        let artifact = store.put(png(b"first")).expect("put");
        assert_eq!(artifact.location, ArtifactLocation::Memory);
        assert_eq!(artifact.size, 5);
        assert_eq!(artifact.sha256, hash_bytes(b"first"));
        assert!(artifact.file_name.starts_with("scan-"));
        assert!(artifact.file_name.ends_with(".png"));

        let stored = store.load_latest().expect("load").expect("present");
        assert_eq!(&*stored.bytes, b"first");
    }

    #[test]
    fn newer_artifact_replaces_older() {
        let store = ArtifactStore::in_memory();
        let first = store.put(png(b"first")).expect("put");
        let second = store.put(png(b"second")).expect("put");
        assert_ne!(first.id, second.id);

        let stored = store.load_latest().expect("load").expect("present");
        assert_eq!(stored.artifact.id, second.id);
        assert_eq!(&*stored.bytes, b"second");
    }

    #[test]
    fn disk_store_writes_and_reads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::on_disk(dir.path().join("scans")).expect("store");
        let artifact = store.put(png(b"on disk")).expect("put");

        let ArtifactLocation::Disk { path } = &artifact.location else {
            panic!("expected a disk artifact");
        };
        assert_eq!(fs::read(path).expect("read"), b"on disk");
        assert_eq!(artifact.size, 7);

        let stored = store.load_latest().expect("load").expect("present");
        assert_eq!(&*stored.bytes, b"on disk");
    }

    #[test]
    fn scans_within_one_second_get_distinct_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::on_disk(dir.path()).expect("store");
        let a = store.put(png(b"a")).expect("put");
        let b = store.put(png(b"b")).expect("put");
        assert_ne!(a.location, b.location);
        assert_eq!(b.sha256, hash_bytes(b"b"));
        assert!(
            !fs::read_dir(dir.path())
                .expect("list")
                .any(|e| e.expect("entry").path().extension().is_some_and(|x| x == "part"))
        );
    }

    #[test]
    fn tampered_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::on_disk(dir.path()).expect("store");
        let artifact = store.put(png(b"as written")).expect("put");
        let ArtifactLocation::Disk { path } = &artifact.location else {
            panic!("expected a disk artifact");
        };
        fs::write(path, b"changed").expect("overwrite");
        assert!(store.load_latest().is_err());
    }

    fn png_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .expect("list")
            .filter(|e| e.as_ref().expect("entry").path().extension().is_some_and(|x| x == "png"))
            .count()
    }

    #[test]
    fn disk_store_keeps_only_the_last_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::on_disk(dir.path()).expect("store");
        let mut paths = Vec::new();
        for i in 0..5u8 {
            let artifact = store.put(png(&[i; 16])).expect("put");
            let ArtifactLocation::Disk { path } = &artifact.location else {
                panic!("expected a disk artifact");
            };
            paths.push(path.clone());
        }

        assert_eq!(png_files(dir.path()), 1);
        let (last, earlier) = paths.split_last().expect("paths");
        assert!(last.exists());
        assert!(earlier.iter().all(|p| !p.exists()));

        let stored = store.load_latest().expect("load").expect("present");
        assert_eq!(&*stored.bytes, &[4u8; 16]);
    }

    #[test]
    fn missing_file_of_the_current_artifact_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::on_disk(dir.path()).expect("store");
        let artifact = store.put(png(b"gone")).expect("put");
        let ArtifactLocation::Disk { path } = &artifact.location else {
            panic!("expected a disk artifact");
        };
        fs::remove_file(path).expect("remove");
        assert!(matches!(store.load_latest(), Err(ScanwerkError::Storage(_))));
    }
}
