use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::debug;
use snafu::{prelude::*, Snafu};

use survey_records::content_revision;

/// Failures surfaced by a remote store implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("I/O failure on {path}"))]
    Io {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("transport failure talking to the store: {detail}"))]
    Transport { detail: String },
    #[snafu(display("store returned HTTP {status}: {detail}"))]
    Http { status: u16, detail: String },
    #[snafu(display("conditional write lost the race"))]
    Conflict {},
    #[snafu(display("credential exchange failed: {reason}"))]
    Credentials { reason: String },
    #[snafu(display("malformed store response: {reason}"))]
    BadResponse { reason: String },
}

/// A fetched object together with the revision the store observed. The
/// revision is opaque: its only use is to be handed back in
/// [WriteMode::Update] for a conditional write.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub bytes: Vec<u8>,
    pub revision: String,
}

#[derive(Debug, Clone)]
pub enum WriteMode {
    /// Replace the object unconditionally (last writer wins).
    Overwrite,
    /// Replace the object only if its revision still matches.
    Update(String),
}

/// A blob store addressed by logical slash-separated paths.
///
/// The store holds all durable state of the system: the two survey tables
/// and the uploaded soil test documents. It offers no locking and no
/// transactions; the conditional write is the only concurrency primitive.
pub trait RemoteStore {
    /// Reads the object at `path`. `Ok(None)` when it does not exist.
    fn fetch(&self, path: &str) -> Result<Option<FetchedObject>, StoreError>;

    /// Writes the object at `path` in full.
    fn put(&self, path: &str, bytes: &[u8], mode: WriteMode) -> Result<(), StoreError>;
}

/// A store rooted in a local directory. Used for development and tests;
/// revisions are content digests, so a conditional write detects any
/// interleaved writer that changed the bytes.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> DirStore {
        DirStore { root: root.into() }
    }

    fn object_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn current_revision(&self, path: &str) -> Result<Option<String>, StoreError> {
        match fs::read(self.object_path(path)) {
            Ok(bytes) => Ok(Some(content_revision(&bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(IoSnafu { path }),
        }
    }
}

impl RemoteStore for DirStore {
    fn fetch(&self, path: &str) -> Result<Option<FetchedObject>, StoreError> {
        match fs::read(self.object_path(path)) {
            Ok(bytes) => {
                let revision = content_revision(&bytes);
                debug!(
                    "DirStore: fetched {} ({} bytes, rev {})",
                    path,
                    bytes.len(),
                    revision
                );
                Ok(Some(FetchedObject { bytes, revision }))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(IoSnafu { path }),
        }
    }

    fn put(&self, path: &str, bytes: &[u8], mode: WriteMode) -> Result<(), StoreError> {
        if let WriteMode::Update(expected) = &mode {
            let current = self.current_revision(path)?;
            if current.as_deref() != Some(expected.as_str()) {
                debug!("DirStore: revision moved under {}, rejecting write", path);
                return ConflictSnafu {}.fail();
            }
        }
        let target = self.object_path(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).context(IoSnafu { path })?;
        }
        fs::write(&target, bytes).context(IoSnafu { path })?;
        debug!("DirStore: wrote {} ({} bytes)", path, bytes.len());
        Ok(())
    }
}
