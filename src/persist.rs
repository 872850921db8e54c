//! Binary persistence of stores and indexes.
//!
//! Both are written as a small envelope holding a format tag, the store
//! fingerprint they belong to, a blake3 digest of the payload, and the
//! bincode-encoded payload itself. Loading checks all of them before handing
//! the value out, re-checks the invariants the constructors enforce, and
//! recomputes the fingerprint of a loaded store.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::index::InterleavedIndex;
use crate::store::{RcsStore, StoreFingerprint};

const FORMAT_VERSION: u16 = 1;

/// Errors raised while saving or loading.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem failure.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// bincode could not encode or decode the value.
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Envelope of the wrong kind or version.
    #[error("expected {expected} v{version}, found {found} v{found_version}")]
    Format {
        /// Kind the caller asked for.
        expected: Kind,
        /// Version this build reads.
        version: u16,
        /// Kind found in the envelope.
        found: Kind,
        /// Version found in the envelope.
        found_version: u16,
    },

    /// Payload bytes do not hash to the recorded digest.
    #[error("payload digest mismatch")]
    Corrupted,

    /// Decoded value breaks an invariant its constructor enforces.
    #[error("invalid {kind}: {reason}")]
    Invalid {
        /// What was being decoded.
        kind: Kind,
        /// Broken invariant.
        reason: String,
    },

    /// Decoded value does not carry the recorded fingerprint.
    #[error("fingerprint mismatch: recorded {recorded}, computed {computed}")]
    FingerprintMismatch {
        /// Fingerprint stored in the envelope.
        recorded: StoreFingerprint,
        /// Fingerprint of the decoded value.
        computed: StoreFingerprint,
    },
}

/// What an envelope holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    /// An [`RcsStore`].
    Store,
    /// An [`InterleavedIndex`].
    Index,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Store => f.write_str("store"),
            Kind::Index => f.write_str("index"),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    kind: Kind,
    version: u16,
    fingerprint: StoreFingerprint,
    digest: [u8; 32],
    payload: Vec<u8>,
}

fn seal<T: Serialize>(kind: Kind, fingerprint: StoreFingerprint, value: &T) -> Result<Vec<u8>, PersistError> {
    let payload = bincode::serialize(value)?;
    let envelope = Envelope {
        kind,
        version: FORMAT_VERSION,
        fingerprint,
        digest: *blake3::hash(&payload).as_bytes(),
        payload,
    };
    Ok(bincode::serialize(&envelope)?)
}

fn open(kind: Kind, bytes: &[u8]) -> Result<Envelope, PersistError> {
    let envelope: Envelope = bincode::deserialize(bytes)?;
    if envelope.kind != kind || envelope.version != FORMAT_VERSION {
        return Err(PersistError::Format {
            expected: kind,
            version: FORMAT_VERSION,
            found: envelope.kind,
            found_version: envelope.version,
        });
    }
    if *blake3::hash(&envelope.payload).as_bytes() != envelope.digest {
        return Err(PersistError::Corrupted);
    }
    Ok(envelope)
}

fn check_fingerprint(recorded: StoreFingerprint, computed: StoreFingerprint) -> Result<(), PersistError> {
    if recorded != computed {
        return Err(PersistError::FingerprintMismatch { recorded, computed });
    }
    Ok(())
}

/// Encode `store`.
pub fn store_to_bytes(store: &RcsStore) -> Result<Vec<u8>, PersistError> {
    seal(Kind::Store, store.fingerprint(), store)
}

/// Decode a store written by [`store_to_bytes`].
pub fn store_from_bytes(bytes: &[u8]) -> Result<RcsStore, PersistError> {
    let envelope = open(Kind::Store, bytes)?;
    let store: RcsStore = bincode::deserialize(&envelope.payload)?;
    store
        .check_layout()
        .map_err(|reason| PersistError::Invalid { kind: Kind::Store, reason })?;
    check_fingerprint(envelope.fingerprint, store.fingerprint())?;
    Ok(store)
}

/// Encode `index`.
pub fn index_to_bytes(index: &InterleavedIndex) -> Result<Vec<u8>, PersistError> {
    seal(Kind::Index, index.fingerprint(), index)
}

/// Decode an index written by [`index_to_bytes`].
pub fn index_from_bytes(bytes: &[u8]) -> Result<InterleavedIndex, PersistError> {
    let envelope = open(Kind::Index, bytes)?;
    let index: InterleavedIndex = bincode::deserialize(&envelope.payload)?;
    index
        .check_layout()
        .map_err(|reason| PersistError::Invalid { kind: Kind::Index, reason })?;
    check_fingerprint(envelope.fingerprint, index.fingerprint())?;
    Ok(index)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistError + '_ {
    move |source| PersistError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes).map_err(io_error(path))?;
    writer.flush().map_err(io_error(path))?;
    Ok(())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, PersistError> {
    let file = File::open(path).map_err(io_error(path))?;
    let mut bytes = Vec::new();
    std::io::Read::read_to_end(&mut BufReader::new(file), &mut bytes).map_err(io_error(path))?;
    Ok(bytes)
}

/// Write `store` to `path`.
pub fn write_store(store: &RcsStore, path: &Path) -> Result<(), PersistError> {
    let bytes = store_to_bytes(store)?;
    write_bytes(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "store written");
    Ok(())
}

/// Read a store from `path`.
pub fn read_store(path: &Path) -> Result<RcsStore, PersistError> {
    let store = store_from_bytes(&read_bytes(path)?)?;
    info!(
        path = %path.display(),
        haplotypes = store.haplotype_count(),
        fingerprint = %store.fingerprint(),
        "store loaded"
    );
    Ok(store)
}

/// Write `index` to `path`.
pub fn write_index(index: &InterleavedIndex, path: &Path) -> Result<(), PersistError> {
    let bytes = index_to_bytes(index)?;
    write_bytes(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "index written");
    Ok(())
}

/// Read an index from `path`.
pub fn read_index(path: &Path) -> Result<InterleavedIndex, PersistError> {
    let index = index_from_bytes(&read_bytes(path)?)?;
    info!(path = %path.display(), bins = index.bin_count(), "index loaded");
    Ok(index)
}
