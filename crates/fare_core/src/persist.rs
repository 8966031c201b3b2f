//! Binary model artifacts.
//!
//! Layout: 4-byte magic `TXFR`, a little-endian `u32` format version, then a
//! bincode body carrying the creation time, the model hash and the
//! [`FittedModel`]. The hash is the BLAKE3 digest of the model's canonical
//! JSON and is checked on every load.

use bincode::Options;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::errors::PersistError;
use crate::fitted::FittedModel;

/// Leading tag of every artifact file.
pub const MAGIC: [u8; 4] = *b"TXFR";

/// Artifact format version written by [`save`].
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = MAGIC.len() + 4;

/// Fixed-width little-endian body encoding; the body must fill the file.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

#[derive(Serialize)]
struct BodyRef<'a> {
    created_at: DateTime<Utc>,
    model_hash: &'a str,
    model: &'a FittedModel,
}

/// A decoded artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    pub created_at: DateTime<Utc>,
    pub model_hash: String,
    pub model: FittedModel,
}

/// Write `model` to `path`, replacing any existing file.
///
/// Bytes go to a temporary file in the target directory which is then
/// renamed over `path`.
pub fn save(model: &FittedModel, path: impl AsRef<Path>) -> Result<String, PersistError> {
    let path = path.as_ref();
    model.validate()?;
    let model_hash = model.hash_hex()?;

    let body = BodyRef {
        created_at: Utc::now(),
        model_hash: &model_hash,
        model,
    };
    let encoded = codec().serialize(&body).map_err(|e| PersistError::Encode(e.to_string()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&MAGIC)?;
    file.write_all(&FORMAT_VERSION.to_le_bytes())?;
    file.write_all(&encoded)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| PersistError::Io(e.error))?;

    info!(
        "Saved {} model to {} ({} bytes, hash {})",
        model.target(),
        path.display(),
        HEADER_LEN + encoded.len(),
        &model_hash[..16]
    );
    Ok(model_hash)
}

/// Read and verify the artifact at `path`.
pub fn load_artifact(path: impl AsRef<Path>) -> Result<Artifact, PersistError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());

    if bytes.len() < HEADER_LEN {
        return Err(PersistError::Decode(format!(
            "file is {} bytes, header needs {}",
            bytes.len(),
            HEADER_LEN
        )));
    }
    if bytes[..MAGIC.len()] != MAGIC {
        return Err(PersistError::BadMagic);
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(PersistError::IncompatibleVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }

    let artifact: Artifact = codec()
        .deserialize(&bytes[HEADER_LEN..])
        .map_err(|e| PersistError::Decode(e.to_string()))?;

    let computed = artifact.model.hash_hex()?;
    if computed != artifact.model_hash {
        return Err(PersistError::HashMismatch {
            recorded: artifact.model_hash,
            computed,
        });
    }
    artifact.model.validate()?;

    info!(
        "Loaded {} model from {} (created {})",
        artifact.model.target(),
        path.display(),
        artifact.created_at.to_rfc3339()
    );
    Ok(artifact)
}

/// Read and verify the model at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<FittedModel, PersistError> {
    load_artifact(path).map(|artifact| artifact.model)
}
