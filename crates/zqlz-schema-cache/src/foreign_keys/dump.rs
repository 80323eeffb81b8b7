//! Persisting the foreign key cache to disk
//!
//! A dump lets an application skip catalog queries on the next start. The
//! file layout is:
//!
//! ```text
//! magic    8 bytes   b"ZQLZFKC\0"
//! version  4 bytes   u32, little endian
//! sha256  32 bytes   digest of the payload
//! payload  ...       bincode list of (key, foreign keys) records, sorted by key
//! ```
//!
//! Dumps are written in place. A process killed mid-write leaves a truncated
//! file, which fails the checksum on the next load.
//!
//! Nothing checks that a dump matches the live schema. Regenerate it after
//! migrations, and only load dumps from trusted locations: the checksum
//! catches corruption, not tampering.

use bincode::Options;
use ring::digest::{SHA256, SHA256_OUTPUT_LEN, digest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;
use zqlz_core::{ForeignKeyInfo, Result, ZqlzError};

use super::cache::ForeignKeyCache;

const MAGIC: &[u8; 8] = b"ZQLZFKC\0";

/// Current dump format version
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = MAGIC.len() + 4 + SHA256_OUTPUT_LEN;

#[derive(Serialize)]
struct DumpEntryRef<'a> {
    key: &'a str,
    foreign_keys: &'a [ForeignKeyInfo],
}

#[derive(Deserialize)]
struct DumpEntry {
    key: String,
    foreign_keys: Vec<ForeignKeyInfo>,
}

/// Serialize a store into the dump format
pub(crate) fn encode(entries: &HashMap<String, Vec<ForeignKeyInfo>>) -> Result<Vec<u8>> {
    let mut records: Vec<DumpEntryRef<'_>> = entries
        .iter()
        .map(|(key, foreign_keys)| DumpEntryRef {
            key,
            foreign_keys,
        })
        .collect();
    records.sort_by(|a, b| a.key.cmp(b.key));

    let payload = bincode::DefaultOptions::new()
        .serialize(&records)
        .map_err(|e| ZqlzError::Other(format!("Failed to encode foreign key cache: {}", e)))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(digest(&SHA256, &payload).as_ref());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Parse a dump produced by [`encode`]
pub(crate) fn decode(bytes: &[u8]) -> Result<HashMap<String, Vec<ForeignKeyInfo>>> {
    if bytes.len() < HEADER_LEN {
        return Err(ZqlzError::CacheDecode(format!(
            "file is {} bytes, shorter than the {} byte header",
            bytes.len(),
            HEADER_LEN
        )));
    }

    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(ZqlzError::CacheDecode(
            "not a foreign key cache dump (bad magic)".into(),
        ));
    }

    let (version, rest) = rest.split_at(4);
    let version = u32::from_le_bytes([version[0], version[1], version[2], version[3]]);
    if version != FORMAT_VERSION {
        return Err(ZqlzError::CacheDecode(format!(
            "unsupported dump version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    let (checksum, payload) = rest.split_at(SHA256_OUTPUT_LEN);
    if digest(&SHA256, payload).as_ref() != checksum {
        return Err(ZqlzError::CacheDecode("payload checksum mismatch".into()));
    }

    let records: Vec<DumpEntry> = bincode::DefaultOptions::new()
        .with_limit(payload.len() as u64)
        .deserialize(payload)
        .map_err(|e| ZqlzError::CacheDecode(format!("invalid payload: {}", e)))?;

    let mut entries = HashMap::with_capacity(records.len());
    for record in records {
        match entries.entry(record.key) {
            Entry::Occupied(occupied) => {
                return Err(ZqlzError::CacheDecode(format!(
                    "duplicate entry for {}",
                    occupied.key()
                )));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record.foreign_keys);
            }
        }
    }
    Ok(entries)
}

/// Write `bytes` to `path`, creating or truncating it.
///
/// The file is rewritten in place: an existing file keeps its permissions and
/// a symlink keeps pointing at the same target. With `clobber == false` an
/// existing file wins and `Ok(false)` is returned.
fn write_file(path: &Path, bytes: &[u8], clobber: bool) -> Result<bool> {
    let mut options = OpenOptions::new();
    options.write(true);
    if clobber {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if !clobber && e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(true)
}

impl ForeignKeyCache {
    /// Write the whole cache to `path`, replacing any existing file
    pub fn dump_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let entries = self.entries.lock();
        let bytes = encode(&entries)?;
        write_file(path, &bytes, true)?;
        tracing::info!(
            path = %path.display(),
            entry_count = entries.len(),
            "dumped foreign key cache"
        );
        Ok(())
    }

    /// Write the whole cache to `path` unless a file is already there.
    /// Returns whether a dump was written.
    pub fn dump_to_file_unless_exists(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if path.exists() {
            tracing::debug!(path = %path.display(), "foreign key cache dump exists, not overwriting");
            return Ok(false);
        }

        let entries = self.entries.lock();
        let bytes = encode(&entries)?;
        let written = write_file(path, &bytes, false)?;
        if written {
            tracing::info!(
                path = %path.display(),
                entry_count = entries.len(),
                "dumped foreign key cache"
            );
        } else {
            tracing::debug!(path = %path.display(), "foreign key cache dump appeared concurrently, not overwriting");
        }
        Ok(written)
    }

    /// Replace the whole cache with the contents of the dump at `path`.
    ///
    /// Entries cached before the load are discarded. If the file cannot be
    /// read or decoded the cache is left as it was.
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        self.replace_from_bytes(path, &bytes)
    }

    /// Like [`load_from_file`](Self::load_from_file), but a missing file is
    /// not an error. Returns whether a dump was loaded.
    pub fn load_from_file_if_exists(&self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no foreign key cache dump to load");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        self.replace_from_bytes(path, &bytes)?;
        Ok(true)
    }

    fn replace_from_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut entries = self.entries.lock();
        let loaded = decode(bytes).inspect_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "rejected foreign key cache dump");
        })?;
        tracing::info!(
            path = %path.display(),
            entry_count = loaded.len(),
            discarded = entries.len(),
            "loaded foreign key cache"
        );
        *entries = loaded;
        Ok(())
    }
}

#[cfg(test)]
#[path = "dump_tests.rs"]
mod tests;
