// src/watch/hash.rs

//! Content digests for the polling strategy.

use std::fmt;
use std::io::{ErrorKind, Read};
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Length of a [`Digest`] in bytes.
pub const DIGEST_LEN: usize = blake3::OUT_LEN;

/// Files are streamed through the hasher in blocks of this size.
pub const HASH_BLOCK_SIZE: usize = 1024;

/// Fixed-size BLAKE3 digest of a file's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl From<blake3::Hash> for Digest {
    fn from(hash: blake3::Hash) -> Self {
        Digest(*hash.as_bytes())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Digest({})", &hex[..12])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the digest of a single file.
///
/// Any error, including one in the middle of the stream, fails the whole
/// computation: a partial digest is never returned.
pub fn compute_file_digest(fs: &dyn FileSystem, path: &Path) -> Result<Digest> {
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;

    let mut hasher = Hasher::new();
    let mut buf = [0u8; HASH_BLOCK_SIZE];
    let mut total = 0usize;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("reading {:?} after {} bytes", path, total)
                });
            }
        };
        hasher.update(&buf[..n]);
        total += n;
    }

    let digest = Digest::from(hasher.finalize());
    debug!(?path, bytes = total, %digest, "computed file digest");
    Ok(digest)
}
