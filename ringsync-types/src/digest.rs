//! Content digests for ring files.
//!
//! The ring-master identifies a ring version by the md5 of the file, sent as
//! the `ETag` header and echoed back by minions in `If-None-Match`. A
//! [`RingDigest`] is that value in normalized form: lowercase hex, no quotes.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read size used when hashing files. Memory use is constant in file size.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// md5 fingerprint of a ring file.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RingDigest(String);

impl RingDigest {
    /// Wrap a digest received from elsewhere (an `ETag` header, config, logs).
    ///
    /// Surrounding whitespace and quotes are stripped and hex is lowercased.
    /// No other validation happens: a malformed value simply never matches a
    /// computed digest.
    pub fn new(value: impl AsRef<str>) -> Self {
        let trimmed = value.as_ref().trim();
        let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);
        Self(trimmed.trim_matches('"').to_ascii_lowercase())
    }

    /// Digest of an in-memory buffer.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(hex::encode(Md5::digest(data)))
    }

    /// Digest of everything readable from `reader`, in [`CHUNK_SIZE`] chunks.
    pub fn of_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Digest of a file on disk.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        Self::of_reader(File::open(path)?)
    }

    /// The normalized digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RingDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RingDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RingDigest({})", self.0)
    }
}

impl From<&str> for RingDigest {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn known_md5_value() {
        // md5("") and md5("abc") from RFC 1321
        assert_eq!(
            RingDigest::of_bytes(b"").as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            RingDigest::of_bytes(b"abc").as_str(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn reader_digest_matches_buffer_digest_across_chunks() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed = RingDigest::of_reader(&data[..]).unwrap();
        assert_eq!(streamed, RingDigest::of_bytes(&data));
    }

    #[test]
    fn file_digest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        file.flush().unwrap();

        let digest = RingDigest::of_file(file.path()).unwrap();
        assert_eq!(digest, RingDigest::new("900150983cd24fb0d6963f7d28e17f72"));
    }

    #[test]
    fn header_values_are_normalized() {
        let expected = RingDigest::of_bytes(b"abc");
        assert_eq!(
            RingDigest::new("\"900150983CD24FB0D6963F7D28E17F72\""),
            expected
        );
        assert_eq!(
            RingDigest::new(" W/\"900150983cd24fb0d6963f7d28e17f72\" "),
            expected
        );
    }

    #[test]
    fn malformed_value_never_matches() {
        assert_ne!(RingDigest::new("badmd5"), RingDigest::of_bytes(b"abc"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = RingDigest::of_file(&dir.path().join("nope.ring.gz"));
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
