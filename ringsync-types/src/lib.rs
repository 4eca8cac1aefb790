//! # ringsync-types
//!
//! Shared vocabulary for the ringsync crates.
//!
//! - [`RingDigest`] - md5 fingerprint of a ring file, the same value the
//!   ring-master sends as `ETag`
//! - [`RingDecoder`] / [`RingHandle`] - the capability the sync core needs from
//!   a ring: decode bytes, count devices, resolve a partition to its nodes
//! - [`SwiftRingDecoder`] / [`RingData`] - decoder for gzip'd Swift ring files
//! - [`RingError`] - decode and lookup failures

#![warn(missing_docs)]
#![warn(clippy::all)]

mod digest;
mod error;
mod ring;

pub use digest::{RingDigest, CHUNK_SIZE};
pub use error::RingError;
pub use ring::{
    ByteOrder, Device, RingData, RingDecoder, RingHandle, SwiftRingDecoder, RING_FORMAT_VERSION,
    RING_MAGIC,
};
