//! Ring decoding capability and the Swift ring file format.
//!
//! The sync core never looks inside a ring. It only needs to know that a file
//! decodes, that it has devices, and that partitions resolve to nodes. That
//! capability is [`RingDecoder`] + [`RingHandle`].
//!
//! [`SwiftRingDecoder`] implements it for gzip'd Swift ring files, format v1:
//!
//! ```text
//! gzip(
//!   b"R1"                     magic
//!   u16 (big endian)          format version, 1
//!   u32 (big endian)          length of the JSON header
//!   JSON header               {devs, part_shift, replica_count, byteorder}
//!   replica_count tables      2^(32 - part_shift) u16 device ids each,
//!                             in `byteorder`; the last may be short
//! )
//! ```

use crate::error::RingError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Read, Write};

/// Magic bytes at the start of a decompressed ring.
pub const RING_MAGIC: &[u8; 2] = b"R1";

/// The only ring format version this crate reads and writes.
pub const RING_FORMAT_VERSION: u16 = 1;

/// A storage device entry in a ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device id, also its index in the device table.
    pub id: u16,
    /// Region.
    #[serde(default = "default_region")]
    pub region: u32,
    /// Zone.
    #[serde(default)]
    pub zone: u32,
    /// Address of the storage node.
    pub ip: String,
    /// Port of the storage node.
    pub port: u16,
    /// Device name on the node (e.g. `sdb1`).
    pub device: String,
    /// Relative weight.
    #[serde(default)]
    pub weight: f64,
    /// Free-form operator metadata.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub meta: String,
    /// Replication network address, when separate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_ip: Option<String>,
    /// Replication network port, when separate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_port: Option<u16>,
}

fn default_region() -> u32 {
    1
}

impl Device {
    /// Create a device with default region, zone and weight.
    pub fn new(id: u16, ip: impl Into<String>, port: u16, device: impl Into<String>) -> Self {
        Self {
            id,
            region: default_region(),
            zone: 0,
            ip: ip.into(),
            port,
            device: device.into(),
            weight: 100.0,
            meta: String::new(),
            replication_ip: None,
            replication_port: None,
        }
    }
}

/// Byte order of the assignment tables.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Little endian.
    #[default]
    Little,
    /// Big endian.
    Big,
}

#[derive(Debug, Serialize, Deserialize)]
struct RingHeader {
    devs: Vec<Option<Device>>,
    part_shift: u32,
    replica_count: usize,
    #[serde(default)]
    byteorder: ByteOrder,
}

/// What the sync core needs from a decoded ring.
pub trait RingHandle: Send + Sync {
    /// Number of devices present (empty device slots are not counted).
    fn device_count(&self) -> usize;

    /// Number of partitions.
    fn partition_count(&self) -> usize;

    /// Resolve a partition to the devices holding its replicas.
    fn nodes_for_partition(&self, partition: u32) -> Result<Vec<Device>, RingError>;
}

/// Turns raw ring bytes into a [`RingHandle`].
pub trait RingDecoder: Send + Sync {
    /// Decode a ring.
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn RingHandle>, RingError>;
}

/// Decoder for gzip'd Swift ring files (format v1).
#[derive(Debug, Default, Clone, Copy)]
pub struct SwiftRingDecoder;

impl RingDecoder for SwiftRingDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn RingHandle>, RingError> {
        Ok(Box::new(RingData::from_gzip_bytes(bytes)?))
    }
}

/// A decoded Swift ring.
#[derive(Debug, Clone, PartialEq)]
pub struct RingData {
    devs: Vec<Option<Device>>,
    part_shift: u32,
    replica2part2dev: Vec<Vec<u16>>,
}

impl RingData {
    /// Build a ring from its parts.
    ///
    /// `replica2part2dev[r][p]` is the device id holding replica `r` of
    /// partition `p`.
    pub fn new(
        devs: Vec<Option<Device>>,
        part_shift: u32,
        replica2part2dev: Vec<Vec<u16>>,
    ) -> Self {
        Self {
            devs,
            part_shift,
            replica2part2dev,
        }
    }

    /// Assign `replicas` copies of every partition round-robin over `devices`.
    ///
    /// No balancing or zone awareness; meant for fixtures and demos.
    pub fn round_robin(devices: Vec<Device>, part_power: u32, replicas: usize) -> Self {
        let part_count = 1usize << part_power.min(32);
        let dev_count = devices.len().max(1);
        let replica2part2dev = (0..replicas)
            .map(|r| {
                (0..part_count)
                    .map(|p| devices.get((p + r) % dev_count).map_or(0, |d| d.id))
                    .collect()
            })
            .collect();

        let mut devs: Vec<Option<Device>> = Vec::new();
        for device in devices {
            let idx = device.id as usize;
            if devs.len() <= idx {
                devs.resize(idx + 1, None);
            }
            devs[idx] = Some(device);
        }

        Self::new(devs, 32 - part_power.min(32), replica2part2dev)
    }

    /// Decode a gzip'd ring file.
    pub fn from_gzip_bytes(bytes: &[u8]) -> Result<Self, RingError> {
        let mut gz = GzDecoder::new(bytes);

        let mut magic = [0u8; 2];
        gz.read_exact(&mut magic)?;
        if &magic != RING_MAGIC {
            return Err(RingError::BadMagic);
        }

        let mut version = [0u8; 2];
        gz.read_exact(&mut version)?;
        let version = u16::from_be_bytes(version);
        if version != RING_FORMAT_VERSION {
            return Err(RingError::UnsupportedVersion(version));
        }

        let mut header_len = [0u8; 4];
        gz.read_exact(&mut header_len)?;
        let header_len = u32::from_be_bytes(header_len) as u64;

        // Bounded reads: a junk length must not turn into a huge allocation.
        let mut header_bytes = Vec::new();
        (&mut gz).take(header_len).read_to_end(&mut header_bytes)?;
        if header_bytes.len() as u64 != header_len {
            return Err(RingError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        let header: RingHeader = serde_json::from_slice(&header_bytes)?;

        if header.part_shift > 32 {
            return Err(RingError::InvalidPartShift(header.part_shift));
        }
        let part_count = 1u64 << (32 - header.part_shift);

        let mut replica2part2dev = Vec::with_capacity(header.replica_count.min(16));
        for replica in 0..header.replica_count {
            let mut raw = Vec::new();
            (&mut gz).take(part_count * 2).read_to_end(&mut raw)?;
            if raw.len() % 2 != 0 {
                return Err(RingError::Truncated { replica });
            }
            let table = raw
                .chunks_exact(2)
                .map(|pair| match header.byteorder {
                    ByteOrder::Little => u16::from_le_bytes([pair[0], pair[1]]),
                    ByteOrder::Big => u16::from_be_bytes([pair[0], pair[1]]),
                })
                .collect();
            replica2part2dev.push(table);
        }

        Ok(Self {
            devs: header.devs,
            part_shift: header.part_shift,
            replica2part2dev,
        })
    }

    /// Encode as a gzip'd v1 ring file (little endian tables).
    pub fn to_gzip_bytes(&self) -> Result<Vec<u8>, RingError> {
        let header = RingHeader {
            devs: self.devs.clone(),
            part_shift: self.part_shift,
            replica_count: self.replica2part2dev.len(),
            byteorder: ByteOrder::Little,
        };
        let header_json = serde_json::to_vec(&header)?;

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(RING_MAGIC)?;
        gz.write_all(&RING_FORMAT_VERSION.to_be_bytes())?;
        gz.write_all(&(header_json.len() as u32).to_be_bytes())?;
        gz.write_all(&header_json)?;
        for table in &self.replica2part2dev {
            for id in table {
                gz.write_all(&id.to_le_bytes())?;
            }
        }
        Ok(gz.finish()?)
    }

    /// The device table, including empty slots.
    pub fn devices(&self) -> &[Option<Device>] {
        &self.devs
    }

    /// Number of replica tables.
    pub fn replica_count(&self) -> usize {
        self.replica2part2dev.len()
    }
}

impl RingHandle for RingData {
    fn device_count(&self) -> usize {
        self.devs.iter().filter(|d| d.is_some()).count()
    }

    fn partition_count(&self) -> usize {
        1usize << (32 - self.part_shift.min(32))
    }

    fn nodes_for_partition(&self, partition: u32) -> Result<Vec<Device>, RingError> {
        let count = self.partition_count();
        if partition as usize >= count {
            return Err(RingError::PartitionOutOfRange { partition, count });
        }

        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for table in &self.replica2part2dev {
            let Some(&id) = table.get(partition as usize) else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            let device = self
                .devs
                .get(id as usize)
                .and_then(Option::as_ref)
                .ok_or(RingError::UnknownDevice { id })?;
            nodes.push(device.clone());
        }
        Ok(nodes)
    }
}
