//! Deterministic snapshot encoding for emulated I/O devices.
//!
//! The snapshot format is a small tag-length-value (TLV) encoding chosen for:
//! - deterministic byte output (fields are emitted in canonical tag order)
//! - forward compatibility (readers skip unknown tags)
//! - explicit versioning (major/minor) at the device level
//!
//! Devices implement [`IoSnapshot`] and build their payload with
//! [`SnapshotWriter`]; repeated or structured fields are packed into a single
//! `bytes` field with [`codec::Encoder`].

#![forbid(unsafe_code)]

pub mod codec;

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot payload truncated")]
    Truncated,
    #[error("snapshot is for device {found:?}, expected {expected:?}")]
    WrongDevice { expected: [u8; 4], found: [u8; 4] },
    #[error("unsupported device snapshot major version {found} (supported: {supported})")]
    UnsupportedMajor { supported: u16, found: u16 },
    #[error("duplicate field tag {tag}")]
    DuplicateTag { tag: u16 },
    #[error("field tag {tag} has length {found}, expected {expected}")]
    BadFieldLength {
        tag: u16,
        expected: usize,
        found: usize,
    },
    #[error("invalid boolean byte {0}")]
    BadBool(u8),
    #[error("trailing bytes after decoded payload")]
    TrailingBytes,
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Device snapshot version. Minor bumps are forward-compatible additions;
/// a major bump breaks older readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotVersion {
    pub major: u16,
    pub minor: u16,
}

impl SnapshotVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

/// Snapshotting contract for emulated devices.
///
/// `DEVICE_ID` must stay stable forever; within a major version, changes are
/// limited to adding new TLV fields.
pub trait IoSnapshot {
    const DEVICE_ID: [u8; 4];
    const DEVICE_VERSION: SnapshotVersion;

    fn save_state(&self) -> Vec<u8>;
    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()>;
}

/// Builds a device snapshot payload.
#[derive(Debug)]
pub struct SnapshotWriter {
    device_id: [u8; 4],
    version: SnapshotVersion,
    fields: BTreeMap<u16, Vec<u8>>,
}

impl SnapshotWriter {
    pub fn new(device_id: [u8; 4], version: SnapshotVersion) -> Self {
        Self {
            device_id,
            version,
            fields: BTreeMap::new(),
        }
    }

    pub fn field_bytes(&mut self, tag: u16, bytes: Vec<u8>) {
        self.fields.insert(tag, bytes);
    }

    pub fn field_bool(&mut self, tag: u16, value: bool) {
        self.field_bytes(tag, vec![u8::from(value)]);
    }

    pub fn field_u8(&mut self, tag: u16, value: u8) {
        self.field_bytes(tag, vec![value]);
    }

    pub fn field_u16(&mut self, tag: u16, value: u16) {
        self.field_bytes(tag, value.to_le_bytes().to_vec());
    }

    pub fn field_u32(&mut self, tag: u16, value: u32) {
        self.field_bytes(tag, value.to_le_bytes().to_vec());
    }

    pub fn field_u64(&mut self, tag: u16, value: u64) {
        self.field_bytes(tag, value.to_le_bytes().to_vec());
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.device_id);
        out.extend_from_slice(&self.version.major.to_le_bytes());
        out.extend_from_slice(&self.version.minor.to_le_bytes());
        // BTreeMap iteration gives the canonical (ascending-tag) order.
        for (tag, payload) in &self.fields {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(payload);
        }
        out
    }
}

/// Parses a device snapshot payload produced by [`SnapshotWriter`].
#[derive(Debug)]
pub struct SnapshotReader {
    version: SnapshotVersion,
    fields: BTreeMap<u16, Vec<u8>>,
}

impl SnapshotReader {
    pub fn parse(bytes: &[u8], device_id: [u8; 4]) -> SnapshotResult<Self> {
        if bytes.len() < 8 {
            return Err(SnapshotError::Truncated);
        }
        let found_id: [u8; 4] = bytes[0..4].try_into().expect("4-byte slice");
        if found_id != device_id {
            return Err(SnapshotError::WrongDevice {
                expected: device_id,
                found: found_id,
            });
        }
        let major = u16::from_le_bytes(bytes[4..6].try_into().expect("2-byte slice"));
        let minor = u16::from_le_bytes(bytes[6..8].try_into().expect("2-byte slice"));

        let mut fields = BTreeMap::new();
        let mut rest = &bytes[8..];
        while !rest.is_empty() {
            if rest.len() < 6 {
                return Err(SnapshotError::Truncated);
            }
            let tag = u16::from_le_bytes(rest[0..2].try_into().expect("2-byte slice"));
            let len = u32::from_le_bytes(rest[2..6].try_into().expect("4-byte slice")) as usize;
            rest = &rest[6..];
            if rest.len() < len {
                return Err(SnapshotError::Truncated);
            }
            if fields.insert(tag, rest[..len].to_vec()).is_some() {
                return Err(SnapshotError::DuplicateTag { tag });
            }
            rest = &rest[len..];
        }

        Ok(Self {
            version: SnapshotVersion::new(major, minor),
            fields,
        })
    }

    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    pub fn ensure_device_major(&self, supported: u16) -> SnapshotResult<()> {
        if self.version.major != supported {
            return Err(SnapshotError::UnsupportedMajor {
                supported,
                found: self.version.major,
            });
        }
        Ok(())
    }

    /// Returns a raw field payload, or `None` if the tag is absent.
    pub fn bytes(&self, tag: u16) -> Option<&[u8]> {
        self.fields.get(&tag).map(Vec::as_slice)
    }

    fn fixed<const N: usize>(&self, tag: u16) -> SnapshotResult<Option<[u8; N]>> {
        match self.fields.get(&tag) {
            None => Ok(None),
            Some(payload) => {
                let arr: [u8; N] =
                    payload
                        .as_slice()
                        .try_into()
                        .map_err(|_| SnapshotError::BadFieldLength {
                            tag,
                            expected: N,
                            found: payload.len(),
                        })?;
                Ok(Some(arr))
            }
        }
    }

    pub fn u8(&self, tag: u16) -> SnapshotResult<Option<u8>> {
        Ok(self.fixed::<1>(tag)?.map(|b| b[0]))
    }

    pub fn bool(&self, tag: u16) -> SnapshotResult<Option<bool>> {
        match self.u8(tag)? {
            None => Ok(None),
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            Some(other) => Err(SnapshotError::BadBool(other)),
        }
    }

    pub fn u16(&self, tag: u16) -> SnapshotResult<Option<u16>> {
        Ok(self.fixed::<2>(tag)?.map(u16::from_le_bytes))
    }

    pub fn u32(&self, tag: u16) -> SnapshotResult<Option<u32>> {
        Ok(self.fixed::<4>(tag)?.map(u32::from_le_bytes))
    }

    pub fn u64(&self, tag: u16) -> SnapshotResult<Option<u64>> {
        Ok(self.fixed::<8>(tag)?.map(u64::from_le_bytes))
    }
}
