use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Volume geometry needed to locate and decode MFT records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct VolumeParameters {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub mft_entry_size: u32,
    pub mft_start_cluster: u64,
}

impl VolumeParameters {
    pub fn new(
        bytes_per_sector: u16,
        sectors_per_cluster: u8,
        mft_entry_size: u32,
        mft_start_cluster: u64,
    ) -> Result<Self, DecodeError> {
        if bytes_per_sector == 0 {
            return Err(DecodeError::InvalidParameters("bytes per sector is 0".into()));
        }
        if sectors_per_cluster == 0 {
            return Err(DecodeError::InvalidParameters(
                "sectors per cluster is 0".into(),
            ));
        }
        // The fixed record header alone takes 42 bytes.
        if mft_entry_size < 42 {
            return Err(DecodeError::InvalidParameters(format!(
                "MFT entry size {} is too small",
                mft_entry_size
            )));
        }
        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            mft_entry_size,
            mft_start_cluster,
        })
    }

    /// Build from the raw boot sector byte describing the entry size.
    pub fn from_raw_entry_size(
        bytes_per_sector: u16,
        sectors_per_cluster: u8,
        raw_entry_size: i8,
        mft_start_cluster: u64,
    ) -> Result<Self, DecodeError> {
        let cluster = u32::from(bytes_per_sector) * u32::from(sectors_per_cluster);
        let entry_size = decode_entry_size(raw_entry_size, cluster)?;
        Self::new(
            bytes_per_sector,
            sectors_per_cluster,
            entry_size,
            mft_start_cluster,
        )
    }

    pub fn bytes_per_cluster(&self) -> u64 {
        u64::from(self.bytes_per_sector) * u64::from(self.sectors_per_cluster)
    }

    /// Byte offset of `cluster` from the start of the volume.
    pub fn cluster_offset(&self, cluster: u64) -> Result<u64, DecodeError> {
        cluster
            .checked_mul(self.bytes_per_cluster())
            .ok_or_else(|| {
                DecodeError::InvalidParameters(format!("cluster {} is beyond u64 range", cluster))
            })
    }

    pub fn mft_offset(&self) -> Result<u64, DecodeError> {
        self.cluster_offset(self.mft_start_cluster)
    }
}

/// Decode a "clusters per record" boot sector byte: negative values give
/// `2^|raw|` bytes, others count clusters.
pub fn decode_entry_size(raw: i8, bytes_per_cluster: u32) -> Result<u32, DecodeError> {
    let size = if raw < 0 {
        1u32.checked_shl(u32::from(raw.unsigned_abs()))
    } else {
        (raw as u32).checked_mul(bytes_per_cluster)
    };
    match size {
        Some(s) if s > 0 => Ok(s),
        _ => Err(DecodeError::InvalidParameters(format!(
            "cannot derive a record size from {} (cluster size {})",
            raw, bytes_per_cluster
        ))),
    }
}
