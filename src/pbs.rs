// Sources:
// - https://en.wikipedia.org/wiki/NTFS

//! NTFS Partition-Boot-Sector: the volume geometry the MFT decoder consumes.

use byteorder::{LittleEndian, ReadBytesExt};
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::io::{Cursor, Read};

use crate::error::DecodeError;
use crate::volume::{VolumeParameters, decode_entry_size};

pub const BOOT_SECTOR_LEN: usize = 512;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PartitionBootSector {
    /* -- 0x00-0x0A ------------------------------------------ */
    pub jump_instruction: [u8; 3], // x86 JMP + NOP
    pub oem_id: [u8; 8],           // "NTFS    "

    /* -- BIOS Parameter Block (BPB) – 0x0B-0x23 ------------- */
    pub bytes_per_sector: u16,   // 0x0B
    pub sectors_per_cluster: u8, // 0x0D
    pub media_descriptor: u8,    // 0x15 (0xF8 = hard disk)
    pub sectors_per_track: u16,  // 0x18
    pub number_of_heads: u16,    // 0x1A
    pub hidden_sectors: u32,     // 0x1C

    /* -- Extended BPB – 0x28-0x53 ---------------------------- */
    pub total_sectors: u64,           // 0x28
    pub mft_cluster: u64,             // 0x30
    pub mft_mirror_cluster: u64,      // 0x38
    pub clusters_per_file_record: i8, // 0x40  (may be negative)
    pub clusters_per_index_buffer: i8, // 0x44
    pub volume_serial_number: u64,    // 0x48

    pub end_of_sector_marker: u16, // 0x1FE (0xAA55)
}

impl PartitionBootSector {
    pub const NTFS_OEM_ID: [u8; 8] = *b"NTFS    ";

    /// Parse the 512-byte sector into `PartitionBootSector`
    pub fn from_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < BOOT_SECTOR_LEN {
            return Err(DecodeError::ShortRead {
                expected: BOOT_SECTOR_LEN,
                available: buf.len(),
            });
        }
        let mut c = Cursor::new(buf);

        /* helper macros to reduce boilerplate */
        macro_rules! read_array {
            ($len:expr) => {{
                let mut tmp = [0u8; $len];
                c.read_exact(&mut tmp)?;
                tmp
            }};
        }
        macro_rules! skip {
            ($len:expr) => {
                c.set_position(c.position() + $len)
            };
        }

        let jump_instruction = read_array!(3);
        let oem_id = read_array!(8);
        let bytes_per_sector = c.read_u16::<LittleEndian>()?;
        let sectors_per_cluster = c.read_u8()?;
        skip!(7); // reserved sectors + unused
        let media_descriptor = c.read_u8()?;
        skip!(2);
        let sectors_per_track = c.read_u16::<LittleEndian>()?;
        let number_of_heads = c.read_u16::<LittleEndian>()?;
        let hidden_sectors = c.read_u32::<LittleEndian>()?;
        skip!(8);
        let total_sectors = c.read_u64::<LittleEndian>()?;
        let mft_cluster = c.read_u64::<LittleEndian>()?;
        let mft_mirror_cluster = c.read_u64::<LittleEndian>()?;
        let clusters_per_file_record = c.read_i8()?;
        skip!(3);
        let clusters_per_index_buffer = c.read_i8()?;
        skip!(3);
        let volume_serial_number = c.read_u64::<LittleEndian>()?;
        c.set_position(0x1FE);
        let end_of_sector_marker = c.read_u16::<LittleEndian>()?;

        Ok(Self {
            jump_instruction,
            oem_id,
            bytes_per_sector,
            sectors_per_cluster,
            media_descriptor,
            sectors_per_track,
            number_of_heads,
            hidden_sectors,
            total_sectors,
            mft_cluster,
            mft_mirror_cluster,
            clusters_per_file_record,
            clusters_per_index_buffer,
            volume_serial_number,
            end_of_sector_marker,
        })
    }

    /// Check if the oem_id is valid
    pub fn oem_id_is_valid(&self) -> bool {
        self.oem_id == Self::NTFS_OEM_ID
    }

    pub fn cluster_size(&self) -> u32 {
        u32::from(self.bytes_per_sector) * u32::from(self.sectors_per_cluster)
    }

    /// Compute actual bytes per file-record segment
    pub fn file_record_size(&self) -> Result<u32, DecodeError> {
        decode_entry_size(self.clusters_per_file_record, self.cluster_size())
    }

    /// Compute actual bytes per index record
    pub fn index_record_size(&self) -> Result<u32, DecodeError> {
        decode_entry_size(self.clusters_per_index_buffer, self.cluster_size())
    }

    pub fn volume_parameters(&self) -> Result<VolumeParameters, DecodeError> {
        VolumeParameters::from_raw_entry_size(
            self.bytes_per_sector,
            self.sectors_per_cluster,
            self.clusters_per_file_record,
            self.mft_cluster,
        )
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }
}

impl fmt::Display for PartitionBootSector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record_size = self
            .file_record_size()
            .map_or_else(|e| e.to_string(), |s| s.to_string());
        let index_size = self
            .index_record_size()
            .map_or_else(|e| e.to_string(), |s| s.to_string());
        let mut t = Table::new();
        t.add_row(row!["Partition Boot Sector"]);
        t.add_row(row![b -> "OEM ID", String::from_utf8_lossy(&self.oem_id)]);
        t.add_row(row![b -> "Bytes per Sector", self.bytes_per_sector]);
        t.add_row(row![b -> "Sectors per Cluster", self.sectors_per_cluster]);
        t.add_row(row![b -> "Total Sectors", self.total_sectors]);
        t.add_row(row![b -> "$MFT Cluster", self.mft_cluster]);
        t.add_row(row![b -> "$MFTMirr Cluster", self.mft_mirror_cluster]);
        t.add_row(row![b -> "File Record Size", record_size]);
        t.add_row(row![b -> "Index Record Size", index_size]);
        t.add_row(row![b -> "Serial Number", format!("{:016X}", self.volume_serial_number)]);
        write!(f, "{}", t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ntfs_vbr() -> Vec<u8> {
        let mut vbr = vec![0u8; 512];
        vbr[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
        vbr[3..11].copy_from_slice(b"NTFS    ");
        vbr[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        vbr[0x0D] = 8;
        vbr[0x15] = 0xF8;
        vbr[0x28..0x30].copy_from_slice(&204_800u64.to_le_bytes());
        vbr[0x30..0x38].copy_from_slice(&4u64.to_le_bytes());
        vbr[0x38..0x40].copy_from_slice(&2u64.to_le_bytes());
        vbr[0x40] = (-10i8) as u8;
        vbr[0x44] = 1;
        vbr[0x48..0x50].copy_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
        vbr[0x1FE..0x200].copy_from_slice(&0xAA55u16.to_le_bytes());
        vbr
    }

    #[test]
    fn parses_geometry() {
        let pbs = PartitionBootSector::from_bytes(&make_ntfs_vbr()).unwrap();
        assert!(pbs.oem_id_is_valid());
        assert_eq!(pbs.bytes_per_sector, 512);
        assert_eq!(pbs.sectors_per_cluster, 8);
        assert_eq!(pbs.media_descriptor, 0xF8);
        assert_eq!(pbs.total_sectors, 204_800);
        assert_eq!(pbs.mft_cluster, 4);
        assert_eq!(pbs.mft_mirror_cluster, 2);
        assert_eq!(pbs.volume_serial_number, 0x1122_3344_5566_7788);
        assert_eq!(pbs.end_of_sector_marker, 0xAA55);
        assert_eq!(pbs.cluster_size(), 4096);
        assert_eq!(pbs.file_record_size().unwrap(), 1024);
        assert_eq!(pbs.index_record_size().unwrap(), 4096);

        let params = pbs.volume_parameters().unwrap();
        assert_eq!(params.mft_entry_size, 1024);
        assert_eq!(params.mft_start_cluster, 4);
    }

    #[test]
    fn positive_record_size_counts_clusters() {
        let mut vbr = make_ntfs_vbr();
        vbr[0x0D] = 2;
        vbr[0x40] = 1;
        let pbs = PartitionBootSector::from_bytes(&vbr).unwrap();
        assert_eq!(pbs.file_record_size().unwrap(), 1024);
    }

    #[test]
    fn rejects_short_sector() {
        assert!(matches!(
            PartitionBootSector::from_bytes(&[0u8; 100]),
            Err(DecodeError::ShortRead { .. })
        ));
    }

    #[test]
    fn detects_bad_oem_id() {
        let mut vbr = make_ntfs_vbr();
        vbr[3..11].copy_from_slice(b"MSDOS5.0");
        let pbs = PartitionBootSector::from_bytes(&vbr).unwrap();
        assert!(!pbs.oem_id_is_valid());
    }
}
