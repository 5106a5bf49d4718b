// Sources:
// - https://dubeyko.com/development/FileSystems/NTFS/ntfsdoc.pdf
// - https://learn.microsoft.com/windows/win32/fileio/file-attribute-constants

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// 100ns ticks between 1601-01-01 and 1970-01-01.
pub const FILETIME_UNIX_DELTA: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Convert a Windows FILETIME to seconds since the unix epoch.
pub fn filetime_to_unix(ft: u64) -> i64 {
    (i128::from(ft) - i128::from(FILETIME_UNIX_DELTA)).div_euclid(i128::from(TICKS_PER_SECOND))
        as i64
}

/// Render unix seconds as RFC 3339 (UTC), empty when out of chrono's range.
pub fn unix_to_rfc3339(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

/// DOS / NTFS file attribute flags carried by $STANDARD_INFORMATION and
/// $FILE_NAME.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileAttributeFlags(pub u32);

impl FileAttributeFlags {
    pub const READ_ONLY: u32 = 0x0001;
    pub const HIDDEN: u32 = 0x0002;
    pub const SYSTEM: u32 = 0x0004;
    pub const ARCHIVE: u32 = 0x0020;
    pub const DEVICE: u32 = 0x0040;
    pub const NORMAL: u32 = 0x0080;
    pub const TEMPORARY: u32 = 0x0100;
    pub const SPARSE_FILE: u32 = 0x0200;
    pub const REPARSE_POINT: u32 = 0x0400;
    pub const COMPRESSED: u32 = 0x0800;
    pub const OFFLINE: u32 = 0x1000;
    pub const NOT_CONTENT_INDEXED: u32 = 0x2000;
    pub const ENCRYPTED: u32 = 0x4000;
    pub const DIRECTORY: u32 = 0x1000_0000;
    pub const INDEX_VIEW: u32 = 0x2000_0000;

    const NAMES: [(u32, &'static str); 15] = [
        (Self::READ_ONLY, "READONLY"),
        (Self::HIDDEN, "HIDDEN"),
        (Self::SYSTEM, "SYSTEM"),
        (Self::ARCHIVE, "ARCHIVE"),
        (Self::DEVICE, "DEVICE"),
        (Self::NORMAL, "NORMAL"),
        (Self::TEMPORARY, "TEMPORARY"),
        (Self::SPARSE_FILE, "SPARSE_FILE"),
        (Self::REPARSE_POINT, "REPARSE_POINT"),
        (Self::COMPRESSED, "COMPRESSED"),
        (Self::OFFLINE, "OFFLINE"),
        (Self::NOT_CONTENT_INDEXED, "NOT_CONTENT_INDEXED"),
        (Self::ENCRYPTED, "ENCRYPTED"),
        (Self::DIRECTORY, "DIRECTORY"),
        (Self::INDEX_VIEW, "INDEX_VIEW"),
    ];

    pub fn contains(&self, mask: u32) -> bool {
        self.0 & mask != 0
    }

    pub fn names(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(mask, _)| self.contains(*mask))
            .map(|(_, name)| *name)
            .collect()
    }

    pub fn to_display(&self) -> String {
        let names = self.names();
        if names.is_empty() {
            "None".to_string()
        } else {
            names.join(" | ")
        }
    }
}

/// Parsed $STANDARD_INFORMATION (covers v0 & v1, optionally v2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardInformation {
    pub created: i64,
    pub modified: i64,
    pub mft_modified: i64,
    pub accessed: i64,
    pub file_attrs: FileAttributeFlags,
    pub max_versions: u32,
    pub version_number: u32,
    pub class_id: u32,
    pub owner_id: Option<u32>,
    pub security_id: Option<u32>,
    pub quota_charged: Option<u64>,
    pub usn: Option<u64>,
}

impl StandardInformation {
    pub const MIN_LEN: usize = 0x30;

    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() < Self::MIN_LEN {
            return None;
        }
        let mut cur = Cursor::new(raw);
        let created = filetime_to_unix(cur.read_u64::<LittleEndian>().ok()?);
        let modified = filetime_to_unix(cur.read_u64::<LittleEndian>().ok()?);
        let mft_modified = filetime_to_unix(cur.read_u64::<LittleEndian>().ok()?);
        let accessed = filetime_to_unix(cur.read_u64::<LittleEndian>().ok()?);
        let file_attrs = FileAttributeFlags(cur.read_u32::<LittleEndian>().ok()?);
        let max_versions = cur.read_u32::<LittleEndian>().ok()?;
        let version_number = cur.read_u32::<LittleEndian>().ok()?;
        let class_id = cur.read_u32::<LittleEndian>().ok()?;
        let owner_id = (raw.len() >= 0x34)
            .then(|| cur.read_u32::<LittleEndian>().ok())
            .flatten();
        let security_id = (raw.len() >= 0x38)
            .then(|| cur.read_u32::<LittleEndian>().ok())
            .flatten();
        let quota_charged = (raw.len() >= 0x40)
            .then(|| cur.read_u64::<LittleEndian>().ok())
            .flatten();
        let usn = (raw.len() >= 0x48)
            .then(|| cur.read_u64::<LittleEndian>().ok())
            .flatten();
        Some(Self {
            created,
            modified,
            mft_modified,
            accessed,
            file_attrs,
            max_versions,
            version_number,
            class_id,
            owner_id,
            security_id,
            quota_charged,
            usn,
        })
    }
}

/// MFT reference to the directory holding a $FILE_NAME.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentReference {
    /// 48-bit MFT record index.
    pub record: u64,
    pub sequence: u16,
}

impl From<u64> for ParentReference {
    fn from(raw: u64) -> Self {
        Self {
            record: raw & 0x0000_FFFF_FFFF_FFFF,
            sequence: (raw >> 48) as u16,
        }
    }
}

/// Parsed $FILE_NAME attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNameAttr {
    pub parent: ParentReference,
    pub created: i64,
    pub modified: i64,
    pub mft_modified: i64,
    pub accessed: i64,
    pub allocated_size: u64,
    pub real_size: u64,
    pub flags: FileAttributeFlags,
    pub reparse_value: u32,
    pub name_length: u8,
    /// 0 = POSIX, 1 = Win32, 2 = DOS, 3 = Win32 & DOS
    pub namespace: u8,
    pub name: String,
}

impl FileNameAttr {
    pub const NAME_OFFSET: usize = 66;

    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() < Self::NAME_OFFSET {
            return None;
        }
        let mut cur = Cursor::new(raw);
        let parent = ParentReference::from(cur.read_u64::<LittleEndian>().ok()?);
        let created = filetime_to_unix(cur.read_u64::<LittleEndian>().ok()?);
        let modified = filetime_to_unix(cur.read_u64::<LittleEndian>().ok()?);
        let mft_modified = filetime_to_unix(cur.read_u64::<LittleEndian>().ok()?);
        let accessed = filetime_to_unix(cur.read_u64::<LittleEndian>().ok()?);
        let allocated_size = cur.read_u64::<LittleEndian>().ok()?;
        let real_size = cur.read_u64::<LittleEndian>().ok()?;
        let flags = FileAttributeFlags(cur.read_u32::<LittleEndian>().ok()?);
        let reparse_value = cur.read_u32::<LittleEndian>().ok()?;
        let name_length = cur.read_u8().ok()?;
        let namespace = cur.read_u8().ok()?;

        let name_end = Self::NAME_OFFSET + name_length as usize * 2;
        if raw.len() < name_end {
            return None;
        }
        let name = utf16le_lossy(&raw[Self::NAME_OFFSET..name_end]);
        Some(Self {
            parent,
            created,
            modified,
            mft_modified,
            accessed,
            allocated_size,
            real_size,
            flags,
            reparse_value,
            name_length,
            namespace,
            name,
        })
    }

    pub fn namespace_name(&self) -> &'static str {
        match self.namespace {
            0 => "POSIX",
            1 => "Win32",
            2 => "DOS",
            3 => "Win32 & DOS",
            _ => "Unknown",
        }
    }
}

pub(crate) fn utf16le_lossy(raw: &[u8]) -> String {
    String::from_utf16_lossy(
        &raw.chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect::<Vec<_>>(),
    )
}
