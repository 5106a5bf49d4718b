// Sources:
// - https://dubeyko.com/development/FileSystems/NTFS/ntfsdoc.pdf
// - https://en.wikipedia.org/wiki/NTFS

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Seek, SeekFrom};

use crate::content::{FileNameAttr, StandardInformation, utf16le_lossy};
use crate::error::{DecodeError, DecodeWarning};
use crate::runlist::{ClusterRun, decode_runlist, max_runs_for, max_runs_for_extent};

/// Size of the header shared by resident and non-resident attributes.
pub const COMMON_HEADER_LEN: usize = 16;
const RESIDENT_HEADER_LEN: usize = 24;
const NON_RESIDENT_HEADER_LEN: usize = 64;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum AttributeType {
    StandardInformation = 0x10,
    AttributeList = 0x20,
    FileName = 0x30,
    ObjectId = 0x40,
    SecurityDescriptor = 0x50,
    VolumeName = 0x60,
    VolumeInformation = 0x70,
    Data = 0x80,
    IndexRoot = 0x90,
    IndexAllocation = 0xA0,
    Bitmap = 0xB0,
    ReparsePoint = 0xC0,
    EaInformation = 0xD0,
    Ea = 0xE0,
    PropertySet = 0xF0,
    LoggedUtilityStream = 0x100,
}

impl AttributeType {
    pub fn name(&self) -> &'static str {
        use AttributeType::*;
        match self {
            StandardInformation => "$STANDARD_INFORMATION",
            AttributeList => "$ATTRIBUTE_LIST",
            FileName => "$FILE_NAME",
            ObjectId => "$OBJECT_ID",
            SecurityDescriptor => "$SECURITY_DESCRIPTOR",
            VolumeName => "$VOLUME_NAME",
            VolumeInformation => "$VOLUME_INFORMATION",
            Data => "$DATA",
            IndexRoot => "$INDEX_ROOT",
            IndexAllocation => "$INDEX_ALLOCATION",
            Bitmap => "$BITMAP",
            ReparsePoint => "$REPARSE_POINT",
            EaInformation => "$EA_INFORMATION",
            Ea => "$EA",
            PropertySet => "$PROPERTY_SET",
            LoggedUtilityStream => "$LOGGED_UTILITY_STREAM",
        }
    }
}

impl TryFrom<u32> for AttributeType {
    type Error = DecodeError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use AttributeType::*;
        Ok(match value {
            0x10 => StandardInformation,
            0x20 => AttributeList,
            0x30 => FileName,
            0x40 => ObjectId,
            0x50 => SecurityDescriptor,
            0x60 => VolumeName,
            0x70 => VolumeInformation,
            0x80 => Data,
            0x90 => IndexRoot,
            0xA0 => IndexAllocation,
            0xB0 => Bitmap,
            0xC0 => ReparsePoint,
            0xD0 => EaInformation,
            0xE0 => Ea,
            0xF0 => PropertySet,
            0x100 => LoggedUtilityStream,
            _ => return Err(DecodeError::UnknownAttributeType(value)),
        })
    }
}

/// Common header part for resident & non‑resident attributes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttributeHeader {
    /// Position of the attribute inside its record.
    pub offset: usize,
    pub type_id: u32,
    /// `None` for type codes outside the standard table.
    pub attr_type: Option<AttributeType>,
    pub length: u32,
    pub non_resident: bool,
    pub name_length: u8,
    pub name_offset: u16,
    pub flags: u16,
    pub id: u16,
    pub name: Option<String>,
}

impl AttributeHeader {
    pub fn type_name(&self) -> &'static str {
        self.attr_type.map_or("$UNKNOWN", |t| t.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResidentHeader {
    pub value_length: u32,
    pub value_offset: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NonResidentHeader {
    pub lowest_vcn: u64,
    pub highest_vcn: u64,
    pub mapping_pairs_offset: u16,
    pub compression_unit: u16,
    pub allocated_size: u64,
    pub real_size: u64,
    pub initialized_size: u64,
}

/// Typed view over a resident value, selected once from the type code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum AttributeContent {
    StandardInformation(StandardInformation),
    FileName(FileNameAttr),
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum AttributeBody {
    Resident {
        resident: ResidentHeader,
        value: Vec<u8>,
        content: AttributeContent,
    },
    NonResident {
        non_resident: NonResidentHeader,
        runs: Vec<ClusterRun>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Attribute {
    pub header: AttributeHeader,
    pub body: AttributeBody,
}

impl Attribute {
    pub fn is_type(&self, attr_type: AttributeType) -> bool {
        self.header.attr_type == Some(attr_type)
    }

    /// Logical size of the attribute value.
    pub fn value_size(&self) -> u64 {
        match &self.body {
            AttributeBody::Resident { resident, .. } => u64::from(resident.value_length),
            AttributeBody::NonResident { non_resident, .. } => non_resident.real_size,
        }
    }

    pub fn content(&self) -> Option<&AttributeContent> {
        match &self.body {
            AttributeBody::Resident { content, .. } => Some(content),
            AttributeBody::NonResident { .. } => None,
        }
    }

    pub fn runs(&self) -> Option<&[ClusterRun]> {
        match &self.body {
            AttributeBody::NonResident { runs, .. } => Some(runs),
            AttributeBody::Resident { .. } => None,
        }
    }
}

/// Decode the attribute starting at `offset` of `buf`; it must end at or
/// before `limit`. Non-fatal findings are pushed on `warnings`.
pub fn decode_attribute(
    buf: &[u8],
    offset: usize,
    limit: usize,
    bytes_per_cluster: u64,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Attribute, DecodeError> {
    let truncated = DecodeError::Truncated { offset, limit };
    let limit = limit.min(buf.len());
    if offset + COMMON_HEADER_LEN > limit {
        return Err(truncated);
    }

    let mut cursor = Cursor::new(&buf[offset..limit]);
    let type_id = cursor.read_u32::<LittleEndian>()?;
    let length = cursor.read_u32::<LittleEndian>()?;
    let non_resident = cursor.read_u8()? != 0;
    let name_length = cursor.read_u8()?;
    let name_offset = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let id = cursor.read_u16::<LittleEndian>()?;

    let min_len = if non_resident {
        NON_RESIDENT_HEADER_LEN
    } else {
        RESIDENT_HEADER_LEN
    };
    let end = offset.checked_add(length as usize).ok_or(DecodeError::Truncated { offset, limit })?;
    if (length as usize) < min_len || end > limit {
        return Err(truncated);
    }
    let span = &buf[offset..end];

    let attr_type = match AttributeType::try_from(type_id) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("{} at offset {:#x}, keeping it opaque.", e, offset);
            warnings.push(DecodeWarning::UnknownAttributeType { type_id, offset });
            None
        }
    };

    let name = if name_length > 0 {
        let start = name_offset as usize;
        let stop = start + name_length as usize * 2;
        if stop > span.len() {
            return Err(truncated);
        }
        Some(utf16le_lossy(&span[start..stop]))
    } else {
        None
    };

    let header = AttributeHeader {
        offset,
        type_id,
        attr_type,
        length,
        non_resident,
        name_length,
        name_offset,
        flags,
        id,
        name,
    };
    debug!(
        "Attribute {} (0x{:X}-#{}) at {:#x}, {} bytes, {}",
        header.type_name(),
        type_id,
        id,
        offset,
        length,
        if non_resident { "non-resident" } else { "resident" }
    );

    let body = if !non_resident {
        let value_length = cursor.read_u32::<LittleEndian>()?;
        let value_offset = cursor.read_u16::<LittleEndian>()?;
        let value_start = value_offset as usize;
        let value_end = value_start + value_length as usize;
        if value_end > span.len() {
            return Err(truncated);
        }
        let value = span[value_start..value_end].to_vec();
        let content = decode_content(&header, &value, warnings);
        AttributeBody::Resident {
            resident: ResidentHeader {
                value_length,
                value_offset,
            },
            value,
            content,
        }
    } else {
        let lowest_vcn = cursor.read_u64::<LittleEndian>()?;
        let highest_vcn = cursor.read_u64::<LittleEndian>()?;
        let mapping_pairs_offset = cursor.read_u16::<LittleEndian>()?;
        let compression_unit = cursor.read_u16::<LittleEndian>()?;
        cursor.seek(SeekFrom::Current(4))?;
        let allocated_size = cursor.read_u64::<LittleEndian>()?;
        let real_size = cursor.read_u64::<LittleEndian>()?;
        let initialized_size = cursor.read_u64::<LittleEndian>()?;

        let runs_start = mapping_pairs_offset as usize;
        if runs_start > span.len() {
            return Err(truncated);
        }
        let max_runs = max_runs_for(allocated_size, bytes_per_cluster)
            .max(max_runs_for_extent(lowest_vcn, highest_vcn));
        let runs = decode_runlist(&span[runs_start..], max_runs)?;
        AttributeBody::NonResident {
            non_resident: NonResidentHeader {
                lowest_vcn,
                highest_vcn,
                mapping_pairs_offset,
                compression_unit,
                allocated_size,
                real_size,
                initialized_size,
            },
            runs,
        }
    };

    Ok(Attribute { header, body })
}

fn decode_content(
    header: &AttributeHeader,
    value: &[u8],
    warnings: &mut Vec<DecodeWarning>,
) -> AttributeContent {
    let decoded = match header.attr_type {
        Some(AttributeType::StandardInformation) => {
            StandardInformation::from_bytes(value).map(AttributeContent::StandardInformation)
        }
        Some(AttributeType::FileName) => {
            FileNameAttr::from_bytes(value).map(AttributeContent::FileName)
        }
        _ => return AttributeContent::Opaque,
    };
    decoded.unwrap_or_else(|| {
        warn!(
            "{} value at {:#x} is too short ({} bytes).",
            header.type_name(),
            header.offset,
            value.len()
        );
        warnings.push(DecodeWarning::MalformedContent {
            type_id: header.type_id,
            offset: header.offset,
        });
        AttributeContent::Opaque
    })
}
