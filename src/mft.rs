// Sources:
// - https://dubeyko.com/development/FileSystems/NTFS/ntfsdoc.pdf
// - https://en.wikipedia.org/wiki/NTFS

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, error, warn};
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::attribute::{
    Attribute, AttributeBody, AttributeContent, AttributeType, COMMON_HEADER_LEN,
    decode_attribute,
};
use crate::content::{FileNameAttr, ParentReference, StandardInformation, unix_to_rfc3339};
use crate::error::{DecodeError, DecodeWarning};
use crate::fixup::{FixupMode, FixupReport, validate_fixups};
use crate::runlist::ClusterRun;
use crate::volume::VolumeParameters;

pub const FILE_SIGNATURE: &[u8; 4] = b"FILE";
/// Length of the fixed FILE record header.
pub const HEADER_LEN: usize = 42;
const END_MARKER: u32 = 0xFFFF_FFFF;

/// Flags of the FILE record header (offset 22).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecordFlags(pub u16);

impl RecordFlags {
    pub const IN_USE: u16 = 0x0001;
    pub const DIRECTORY: u16 = 0x0002;
    pub const EXTENSION: u16 = 0x0004;
    pub const SPECIAL_INDEX: u16 = 0x0008;

    pub fn is_in_use(&self) -> bool {
        self.0 & Self::IN_USE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut v = Vec::new();
        if self.0 & Self::IN_USE != 0 {
            v.push("Allocated")
        }
        if self.0 & Self::DIRECTORY != 0 {
            v.push("Directory")
        }
        if self.0 & Self::EXTENSION != 0 {
            v.push("Extension")
        }
        if self.0 & Self::SPECIAL_INDEX != 0 {
            v.push("Special Index")
        }
        v
    }
}

/// Header found at the very beginning of every **FILE** record (offset 0).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileRecordHeader {
    pub signature: [u8; 4],
    pub usa_offset: u16,
    pub usa_count: u16,
    pub lsn: u64,
    pub sequence_number: u16,
    pub hard_link_count: u16,
    pub attrs_offset: u16,
    pub flags: RecordFlags,
    pub bytes_in_use: u32,
    pub bytes_allocated: u32,
    pub base_file_record: u64,
    pub next_attr_id: u16,
}

impl FileRecordHeader {
    /// Parse the fixed 42-byte header, checking the signature first.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() < 4 {
            return Err(DecodeError::ShortRead {
                expected: HEADER_LEN,
                available: raw.len(),
            });
        }
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&raw[0..4]);
        if &signature != FILE_SIGNATURE {
            debug!(
                "Record signature is not 'FILE', found: {}",
                String::from_utf8_lossy(&signature)
            );
            return Err(DecodeError::BadSignature { found: signature });
        }
        if raw.len() < HEADER_LEN {
            return Err(DecodeError::ShortRead {
                expected: HEADER_LEN,
                available: raw.len(),
            });
        }

        let mut cursor = Cursor::new(&raw[4..HEADER_LEN]);
        Ok(Self {
            signature,
            usa_offset: cursor.read_u16::<LittleEndian>()?,
            usa_count: cursor.read_u16::<LittleEndian>()?,
            lsn: cursor.read_u64::<LittleEndian>()?,
            sequence_number: cursor.read_u16::<LittleEndian>()?,
            hard_link_count: cursor.read_u16::<LittleEndian>()?,
            attrs_offset: cursor.read_u16::<LittleEndian>()?,
            flags: RecordFlags(cursor.read_u16::<LittleEndian>()?),
            bytes_in_use: cursor.read_u32::<LittleEndian>()?,
            bytes_allocated: cursor.read_u32::<LittleEndian>()?,
            base_file_record: cursor.read_u64::<LittleEndian>()?,
            next_attr_id: cursor.read_u16::<LittleEndian>()?,
        })
    }
}

/// Knobs for a decode call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DecodeOptions {
    pub fixups: FixupMode,
}

/// Represents an Alternate Data Stream (named $DATA attribute).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataStream {
    pub name: String,
    pub size: u64,
    pub resident: bool,
}

/// A fully decoded MFT record.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MftRecord {
    pub header: FileRecordHeader,
    pub attributes: Vec<Attribute>,
    pub fixups: FixupReport,
    pub warnings: Vec<DecodeWarning>,
    /// The record exactly as read, fixups not applied.
    #[serde(skip)]
    pub raw: Vec<u8>,
}

impl MftRecord {
    /// Decode a raw record (`mft_entry_size` bytes) into an `MftRecord`.
    pub fn from_bytes(
        mut raw: Vec<u8>,
        params: &VolumeParameters,
        options: &DecodeOptions,
    ) -> Result<Self, DecodeError> {
        let expected = params.mft_entry_size as usize;
        if raw.len() < expected {
            return Err(DecodeError::ShortRead {
                expected,
                available: raw.len(),
            });
        }
        raw.truncate(expected);
        let header = FileRecordHeader::from_bytes(&raw)?;
        let mut warnings = Vec::new();

        if header.bytes_allocated as usize != raw.len() {
            warn!(
                "Header allocated size {} differs from record size {}.",
                header.bytes_allocated,
                raw.len()
            );
            warnings.push(DecodeWarning::AllocatedSizeMismatch {
                header: header.bytes_allocated,
                actual: raw.len(),
            });
        }
        let used = header.bytes_in_use as usize;
        if used > raw.len() || used > header.bytes_allocated as usize {
            return Err(DecodeError::Truncated {
                offset: used,
                limit: raw.len().min(header.bytes_allocated as usize),
            });
        }

        let fixups = validate_fixups(&raw, header.usa_offset, header.usa_count);
        warnings.extend(fixups.warnings());

        let attributes = match options.fixups {
            FixupMode::Apply if fixups.is_intact() => {
                debug!("Detected a multi-sector record, patching.");
                let mut buf = raw.clone();
                fixups.apply(&mut buf);
                walk_attributes(&buf, &header, params, &mut warnings)?
            }
            FixupMode::Apply => {
                warn!("Fixups did not validate, decoding the record as stored.");
                walk_attributes(&raw, &header, params, &mut warnings)?
            }
            FixupMode::Report => walk_attributes(&raw, &header, params, &mut warnings)?,
        };

        Ok(MftRecord {
            header,
            attributes,
            fixups,
            warnings,
            raw,
        })
    }

    pub fn is_in_use(&self) -> bool {
        self.header.flags.is_in_use()
    }

    pub fn is_dir(&self) -> bool {
        self.header.flags.is_directory()
    }

    /// The stored bytes with every sector end restored from the fixup array.
    pub fn restored_raw(&self) -> Vec<u8> {
        let mut buf = self.raw.clone();
        self.fixups.apply(&mut buf);
        buf
    }

    pub fn attributes_of(&self, attr_type: AttributeType) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(move |a| a.is_type(attr_type))
    }

    pub fn standard_information(&self) -> Option<&StandardInformation> {
        self.attributes.iter().find_map(|a| match a.content() {
            Some(AttributeContent::StandardInformation(si)) => Some(si),
            _ => None,
        })
    }

    /// Every $FILE_NAME attribute found (there may be 2 – long & DOS).
    pub fn file_names(&self) -> Vec<&FileNameAttr> {
        self.attributes
            .iter()
            .filter_map(|a| match a.content() {
                Some(AttributeContent::FileName(f)) => Some(f),
                _ => None,
            })
            .collect()
    }

    /// The first non-DOS name, falling back to any name.
    pub fn primary_name(&self) -> Option<&str> {
        let names = self.file_names();
        names
            .iter()
            .copied()
            .find(|f| f.namespace != 2)
            .or_else(|| names.first().copied())
            .map(|f| f.name.as_str())
    }

    pub fn parent_reference(&self) -> Option<ParentReference> {
        self.file_names().first().map(|f| f.parent)
    }

    /// Runs of the unnamed non-resident $DATA attribute.
    pub fn data_runs(&self) -> Option<&[ClusterRun]> {
        self.attributes_of(AttributeType::Data)
            .find(|a| a.header.name_length == 0)
            .and_then(|a| a.runs())
    }

    /// Extract Alternate Data Streams (named $DATA attributes).
    pub fn alternate_data_streams(&self) -> Vec<DataStream> {
        self.attributes_of(AttributeType::Data)
            .filter(|a| a.header.name_length > 0)
            .map(|a| DataStream {
                name: a.header.name.clone().unwrap_or_default(),
                size: a.value_size(),
                resident: !a.header.non_resident,
            })
            .collect()
    }

    /// Serialize to JSON (uses `serde`).
    pub fn to_json(&self) -> Value {
        json!({
            "header": &self.header,
            "flags": self.header.flags.names(),
            "attributes": &self.attributes,
            "fixups_intact": self.fixups.is_intact(),
            "warnings": &self.warnings,
            "name": self.primary_name(),
            "ads": self.alternate_data_streams(),
        })
    }
}

/// Walk the attribute chain from the header's first attribute offset.
fn walk_attributes(
    buf: &[u8],
    header: &FileRecordHeader,
    params: &VolumeParameters,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Vec<Attribute>, DecodeError> {
    let used = header.bytes_in_use as usize;
    let mut offset = header.attrs_offset as usize;
    let mut attributes = Vec::new();

    loop {
        if offset + 4 <= buf.len() {
            let mut c = Cursor::new(&buf[offset..offset + 4]);
            if c.read_u32::<LittleEndian>()? == END_MARKER {
                debug!("End of attributes marker at {:#x}.", offset);
                break;
            }
        }
        if offset + COMMON_HEADER_LEN > used {
            break;
        }
        if attributes.len() >= header.next_attr_id as usize {
            debug!("Decoded next_attr_id ({}) attributes.", header.next_attr_id);
            break;
        }

        let attr = decode_attribute(buf, offset, used, params.bytes_per_cluster(), warnings)?;
        offset += attr.header.length as usize;
        attributes.push(attr);
    }

    Ok(attributes)
}

/// Decode the record stored at `cluster_index` of the volume.
pub fn decode_mft_record<R: Read + Seek>(
    params: &VolumeParameters,
    cluster_index: u64,
    reader: &mut R,
) -> Result<MftRecord, DecodeError> {
    decode_mft_record_with(params, cluster_index, reader, &DecodeOptions::default())
}

pub fn decode_mft_record_with<R: Read + Seek>(
    params: &VolumeParameters,
    cluster_index: u64,
    reader: &mut R,
    options: &DecodeOptions,
) -> Result<MftRecord, DecodeError> {
    let offset = params.cluster_offset(cluster_index)?;
    decode_mft_record_at(params, offset, reader, options)
}

/// Decode the record stored at byte `offset` of the volume.
pub fn decode_mft_record_at<R: Read + Seek>(
    params: &VolumeParameters,
    offset: u64,
    reader: &mut R,
    options: &DecodeOptions,
) -> Result<MftRecord, DecodeError> {
    let size = params.mft_entry_size as usize;
    reader.seek(SeekFrom::Start(offset))?;
    let mut raw = Vec::with_capacity(size);
    reader.by_ref().take(size as u64).read_to_end(&mut raw)?;
    if raw.len() < size {
        error!(
            "Short read at 0x{:X}: {} of {} bytes.",
            offset,
            raw.len(),
            size
        );
        return Err(DecodeError::ShortRead {
            expected: size,
            available: raw.len(),
        });
    }
    debug!("MFT record read from 0x{:X}", offset);
    MftRecord::from_bytes(raw, params, options)
}

impl fmt::Display for MftRecord {
    /// Render the record as human‑readable tables.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.header.flags.names();
        let flags = if names.is_empty() {
            "None".to_string()
        } else {
            names.join(" | ")
        };
        let fixups = if self.fixups.is_intact() { "OK" } else { "MISMATCH" };

        //  Header
        let mut hdr = Table::new();
        hdr.add_row(row!["MFT Entry Header Values"]);
        hdr.add_row(row![b -> "Sequence", self.header.sequence_number]);
        hdr.add_row(row![b -> "$LogFile Sequence Number", self.header.lsn]);
        hdr.add_row(row![b -> "Flags", flags]);
        hdr.add_row(row![b -> "Links", self.header.hard_link_count]);
        hdr.add_row(row![b -> "Used / Allocated", format!("{} / {}", self.header.bytes_in_use, self.header.bytes_allocated)]);
        hdr.add_row(row![b -> "Base Record", self.header.base_file_record]);
        hdr.add_row(row![b -> "Fixups", fixups]);
        writeln!(f, "{}", hdr)?;

        //  Attributes overview
        let mut attrs = Table::new();
        attrs.add_row(row!["Attributes", "Name", "Status", "Size"]);
        for a in &self.attributes {
            let status = if a.header.non_resident {
                "Non‑resident"
            } else {
                "Resident"
            };
            attrs.add_row(row![
                format!(
                    "{} (0x{:X}‑#{})",
                    a.header.type_name(),
                    a.header.type_id,
                    a.header.id
                ),
                a.header.name.clone().unwrap_or_else(|| "N/A".to_string()),
                status,
                a.value_size()
            ]);
        }
        writeln!(f, "{}", attrs)?;

        //  $STANDARD_INFORMATION
        if let Some(std) = self.standard_information() {
            let mut t = Table::new();
            t.add_row(row!["$STANDARD_INFORMATION"]);
            t.add_row(row![b -> "Created", unix_to_rfc3339(std.created)]);
            t.add_row(row![b -> "File Modified", unix_to_rfc3339(std.modified)]);
            t.add_row(row![b -> "MFT Modified", unix_to_rfc3339(std.mft_modified)]);
            t.add_row(row![b -> "Accessed", unix_to_rfc3339(std.accessed)]);
            t.add_row(row![b -> "Flags", std.file_attrs.to_display()]);
            t.add_row(row![b -> "Owner ID", std.owner_id.map_or("‑".into(), |v| v.to_string())]);
            t.add_row(
                row![b -> "Security ID", std.security_id.map_or("‑".into(), |v| v.to_string())],
            );
            if let Some(q) = std.quota_charged {
                t.add_row(row![b -> "Quota Charged", q]);
            }
            if let Some(u) = std.usn {
                t.add_row(row![b -> "Last USN", u]);
            }
            writeln!(f, "{}", t)?;
        }

        //  All FILE_NAME attributes
        let names = self.file_names();
        if !names.is_empty() {
            let mut t = Table::new();
            t.add_row(row!["$FILE_NAME Attributes"]);
            for fname in names {
                t.add_row(row![b -> "Name", fname.name.clone()]);
                t.add_row(row![b -> "Namespace", fname.namespace_name()]);
                t.add_row(row![b -> "Parent MFT", format!("{} (seq {})", fname.parent.record, fname.parent.sequence)]);
                t.add_row(row![b -> "Allocated", fname.allocated_size]);
                t.add_row(row![b -> "Actual", fname.real_size]);
                t.add_row(row!["Flags", fname.flags.to_display()]);
                t.add_row(row![b -> "Timestamps", ""]);
                t.add_row(row!["‑ Created", unix_to_rfc3339(fname.created)]);
                t.add_row(row!["‑ Modified", unix_to_rfc3339(fname.modified)]);
                t.add_row(row!["‑ MFT Mod", unix_to_rfc3339(fname.mft_modified)]);
                t.add_row(row!["‑ Accessed", unix_to_rfc3339(fname.accessed)]);
                t.add_row(row!["", ""]); // blank separator
            }
            writeln!(f, "{}", t)?;
        }

        //  Data runs of every non-resident attribute
        let mut t = Table::new();
        t.add_row(row!["Data Runs", "Start Cluster", "Length"]);
        let mut any = false;
        for a in &self.attributes {
            if let AttributeBody::NonResident { runs, .. } = &a.body {
                for run in runs {
                    any = true;
                    t.add_row(row![
                        format!("{} #{}", a.header.type_name(), a.header.id),
                        run.start_cluster.map_or("sparse".to_string(), |c| c.to_string()),
                        run.length
                    ]);
                }
            }
        }
        if any {
            writeln!(f, "{}", t)?;
        }

        //  Alternate Data Streams
        let ads = self.alternate_data_streams();
        if !ads.is_empty() {
            let mut t = Table::new();
            t.add_row(row!["Alternate Data Streams"]);
            t.add_row(row![b -> "Name", "Size", "Resident"]);
            for s in ads {
                let resident = if s.resident { "Yes" } else { "No" };
                t.add_row(row![s.name, s.size, resident]);
            }
            writeln!(f, "{}", t)?;
        }

        if !self.warnings.is_empty() {
            let mut t = Table::new();
            t.add_row(row!["Warnings"]);
            for w in &self.warnings {
                t.add_row(row![format!("{:?}", w)]);
            }
            writeln!(f, "{}", t)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_needs_signature_before_length() {
        assert!(matches!(
            FileRecordHeader::from_bytes(b"INDX\0\0\0\0"),
            Err(DecodeError::BadSignature { .. })
        ));
        assert!(matches!(
            FileRecordHeader::from_bytes(b"FILE\0\0"),
            Err(DecodeError::ShortRead { expected: 42, .. })
        ));
    }

    #[test]
    fn record_flags() {
        let flags = RecordFlags(0x0003);
        assert!(flags.is_in_use());
        assert!(flags.is_directory());
        assert_eq!(flags.names(), vec!["Allocated", "Directory"]);
        assert!(RecordFlags::default().names().is_empty());
    }

    #[test]
    fn short_buffer_is_rejected_before_parsing() {
        let params = VolumeParameters::new(512, 8, 1024, 4).unwrap();
        let err = MftRecord::from_bytes(b"FILE".to_vec(), &params, &DecodeOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::ShortRead {
                expected: 1024,
                available: 4
            }
        ));
    }
}
