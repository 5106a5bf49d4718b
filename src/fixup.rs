// Sources:
// - https://dubeyko.com/development/FileSystems/NTFS/ntfsdoc.pdf (Update Sequence)

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::DecodeWarning;

/// Stride of the update sequence protection: NTFS stamps the last two bytes
/// of every 512-byte block of a multi-sector record.
pub const FIXUP_STRIDE: usize = 512;

/// Whether the decoder only reports fixups or restores them before walking
/// attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum FixupMode {
    #[default]
    Report,
    Apply,
}

/// One protected sector end.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SectorFixup {
    pub sector: usize,
    /// Offset of the two protected bytes within the record.
    pub offset: usize,
    pub stored: [u8; 2],
    pub replacement: [u8; 2],
    pub matches: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FixupReport {
    pub fixup_offset: u16,
    pub entry_count: u16,
    pub signature: [u8; 2],
    pub sectors: Vec<SectorFixup>,
    /// The array or one of the sectors it protects lies outside the record.
    pub out_of_bounds: bool,
}

impl FixupReport {
    /// True when every sector end carries the update sequence number.
    pub fn is_intact(&self) -> bool {
        !self.out_of_bounds && self.sectors.iter().all(|s| s.matches)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &SectorFixup> {
        self.sectors.iter().filter(|s| !s.matches)
    }

    /// Write the original values back at every reported sector end.
    pub fn apply(&self, buf: &mut [u8]) {
        for s in &self.sectors {
            if s.offset + 2 <= buf.len() {
                buf[s.offset..s.offset + 2].copy_from_slice(&s.replacement);
            }
        }
    }

    pub fn warnings(&self) -> Vec<DecodeWarning> {
        let mut out: Vec<DecodeWarning> = self
            .mismatches()
            .map(|s| DecodeWarning::FixupMismatch {
                sector: s.sector,
                expected: self.signature,
                found: s.stored,
            })
            .collect();
        if self.out_of_bounds {
            out.push(DecodeWarning::FixupOutOfBounds {
                fixup_offset: self.fixup_offset,
                entry_count: self.entry_count,
            });
        }
        out
    }
}

/// Compare every sector end of `raw` with the update sequence number stored
/// at `fixup_offset`. The buffer is left untouched.
pub fn validate_fixups(raw: &[u8], fixup_offset: u16, entry_count: u16) -> FixupReport {
    let usa = fixup_offset as usize;
    let mut report = FixupReport {
        fixup_offset,
        entry_count,
        signature: [0, 0],
        sectors: Vec::new(),
        out_of_bounds: false,
    };

    if entry_count == 0 {
        return report;
    }
    if usa + 2 > raw.len() {
        warn!("Update sequence array at {:#x} lies outside the record.", usa);
        report.out_of_bounds = true;
        return report;
    }
    report.signature = [raw[usa], raw[usa + 1]];

    for i in 1..entry_count as usize {
        let fix_pos = usa + 2 * i;
        let sector_end = i * FIXUP_STRIDE - 2;
        if fix_pos + 2 > raw.len() || sector_end + 2 > raw.len() {
            report.out_of_bounds = true;
            break;
        }
        let stored = [raw[sector_end], raw[sector_end + 1]];
        let matches = stored == report.signature;
        if !matches {
            warn!(
                "Fixup mismatch at sector {}: expected {:02X?}, found {:02X?}",
                i, report.signature, stored
            );
        }
        report.sectors.push(SectorFixup {
            sector: i,
            offset: sector_end,
            stored,
            replacement: [raw[fix_pos], raw[fix_pos + 1]],
            matches,
        });
    }

    if report.is_intact() {
        debug!("MFT record verified (USA check OK).");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protected_record() -> Vec<u8> {
        let mut buf = vec![0u8; 1024];
        // USA at 0x30: USN 0x0102, originals 0xAAAA / 0xBBBB
        buf[0x30..0x36].copy_from_slice(&[0x01, 0x02, 0xAA, 0xAA, 0xBB, 0xBB]);
        buf[510..512].copy_from_slice(&[0x01, 0x02]);
        buf[1022..1024].copy_from_slice(&[0x01, 0x02]);
        buf
    }

    #[test]
    fn intact_record_reports_replacements() {
        let buf = protected_record();
        let report = validate_fixups(&buf, 0x30, 3);
        assert!(report.is_intact());
        assert_eq!(report.signature, [0x01, 0x02]);
        assert_eq!(report.sectors.len(), 2);
        assert_eq!(report.sectors[0].offset, 510);
        assert_eq!(report.sectors[0].replacement, [0xAA, 0xAA]);
        assert_eq!(report.sectors[1].offset, 1022);
        assert_eq!(report.sectors[1].replacement, [0xBB, 0xBB]);
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn mismatch_is_reported_not_fatal() {
        let mut buf = protected_record();
        buf[1022] = 0x99;
        let report = validate_fixups(&buf, 0x30, 3);
        assert!(!report.is_intact());
        assert_eq!(report.mismatches().count(), 1);
        assert_eq!(
            report.warnings(),
            vec![DecodeWarning::FixupMismatch {
                sector: 2,
                expected: [0x01, 0x02],
                found: [0x99, 0x02],
            }]
        );
    }

    #[test]
    fn apply_restores_sector_ends() {
        let buf = protected_record();
        let report = validate_fixups(&buf, 0x30, 3);
        let mut restored = buf.clone();
        report.apply(&mut restored);
        assert_eq!(&restored[510..512], &[0xAA, 0xAA]);
        assert_eq!(&restored[1022..1024], &[0xBB, 0xBB]);
        // original untouched
        assert_eq!(&buf[510..512], &[0x01, 0x02]);
    }

    #[test]
    fn array_past_record_end_is_flagged() {
        let buf = protected_record();
        let report = validate_fixups(&buf, 0x30, 4);
        assert!(report.out_of_bounds);
        assert_eq!(report.sectors.len(), 2);
        assert!(!report.is_intact());

        let report = validate_fixups(&buf, 0x500, 3);
        assert!(report.out_of_bounds);
        assert!(report.sectors.is_empty());
    }
}
