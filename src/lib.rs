// Sources:
// - https://dubeyko.com/development/FileSystems/NTFS/ntfsdoc.pdf
// - https://en.wikipedia.org/wiki/NTFS

use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;

use log::{debug, error, info, warn};

pub mod attribute;
pub mod codec;
pub mod content;
pub mod error;
pub mod fixup;
pub mod mft;
pub mod pbs;
pub mod runlist;
pub mod volume;

pub use attribute::{Attribute, AttributeBody, AttributeContent, AttributeType};
pub use error::{DecodeError, DecodeWarning};
pub use fixup::FixupMode;
pub use mft::{
    DecodeOptions, MftRecord, decode_mft_record, decode_mft_record_at, decode_mft_record_with,
};
pub use pbs::PartitionBootSector;
pub use runlist::ClusterRun;
pub use volume::VolumeParameters;

/// Record 0 of the MFT describes the MFT itself.
pub const MFT_RECORD_MFT: u64 = 0;

/// Outcome of decoding one entry during a scan.
pub type ScanResult = (u64, Result<MftRecord, DecodeError>);

/// Random access to the MFT entries of an NTFS volume.
pub struct MftReader<T: Read + Seek> {
    pub pbs: PartitionBootSector,
    pub params: VolumeParameters,
    pub options: DecodeOptions,
    body: T,
    mft_runs: Option<Vec<ClusterRun>>, // Cached DATA run-list of the MFT itself
}

impl<T: Read + Seek> MftReader<T> {
    /// Open a volume from its boot sector.
    pub fn new(mut body: T) -> Result<Self, DecodeError> {
        let mut sp_data = vec![0u8; pbs::BOOT_SECTOR_LEN];
        body.seek(SeekFrom::Start(0))?;
        body.read_exact(&mut sp_data)?;
        let pbs = PartitionBootSector::from_bytes(&sp_data)?;
        if !pbs.oem_id_is_valid() {
            error!("The OEM Identifier is not valid.");
            return Err(DecodeError::InvalidParameters(
                "the OEM Identifier is not valid".into(),
            ));
        }
        let params = pbs.volume_parameters()?;
        info!(
            "NTFS volume: {} bytes per cluster, {} bytes per MFT entry, $MFT at cluster {}",
            params.bytes_per_cluster(),
            params.mft_entry_size,
            params.mft_start_cluster
        );
        Ok(Self {
            pbs,
            params,
            options: DecodeOptions::default(),
            body,
            mft_runs: None,
        })
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Decode the record stored at an absolute cluster.
    pub fn record_at_cluster(&mut self, cluster: u64) -> Result<MftRecord, DecodeError> {
        decode_mft_record_with(&self.params, cluster, &mut self.body, &self.options)
    }

    /// Load MFT run-list if not loaded yet
    fn ensure_mft_runs(&mut self) -> Result<&[ClusterRun], DecodeError> {
        if self.mft_runs.is_none() {
            debug!("Loading MFT run-list (not loaded).");
            // record 0 is always in the first extent
            let rec0 = self.record_at_cluster(self.params.mft_start_cluster)?;
            let runs = rec0
                .data_runs()
                .ok_or(DecodeError::EntryOutOfRange(MFT_RECORD_MFT))?
                .to_vec();
            self.mft_runs = Some(runs);
        }
        Ok(self.mft_runs.as_deref().unwrap_or_default())
    }

    /// Number of entries the $MFT data runs can hold.
    pub fn entry_count(&mut self) -> Result<u64, DecodeError> {
        let clusters = self
            .ensure_mft_runs()?
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.length));
        Ok(clusters.saturating_mul(self.params.bytes_per_cluster())
            / u64::from(self.params.mft_entry_size))
    }

    /// Byte offset of MFT entry `entry` on the volume.
    fn entry_offset(&mut self, entry: u64) -> Result<u64, DecodeError> {
        let rec_size = u64::from(self.params.mft_entry_size);
        let clu_size = self.params.bytes_per_cluster();
        let wanted = entry
            .checked_mul(rec_size)
            .ok_or(DecodeError::EntryOutOfRange(entry))?;

        // Walk the run-list to find the extent holding that byte
        let mut base = 0u64;
        for run in self.ensure_mft_runs()? {
            let run_bytes = run.length.saturating_mul(clu_size);
            if wanted - base < run_bytes {
                return run
                    .start_cluster
                    .and_then(|lcn| lcn.checked_mul(clu_size))
                    .and_then(|start| start.checked_add(wanted - base))
                    .ok_or(DecodeError::EntryOutOfRange(entry));
            }
            base = base.saturating_add(run_bytes);
        }
        Err(DecodeError::EntryOutOfRange(entry))
    }

    /// Decode MFT entry number `entry`.
    pub fn entry(&mut self, entry: u64) -> Result<MftRecord, DecodeError> {
        let offset = self.entry_offset(entry)?;
        debug!("MFT entry {} read from 0x{:X}", entry, offset);
        decode_mft_record_at(&self.params, offset, &mut self.body, &self.options)
    }

    /// Decode every entry of `range` independently; a failing entry is
    /// reported in place and the scan moves on.
    pub fn scan(&mut self, range: Range<u64>) -> Result<Vec<ScanResult>, DecodeError> {
        self.ensure_mft_runs()?;
        let mut out = Vec::new();
        for id in range {
            let res = self.entry(id);
            if let Err(e) = &res {
                warn!("MFT entry {}: {}", id, e);
            }
            out.push((id, res));
        }
        Ok(out)
    }
}
