// Sources:
// - https://dubeyko.com/development/FileSystems/NTFS/ntfsdoc.pdf (Data Runs)

use log::debug;
use serde::{Deserialize, Serialize};

use crate::codec::{decode_signed, decode_unsigned};
use crate::error::DecodeError;

/// A contiguous extent of a non-resident attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClusterRun {
    /// Absolute logical cluster number, `None` for a sparse run.
    pub start_cluster: Option<u64>,
    pub length: u64,
}

impl ClusterRun {
    pub fn is_sparse(&self) -> bool {
        self.start_cluster.is_none()
    }
}

/// Upper bound on the number of runs an attribute of `allocated_size` bytes
/// can describe: every run covers at least one cluster.
pub fn max_runs_for(allocated_size: u64, bytes_per_cluster: u64) -> usize {
    let clusters = allocated_size.div_ceil(bytes_per_cluster.max(1));
    usize::try_from(clusters.saturating_add(1)).unwrap_or(usize::MAX)
}

/// Same bound for an extent covering `lowest_vcn..=highest_vcn`. Extents
/// past the first one carry zero sizes, so the VCN span is all they offer.
pub fn max_runs_for_extent(lowest_vcn: u64, highest_vcn: u64) -> usize {
    let clusters = highest_vcn.saturating_sub(lowest_vcn).saturating_add(1);
    usize::try_from(clusters.saturating_add(1)).unwrap_or(usize::MAX)
}

/// Decode mapping pairs into absolute cluster runs.
///
/// Each pair starts with a header byte whose low nibble is the size of the
/// length field and high nibble the size of the (signed, relative) offset
/// field. A zero header byte, or the end of `data`, ends the list. Decoding
/// more than `max_runs` runs fails with [`DecodeError::RunlistOverrun`].
pub fn decode_runlist(data: &[u8], max_runs: usize) -> Result<Vec<ClusterRun>, DecodeError> {
    let mut runs = Vec::new();
    let mut pos = 0usize;
    let mut run_start: i64 = 0;

    while pos < data.len() && data[pos] != 0 {
        if runs.len() >= max_runs {
            return Err(DecodeError::RunlistOverrun { limit: max_runs });
        }
        let header = data[pos];
        let len_size = (header & 0x0F) as usize;
        let off_size = ((header >> 4) & 0x0F) as usize;

        if len_size == 0 || len_size > 8 || off_size > 8 {
            return Err(DecodeError::InvalidRun {
                position: pos,
                reason: format!("bad header byte {:#04x}", header),
            });
        }
        if pos + 1 + len_size + off_size > data.len() {
            return Err(DecodeError::InvalidRun {
                position: pos,
                reason: "mapping pair runs past the attribute".into(),
            });
        }
        pos += 1;

        let length = decode_unsigned(&data[pos..pos + len_size])?;
        if length == 0 {
            return Err(DecodeError::InvalidRun {
                position: pos - 1,
                reason: "zero-length run".into(),
            });
        }
        pos += len_size;

        let start_cluster = if off_size == 0 {
            None
        } else {
            let delta = decode_signed(&data[pos..pos + off_size])?;
            run_start = run_start
                .checked_add(delta)
                .filter(|lcn| *lcn >= 0)
                .ok_or_else(|| DecodeError::InvalidRun {
                    position: pos,
                    reason: format!("offset {} moves before cluster 0", delta),
                })?;
            Some(run_start as u64)
        };
        pos += off_size;

        runs.push(ClusterRun {
            start_cluster,
            length,
        });
    }

    debug!("Decoded {} data run(s).", runs.len());
    Ok(runs)
}
