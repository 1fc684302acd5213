//! Threshold-triggered heavy-load events, tallied into index buckets.
//!
//! An index record at position `i` whose zone difference is strictly above the
//! threshold is one event. Events land in bucket `round(i / bucket_width)`,
//! counted from 1, with halves rounding up. Buckets outside
//! `1..=bucket_count` are handled by [`BucketPolicy`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BucketPolicy, EdgeError, IndexRecord, Params, Zone, ZoneSeries};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct HeavyLoadEvent {
    pub index: usize,
    pub value: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinningDiagnostics {
    pub events: usize,
    pub clamped: usize,
    pub dropped: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HeavyLoadBins {
    pub counts: ZoneSeries<u32>,
    pub diagnostics: BinningDiagnostics,
}

/// Records of one zone whose difference exceeds `threshold`, in input order.
pub fn detect_heavy_load(records: &[IndexRecord], zone: Zone, threshold: f64) -> Vec<HeavyLoadEvent> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let value = record.diff(zone);
            (value > threshold).then_some(HeavyLoadEvent { index, value })
        })
        .collect()
}

/// One-based bucket number for a record position, `round(index / bucket_width)`.
///
/// Returns 0 for positions below half a bucket width. Never overflows.
pub fn bucket_for_index(index: usize, bucket_width: usize) -> usize {
    if bucket_width == 0 {
        return 0;
    }
    let rounds_up = index % bucket_width >= bucket_width - bucket_width / 2;
    index / bucket_width + usize::from(rounds_up)
}

pub fn bin_heavy_load(records: &[IndexRecord], params: &Params) -> Result<HeavyLoadBins, EdgeError> {
    params.validate_buckets()?;
    let bucket_count = params.bucket_count;
    let mut counts = ZoneSeries::filled(bucket_count, 0u32);
    let mut diagnostics = BinningDiagnostics::default();

    for zone in Zone::ALL {
        let events = detect_heavy_load(records, zone, params.heavy_load_threshold);
        diagnostics.events += events.len();
        let buckets = counts.get_mut(zone);
        for event in &events {
            let bucket = bucket_for_index(event.index, params.bucket_width);
            let slot = if (1..=bucket_count).contains(&bucket) {
                bucket - 1
            } else {
                match params.bucket_policy {
                    BucketPolicy::Reject => {
                        return Err(EdgeError::BucketOutOfRange {
                            zone,
                            index: event.index,
                            bucket,
                            bucket_count,
                        })
                    }
                    BucketPolicy::Clamp => {
                        diagnostics.clamped += 1;
                        if bucket == 0 {
                            0
                        } else {
                            bucket_count - 1
                        }
                    }
                    BucketPolicy::Drop => {
                        diagnostics.dropped += 1;
                        continue;
                    }
                }
            };
            buckets[slot] += 1;
        }
        debug!("{} heavy-load buckets: {:?} ({} events)", zone, buckets, events.len());
    }

    Ok(HeavyLoadBins {
        counts,
        diagnostics,
    })
}
