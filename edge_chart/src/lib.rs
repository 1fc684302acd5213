//! Chart-ready summaries of edge sensor batches.
//!
//! A batch holds three already-fetched arrays: inertial samples for the head and
//! both arms, opaque environment readings, and per-sample index records. Two
//! summaries come out of it: the mean movement magnitude of each fixed-width
//! chunk per zone, and heavy-load event counts per index bucket per zone.

pub mod chart;
pub mod chunk;
pub mod heavy_load;
pub mod magnitude;
pub mod records;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chart::{activity_chart, heavy_load_chart, ChartBundle, ChartDataset, HeavyLoadChart};
pub use chunk::{chunk, chunk_count};
pub use heavy_load::{
    bin_heavy_load, bucket_for_index, detect_heavy_load, BinningDiagnostics, HeavyLoadBins,
    HeavyLoadEvent,
};
pub use magnitude::average_magnitudes;
pub use records::{
    arm_repetitions, counter_regressions, parse_environment, parse_index_records,
    parse_inertial, Axes6, EnvironmentSample, IndexRecord, InertialSample,
};

pub const DEFAULT_CHUNK_WIDTH: usize = 60;
pub const DEFAULT_HEAVY_LOAD_THRESHOLD: f64 = 100.0;
pub const DEFAULT_BUCKET_COUNT: usize = 5;
/// Ten index records make roughly one minute of data.
pub const DEFAULT_BUCKET_WIDTH: usize = 10;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EdgeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("chunk {chunk} is empty")]
    EmptyChunk { chunk: usize },
    #[error(
        "{zone} heavy-load event at index {index} maps to bucket {bucket}, outside 1..={bucket_count}"
    )]
    BucketOutOfRange {
        zone: Zone,
        index: usize,
        bucket: usize,
        bucket_count: usize,
    },
    #[error("failed to parse {kind} records: {message}")]
    Parse { kind: &'static str, message: String },
}

/// Monitored body location.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Head,
    Left,
    Right,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Head, Zone::Left, Zone::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Head => "head",
            Zone::Left => "left",
            Zone::Right => "right",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Zone::Head => "Head",
            Zone::Left => "Left arm",
            Zone::Right => "Right arm",
        }
    }

    /// Series color used by the dashboard for this zone.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            Zone::Head => (255, 99, 132),
            Zone::Left => (2, 99, 132),
            Zone::Right => (2, 200, 132),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sequence per zone.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ZoneSeries<T> {
    pub head: Vec<T>,
    pub left: Vec<T>,
    pub right: Vec<T>,
}

impl<T> ZoneSeries<T> {
    pub fn from_fn(mut f: impl FnMut(Zone) -> Vec<T>) -> Self {
        Self {
            head: f(Zone::Head),
            left: f(Zone::Left),
            right: f(Zone::Right),
        }
    }

    pub fn get(&self, zone: Zone) -> &[T] {
        match zone {
            Zone::Head => &self.head,
            Zone::Left => &self.left,
            Zone::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, zone: Zone) -> &mut Vec<T> {
        match zone {
            Zone::Head => &mut self.head,
            Zone::Left => &mut self.left,
            Zone::Right => &mut self.right,
        }
    }
}

impl<T: Clone> ZoneSeries<T> {
    pub fn filled(len: usize, value: T) -> Self {
        Self::from_fn(|_| vec![value.clone(); len])
    }
}

/// What the binner does with an event whose bucket falls outside `1..=bucket_count`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BucketPolicy {
    Reject,
    Clamp,
    Drop,
}

impl Default for BucketPolicy {
    fn default() -> Self {
        BucketPolicy::Reject
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Params {
    pub chunk_width: usize,
    pub heavy_load_threshold: f64,
    pub bucket_count: usize,
    pub bucket_width: usize,
    pub bucket_policy: BucketPolicy,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            chunk_width: DEFAULT_CHUNK_WIDTH,
            heavy_load_threshold: DEFAULT_HEAVY_LOAD_THRESHOLD,
            bucket_count: DEFAULT_BUCKET_COUNT,
            bucket_width: DEFAULT_BUCKET_WIDTH,
            bucket_policy: BucketPolicy::Reject,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), EdgeError> {
        if self.chunk_width == 0 {
            return Err(EdgeError::InvalidArgument("chunk width must be > 0".into()));
        }
        self.validate_buckets()
    }

    /// Checks only the fields the heavy-load binner reads.
    pub fn validate_buckets(&self) -> Result<(), EdgeError> {
        if self.bucket_count == 0 {
            return Err(EdgeError::InvalidArgument("bucket count must be > 0".into()));
        }
        if self.bucket_width == 0 {
            return Err(EdgeError::InvalidArgument("bucket width must be > 0".into()));
        }
        if !self.heavy_load_threshold.is_finite() {
            return Err(EdgeError::InvalidArgument(format!(
                "heavy-load threshold must be finite, got {}",
                self.heavy_load_threshold
            )));
        }
        Ok(())
    }
}

/// The three arrays of one fetched dataset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SensorBatch {
    pub inertial: Vec<InertialSample>,
    pub environment: Vec<EnvironmentSample>,
    pub index: Vec<IndexRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub chunk_count: usize,
    pub environment_chunk_count: usize,
    pub activity: ZoneSeries<f64>,
    pub heavy_load: ZoneSeries<u32>,
    pub binning: BinningDiagnostics,
    pub arm_repetitions: Option<f64>,
}

/// Run the full aggregation over one batch.
pub fn summarize(batch: &SensorBatch, params: &Params) -> Result<Summary, EdgeError> {
    params.validate()?;

    let inertial_chunks = chunk(&batch.inertial, params.chunk_width)?;
    let activity = average_magnitudes(&inertial_chunks)?;
    let environment_chunks = chunk(&batch.environment, params.chunk_width)?;
    let bins = bin_heavy_load(&batch.index, params)?;

    Ok(Summary {
        chunk_count: inertial_chunks.len(),
        environment_chunk_count: environment_chunks.len(),
        activity,
        heavy_load: bins.counts,
        binning: bins.diagnostics,
        arm_repetitions: arm_repetitions(&batch.index),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(value: f64) -> InertialSample {
        let axes = Axes6 {
            acc_x: value,
            acc_y: -value,
            acc_z: value,
            gyro_x: -value,
            gyro_y: value,
            gyro_z: -value,
        };
        InertialSample {
            timestamp: None,
            head: axes,
            left: axes,
            right: axes,
        }
    }

    fn index_record(diff: f64, arm_up_down: f64) -> IndexRecord {
        IndexRecord {
            diff_head: diff,
            diff_left: 0.0,
            diff_right: diff,
            arm_up_down,
        }
    }

    #[test]
    fn default_params_carry_dashboard_constants() {
        let params = Params::default();
        assert_eq!(params.chunk_width, 60);
        assert_eq!(params.heavy_load_threshold, 100.0);
        assert_eq!(params.bucket_count, 5);
        assert_eq!(params.bucket_width, 10);
        assert_eq!(params.bucket_policy, BucketPolicy::Reject);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn params_fill_missing_fields_from_defaults() {
        let params: Params =
            serde_json::from_str(r#"{"chunk_width": 30, "bucket_policy": "clamp"}"#).unwrap();
        assert_eq!(params.chunk_width, 30);
        assert_eq!(params.bucket_policy, BucketPolicy::Clamp);
        assert_eq!(params.bucket_count, DEFAULT_BUCKET_COUNT);
    }

    #[test]
    fn negative_chunk_width_is_rejected_at_deserialization() {
        assert!(serde_json::from_str::<Params>(r#"{"chunk_width": -1}"#).is_err());
    }

    #[test]
    fn zero_widths_are_invalid() {
        let params = Params {
            chunk_width: 0,
            ..Params::default()
        };
        assert!(matches!(
            params.validate(),
            Err(EdgeError::InvalidArgument(_))
        ));

        let params = Params {
            bucket_width: 0,
            ..Params::default()
        };
        assert!(matches!(
            params.validate_buckets(),
            Err(EdgeError::InvalidArgument(_))
        ));

        let params = Params {
            heavy_load_threshold: f64::NAN,
            ..Params::default()
        };
        assert!(params.validate_buckets().is_err());
    }

    #[test]
    fn empty_batch_summarizes_to_zeroes() {
        let summary = summarize(&SensorBatch::default(), &Params::default()).unwrap();
        assert_eq!(summary.chunk_count, 0);
        assert_eq!(summary.environment_chunk_count, 0);
        assert!(summary.activity.head.is_empty());
        assert_eq!(summary.heavy_load, ZoneSeries::filled(5, 0));
        assert_eq!(summary.arm_repetitions, None);
    }

    #[test]
    fn summarize_combines_both_charts() {
        let batch = SensorBatch {
            inertial: (0..130).map(|_| sample(1.0)).collect(),
            environment: (0..61)
                .map(|i| EnvironmentSample(serde_json::json!({ "temp": i })))
                .collect(),
            index: (0..50)
                .map(|i| index_record(if i == 12 { 150.0 } else { 0.0 }, i as f64))
                .collect(),
        };

        let summary = summarize(&batch, &Params::default()).unwrap();
        assert_eq!(summary.chunk_count, 3);
        assert_eq!(summary.environment_chunk_count, 2);
        assert_eq!(summary.activity.head, vec![6.0, 6.0, 6.0]);
        assert_eq!(summary.heavy_load.head, vec![1, 0, 0, 0, 0]);
        assert_eq!(summary.heavy_load.left, vec![0, 0, 0, 0, 0]);
        assert_eq!(summary.heavy_load.right, vec![1, 0, 0, 0, 0]);
        assert_eq!(summary.arm_repetitions, Some(49.0));
    }

    #[test]
    fn summarize_is_repeatable() {
        let batch = SensorBatch {
            inertial: (0..75).map(|i| sample(i as f64 * 0.37)).collect(),
            index: (0..40)
                .map(|i| index_record(if i % 7 == 0 { 120.0 } else { 10.0 }, 0.0))
                .collect(),
            ..SensorBatch::default()
        };
        let params = Params {
            bucket_policy: BucketPolicy::Clamp,
            ..Params::default()
        };

        let first = summarize(&batch, &params).unwrap();
        let second = summarize(&batch, &params).unwrap();
        assert_eq!(first, second);
        for (a, b) in first.activity.head.iter().zip(second.activity.head.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn summarize_surfaces_binning_errors() {
        let batch = SensorBatch {
            index: vec![index_record(500.0, 0.0)],
            ..SensorBatch::default()
        };
        let err = summarize(&batch, &Params::default()).unwrap_err();
        assert!(matches!(
            err,
            EdgeError::BucketOutOfRange {
                zone: Zone::Head,
                index: 0,
                bucket: 0,
                bucket_count: 5
            }
        ));
    }

    #[test]
    fn zone_display_matches_wire_names() {
        for zone in Zone::ALL {
            let json = serde_json::to_string(&zone).unwrap();
            assert_eq!(json, format!("\"{}\"", zone));
        }
    }
}
