use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::{EdgeError, Zone};

/// Six channels of one inertial reading.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Axes6 {
    pub acc_x: f64,
    pub acc_y: f64,
    pub acc_z: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
}

impl Axes6 {
    /// Sum of absolute values over all six axes.
    pub fn magnitude(&self) -> f64 {
        self.acc_x.abs()
            + self.acc_y.abs()
            + self.acc_z.abs()
            + self.gyro_x.abs()
            + self.gyro_y.abs()
            + self.gyro_z.abs()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InertialSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub head: Axes6,
    pub left: Axes6,
    pub right: Axes6,
}

impl InertialSample {
    pub fn zone(&self, zone: Zone) -> &Axes6 {
        match zone {
            Zone::Head => &self.head,
            Zone::Left => &self.left,
            Zone::Right => &self.right,
        }
    }
}

/// Environment reading, kept as received.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct EnvironmentSample(pub JsonValue);

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub diff_head: f64,
    pub diff_left: f64,
    pub diff_right: f64,
    /// Cumulative arm raise count.
    pub arm_up_down: f64,
}

impl IndexRecord {
    pub fn diff(&self, zone: Zone) -> f64 {
        match zone {
            Zone::Head => self.diff_head,
            Zone::Left => self.diff_left,
            Zone::Right => self.diff_right,
        }
    }
}

fn parse_array<T: DeserializeOwned>(input: &[u8], kind: &'static str) -> Result<Vec<T>, EdgeError> {
    serde_json::from_slice(input).map_err(|e| EdgeError::Parse {
        kind,
        message: e.to_string(),
    })
}

/// Parse a JSON array of inertial samples.
pub fn parse_inertial(input: &[u8]) -> Result<Vec<InertialSample>, EdgeError> {
    parse_array(input, "inertial")
}

pub fn parse_environment(input: &[u8]) -> Result<Vec<EnvironmentSample>, EdgeError> {
    parse_array(input, "environment")
}

/// Parse a JSON array of index records.
///
/// A decreasing `armUpDown` counter is logged but not rejected.
pub fn parse_index_records(input: &[u8]) -> Result<Vec<IndexRecord>, EdgeError> {
    let records: Vec<IndexRecord> = parse_array(input, "index")?;
    let regressions = counter_regressions(&records);
    if regressions > 0 {
        warn!(
            "armUpDown counter decreased {} time(s) across {} index records",
            regressions,
            records.len()
        );
    }
    Ok(records)
}

/// Number of positions where `armUpDown` is lower than in the previous record.
pub fn counter_regressions(records: &[IndexRecord]) -> usize {
    records
        .windows(2)
        .filter(|w| w[1].arm_up_down < w[0].arm_up_down)
        .count()
}

/// Final arm repetition count of the batch.
pub fn arm_repetitions(records: &[IndexRecord]) -> Option<f64> {
    records.last().map(|r| r.arm_up_down)
}
