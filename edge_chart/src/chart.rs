use serde::{Deserialize, Serialize};

use crate::{
    average_magnitudes, bin_heavy_load, chunk, BinningDiagnostics, EdgeError, IndexRecord,
    InertialSample, Params, Zone, ZoneSeries,
};

pub const ACTIVITY_TITLE: &str = "Mean acc/gyro magnitude per chunk";
pub const HEAVY_LOAD_TITLE: &str = "Heavy-load movements per minute";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChartDataset {
    pub zone: Zone,
    pub label: String,
    pub data: Vec<f64>,
    pub border_color: String,
    pub background_color: String,
}

/// Line chart input: shared x labels and one dataset per zone.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChartBundle {
    pub title: String,
    pub labels: Vec<usize>,
    pub datasets: Vec<ChartDataset>,
}

impl ChartBundle {
    fn build(
        title: &str,
        params: &Params,
        mut label_for: impl FnMut(Zone) -> String,
        mut data_for: impl FnMut(Zone) -> Vec<f64>,
    ) -> Self {
        let labels = (1..=params.bucket_count).collect();
        let datasets = Zone::ALL
            .iter()
            .map(|&zone| {
                let (r, g, b) = zone.rgb();
                ChartDataset {
                    zone,
                    label: label_for(zone),
                    data: data_for(zone),
                    border_color: format!("rgb({}, {}, {})", r, g, b),
                    background_color: format!("rgba({}, {}, {}, 0.5)", r, g, b),
                }
            })
            .collect();
        Self {
            title: title.to_string(),
            labels,
            datasets,
        }
    }

    pub fn activity(series: &ZoneSeries<f64>, params: &Params) -> Self {
        Self::build(
            ACTIVITY_TITLE,
            params,
            |zone| format!("{} mean |acc| + |gyro|", zone.title()),
            |zone| series.get(zone).to_vec(),
        )
    }

    pub fn heavy_load(series: &ZoneSeries<u32>, params: &Params) -> Self {
        Self::build(
            HEAVY_LOAD_TITLE,
            params,
            |zone| format!("{} heavy loads per minute", zone.title()),
            |zone| series.get(zone).iter().map(|&c| c as f64).collect(),
        )
    }

    pub fn dataset(&self, zone: Zone) -> Option<&ChartDataset> {
        self.datasets.iter().find(|d| d.zone == zone)
    }
}

/// Heavy-load chart together with the out-of-range events the policy absorbed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HeavyLoadChart {
    pub chart: ChartBundle,
    pub diagnostics: BinningDiagnostics,
}

/// Chunk the inertial samples and build the activity chart.
///
/// Only the chunk width is checked, so bad bucket settings do not block this chart.
pub fn activity_chart(samples: &[InertialSample], params: &Params) -> Result<ChartBundle, EdgeError> {
    let chunks = chunk(samples, params.chunk_width)?;
    let averages = average_magnitudes(&chunks)?;
    Ok(ChartBundle::activity(&averages, params))
}

/// Bin the index records and build the heavy-load chart.
pub fn heavy_load_chart(
    records: &[IndexRecord],
    params: &Params,
) -> Result<HeavyLoadChart, EdgeError> {
    let bins = bin_heavy_load(records, params)?;
    Ok(HeavyLoadChart {
        chart: ChartBundle::heavy_load(&bins.counts, params),
        diagnostics: bins.diagnostics,
    })
}
