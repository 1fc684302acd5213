use crate::{EdgeError, InertialSample, Zone, ZoneSeries};

/// Mean per-sample movement magnitude of every chunk, per zone.
///
/// The output holds one value per chunk in chunk order. A zero-length chunk is
/// rejected with [`EdgeError::EmptyChunk`].
pub fn average_magnitudes(chunks: &[&[InertialSample]]) -> Result<ZoneSeries<f64>, EdgeError> {
    let mut out = ZoneSeries::from_fn(|_| Vec::with_capacity(chunks.len()));
    for (idx, samples) in chunks.iter().enumerate() {
        if samples.is_empty() {
            return Err(EdgeError::EmptyChunk { chunk: idx });
        }
        let len = samples.len() as f64;
        for zone in Zone::ALL {
            let total: f64 = samples.iter().map(|s| s.zone(zone).magnitude()).sum();
            out.get_mut(zone).push(total / len);
        }
    }
    Ok(out)
}
