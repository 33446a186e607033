//! Zonal mean reduction.
//!
//! Averages a band over an ROI polygon at a stated evaluation scale: a grid
//! of `scale_m` cells is laid over the ROI's bounding box and the band is
//! sampled at every cell centre falling inside the polygon. NaN samples are
//! skipped; the mean is taken over valid samples only. When less than half
//! of the in-polygon cells carry valid data a warning is emitted, since a
//! mean over sparse coverage is statistically suspect but still defined.

use tracing::warn;

use crate::error::DownscaleResult;
use crate::raster::{RasterField, Resampling};
use crate::roi::Roi;

/// Result of one zonal reduction.
#[derive(Debug, Clone, Copy)]
pub struct ZonalMean {
    pub mean: f64,
    /// Cells inside the polygon with a valid (non-NaN) sample.
    pub valid_cells: usize,
    /// Cells inside the polygon, valid or not.
    pub covered_cells: usize,
}

/// Area-weighted mean of `band` over `roi` at evaluation scale `scale_m`.
///
/// Returns `Ok(None)` when no cell centre inside the polygon yields a valid
/// value, leaving the caller to decide whether an undefined mean is fatal.
pub fn zonal_mean(
    field: &RasterField,
    band: &str,
    roi: &Roi,
    scale_m: f64,
) -> DownscaleResult<Option<ZonalMean>> {
    let band_idx = field
        .band_index(band)
        .ok_or_else(|| crate::error::DownscaleError::UnknownBand(band.to_string()))?;

    let extent = roi.extent();
    let (cols, rows) = extent.grid_shape(scale_m);

    let mut sum = 0.0f64;
    let mut valid = 0usize;
    let mut covered = 0usize;
    for r in 0..rows {
        for c in 0..cols {
            let lon = extent.min_lon
                + (c as f64 + 0.5) / cols as f64 * (extent.max_lon - extent.min_lon);
            let lat = extent.min_lat
                + (r as f64 + 0.5) / rows as f64 * (extent.max_lat - extent.min_lat);
            if !roi.contains(lon, lat) {
                continue;
            }
            covered += 1;
            if let Some(v) = field.sample(band_idx, lon, lat, Resampling::Bilinear) {
                if v.is_finite() {
                    sum += v as f64;
                    valid += 1;
                }
            }
        }
    }

    if valid == 0 {
        return Ok(None);
    }
    if valid * 2 < covered {
        warn!(
            band,
            valid,
            covered,
            "zonal mean computed over less than half of the region"
        );
    }
    Ok(Some(ZonalMean { mean: sum / valid as f64, valid_cells: valid, covered_cells: covered }))
}
