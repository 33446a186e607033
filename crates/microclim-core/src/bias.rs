//! Global bias correction of the downscaled prediction.
//!
//! The regression reproduces fine-scale spatial structure but can drift
//! globally relative to the physically measured coarse field. A single
//! additive scalar anchors the areal mean of the prediction to the coarse
//! mean without touching the learned pattern: `bias = mean(coarse over ROI
//! at coarse scale) - mean(prediction over ROI at fine scale)`, added
//! uniformly. Deliberately global, never per-pixel or windowed.

use tracing::debug;

use crate::error::{DownscaleError, DownscaleResult};
use crate::forest::PREDICTION_BAND;
use crate::raster::RasterField;
use crate::roi::Roi;
use crate::variables::Variable;
use crate::zonal::zonal_mean;

/// Shift `high` so its fine-scale zonal mean matches `low`'s coarse-scale
/// zonal mean, and rename the band to `<variable>_corrected`.
///
/// An all-null reduction on either side leaves the bias undefined; that is
/// a hard error, never a silent zero.
pub fn correct_bias(
    low: &RasterField,
    high: &RasterField,
    roi: &Roi,
    variable: Variable,
    coarse_scale_m: f64,
    fine_scale_m: f64,
) -> DownscaleResult<RasterField> {
    let low_band = variable.aggregated_band();
    let mean_low = zonal_mean(low, &low_band, roi, coarse_scale_m)?
        .ok_or_else(|| {
            DownscaleError::BiasUndefined(format!(
                "coarse mean of '{low_band}' has no valid pixels"
            ))
        })?
        .mean;
    let mean_high = zonal_mean(high, PREDICTION_BAND, roi, fine_scale_m)?
        .ok_or_else(|| {
            DownscaleError::BiasUndefined(format!(
                "fine mean of '{PREDICTION_BAND}' has no valid pixels"
            ))
        })?
        .mean;

    let bias = mean_low - mean_high;
    debug!(variable = %variable, mean_low, mean_high, bias, "applying bias correction");

    let data: Vec<f32> = high
        .band(PREDICTION_BAND)?
        .iter()
        .map(|&v| v + bias as f32)
        .collect();
    RasterField::from_data(
        high.width,
        high.height,
        high.extent,
        high.scale_m,
        &variable.corrected_band(),
        data,
    )
}
