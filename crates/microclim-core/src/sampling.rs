//! Adaptive spatial sampling of a combined raster.
//!
//! The sample count scales with ROI area so small regions are not
//! over-sampled and large ones not starved, clamped to keep training cost
//! and statistical coverage inside a sane envelope. Drawing is seeded, so a
//! re-run (or a parallel run across variables) reproduces the same points.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::{DownscaleError, DownscaleResult};
use crate::raster::{RasterField, Resampling};
use crate::roi::Roi;

/// Samples per km² of ROI area.
const SAMPLES_PER_KM2: f64 = 0.5;
/// Lower and upper bounds on the training-set size.
const MIN_SAMPLES: usize = 1000;
const MAX_SAMPLES: usize = 8000;
/// Draw attempts per requested sample before giving up on a sparse region.
const ATTEMPTS_PER_SAMPLE: usize = 20;

/// Training-set size for an ROI of the given area.
pub fn sample_count(area_km2: f64) -> usize {
    let raw = (area_km2 * SAMPLES_PER_KM2).round();
    (raw as usize).clamp(MIN_SAMPLES, MAX_SAMPLES)
}

/// Point observations drawn from a combined raster: one value per band per
/// sampled location, rows with any null band already dropped.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    band_names: Vec<String>,
    rows: Vec<Vec<f32>>,
}

impl TrainingSet {
    /// Assemble a set from pre-drawn rows. Every row must carry one value
    /// per band.
    pub fn new(band_names: Vec<String>, rows: Vec<Vec<f32>>) -> DownscaleResult<Self> {
        if let Some(bad) = rows.iter().find(|r| r.len() != band_names.len()) {
            return Err(DownscaleError::GridMismatch(format!(
                "training row has {} values for {} bands",
                bad.len(),
                band_names.len()
            )));
        }
        Ok(Self { band_names, rows })
    }

    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// All values of one named column.
    pub fn column(&self, band: &str) -> DownscaleResult<Vec<f32>> {
        let idx = self
            .band_names
            .iter()
            .position(|b| b == band)
            .ok_or_else(|| DownscaleError::UnknownBand(band.to_string()))?;
        Ok(self.rows.iter().map(|row| row[idx]).collect())
    }
}

/// Draw up to `count` samples of `field` inside `roi` at resolution
/// `scale_m`, using the fixed `seed` for reproducibility.
///
/// Candidate locations are centres of a `scale_m` grid over the ROI's
/// bounding box; rows containing any NaN band are discarded. The draw stops
/// once `count` rows are collected or the attempt budget is spent, so a
/// heavily masked field yields a short (possibly empty) set rather than
/// looping forever.
pub fn draw_samples(
    field: &RasterField,
    roi: &Roi,
    count: usize,
    scale_m: f64,
    seed: u64,
) -> DownscaleResult<TrainingSet> {
    let extent = roi.extent();
    let (cols, rows_n) = extent.grid_shape(scale_m);
    if cols == 0 || rows_n == 0 {
        return Err(DownscaleError::MissingData(
            "sampling grid over the ROI is empty".to_string(),
        ));
    }

    let band_names: Vec<String> = field.band_names().iter().map(|s| s.to_string()).collect();
    let n_bands = band_names.len();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows: Vec<Vec<f32>> = Vec::with_capacity(count);
    let mut attempts = 0usize;
    let budget = count.saturating_mul(ATTEMPTS_PER_SAMPLE);

    while rows.len() < count && attempts < budget {
        attempts += 1;
        let c = rng.gen_range(0..cols);
        let r = rng.gen_range(0..rows_n);
        let lon = extent.min_lon
            + (c as f64 + 0.5) / cols as f64 * (extent.max_lon - extent.min_lon);
        let lat = extent.min_lat
            + (r as f64 + 0.5) / rows_n as f64 * (extent.max_lat - extent.min_lat);
        if !roi.contains(lon, lat) {
            continue;
        }

        let mut row = Vec::with_capacity(n_bands);
        for b in 0..n_bands {
            match field.sample(b, lon, lat, Resampling::Bilinear) {
                Some(v) if v.is_finite() => row.push(v),
                _ => break,
            }
        }
        if row.len() == n_bands {
            rows.push(row);
        }
    }

    if rows.len() < count {
        warn!(
            drawn = rows.len(),
            requested = count,
            attempts,
            "sampling fell short of the requested count"
        );
    } else {
        debug!(drawn = rows.len(), attempts, "drew training samples");
    }
    Ok(TrainingSet { band_names, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Extent;

    fn roi() -> Roi {
        Roi::rectangle(Extent::new(0.0, 0.0, 0.5, 0.5))
    }

    #[test]
    fn count_is_clamped_below() {
        assert_eq!(sample_count(0.0), 1000);
        assert_eq!(sample_count(100.0), 1000);
    }

    #[test]
    fn count_is_clamped_above() {
        assert_eq!(sample_count(20_000.0), 8000);
        assert_eq!(sample_count(1e7), 8000);
    }

    #[test]
    fn count_is_half_the_area_between_the_bounds() {
        assert_eq!(sample_count(3000.0), 1500);
        assert_eq!(sample_count(5000.0), 2500);
    }

    #[test]
    fn count_is_monotonic_in_area() {
        let areas = [0.0, 500.0, 2000.0, 3000.0, 8000.0, 20_000.0, 50_000.0];
        let counts: Vec<_> = areas.iter().map(|&a| sample_count(a)).collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn draw_is_deterministic_for_a_seed() {
        let field = RasterField::from_fn(*roi().extent(), 2000.0, "x", |lon, lat| {
            (lon * 10.0 + lat) as f32
        });
        let a = draw_samples(&field, &roi(), 50, 500.0, 42).unwrap();
        let b = draw_samples(&field, &roi(), 50, 500.0, 42).unwrap();
        assert_eq!(a.rows(), b.rows());

        let c = draw_samples(&field, &roi(), 50, 500.0, 43).unwrap();
        assert_ne!(a.rows(), c.rows());
    }

    #[test]
    fn rows_with_any_null_band_are_dropped() {
        let base = RasterField::from_fn(*roi().extent(), 2000.0, "x", |lon, _| {
            if lon < 0.25 { 1.0 } else { f32::NAN }
        });
        let n = base.width * base.height;
        let field = base.with_band("y", vec![2.0; n]).unwrap();
        let set = draw_samples(&field, &roi(), 100, 500.0, 42).unwrap();
        assert!(!set.is_empty());
        for row in set.rows() {
            assert!(row.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn fully_null_field_yields_an_empty_set() {
        let field = RasterField::filled(*roi().extent(), 2000.0, "x", f32::NAN);
        let set = draw_samples(&field, &roi(), 100, 500.0, 42).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn column_extraction_matches_band_order() {
        let base = RasterField::filled(*roi().extent(), 2000.0, "a", 1.0);
        let n = base.width * base.height;
        let field = base.with_band("b", vec![2.0; n]).unwrap();
        let set = draw_samples(&field, &roi(), 20, 500.0, 7).unwrap();
        assert!(set.column("a").unwrap().iter().all(|&v| v == 1.0));
        assert!(set.column("b").unwrap().iter().all(|&v| v == 2.0));
        assert!(set.column("zzz").is_err());
    }
}
