//! Monthly vegetation-index composite selection.
//!
//! The vegetation product for the current calendar month may still be
//! incomplete, so a request whose `(year, month)` matches the wall clock is
//! shifted back one month. The month's scenes are reduced per pixel by the
//! median, which is robust to cloud-contaminated single-date values in a way
//! a mean is not, then scaled from raw integer units to the physical range.

use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

use crate::error::{DownscaleError, DownscaleResult};
use crate::raster::RasterField;
use crate::roi::Roi;
use crate::sources::VegetationIndexSource;

/// Output band name of the composite.
pub const NDVI_BAND: &str = "NDVI";

/// Raw-to-physical scale factor of the vegetation-index product.
pub const NDVI_SCALE: f32 = 0.0001;

/// Grid scale used to carry an all-null composite when the month is empty.
const NULL_FIELD_SCALE_M: f64 = 500.0;

/// The `(year, month)` whose composite should represent `date`.
///
/// A date in the wall-clock month resolves to the prior month; anything else
/// resolves to its own month.
pub fn resolve_composite_month(date: NaiveDate, today: NaiveDate) -> (i32, u32) {
    if (date.year(), date.month()) == (today.year(), today.month()) {
        if date.month() == 1 {
            (date.year() - 1, 12)
        } else {
            (date.year(), date.month() - 1)
        }
    } else {
        (date.year(), date.month())
    }
}

/// Build the monthly NDVI composite for `date`.
///
/// An empty month is not an error: the composite comes back all-NaN and the
/// gap surfaces later when training or a reduction runs out of valid data.
pub fn monthly_ndvi(
    source: &dyn VegetationIndexSource,
    roi: &Roi,
    date: NaiveDate,
    today: NaiveDate,
) -> DownscaleResult<RasterField> {
    let (year, month) = resolve_composite_month(date, today);
    let scenes = source.fetch_monthly(year, month, roi.extent())?;

    if scenes.is_empty() {
        warn!(year, month, "no vegetation scenes for month, emitting null composite");
        return Ok(RasterField::filled(
            *roi.extent(),
            NULL_FIELD_SCALE_M,
            NDVI_BAND,
            f32::NAN,
        ));
    }

    let first = &scenes[0];
    let n_cells = first.width * first.height;
    for scene in &scenes[1..] {
        if scene.width != first.width || scene.height != first.height {
            return Err(DownscaleError::GridMismatch(format!(
                "vegetation scenes for {year}-{month:02} mix {}x{} and {}x{} grids",
                first.width, first.height, scene.width, scene.height
            )));
        }
    }

    let mut columns: Vec<Vec<f32>> = vec![Vec::with_capacity(scenes.len()); n_cells];
    for scene in &scenes {
        let data = scene.band(scene.band_names()[0])?;
        for (i, &v) in data.iter().enumerate() {
            if v.is_finite() {
                columns[i].push(v);
            }
        }
    }

    let data: Vec<f32> = columns
        .into_iter()
        .map(|mut vals| median(&mut vals).map_or(f32::NAN, |m| m * NDVI_SCALE))
        .collect();

    debug!(year, month, scenes = scenes.len(), "built monthly NDVI composite");
    RasterField::from_data(first.width, first.height, first.extent, first.scale_m, NDVI_BAND, data)
}

/// Median of a non-empty slice; even counts average the two middle values.
fn median(vals: &mut [f32]) -> Option<f32> {
    if vals.is_empty() {
        return None;
    }
    vals.sort_by(f32::total_cmp);
    let mid = vals.len() / 2;
    if vals.len() % 2 == 1 {
        Some(vals[mid])
    } else {
        Some((vals[mid - 1] + vals[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Extent;
    use approx::assert_relative_eq;

    struct FixedScenes {
        raw_values: Vec<f32>,
    }

    impl VegetationIndexSource for FixedScenes {
        fn fetch_monthly(
            &self,
            _year: i32,
            _month: u32,
            extent: &Extent,
        ) -> DownscaleResult<Vec<RasterField>> {
            self.raw_values
                .iter()
                .map(|&v| Ok(RasterField::filled(*extent, 500.0, "raw", v)))
                .collect()
        }
    }

    fn roi() -> Roi {
        Roi::rectangle(Extent::new(10.0, 45.0, 10.1, 45.1))
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn current_month_resolves_to_prior_month() {
        assert_eq!(resolve_composite_month(ymd(2023, 7, 14), ymd(2023, 7, 20)), (2023, 6));
    }

    #[test]
    fn january_in_current_month_wraps_to_december() {
        assert_eq!(resolve_composite_month(ymd(2024, 1, 5), ymd(2024, 1, 30)), (2023, 12));
    }

    #[test]
    fn past_month_resolves_to_itself() {
        assert_eq!(resolve_composite_month(ymd(2023, 3, 14), ymd(2023, 7, 20)), (2023, 3));
    }

    #[test]
    fn median_is_robust_to_a_cloud_spike() {
        // Six clean scenes around 6000 raw and one contaminated at -2000:
        // the median ignores the spike where a mean would not.
        let source = FixedScenes {
            raw_values: vec![5900.0, 6000.0, 6100.0, 6000.0, 5950.0, 6050.0, -2000.0],
        };
        let field = monthly_ndvi(&source, &roi(), ymd(2023, 3, 14), ymd(2023, 7, 20)).unwrap();
        let data = field.band(NDVI_BAND).unwrap();
        assert_relative_eq!(data[0], 0.6, epsilon = 1e-4);
    }

    #[test]
    fn empty_month_yields_null_composite() {
        let source = FixedScenes { raw_values: vec![] };
        let field = monthly_ndvi(&source, &roi(), ymd(2023, 3, 14), ymd(2023, 7, 20)).unwrap();
        assert!(field.band(NDVI_BAND).unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn even_scene_count_averages_the_middle_pair() {
        let mut vals = vec![4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(median(&mut vals).unwrap(), 2.5);
    }
}
