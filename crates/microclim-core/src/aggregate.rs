//! Temporal aggregation: hourly archive fields to one daily coarse raster.
//!
//! The aggregation window is the half-open 24 h interval `[date, date+1d)`.
//! Accumulated variables (fluxes, precipitation) combine by summation,
//! instantaneous variables by arithmetic mean; both reductions are per pixel
//! and skip NaN hours, so a pixel masked for part of the day still yields a
//! value from the hours that saw it. Kelvin temperatures are shifted to
//! Celsius after the reduction.

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};

use crate::error::{DownscaleError, DownscaleResult};
use crate::raster::RasterField;
use crate::roi::Roi;
use crate::sources::HourlySource;
use crate::variables::{Variable, KELVIN_OFFSET};

/// Grid scale used to carry an all-null field when the archive returns no
/// observations for the window (near-native coarse resolution).
const NULL_FIELD_SCALE_M: f64 = 9000.0;

/// Aggregate one variable's hourly fields into a daily coarse raster.
///
/// The output band is named `<variable>_accum` or `<variable>_daily`
/// depending on the combination rule; this name is internal and is replaced
/// by `<variable>_corrected` at the end of the per-variable pipeline.
pub fn aggregate_daily(
    source: &dyn HourlySource,
    roi: &Roi,
    date: NaiveDate,
    variable: Variable,
) -> DownscaleResult<RasterField> {
    let start = date.and_time(NaiveTime::MIN);
    let end = date
        .succ_opt()
        .ok_or_else(|| DownscaleError::Source(format!("no day after {date}")))?
        .and_time(NaiveTime::MIN);

    let stack = source.fetch_hourly(variable.band(), start, end, roi.extent())?;
    let out_band = variable.aggregated_band();

    if stack.is_empty() {
        // Missing data is not a hard failure here; it propagates as nulls
        // and surfaces downstream when a reduction becomes undefined.
        warn!(variable = %variable, %date, "empty hourly window, emitting null field");
        return Ok(RasterField::filled(
            *roi.extent(),
            NULL_FIELD_SCALE_M,
            &out_band,
            f32::NAN,
        ));
    }

    let first = &stack[0];
    let n_cells = first.width * first.height;
    for field in &stack[1..] {
        if field.width != first.width || field.height != first.height {
            return Err(DownscaleError::GridMismatch(format!(
                "hourly stack for '{}' mixes {}x{} and {}x{} grids",
                variable,
                first.width,
                first.height,
                field.width,
                field.height
            )));
        }
    }

    let mut sums = vec![0.0f64; n_cells];
    let mut counts = vec![0u32; n_cells];
    for field in &stack {
        let data = field.band(field.band_names()[0])?;
        for (i, &v) in data.iter().enumerate() {
            if v.is_finite() {
                sums[i] += v as f64;
                counts[i] += 1;
            }
        }
    }

    let offset = if variable.is_kelvin() { KELVIN_OFFSET } else { 0.0 };
    let data: Vec<f32> = sums
        .iter()
        .zip(&counts)
        .map(|(&sum, &count)| {
            if count == 0 {
                f32::NAN
            } else if variable.is_accumulated() {
                sum as f32 - offset
            } else {
                (sum / count as f64) as f32 - offset
            }
        })
        .collect();

    debug!(
        variable = %variable,
        %date,
        hours = stack.len(),
        "aggregated daily field"
    );
    RasterField::from_data(first.width, first.height, first.extent, first.scale_m, &out_band, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Extent;
    use approx::assert_relative_eq;
    use chrono::NaiveDateTime;

    /// Hourly source that replays a fixed stack of constant fields.
    struct FixedHours {
        values: Vec<f32>,
    }

    impl HourlySource for FixedHours {
        fn fetch_hourly(
            &self,
            band: &str,
            _start: NaiveDateTime,
            _end: NaiveDateTime,
            extent: &Extent,
        ) -> DownscaleResult<Vec<RasterField>> {
            self.values
                .iter()
                .map(|&v| Ok(RasterField::filled(*extent, 9000.0, band, v)))
                .collect()
        }
    }

    fn roi() -> Roi {
        Roi::rectangle(Extent::new(10.0, 45.0, 11.0, 46.0))
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 7, 14).unwrap()
    }

    #[test]
    fn accumulated_variable_sums_hours() {
        let source = FixedHours { values: vec![1.5; 24] };
        let field = aggregate_daily(&source, &roi(), day(), Variable::Tp).unwrap();
        let data = field.band("tp_accum").unwrap();
        assert_relative_eq!(data[0], 36.0, epsilon = 1e-5);
    }

    #[test]
    fn instantaneous_variable_averages_hours() {
        let source = FixedHours { values: vec![10.0, 20.0, 30.0] };
        let field = aggregate_daily(&source, &roi(), day(), Variable::Sp).unwrap();
        let data = field.band("sp_daily").unwrap();
        assert_relative_eq!(data[0], 20.0, epsilon = 1e-5);
    }

    #[test]
    fn kelvin_temperature_lands_in_celsius() {
        let source = FixedHours { values: vec![293.15; 24] };
        let field = aggregate_daily(&source, &roi(), day(), Variable::T2m).unwrap();
        let data = field.band("t2m_daily").unwrap();
        assert_relative_eq!(data[0], 20.0, epsilon = 1e-3);
    }

    #[test]
    fn nan_hours_are_skipped_per_pixel() {
        let source = FixedHours { values: vec![10.0, f32::NAN, 30.0] };
        let field = aggregate_daily(&source, &roi(), day(), Variable::U10).unwrap();
        let data = field.band("u10_daily").unwrap();
        assert_relative_eq!(data[0], 20.0, epsilon = 1e-5);
    }

    #[test]
    fn empty_window_propagates_nulls_not_failure() {
        let source = FixedHours { values: vec![] };
        let field = aggregate_daily(&source, &roi(), day(), Variable::Ssr).unwrap();
        let data = field.band("ssr_accum").unwrap();
        assert!(data.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn unknown_band_aborts_the_variable() {
        struct NoSuchBand;
        impl HourlySource for NoSuchBand {
            fn fetch_hourly(
                &self,
                band: &str,
                _start: NaiveDateTime,
                _end: NaiveDateTime,
                _extent: &Extent,
            ) -> DownscaleResult<Vec<RasterField>> {
                Err(DownscaleError::UnknownVariable(band.to_string()))
            }
        }
        let err = aggregate_daily(&NoSuchBand, &roi(), day(), Variable::T2m).unwrap_err();
        assert!(matches!(err, DownscaleError::UnknownVariable(_)));
    }
}
