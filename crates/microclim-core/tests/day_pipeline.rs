//! End-to-end day-pipeline scenarios over in-memory catalogs.

use chrono::{NaiveDate, NaiveDateTime};
use microclim_core::error::{DownscaleError, DownscaleResult};
use microclim_core::forest::ForestConfig;
use microclim_core::pipeline::{DayPipeline, PipelineConfig};
use microclim_core::raster::{Extent, RasterField};
use microclim_core::roi::Roi;
use microclim_core::sources::HourlySource;
use microclim_core::synthetic::SyntheticCatalog;
use microclim_core::variables::Variable;
use microclim_core::zonal::zonal_mean;

fn roi() -> Roi {
    Roi::rectangle(Extent::new(10.0, 46.0, 10.3, 46.3))
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 7, 14).unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig {
        // Smaller ensemble keeps the scenario fast; the anchoring property
        // under test is independent of ensemble size.
        forest: ForestConfig { n_trees: 15, ..ForestConfig::default() },
        today: NaiveDate::from_ymd_opt(2023, 11, 2).unwrap(),
        ..PipelineConfig::default()
    }
}

/// Hourly source returning the same constant field for every band and hour.
struct ConstantHours {
    value: f32,
}

impl HourlySource for ConstantHours {
    fn fetch_hourly(
        &self,
        band: &str,
        _start: NaiveDateTime,
        _end: NaiveDateTime,
        extent: &Extent,
    ) -> DownscaleResult<Vec<RasterField>> {
        Ok((0..24)
            .map(|_| RasterField::filled(*extent, 9000.0, band, self.value))
            .collect())
    }
}

/// Hourly source with an empty archive window for one band.
struct MissingBandHours {
    inner: ConstantHours,
    missing: &'static str,
}

impl HourlySource for MissingBandHours {
    fn fetch_hourly(
        &self,
        band: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        extent: &Extent,
    ) -> DownscaleResult<Vec<RasterField>> {
        if band == self.missing {
            return Ok(vec![]);
        }
        self.inner.fetch_hourly(band, start, end, extent)
    }
}

#[test]
fn constant_coarse_field_round_trips_through_the_pipeline() {
    // 293.15 K everywhere: t2m aggregates to a constant 20.0 degC. Whatever
    // spatial pattern the covariates induce, bias correction must anchor the
    // fine-scale mean back onto the coarse mean.
    let hourly = ConstantHours { value: 293.15 };
    let catalog = SyntheticCatalog::new(42);
    let pipeline =
        DayPipeline::new(&hourly, &catalog, &catalog, &catalog, roi(), config());

    let daily = pipeline.process_day(day()).unwrap();
    assert_eq!(daily.day_processed, day());

    let zm = zonal_mean(&daily.field, "t2m_corrected", pipeline.roi(), 500.0)
        .unwrap()
        .unwrap();
    assert!(
        (zm.mean - 20.0).abs() < 0.01,
        "corrected t2m mean {} not anchored to 20.0",
        zm.mean
    );
}

#[test]
fn output_bands_follow_declared_variable_order() {
    let hourly = ConstantHours { value: 100.0 };
    let catalog = SyntheticCatalog::new(42);
    let pipeline =
        DayPipeline::new(&hourly, &catalog, &catalog, &catalog, roi(), config());

    let daily = pipeline.process_day(day()).unwrap();
    let expected: Vec<String> = Variable::ALL.iter().map(|v| v.corrected_band()).collect();
    assert_eq!(daily.field.band_names(), expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[test]
fn synthetic_day_preserves_each_coarse_mean() {
    // Full synthetic run: for every variable the corrected fine-scale mean
    // must match the aggregated coarse mean within tolerance.
    let catalog = SyntheticCatalog::new(42);
    let pipeline =
        DayPipeline::new(&catalog, &catalog, &catalog, &catalog, roi(), config());

    let daily = pipeline.process_day(day()).unwrap();
    for variable in Variable::ALL {
        let low =
            microclim_core::aggregate::aggregate_daily(&catalog, pipeline.roi(), day(), variable)
                .unwrap();
        let mean_low = zonal_mean(&low, &variable.aggregated_band(), pipeline.roi(), 9000.0)
            .unwrap()
            .unwrap()
            .mean;
        let mean_corrected =
            zonal_mean(&daily.field, &variable.corrected_band(), pipeline.roi(), 500.0)
                .unwrap()
                .unwrap()
                .mean;
        let tolerance = 0.01 * mean_low.abs().max(1.0);
        assert!(
            (mean_low - mean_corrected).abs() < tolerance,
            "{variable}: coarse mean {mean_low} vs corrected mean {mean_corrected}"
        );
    }
}

#[test]
fn all_null_ndvi_fails_loudly_rather_than_silently() {
    // An empty vegetation month propagates a null NDVI band through the
    // covariate stack; every training row then carries a NaN and is dropped,
    // so the day must fail with a data error, never a silently wrong number.
    struct NoScenes;
    impl microclim_core::sources::VegetationIndexSource for NoScenes {
        fn fetch_monthly(
            &self,
            _year: i32,
            _month: u32,
            _extent: &Extent,
        ) -> DownscaleResult<Vec<RasterField>> {
            Ok(vec![])
        }
    }

    let hourly = ConstantHours { value: 293.15 };
    let catalog = SyntheticCatalog::new(42);
    let pipeline =
        DayPipeline::new(&hourly, &NoScenes, &catalog, &catalog, roi(), config());

    let err = pipeline.process_day(day()).unwrap_err();
    match err {
        DownscaleError::Variable { source, .. } => {
            assert!(matches!(
                *source,
                DownscaleError::InsufficientTrainingData { .. } | DownscaleError::MissingData(_)
            ));
        }
        other => panic!("expected a per-variable failure, got {other}"),
    }
}

#[test]
fn one_failing_variable_fails_the_whole_day() {
    // tp's archive window is empty: its aggregate is all-NaN, every training
    // row is dropped, and the day must fail naming tp; no partial multiband
    // output exists even though seven variables would have succeeded.
    let hourly = MissingBandHours {
        inner: ConstantHours { value: 280.0 },
        missing: "tp",
    };
    let catalog = SyntheticCatalog::new(42);
    let pipeline =
        DayPipeline::new(&hourly, &catalog, &catalog, &catalog, roi(), config());

    let err = pipeline.process_day(day()).unwrap_err();
    match err {
        DownscaleError::Variable { variable, source } => {
            assert_eq!(variable, "tp");
            assert!(matches!(
                *source,
                DownscaleError::InsufficientTrainingData { .. } | DownscaleError::MissingData(_)
            ));
        }
        other => panic!("expected a per-variable failure, got {other}"),
    }
}

#[test]
fn unknown_variable_band_fails_the_day_with_its_kind() {
    struct NoT2m;
    impl HourlySource for NoT2m {
        fn fetch_hourly(
            &self,
            band: &str,
            _start: NaiveDateTime,
            _end: NaiveDateTime,
            extent: &Extent,
        ) -> DownscaleResult<Vec<RasterField>> {
            if band == "t2m" {
                return Err(DownscaleError::UnknownVariable(band.to_string()));
            }
            Ok((0..24)
                .map(|_| RasterField::filled(*extent, 9000.0, band, 1.0))
                .collect())
        }
    }

    let catalog = SyntheticCatalog::new(42);
    let pipeline =
        DayPipeline::new(&NoT2m, &catalog, &catalog, &catalog, roi(), config());
    let err = pipeline.process_day(day()).unwrap_err();
    match err {
        DownscaleError::Variable { variable, source } => {
            assert_eq!(variable, "t2m");
            assert!(matches!(*source, DownscaleError::UnknownVariable(_)));
        }
        other => panic!("expected a per-variable failure, got {other}"),
    }
}
