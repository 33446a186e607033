//! Statistical spatial downscaling of coarse reanalysis weather fields.
//!
//! The pipeline takes an hourly gridded archive at ~9 km, aggregates it to
//! one daily field per surface variable, trains a per-variable random-forest
//! regression against a shared covariate stack (NDVI, elevation, slope,
//! aspect, land cover) at ~500 m, predicts at the fine resolution, and
//! anchors each prediction's areal mean back to the coarse field with a
//! global additive bias correction.
//!
//! Entry point: [`pipeline::DayPipeline::process_day`].

pub mod aggregate;
pub mod bias;
pub mod covariates;
pub mod error;
pub mod forest;
pub mod ndvi;
pub mod pipeline;
pub mod raster;
pub mod roi;
pub mod sampling;
pub mod sources;
pub mod synthetic;
pub mod terrain;
pub mod variables;
pub mod zonal;

pub use error::{DownscaleError, DownscaleResult};
pub use pipeline::{DailyField, DayPipeline, PipelineConfig};
pub use raster::{Extent, RasterField, Resampling};
pub use roi::Roi;
pub use variables::Variable;
