//! Static covariate store and per-day covariate composition.
//!
//! The store fetches the static explanatory layers once per run: elevation
//! from the terrain source, slope and aspect derived from it, and a
//! fixed-year land-cover classification. Composition merges the day's NDVI
//! composite with the static layers into one stack on the elevation grid,
//! reused across all eight variables for that day.

use tracing::info;

use crate::error::{DownscaleError, DownscaleResult};
use crate::ndvi::NDVI_BAND;
use crate::raster::{RasterField, Resampling};
use crate::roi::Roi;
use crate::sources::{LandCoverSource, TerrainSource};
use crate::terrain::{slope_aspect, ASPECT_BAND, SLOPE_BAND};

pub const ELEVATION_BAND: &str = "elevation";
pub const LANDCOVER_BAND: &str = "LandCover";

/// Static covariate layers on the fine grid. Stateless after load.
#[derive(Debug, Clone)]
pub struct CovariateStore {
    statics: RasterField,
}

impl CovariateStore {
    /// Fetch elevation and land cover for the ROI and derive slope/aspect.
    ///
    /// The elevation grid defines the fine grid of the whole pipeline; land
    /// cover is pulled onto it with nearest-neighbour resampling since class
    /// codes must not be blended.
    pub fn load(
        terrain: &dyn TerrainSource,
        landcover: &dyn LandCoverSource,
        roi: &Roi,
        landcover_year: i32,
    ) -> DownscaleResult<Self> {
        let elevation = terrain
            .elevation(roi.extent())?
            .renamed_first(ELEVATION_BAND)?;
        let (slope, aspect) = slope_aspect(&elevation)?;

        let classes = landcover.classification(landcover_year, roi.extent())?;

        let statics = elevation
            .with_band(SLOPE_BAND, slope)?
            .with_band(ASPECT_BAND, aspect)?
            .concat_resampled(&classes.renamed_first(LANDCOVER_BAND)?, Resampling::Nearest)?;

        info!(
            width = statics.width,
            height = statics.height,
            landcover_year,
            "loaded static covariates"
        );
        Ok(Self { statics })
    }

    /// Grid shape and extent template of the fine grid.
    pub fn grid(&self) -> &RasterField {
        &self.statics
    }

    /// Merge a day's NDVI composite with the static layers.
    ///
    /// Band order: `{NDVI, elevation, slope, aspect, LandCover}`.
    pub fn compose(&self, ndvi: &RasterField) -> DownscaleResult<RasterField> {
        let template = self.statics.select(&[ELEVATION_BAND])?;
        let ndvi_on_grid = template
            .concat_resampled(ndvi, Resampling::Bilinear)?
            .select(&[NDVI_BAND])?;
        ndvi_on_grid.concat(&self.statics)
    }
}

impl RasterField {
    /// Rename the first band; convenience for adopting a source's raster
    /// under the covariate naming scheme whatever the source called it.
    fn renamed_first(&self, to: &str) -> DownscaleResult<RasterField> {
        let first = self
            .band_names()
            .first()
            .map(|s| s.to_string())
            .ok_or_else(|| DownscaleError::UnknownBand(to.to_string()))?;
        self.renamed(&first, to)
    }
}
