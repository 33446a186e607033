//! Abstract data-source interfaces.
//!
//! The pipeline core never talks to storage directly; it consumes these
//! traits. Implementations are expected to be read-only catalogs, so the
//! traits require `Send + Sync` and the day orchestrator shares them freely
//! across the per-variable worker threads. Fetches may block on I/O; retry
//! and backoff are the implementation's concern, not the core's.

use chrono::NaiveDateTime;

use crate::error::DownscaleResult;
use crate::raster::{Extent, RasterField};

/// An hourly gridded weather archive, queryable by band, time window, and
/// region. Returns one single-band raster per sub-daily observation, in
/// chronological order. An unmapped band name is an `UnknownVariable` error;
/// an empty window is an empty vector, not an error.
pub trait HourlySource: Send + Sync {
    fn fetch_hourly(
        &self,
        band: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        extent: &Extent,
    ) -> DownscaleResult<Vec<RasterField>>;
}

/// A vegetation-index scene archive, queryable by calendar month and region.
/// Scenes carry raw integer-scaled values; the selector applies the physical
/// scale factor.
pub trait VegetationIndexSource: Send + Sync {
    fn fetch_monthly(
        &self,
        year: i32,
        month: u32,
        extent: &Extent,
    ) -> DownscaleResult<Vec<RasterField>>;
}

/// A static terrain model for the region.
pub trait TerrainSource: Send + Sync {
    /// Elevation in metres, single band named `elevation`.
    fn elevation(&self, extent: &Extent) -> DownscaleResult<RasterField>;
}

/// A static land-cover classification for the region.
pub trait LandCoverSource: Send + Sync {
    /// Class codes for the given product year, single band named `LandCover`.
    fn classification(&self, year: i32, extent: &Extent) -> DownscaleResult<RasterField>;
}
