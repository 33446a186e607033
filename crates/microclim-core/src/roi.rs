//! Region of interest: an immutable polygon with a derived area.
//!
//! The polygon is loaded once per run; sampling density and all zonal
//! reductions are bound to it. Area is computed with the shoelace formula in
//! degree space and converted to km² with an equirectangular approximation at
//! the polygon's mid latitude, which is adequate for the regional extents
//! this pipeline targets.

use serde::{Deserialize, Serialize};

use crate::error::{DownscaleError, DownscaleResult};
use crate::raster::{Extent, METRES_PER_DEGREE};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roi {
    /// Closed ring of (lon, lat) vertices; the closing edge is implicit.
    vertices: Vec<(f64, f64)>,
    extent: Extent,
    area_km2: f64,
}

impl Roi {
    /// Build an ROI from a vertex ring. At least three vertices are required.
    pub fn new(vertices: Vec<(f64, f64)>) -> DownscaleResult<Self> {
        if vertices.len() < 3 {
            return Err(DownscaleError::InvalidRoi(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        let mut min_lon = f64::INFINITY;
        let mut min_lat = f64::INFINITY;
        let mut max_lon = f64::NEG_INFINITY;
        let mut max_lat = f64::NEG_INFINITY;
        for &(lon, lat) in &vertices {
            if !lon.is_finite() || !lat.is_finite() {
                return Err(DownscaleError::InvalidRoi(
                    "polygon vertex is not finite".to_string(),
                ));
            }
            min_lon = min_lon.min(lon);
            min_lat = min_lat.min(lat);
            max_lon = max_lon.max(lon);
            max_lat = max_lat.max(lat);
        }
        let extent = Extent::new(min_lon, min_lat, max_lon, max_lat);

        // Shoelace area in deg², scaled to km² at the mid latitude.
        let mut deg2 = 0.0;
        for i in 0..vertices.len() {
            let (x1, y1) = vertices[i];
            let (x2, y2) = vertices[(i + 1) % vertices.len()];
            deg2 += x1 * y2 - x2 * y1;
        }
        let deg2 = deg2.abs() / 2.0;
        let km_per_deg = METRES_PER_DEGREE / 1000.0;
        let area_km2 = deg2 * km_per_deg * km_per_deg * extent.mid_lat().to_radians().cos();

        Ok(Self { vertices, extent, area_km2 })
    }

    /// Axis-aligned rectangular ROI covering `extent`.
    pub fn rectangle(extent: Extent) -> Self {
        // Four finite corners always form a valid ring.
        Self::new(vec![
            (extent.min_lon, extent.min_lat),
            (extent.max_lon, extent.min_lat),
            (extent.max_lon, extent.max_lat),
            (extent.min_lon, extent.max_lat),
        ])
        .expect("rectangle ring is always valid")
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn area_km2(&self) -> f64 {
        self.area_km2
    }

    /// Even-odd ray-casting point-in-polygon test.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if !self.extent.contains(lon, lat) {
            return false;
        }
        let mut inside = false;
        let n = self.vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[j];
            if ((yi > lat) != (yj > lat))
                && (lon < (xj - xi) * (lat - yi) / (yj - yi) + xi)
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}
