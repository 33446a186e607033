//! Multi-band raster fields.
//!
//! A [`RasterField`] is a 2D grid of f32 values over a geographic extent with
//! a nominal resolution in metres. Bands carry unique names; missing data is
//! `f32::NAN`. Coordinate math uses f64; cell values use f32. Fields behave
//! as immutable values: every transformation (rename, select, concat,
//! resample) produces a new field.

use serde::{Deserialize, Serialize};

use crate::error::{DownscaleError, DownscaleResult};

/// Metres per degree of latitude (and of longitude at the equator).
pub const METRES_PER_DEGREE: f64 = 111_320.0;

/// A lon/lat bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Extent {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self { min_lon, min_lat, max_lon, max_lat }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    pub fn mid_lat(&self) -> f64 {
        (self.min_lat + self.max_lat) / 2.0
    }

    /// East-west span in metres, measured at the mid latitude.
    pub fn width_m(&self) -> f64 {
        (self.max_lon - self.min_lon).abs() * METRES_PER_DEGREE * self.mid_lat().to_radians().cos()
    }

    /// North-south span in metres.
    pub fn height_m(&self) -> f64 {
        (self.max_lat - self.min_lat).abs() * METRES_PER_DEGREE
    }

    /// Grid shape `(width, height)` for a given cell size in metres.
    /// Degenerate extents still yield at least one cell per axis.
    pub fn grid_shape(&self, scale_m: f64) -> (usize, usize) {
        let w = (self.width_m() / scale_m).round().max(1.0) as usize;
        let h = (self.height_m() / scale_m).round().max(1.0) as usize;
        (w, h)
    }
}

/// How to interpolate when pulling another field's values onto a new grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resampling {
    /// Bilinear over the four surrounding cell centres; NaN-contaminating.
    Bilinear,
    /// Nearest cell centre. Required for categorical bands.
    Nearest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Band {
    name: String,
    /// Row-major values; row 0 is the southern edge.
    data: Vec<f32>,
}

/// A multi-band raster over a geographic extent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterField {
    pub width: usize,
    pub height: usize,
    pub extent: Extent,
    /// Nominal cell size in metres.
    pub scale_m: f64,
    bands: Vec<Band>,
}

impl RasterField {
    /// A single-band field from row-major data with explicit grid shape.
    pub fn from_data(
        width: usize,
        height: usize,
        extent: Extent,
        scale_m: f64,
        name: &str,
        data: Vec<f32>,
    ) -> DownscaleResult<Self> {
        if data.len() != width * height {
            return Err(DownscaleError::GridMismatch(format!(
                "band '{}' has {} values for a {}x{} grid",
                name,
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            extent,
            scale_m,
            bands: vec![Band { name: name.to_string(), data }],
        })
    }

    /// A single-band field filled with a constant, gridded at `scale_m`.
    pub fn filled(extent: Extent, scale_m: f64, name: &str, fill: f32) -> Self {
        let (width, height) = extent.grid_shape(scale_m);
        Self {
            width,
            height,
            extent,
            scale_m,
            bands: vec![Band { name: name.to_string(), data: vec![fill; width * height] }],
        }
    }

    /// A single-band field computed per cell centre from `(lon, lat)`.
    pub fn from_fn(
        extent: Extent,
        scale_m: f64,
        name: &str,
        f: impl Fn(f64, f64) -> f32,
    ) -> Self {
        let (width, height) = extent.grid_shape(scale_m);
        let mut data = Vec::with_capacity(width * height);
        for r in 0..height {
            for c in 0..width {
                let (lon, lat) = cell_center(&extent, width, height, r, c);
                data.push(f(lon, lat));
            }
        }
        Self {
            width,
            height,
            extent,
            scale_m,
            bands: vec![Band { name: name.to_string(), data }],
        }
    }

    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn band_index(&self, name: &str) -> Option<usize> {
        self.bands.iter().position(|b| b.name == name)
    }

    /// Row-major values of a band, or `UnknownBand`.
    pub fn band(&self, name: &str) -> DownscaleResult<&[f32]> {
        self.band_index(name)
            .map(|i| self.bands[i].data.as_slice())
            .ok_or_else(|| DownscaleError::UnknownBand(name.to_string()))
    }

    #[inline]
    pub fn get(&self, band: usize, row: usize, col: usize) -> f32 {
        self.bands[band].data[row * self.width + col]
    }

    /// Geographic centre of cell `(row, col)`.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        cell_center(&self.extent, self.width, self.height, row, col)
    }

    /// Sample one band at `(lon, lat)`.
    ///
    /// Returns `None` outside the extent. Inside the extent a missing-data
    /// neighbourhood yields `Some(NAN)`, so masked pixels propagate rather
    /// than silently disappearing.
    pub fn sample(&self, band: usize, lon: f64, lat: f64, method: Resampling) -> Option<f32> {
        if !self.extent.contains(lon, lat) {
            return None;
        }
        let fx = self.frac_col(lon).clamp(0.0, (self.width - 1) as f64);
        let fy = self.frac_row(lat).clamp(0.0, (self.height - 1) as f64);

        match method {
            Resampling::Nearest => {
                let c = fx.round() as usize;
                let r = fy.round() as usize;
                Some(self.get(band, r, c))
            }
            Resampling::Bilinear => {
                let x0 = fx.floor() as usize;
                let y0 = fy.floor() as usize;
                let x1 = (x0 + 1).min(self.width - 1);
                let y1 = (y0 + 1).min(self.height - 1);
                let tx = (fx - x0 as f64) as f32;
                let ty = (fy - y0 as f64) as f32;

                let v00 = self.get(band, y0, x0);
                let v10 = self.get(band, y0, x1);
                let v01 = self.get(band, y1, x0);
                let v11 = self.get(band, y1, x1);

                Some(
                    v00 * (1.0 - tx) * (1.0 - ty)
                        + v10 * tx * (1.0 - ty)
                        + v01 * (1.0 - tx) * ty
                        + v11 * tx * ty,
                )
            }
        }
    }

    /// New field with one band renamed.
    pub fn renamed(&self, from: &str, to: &str) -> DownscaleResult<Self> {
        let idx = self
            .band_index(from)
            .ok_or_else(|| DownscaleError::UnknownBand(from.to_string()))?;
        if from != to && self.band_index(to).is_some() {
            return Err(DownscaleError::GridMismatch(format!(
                "cannot rename '{from}' to '{to}': band already exists"
            )));
        }
        let mut out = self.clone();
        out.bands[idx].name = to.to_string();
        Ok(out)
    }

    /// New field containing only the named bands, in the given order.
    pub fn select(&self, names: &[&str]) -> DownscaleResult<Self> {
        let mut bands = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .band_index(name)
                .ok_or_else(|| DownscaleError::UnknownBand(name.to_string()))?;
            bands.push(self.bands[idx].clone());
        }
        Ok(Self { bands, ..self.clone() })
    }

    /// New field with `data` appended as an extra band on this grid.
    pub fn with_band(&self, name: &str, data: Vec<f32>) -> DownscaleResult<Self> {
        if data.len() != self.width * self.height {
            return Err(DownscaleError::GridMismatch(format!(
                "band '{}' has {} values for a {}x{} grid",
                name,
                data.len(),
                self.width,
                self.height
            )));
        }
        if self.band_index(name).is_some() {
            return Err(DownscaleError::GridMismatch(format!(
                "duplicate band name '{name}'"
            )));
        }
        let mut out = self.clone();
        out.bands.push(Band { name: name.to_string(), data });
        Ok(out)
    }

    /// Concatenate the bands of `other`, which must share this exact grid.
    pub fn concat(&self, other: &RasterField) -> DownscaleResult<Self> {
        if other.width != self.width || other.height != self.height {
            return Err(DownscaleError::GridMismatch(format!(
                "cannot concat {}x{} onto {}x{}",
                other.width, other.height, self.width, self.height
            )));
        }
        let mut out = self.clone();
        for band in &other.bands {
            if out.band_index(&band.name).is_some() {
                return Err(DownscaleError::GridMismatch(format!(
                    "duplicate band name '{}'",
                    band.name
                )));
            }
            out.bands.push(band.clone());
        }
        Ok(out)
    }

    /// Concatenate the bands of `other` after pulling them onto this grid.
    ///
    /// Cells whose centre falls outside `other`'s extent become NaN.
    pub fn concat_resampled(
        &self,
        other: &RasterField,
        method: Resampling,
    ) -> DownscaleResult<Self> {
        let mut out = self.clone();
        for (b, band) in other.bands.iter().enumerate() {
            if out.band_index(&band.name).is_some() {
                return Err(DownscaleError::GridMismatch(format!(
                    "duplicate band name '{}'",
                    band.name
                )));
            }
            let mut data = Vec::with_capacity(self.width * self.height);
            for r in 0..self.height {
                for c in 0..self.width {
                    let (lon, lat) = self.cell_center(r, c);
                    data.push(other.sample(b, lon, lat, method).unwrap_or(f32::NAN));
                }
            }
            out.bands.push(Band { name: band.name.clone(), data });
        }
        Ok(out)
    }

    /// Fractional column of `lon` under the cell-centre convention.
    #[inline]
    fn frac_col(&self, lon: f64) -> f64 {
        (lon - self.extent.min_lon) / (self.extent.max_lon - self.extent.min_lon)
            * self.width as f64
            - 0.5
    }

    /// Fractional row of `lat`; row 0 is the southern edge.
    #[inline]
    fn frac_row(&self, lat: f64) -> f64 {
        (lat - self.extent.min_lat) / (self.extent.max_lat - self.extent.min_lat)
            * self.height as f64
            - 0.5
    }
}

fn cell_center(extent: &Extent, width: usize, height: usize, row: usize, col: usize) -> (f64, f64) {
    let lon = extent.min_lon
        + (col as f64 + 0.5) / width as f64 * (extent.max_lon - extent.min_lon);
    let lat = extent.min_lat
        + (row as f64 + 0.5) / height as f64 * (extent.max_lat - extent.min_lat);
    (lon, lat)
}
