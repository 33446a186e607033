//! Synthetic in-memory data catalog.
//!
//! Implements all four source traits from seeded fractal noise so the
//! pipeline can run offline: a fractal elevation model, elevation-coupled
//! hourly weather fields with a diurnal cycle, monthly vegetation scenes in
//! raw integer units, and an elevation-derived land-cover classification.
//! Everything is deterministic in the catalog seed. Used by the CLI runner
//! and the integration tests; not a physical simulation.

use chrono::{Datelike, NaiveDateTime, Timelike};
use noise::{NoiseFn, Perlin};

use crate::error::{DownscaleError, DownscaleResult};
use crate::raster::{Extent, RasterField};
use crate::sources::{HourlySource, LandCoverSource, TerrainSource, VegetationIndexSource};
use crate::variables::Variable;

/// Environmental lapse rate in degC (or K) per metre of elevation.
const LAPSE_RATE: f64 = 0.0065;

pub struct SyntheticCatalog {
    pub seed: u32,
    /// Grid scale of the hourly weather fields in metres.
    pub coarse_scale_m: f64,
    /// Grid scale of terrain, land cover, and vegetation scenes in metres.
    pub fine_scale_m: f64,
    elevation_noise: Perlin,
    weather_noise: Perlin,
    vegetation_noise: Perlin,
}

impl SyntheticCatalog {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            coarse_scale_m: 9000.0,
            fine_scale_m: 500.0,
            elevation_noise: Perlin::new(seed),
            weather_noise: Perlin::new(seed ^ 0x5A5A),
            vegetation_noise: Perlin::new(seed ^ 0xC3C3),
        }
    }

    /// Three-octave fBm in [-1, 1]-ish range.
    fn fbm(noise: &Perlin, x: f64, y: f64) -> f64 {
        let mut value = 0.0;
        let mut amp = 1.0;
        let mut freq = 1.0;
        for _ in 0..3 {
            value += amp * noise.get([x * freq, y * freq]);
            amp *= 0.5;
            freq *= 2.0;
        }
        value / 1.75
    }

    /// Elevation in metres at a geographic point; shared by the terrain
    /// trait and the lapse-rate coupling of the weather fields.
    fn elevation_at(&self, lon: f64, lat: f64) -> f64 {
        let v = Self::fbm(&self.elevation_noise, lon * 2.0, lat * 2.0);
        (v * 0.5 + 0.5) * 2200.0
    }

    /// Hourly value of one variable at a point, before daily aggregation.
    fn hourly_value(&self, variable: Variable, hour: u32, day_of_year: u32, lon: f64, lat: f64) -> f32 {
        let elev = self.elevation_at(lon, lat);
        let spatial = Self::fbm(&self.weather_noise, lon * 0.7, lat * 0.7);
        let diurnal = ((hour as f64 - 14.0) / 24.0 * std::f64::consts::TAU).cos();
        let seasonal = ((day_of_year as f64 - 196.0) / 365.25 * std::f64::consts::TAU).cos();

        let v = match variable {
            // Kelvin with lapse-rate coupling to terrain.
            Variable::T2m => 288.15 + 8.0 * seasonal + 4.0 * diurnal + 1.5 * spatial - LAPSE_RATE * elev,
            Variable::D2m => 283.15 + 6.0 * seasonal + 2.0 * diurnal + 1.5 * spatial - LAPSE_RATE * elev,
            Variable::U10 => 2.0 + 3.0 * spatial + 0.5 * diurnal,
            Variable::V10 => -1.0 + 2.5 * spatial,
            // Barometric decay with elevation, in Pa.
            Variable::Sp => 101_325.0 * (-elev / 8434.0).exp() + 150.0 * spatial,
            // Hourly energy flux in J/m2; zero at night.
            Variable::Ssr => (800_000.0 * (1.0 + 0.4 * seasonal) * diurnal.max(0.0)) * (1.0 + 0.1 * spatial),
            Variable::Str => -120_000.0 * (1.0 + 0.2 * diurnal) * (1.0 + 0.1 * spatial),
            // Hourly precipitation depth in metres, mostly dry.
            Variable::Tp => (spatial - 0.4).max(0.0) * 0.002,
        };
        v as f32
    }
}

impl HourlySource for SyntheticCatalog {
    fn fetch_hourly(
        &self,
        band: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        extent: &Extent,
    ) -> DownscaleResult<Vec<RasterField>> {
        let variable = Variable::ALL
            .iter()
            .copied()
            .find(|v| v.band() == band)
            .ok_or_else(|| DownscaleError::UnknownVariable(band.to_string()))?;

        let mut fields = Vec::new();
        let mut at = start;
        while at < end {
            let hour = at.time().hour();
            let doy = at.date().ordinal();
            fields.push(RasterField::from_fn(
                *extent,
                self.coarse_scale_m,
                band,
                |lon, lat| self.hourly_value(variable, hour, doy, lon, lat),
            ));
            at = at + chrono::Duration::hours(1);
        }
        Ok(fields)
    }
}

impl VegetationIndexSource for SyntheticCatalog {
    fn fetch_monthly(
        &self,
        year: i32,
        month: u32,
        extent: &Extent,
    ) -> DownscaleResult<Vec<RasterField>> {
        // Eight clear-ish scenes per month in raw integer units.
        let scenes = (0..8)
            .map(|i| {
                let jitter = (year % 7) as f64 * 0.01 + month as f64 * 0.003 + i as f64 * 0.005;
                RasterField::from_fn(*extent, self.fine_scale_m, "raw_ndvi", |lon, lat| {
                    let green = Self::fbm(&self.vegetation_noise, lon * 1.3, lat * 1.3);
                    let elev = self.elevation_at(lon, lat);
                    // Greener lowlands, barer ridges.
                    let ndvi = 0.45 + 0.25 * green - 0.15 * (elev / 2200.0) + jitter;
                    (ndvi.clamp(-0.2, 0.95) * 10_000.0) as f32
                })
            })
            .collect();
        Ok(scenes)
    }
}

impl TerrainSource for SyntheticCatalog {
    fn elevation(&self, extent: &Extent) -> DownscaleResult<RasterField> {
        Ok(RasterField::from_fn(
            *extent,
            self.fine_scale_m,
            "elevation",
            |lon, lat| self.elevation_at(lon, lat) as f32,
        ))
    }
}

impl LandCoverSource for SyntheticCatalog {
    fn classification(&self, _year: i32, extent: &Extent) -> DownscaleResult<RasterField> {
        Ok(RasterField::from_fn(
            *extent,
            self.fine_scale_m,
            "LandCover",
            |lon, lat| {
                let elev = self.elevation_at(lon, lat);
                let green = Self::fbm(&self.vegetation_noise, lon * 1.3, lat * 1.3);
                // Coarse class ladder: water/cropland/forest/grassland/bare.
                if elev < 150.0 {
                    1.0
                } else if green > 0.25 {
                    3.0
                } else if elev > 1800.0 {
                    5.0
                } else if green > -0.1 {
                    4.0
                } else {
                    2.0
                }
            },
        ))
    }
}
