//! Terrain derivatives: per-cell slope and aspect from elevation.
//!
//! Uses Horn's (1981) 3x3 weighted finite-difference gradient. Border cells
//! use a clamped neighbourhood so the derivative bands cover the full grid
//! instead of carrying a synthetic NaN ring that would poison sampling near
//! the region edge. Any NaN in the neighbourhood makes the cell NaN.

use crate::error::{DownscaleError, DownscaleResult};
use crate::raster::RasterField;

/// Band names of the derivative rasters.
pub const SLOPE_BAND: &str = "slope";
pub const ASPECT_BAND: &str = "aspect";

/// Minimum gradient magnitude treated as non-flat.
/// tan(0.01 deg) ~ 1.745e-4.
const FLAT_GRADIENT_THRESHOLD: f64 = 1.745e-4;

/// Isotropic cell size (metres) derived from the field's geographic bounds.
/// Falls back to the field's nominal scale when bounds are degenerate.
fn cell_size_m(field: &RasterField) -> f64 {
    let ext = &field.extent;
    let cy = ext.height_m() / field.height as f64;
    let cx = ext.width_m() / field.width as f64;
    let avg = (cy + cx) / 2.0;
    if avg < 1e-3 {
        field.scale_m
    } else {
        avg
    }
}

/// Horn (1981) weighted 3x3 gradient at `(r, c)` with clamped borders.
///
/// Returns `(dz_dx, dz_dy)` as dimensionless rise/run, with x pointing east
/// (increasing column) and y pointing north (increasing row, since row 0 is
/// the southern edge).
fn horn_gradient(
    elev: &[f32],
    width: usize,
    height: usize,
    r: usize,
    c: usize,
    cellsize: f64,
) -> (f64, f64) {
    let at = |rr: isize, cc: isize| -> f64 {
        let rr = rr.clamp(0, height as isize - 1) as usize;
        let cc = cc.clamp(0, width as isize - 1) as usize;
        elev[rr * width + cc] as f64
    };
    let (ri, ci) = (r as isize, c as isize);

    let sw = at(ri - 1, ci - 1);
    let s = at(ri - 1, ci);
    let se = at(ri - 1, ci + 1);
    let w = at(ri, ci - 1);
    let e = at(ri, ci + 1);
    let nw = at(ri + 1, ci - 1);
    let n = at(ri + 1, ci);
    let ne = at(ri + 1, ci + 1);

    let dz_dx = ((ne + 2.0 * e + se) - (nw + 2.0 * w + sw)) / (8.0 * cellsize);
    let dz_dy = ((nw + 2.0 * n + ne) - (sw + 2.0 * s + se)) / (8.0 * cellsize);
    (dz_dx, dz_dy)
}

/// Compute slope (degrees) and aspect (degrees clockwise from north) rasters
/// from a single-band elevation field.
///
/// Aspect convention: `atan2(dz_dx, -dz_dy)` normalised to `[0, 360)`; cells
/// with gradient magnitude below the flat threshold get aspect 0.
pub fn slope_aspect(elevation: &RasterField) -> DownscaleResult<(Vec<f32>, Vec<f32>)> {
    if elevation.n_bands() != 1 {
        return Err(DownscaleError::GridMismatch(format!(
            "expected a single elevation band, got {}",
            elevation.n_bands()
        )));
    }
    let name = elevation.band_names()[0].to_string();
    let elev = elevation.band(&name)?;
    let (width, height) = (elevation.width, elevation.height);
    let cellsize = cell_size_m(elevation);

    let mut slope = vec![f32::NAN; width * height];
    let mut aspect = vec![f32::NAN; width * height];

    for r in 0..height {
        for c in 0..width {
            let i = r * width + c;
            let (dz_dx, dz_dy) = horn_gradient(elev, width, height, r, c, cellsize);
            if !dz_dx.is_finite() || !dz_dy.is_finite() {
                continue;
            }
            let magnitude = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt();
            slope[i] = magnitude.atan().to_degrees() as f32;

            if magnitude < FLAT_GRADIENT_THRESHOLD {
                aspect[i] = 0.0;
            } else {
                let mut deg = dz_dx.atan2(-dz_dy).to_degrees();
                if deg < 0.0 {
                    deg += 360.0;
                }
                aspect[i] = deg as f32;
            }
        }
    }

    Ok((slope, aspect))
}
