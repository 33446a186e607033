//! The fixed set of downscaled surface-weather variables.
//!
//! Each variable maps to one band of the hourly archive and declares its
//! temporal-combination rule: instantaneous measurements (temperature, wind,
//! pressure) are averaged over the day, flux/accumulation measurements
//! (radiation, precipitation) are summed. The two temperatures arrive in
//! Kelvin and are converted to Celsius during aggregation. The declared order
//! of [`Variable::ALL`] is the band order of the daily output.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Offset subtracted from Kelvin inputs to yield Celsius.
pub const KELVIN_OFFSET: f32 = 273.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variable {
    /// 2 m air temperature (K in the archive).
    T2m,
    /// 2 m dewpoint temperature (K in the archive).
    D2m,
    /// 10 m eastward wind component.
    U10,
    /// 10 m northward wind component.
    V10,
    /// Surface pressure.
    Sp,
    /// Surface net solar radiation (accumulated flux).
    Ssr,
    /// Surface net thermal radiation (accumulated flux).
    Str,
    /// Total precipitation (accumulated).
    Tp,
}

impl Variable {
    /// All variables in output band order.
    pub const ALL: [Variable; 8] = [
        Variable::T2m,
        Variable::D2m,
        Variable::U10,
        Variable::V10,
        Variable::Sp,
        Variable::Ssr,
        Variable::Str,
        Variable::Tp,
    ];

    /// Band name in the hourly archive.
    pub fn band(self) -> &'static str {
        match self {
            Variable::T2m => "t2m",
            Variable::D2m => "d2m",
            Variable::U10 => "u10",
            Variable::V10 => "v10",
            Variable::Sp => "sp",
            Variable::Ssr => "ssr",
            Variable::Str => "str",
            Variable::Tp => "tp",
        }
    }

    /// Whether daily aggregation sums rather than averages.
    pub fn is_accumulated(self) -> bool {
        matches!(self, Variable::Ssr | Variable::Str | Variable::Tp)
    }

    /// Whether the archive stores this variable in Kelvin.
    pub fn is_kelvin(self) -> bool {
        matches!(self, Variable::T2m | Variable::D2m)
    }

    /// Band name of the daily aggregate. Never used as a final output name.
    pub fn aggregated_band(self) -> String {
        if self.is_accumulated() {
            format!("{}_accum", self.band())
        } else {
            format!("{}_daily", self.band())
        }
    }

    /// Band name of the bias-corrected output.
    pub fn corrected_band(self) -> String {
        format!("{}_corrected", self.band())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.band())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulation_rule_covers_fluxes_only() {
        let accumulated: Vec<_> = Variable::ALL
            .iter()
            .filter(|v| v.is_accumulated())
            .map(|v| v.band())
            .collect();
        assert_eq!(accumulated, vec!["ssr", "str", "tp"]);
    }

    #[test]
    fn kelvin_conversion_applies_to_temperatures_only() {
        let kelvin: Vec<_> = Variable::ALL
            .iter()
            .filter(|v| v.is_kelvin())
            .map(|v| v.band())
            .collect();
        assert_eq!(kelvin, vec!["t2m", "d2m"]);
    }

    #[test]
    fn declared_order_is_the_output_order() {
        let names: Vec<_> = Variable::ALL.iter().map(|v| v.band()).collect();
        assert_eq!(names, vec!["t2m", "d2m", "u10", "v10", "sp", "ssr", "str", "tp"]);
    }

    #[test]
    fn derived_band_names() {
        assert_eq!(Variable::T2m.aggregated_band(), "t2m_daily");
        assert_eq!(Variable::Tp.aggregated_band(), "tp_accum");
        assert_eq!(Variable::Sp.corrected_band(), "sp_corrected");
    }
}
