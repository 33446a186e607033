use thiserror::Error;

/// Error type for downscaling operations.
///
/// Per-variable failures are wrapped in [`DownscaleError::Variable`] by the
/// day orchestrator so the offending variable is always named in the report.
#[derive(Error, Debug)]
pub enum DownscaleError {
    /// The hourly archive has no band mapped to the requested variable.
    #[error("no source band mapping for variable '{0}'")]
    UnknownVariable(String),

    /// A field lookup referenced a band that is not present.
    #[error("no band named '{0}'")]
    UnknownBand(String),

    /// A query or reduction found no usable data where some was required.
    #[error("missing data: {0}")]
    MissingData(String),

    /// The training set had no usable rows after null-dropping.
    #[error("insufficient training data: {rows} usable rows")]
    InsufficientTrainingData { rows: usize },

    /// A zonal mean had no valid pixels, so the bias term is undefined.
    #[error("bias undefined: {0}")]
    BiasUndefined(String),

    /// Two rasters were combined on incompatible grids.
    #[error("grid mismatch: {0}")]
    GridMismatch(String),

    /// A region-of-interest polygon was malformed.
    #[error("invalid ROI: {0}")]
    InvalidRoi(String),

    /// An external source failed in a way the core does not interpret.
    #[error("source error: {0}")]
    Source(String),

    /// A per-variable sub-pipeline failure, tagged with the variable name.
    #[error("variable '{variable}' failed: {source}")]
    Variable {
        variable: &'static str,
        #[source]
        source: Box<DownscaleError>,
    },
}

impl DownscaleError {
    /// Wrap an error as a per-variable pipeline failure.
    pub fn for_variable(variable: &'static str, source: DownscaleError) -> Self {
        DownscaleError::Variable {
            variable,
            source: Box::new(source),
        }
    }
}

/// Convenience type for `Result<T, DownscaleError>`.
pub type DownscaleResult<T> = Result<T, DownscaleError>;
