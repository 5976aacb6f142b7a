use crate::zoom::MAX_ZOOM;

/// Errors raised at the boundaries of the highway profile.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A zoom level outside `0..=MAX_ZOOM` was handed to a zoom-indexed function.
    #[error("zoom {zoom} is outside the supported range 0..={}", MAX_ZOOM)]
    ZoomOutOfRange { zoom: i64 },

    /// Merge input contained a NaN or infinite coordinate.
    #[error("non-finite coordinate in feature #{feature} of layer '{layer}'")]
    NonFiniteCoordinate { layer: String, feature: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
