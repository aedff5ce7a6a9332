//! Unified error type for Hearth.

use hearth_timer::TimerError;

/// Top-level error that wraps every crate-specific error.
///
/// The registries never fail (a miss is just `None`), so today this only
/// carries scheduler errors; `?` converts them through `#[from]`.
#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    /// A scheduler lifecycle or submission error.
    #[error(transparent)]
    Timer(#[from] TimerError),
}
