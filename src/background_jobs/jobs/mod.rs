//! Specific background job implementations.

mod expiration_sweep;
mod status_refresh;

pub use expiration_sweep::ExpirationSweepJob;
pub use status_refresh::StatusRefreshJob;
