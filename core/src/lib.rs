pub mod adaptation;
pub mod belief;
pub mod config;
pub mod cycle;
pub mod error;
pub mod knowledge;
pub mod memory;
pub mod policy;
pub mod safety;
pub mod signals;
pub mod store;
pub mod vocabulary;

/// Clamp a score into the closed unit interval.
pub(crate) fn unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
