pub mod sweep;

pub use sweep::{ReconciliationSweep, SweepConfig, SweepStats};
