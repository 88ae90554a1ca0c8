pub mod lifecycle;

pub use lifecycle::{DeployRequest, DriftCorrection, LifecycleCoordinator, ReconcileReport};
