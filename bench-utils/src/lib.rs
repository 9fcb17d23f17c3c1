pub mod helpers;
pub mod metrics;
