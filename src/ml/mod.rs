pub mod engine;
pub mod metrics;
pub mod naturalness;
pub mod pipeline;
pub mod sharpness;
