pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod stages;
pub mod types;
