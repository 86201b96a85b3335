pub mod demo;
pub mod tracing_setup;
