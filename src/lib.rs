pub mod animation;
pub mod config;
pub mod error;
pub mod job_system;
pub mod math;
pub mod renderer;
pub mod sim;
