pub mod application;
pub mod progress;
pub mod style;
pub mod types;
