#![forbid(unsafe_code)]

pub mod generator;
pub mod model;
pub mod progress;
pub mod time;

pub use generator::generate;
pub use progress::ProgressIndex;
pub use time::Clock;
