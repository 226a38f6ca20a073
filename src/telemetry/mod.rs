//! Telemetry module - collar samples, the sliding window and sample sources

mod sample;
mod window;
mod source;
mod simulator;

pub use sample::{TelemetrySample, Triaxial};
pub use window::SlidingWindowBuffer;
pub use source::{TelemetrySource, CsvSource, ReplaySource};
pub use simulator::SyntheticFeed;
