//! Analysis module - features, clustering, anomaly scoring, forecasting

pub mod features;
mod clustering;
mod anomaly;
mod forecast;
mod statistics;

pub use features::FeaturePoint;
pub use clustering::*;
pub use anomaly::*;
pub use forecast::*;
pub use statistics::*;
