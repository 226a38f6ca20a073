//! Detection module - threshold alerts on incoming samples

mod alerts;

pub use alerts::*;
