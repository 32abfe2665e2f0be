//! Adapters to services outside the process.

pub mod model;
