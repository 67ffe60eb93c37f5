//! Data models

pub mod path;
mod tenant;

pub use tenant::*;
