#![doc = include_str!("../README.md")]

mod error;

pub mod config;
pub mod filters;
pub mod routing;
pub mod sink;
pub mod stats;

pub use error::{Error, Result};
