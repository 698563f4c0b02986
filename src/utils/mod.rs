//! Configuration, errors, paths and file relocation

pub mod config;
pub mod error;
pub mod platform;
pub mod relocator;

pub use config::AppSettings;
pub use error::HaulError;
pub use relocator::{RelocationReport, Relocator};
