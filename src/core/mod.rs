pub mod base;
pub mod builder;
pub mod context;
pub mod engine;
pub mod image;
pub mod installer;
pub mod launcher;
pub mod layer_cache;
pub mod manifest;

pub use crate::domain::model::{BootstrapState, BuildReport, ImageConfig, Step, StepStatus};
pub use crate::domain::ports::{Installer, Storage};
pub use crate::utils::error::Result;
