pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::recipe::RecipeConfig;
pub use config::runtime::{EnvNames, RuntimeConfig};
#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use core::{
    builder::ImageBuilder,
    engine::{run_image, BootstrapEngine},
    image::ImageLayout,
    installer::CommandInstaller,
};
pub use utils::error::{BootstrapError, Result};
