// TODO: re-export cgmath, so targets don't need it as dependency in Cargo.toml
pub mod config;
pub use config::GraphicsConfig;

pub mod error;
pub use error::{GraphicsError, Result};

pub mod game;
pub use game::{GameApp, GameCore};

pub mod gpu;

pub mod holo;

pub mod util;


pub const APP_NAME: &str = env!("CARGO_PKG_DESCRIPTION");
pub const APP_VERSION_MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");
pub const APP_VERSION_MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");
pub const APP_VERSION_PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");
