//! Domain model shared by the Scrupdate stores and their callers.
//!
//! Nothing in this crate touches the filesystem. The storage crate persists
//! these types; the scraping and UI layers produce and consume them.

pub mod error;
pub mod program;
pub mod settings;
pub mod version;

// Re-export commonly used types
pub use error::CoreError;
pub use program::{
    InstallationScope, LocatingInterval, LocatingMethod, Program, UpdateCheckConfigurationError,
    UpdateCheckConfigurationStatus, VersionSearchBehavior, VersionSearchMethod,
    WebpageElementLocatingInstruction, WebpagePostLoadDelay,
};
pub use settings::Settings;
pub use version::VersionTag;
