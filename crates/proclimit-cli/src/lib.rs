//! proclimit CLI
//!
//! Configuration, logging setup and the Dokku-style platform used by the
//! `proclimit` binary.

pub mod config;
pub mod logging;
pub mod platform;

pub use config::Config;
pub use platform::DokkuPlatform;
