//! # Configuration Module
//!
//! This module handles application configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! Everything here is read once at startup and is immutable afterwards.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use community_core::config::Settings;
//!
//! let settings = Settings::load()?;
//! let ids = SnowflakeGenerator::new(settings.snowflake.to_config()?)?;
//! ```

mod settings;

pub use settings::*;
