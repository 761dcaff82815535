//! # Lookout Common
//!
//! Types shared by every crate in the workspace.
//!
//! * **[`config`]**: the validated configuration value the core consumes.
//! * **[`error`]**: the error taxonomy reported alongside results.
//! * **[`models`]**: feed items, host records, scan results and weather data.
//! * **[`network`]**: MAC and CIDR helpers.
//! * **[`vendors`]**: the port used to resolve MAC vendors.

pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod vendors;
