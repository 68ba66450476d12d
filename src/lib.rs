//! Version ordering and package/module resolution for a package
//! documentation catalog.
//!
//! - [`version`]: canonical version parsing and byte-comparable sort keys
//! - [`catalog`]: catalog storage, excluded prefixes and resolution rules
//! - [`config`]: configuration file and data directory
//! - [`logging`]: tracing subscriber setup

pub mod catalog;
pub mod config;
pub mod logging;
pub mod version;
