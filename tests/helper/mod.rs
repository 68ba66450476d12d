//! Shared test utilities

#![allow(dead_code)]

mod catalog;

pub use catalog::{create_test_catalog, module_version, package};
