//! polydown - batch downloader for the Poly Haven asset catalog
//!
//! Lists assets of one type from the catalog API, expands each asset's file
//! metadata into download tasks and runs them through a bounded worker pool,
//! verifying every file against its published MD5.

pub mod catalog;
pub mod download;
pub mod hash;
pub mod http;
pub mod paths;
pub mod runner;
pub mod tasks;
