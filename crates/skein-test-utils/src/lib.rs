//! Shared fixtures for Skein tests.
//!
//! Builders for the level topologies the unit and integration suites
//! use over and over: a source-to-sink chain with configurable port
//! shapes and system kinds, laid out on a horizontal line.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{chain_level, chain_ports, ChainSpec};
