//! Hardware-specific tests requiring real serial devices.
//!
//! These tests are ignored by default and require actual hardware to run.
//! They should be run manually with the `--ignored` flag, either with
//! `TEST_PORT` set or with a USB serial adapter attached for discovery.

pub mod real_port_tests;
pub mod utils;
