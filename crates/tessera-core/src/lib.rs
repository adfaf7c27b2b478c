//! Tessera Core
//!
//! Shared utilities for the Tessera renderer: logging setup, profiling
//! hooks, slab allocation and the 2D geometry types used by the recording API.

pub mod alloc;
pub mod geometry;
pub mod logging;
pub mod profiling;
