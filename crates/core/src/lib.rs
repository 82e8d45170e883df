//! Domain types and pure rules for the media generation task core.
//!
//! Nothing in this crate performs I/O. The queue client, event bus and
//! history store build on these types.

pub mod endpoints;
pub mod error;
pub mod normalize;
pub mod retention;
pub mod task;
pub mod types;
