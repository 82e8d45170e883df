//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod generation_repo;

pub use generation_repo::GenerationRepo;
