//! Shared utilities.
//!
//! File hashing and child-process helpers used by the build strategies and
//! the terraform adapter.

pub mod hash;
pub mod process;

#[cfg(test)]
pub mod testutil;
