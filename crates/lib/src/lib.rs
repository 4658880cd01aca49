//! forge-lib: discovery, builds and deployment pipelines for forge
//!
//! - `stack`: finds `stack.forge.toml` declarations and orders stacks by dependency
//! - `build`: runtime-keyed artifact builders and their decorators
//! - `infra`: the executor port and the terraform adapter
//! - `pipeline`: stages, engines and the per-command pipelines

pub mod build;
pub mod config;
pub mod consts;
pub mod infra;
pub mod pipeline;
pub mod stack;
pub mod util;
