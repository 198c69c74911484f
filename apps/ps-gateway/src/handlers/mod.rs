//! Handlers 模块

pub mod clients;
pub mod commands;
pub mod system;

pub use clients::*;
pub use commands::*;
pub use system::*;
