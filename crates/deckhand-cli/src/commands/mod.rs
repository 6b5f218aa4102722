//! CLI commands

pub mod apply;
pub mod init;
pub mod preview;
pub mod render;
pub mod validate;
