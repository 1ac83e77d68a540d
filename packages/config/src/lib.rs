// ABOUTME: Configuration package for runbox
// ABOUTME: Environment variable names and typed readers shared by every runbox process

pub mod constants;
pub mod env;

pub use constants::*;
