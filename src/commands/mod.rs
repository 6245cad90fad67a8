pub mod common;
pub mod info;
pub mod surf;
pub mod config;
