pub mod config;
pub mod file_kind;
