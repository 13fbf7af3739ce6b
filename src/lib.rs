pub mod aliases;
pub mod cache;
pub mod config;
pub mod errors;
pub mod fuzzy;
pub mod identifier;
pub mod remote;
pub mod resolution;
pub mod sync;
pub mod types;
pub mod workspace;
