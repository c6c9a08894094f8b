pub mod align;
pub mod anchor;
pub mod config;
