//! Pluggable collaborators of the proxy engine

pub mod cache;
pub mod upstream;
