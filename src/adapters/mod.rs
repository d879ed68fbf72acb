// Adapters layer: concrete implementations for the outside world (HTTP, terminal).

pub mod http;
pub mod render;
