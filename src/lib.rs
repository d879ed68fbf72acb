pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::{cli::LocalStorage, SessionConfig};

pub use crate::adapters::{http::HttpStreamSource, render::TimelineRenderer};
pub use crate::core::{reducer::ViewReducer, session::StreamSession, transcript::TranscriptWriter};
pub use crate::utils::error::{CondenserError, Result};
