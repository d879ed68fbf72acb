pub mod classifier;
pub mod ndjson;
pub mod reducer;
pub mod session;
pub mod transcript;

pub use crate::domain::model::{SessionPhase, StreamRecord, TimelineEntry, ViewState};
pub use crate::domain::ports::{ConfigProvider, SessionObserver, Storage, StreamSource};
pub use crate::utils::error::Result;
