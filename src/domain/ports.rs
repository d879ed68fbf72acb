use crate::domain::model::{StreamRecord, ViewState};
use crate::utils::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Byte chunks of one streaming response body.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn base_url(&self) -> &str;
    fn graph_id(&self) -> &str;
    fn thread_id(&self) -> &str;
    fn timeout_seconds(&self) -> u64;
    fn api_token(&self) -> Option<&str>;
    fn headers(&self) -> &[(String, String)];
}

/// Opens one streaming POST against the condenser backend.
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn open(&self, body: serde_json::Value) -> Result<ByteStream>;
}

/// Sees each record as it is folded into the view.
pub trait SessionObserver: Send {
    fn on_record(&mut self, record: &StreamRecord, view: &ViewState);

    /// Called once the read loop stops, whether completed or paused.
    fn on_stream_end(&mut self, _view: &ViewState) {}
}
