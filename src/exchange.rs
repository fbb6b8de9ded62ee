use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// One request/response pair of the host web framework.
///
/// The resolver only reads from the combined context and asks the host
/// to send a file back. Everything else about the host stays opaque.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Combined request/response context that dotted paths resolve
    /// against, conventionally `{ "req": .., "res": .. }`.
    fn context(&self) -> &Value;

    /// Transmit the file at `path` as the response body.
    async fn send_file(&mut self, path: &Path) -> Result<()>;
}
