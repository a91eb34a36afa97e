//! Provider seam for the gateway.

use async_trait::async_trait;

use crate::Result;

/// An upstream AI completion backend.
///
/// The gateway is agnostic to what produces the completion; anything that
/// can turn a parameter document into text plugs in here. Implementations
/// must be safely re-callable: the retry layer may re-issue a request
/// after a transient failure.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Produce a completion for the given request parameters.
    async fn complete(&self, params: &serde_json::Value) -> Result<String>;
}
