use async_trait::async_trait;
use serde_json::Value;

use super::item::{CollectionRequest, SourceKind};
use crate::error::SourceError;

/// Adapter for one external content provider.
///
/// `collect` may be called again after a failure, so it must not leave
/// partial state behind.
#[async_trait]
pub trait Source: Send + Sync {
    /// Registry key, also used to pick the rate limit profile.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind {
        SourceKind::from_source_name(self.name())
    }

    /// Fetches raw items from the provider.
    async fn collect(&self, request: &CollectionRequest) -> Result<Vec<Value>, SourceError>;

    /// Cheap structural check on a raw item. Rejected items are dropped.
    fn validate_item(&self, raw: &Value) -> bool;

    /// Maps a raw item into the payload shape the validator expects.
    fn transform_item(&self, raw: Value) -> Value;
}

/// True when every field is present and non-null.
pub fn has_fields(raw: &Value, fields: &[&str]) -> bool {
    fields
        .iter()
        .all(|field| raw.get(field).is_some_and(|value| !value.is_null()))
}
