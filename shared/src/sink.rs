use async_trait::async_trait;

use crate::errors::StorageError;
use crate::models::MacroImage;

/// Local destination for fetched images.
///
/// `persist` is only ever called by the result collector, which owns the
/// sink outright, hence `&mut self`.
#[async_trait]
pub trait Sink: Send {
    /// Check the destination accepts writes. Runs once, before any network
    /// activity.
    async fn probe_writable(&self) -> Result<(), StorageError>;

    /// Store one image under its macro name, replacing any earlier copy.
    async fn persist(&mut self, image: &MacroImage) -> Result<(), StorageError>;
}
