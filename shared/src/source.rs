use async_trait::async_trait;

use crate::errors::TransportError;
use crate::models::{Macro, MacroImage};

/// Remote collection of macros.
///
/// `fetch_image` is called concurrently from every pool worker, so
/// implementations must not keep per-call mutable state.
#[async_trait]
pub trait MacroSource: Send + Sync {
    /// List every macro. The whole listing is materialized before any fetch
    /// is scheduled, since the job count must be known up front.
    async fn list_macros(&self) -> Result<Vec<Macro>, TransportError>;

    /// Fetch the raw image bytes for one macro.
    async fn fetch_image(&self, entry: &Macro) -> Result<MacroImage, TransportError>;
}
