use std::any::Any;

use async_trait::async_trait;

use crate::Result;

/// Browser/UI driver made available to leaf actions through the execution context.
///
/// The engine only needs `refresh` (page-refresh recovery). Leaf actions reach
/// their concrete driver type through [`PageDriver::as_any`].
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Reload the current page.
    async fn refresh(&self) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
