use std::collections::HashSet;

use async_trait::async_trait;
use sweep_model::{Image, ImageId};

use crate::error::InventoryError;

/// Access to the image cache of the local container runtime.
///
/// Implementations must be safe to call from several deletion workers at once.
#[async_trait]
pub trait ImageRepository: Send + Sync + 'static {
    /// All cached images, in runtime order.
    async fn list_images(&self) -> Result<Vec<Image>, InventoryError>;

    /// Identifiers of images referenced by any container, running or exited.
    async fn list_in_use(&self) -> Result<HashSet<ImageId>, InventoryError>;

    /// Delete one image by identifier.
    async fn remove_image(&self, id: &str) -> Result<(), InventoryError>;
}
