//! Built-in example features.

pub mod greeting;
pub mod storage;

pub use greeting::{greeting_provider, GREETING_PROVIDER};
pub use storage::{automated_storage, AUTOMATED_STORAGE};

use crate::error::Result;
use crate::registry::FeatureRegistry;

/// Registry with both example features, as served by the reference server.
pub fn example_registry() -> Result<FeatureRegistry> {
    let mut registry = FeatureRegistry::new();
    registry.register(greeting_provider()?)?;
    registry.register(automated_storage()?)?;
    Ok(registry)
}
