//! Shared viewer state handed to structures at construction.

use std::sync::Arc;

use crate::options::Options;
use crate::persistent::{PersistentCache, SharedPersistentCache};

/// State every structure and quantity needs access to.
///
/// Cloning is cheap; clones share the same cache and options.
#[derive(Debug, Clone)]
pub struct ViewerState {
    /// Remembered visualization settings.
    pub persistent: SharedPersistentCache,
    /// Viewer configuration.
    pub options: Arc<Options>,
}

impl ViewerState {
    pub fn new(options: Options) -> Self {
        Self {
            persistent: PersistentCache::shared(),
            options: Arc::new(options),
        }
    }
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new(Options::default())
    }
}
