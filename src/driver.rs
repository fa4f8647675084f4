//! Automation driver boundary.
//!
//! The controller talks to the browser only through this trait, so the
//! CDP-backed [`Session`](crate::session::Session) can be swapped for a
//! recording double in tests. The trait records exactly the primitives the
//! NotebookLM flows need, nothing more.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Primitive operations against a live page.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigate the current page to a URL.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Current page URL.
    async fn current_url(&self) -> Result<String>;

    /// Whether any element matches the selector right now.
    async fn element_exists(&self, selector: &str) -> Result<bool>;

    /// Number of elements matching the selector.
    async fn element_count(&self, selector: &str) -> Result<usize>;

    /// Click the first element matching the selector.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Focus the element and type text into it.
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    /// Press Enter on the focused element.
    async fn press_enter(&self) -> Result<()>;

    /// Inner text of the last element matching the selector, or `None`
    /// when nothing matches.
    async fn text_of_last(&self, selector: &str) -> Result<Option<String>>;

    /// Persist cookies + storage snapshot to an opaque state file.
    async fn save_storage_state(&self, path: &Path) -> Result<()>;

    /// Stop the browser and release the profile. Must be safe to call on
    /// every exit path, including after failures.
    async fn close(&self) -> Result<()>;
}
