//! # notebook-puppet
//!
//! Browser automation library for Google NotebookLM.
//!
//! This crate drives the NotebookLM web application through a real
//! Chromium-based browser: authenticate, open notebooks, add YouTube
//! sources, ask questions, and retrieve answers once they finish
//! streaming. NotebookLM has no public API, so the browser session is the
//! integration surface.
//!
//! ## Supported Browsers
//!
//! Chromium-based (CDP automation): Chrome, Chromium, Brave, Edge.
//!
//! **Cross-platform**: Linux, macOS, Windows
//!
//! ## Features
//!
//! - **Completion detection**: streamed answers and background ingestion
//!   are awaited by polling for repeated identical observations, not fixed
//!   sleeps
//! - **Security gating**: action identifiers, content-source URLs, and
//!   local symlinks are allowlist-validated before any privileged step
//! - **Browser automation**: CDP (Chrome DevTools Protocol) via
//!   chromiumoxide, with automatic detection of installed browsers
//! - **Session persistence**: cookies and auth state survive across runs
//!   in a dedicated browser profile
//! - **Humanized pacing**: configurable typing and action delays
//!
//! ## Security Considerations
//!
//! ⚠️ **IMPORTANT**: This library automates a third-party web interface.
//! Users must comply with Google's terms of service and applicable laws.
//!
//! - Only HTTPS URLs on exact allowlisted hosts are ever navigated to
//! - Local action dispatch is whitelist-only with path containment
//! - All automation is local (no external API calls)
//!
//! ## Example
//!
//! ```rust,ignore
//! use notebook_puppet::{Config, NotebookController};
//!
//! #[tokio::main]
//! async fn main() -> notebook_puppet::Result<()> {
//!     let config = Config::builder().headless(false).build();
//!     let mut controller = NotebookController::connect(config).await?;
//!
//!     controller.authenticate().await?;
//!     controller.add_source("https://youtu.be/dQw4w9WgXcQ").await?;
//!     let answer = controller.ask("Summarize the key points").await?;
//!     println!("{answer}");
//!
//!     controller.close().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod browser;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod gate;
pub mod pacing;
pub mod session;
pub mod stabilize;

pub use auth::{AuthStatus, AuthStore};
pub use browser::{BrowserDetector, BrowserInstallation, BrowserType};
pub use config::{Config, ConfigBuilder};
pub use controller::{ControllerState, NotebookController};
pub use dispatch::Dispatcher;
pub use driver::Driver;
pub use error::{Error, Result};
pub use gate::{
    validate_local_link, validate_url, ActionPolicy, UrlPolicy, ValidationOutcome,
};
pub use session::Session;
pub use stabilize::{await_stable, StabilizeConfig, WaitError};
