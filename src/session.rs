//! Chromium session backing the [`Driver`] trait.
//!
//! One session owns one browser process and one persistent profile
//! directory for its whole lifetime. The profile is exclusive: Chromium
//! holds a singleton lock on it, and a second launch against the same
//! profile surfaces here as a launch error rather than a hang.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::browser::BrowserDetector;
use crate::config::Config;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::pacing::Pacer;

/// A live browser session.
pub struct Session {
    browser: RwLock<Option<Browser>>,
    page: RwLock<Page>,
    pacer: Pacer,
    profile_dir: PathBuf,
}

impl Session {
    /// Launch a browser and open an initial blank page.
    pub async fn launch(config: &Config) -> Result<Self> {
        let profile_dir = config
            .browser
            .profile_dir
            .clone()
            .unwrap_or_else(|| config.storage.profile_dir());
        std::fs::create_dir_all(&profile_dir)?;

        let executable = match &config.browser.executable_path {
            Some(path) if path.exists() => path.clone(),
            Some(path) => {
                return Err(Error::Browser(format!(
                    "configured browser not found at {}",
                    path.display()
                )))
            }
            None => BrowserDetector::preferred()?.executable_path,
        };

        tracing::info!(browser = %executable.display(), profile = %profile_dir.display(), "launching browser");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&executable)
            .user_data_dir(&profile_dir)
            .viewport(Viewport {
                width: config.browser.window_width,
                height: config.browser.window_height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: false,
                has_touch: false,
            });

        if !config.browser.headless {
            builder = builder.with_head();
        }
        if !config.browser.sandbox {
            builder = builder.arg("--no-sandbox");
        }
        for arg in &config.browser.args {
            builder = builder.arg(arg);
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-features=IsolateOrigins,site-per-process");

        let browser_config = builder.build().map_err(|e| Error::Browser(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("SingletonLock") || msg.contains("ProcessSingleton") {
                Error::Browser(format!(
                    "profile {} is locked by another browser process: {}",
                    profile_dir.display(),
                    msg
                ))
            } else {
                Error::Browser(format!("failed to launch browser: {}", msg))
            }
        })?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!("browser handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Browser(format!("failed to create page: {}", e)))?;

        Ok(Self {
            browser: RwLock::new(Some(browser)),
            page: RwLock::new(page),
            pacer: Pacer::new(&config.pacing),
            profile_dir,
        })
    }

    /// Profile directory this session holds exclusively.
    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }
}

#[async_trait]
impl Driver for Session {
    async fn navigate(&self, url: &str) -> Result<()> {
        tracing::info!(%url, "navigating");
        let page = self.page.read().await;
        page.goto(url)
            .await
            .map_err(|e| Error::Navigation(format!("navigation to {} failed: {}", url, e)))?;
        // Let the SPA settle before the first DOM query.
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page.read().await;
        page.url()
            .await
            .map_err(|e| Error::Browser(format!("failed to read URL: {}", e)))?
            .ok_or_else(|| Error::Browser("no URL available".into()))
    }

    async fn element_exists(&self, selector: &str) -> Result<bool> {
        let page = self.page.read().await;
        Ok(page.find_element(selector).await.is_ok())
    }

    async fn element_count(&self, selector: &str) -> Result<usize> {
        let page = self.page.read().await;
        match page.find_elements(selector).await {
            Ok(elements) => Ok(elements.len()),
            Err(_) => Ok(0),
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        tracing::debug!(%selector, "clicking");
        self.pacer.before_action().await;
        let page = self.page.read().await;
        let element = page
            .find_element(selector)
            .await
            .map_err(|_| Error::ElementNotFound {
                selector: selector.into(),
            })?;
        element
            .click()
            .await
            .map_err(|e| Error::Browser(format!("click on {} failed: {}", selector, e)))?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        tracing::debug!(%selector, chars = text.len(), "typing");
        self.pacer.before_action().await;
        let page = self.page.read().await;
        let element = page
            .find_element(selector)
            .await
            .map_err(|_| Error::ElementNotFound {
                selector: selector.into(),
            })?;
        element
            .click()
            .await
            .map_err(|e| Error::Browser(format!("focus click failed: {}", e)))?;

        let mut buf = [0u8; 4];
        for ch in text.chars() {
            element
                .type_str(ch.encode_utf8(&mut buf))
                .await
                .map_err(|e| Error::Browser(format!("typing failed: {}", e)))?;
            let delay = self.pacer.type_delay();
            if delay > std::time::Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        tracing::debug!("pressing Enter");
        let script = r#"
            (function() {
                const opts = { key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true };
                document.activeElement.dispatchEvent(new KeyboardEvent('keydown', opts));
                document.activeElement.dispatchEvent(new KeyboardEvent('keyup', opts));
            })()
        "#;
        let page = self.page.read().await;
        page.evaluate(script)
            .await
            .map_err(|e| Error::Browser(format!("key press failed: {}", e)))?;
        Ok(())
    }

    async fn text_of_last(&self, selector: &str) -> Result<Option<String>> {
        let page = self.page.read().await;
        let elements = match page.find_elements(selector).await {
            Ok(elements) => elements,
            Err(_) => return Ok(None),
        };
        let Some(last) = elements.last() else {
            return Ok(None);
        };
        let text = last
            .inner_text()
            .await
            .map_err(|e| Error::Browser(format!("failed to read text: {}", e)))?;
        Ok(text)
    }

    async fn save_storage_state(&self, path: &Path) -> Result<()> {
        tracing::debug!(path = %path.display(), "saving storage state");
        let page = self.page.read().await;
        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| Error::Browser(format!("failed to get cookies: {}", e)))?;
        let state = serde_json::json!({ "cookies": cookies });
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| Error::Internal(format!("failed to serialize state: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.browser.write().await;
        if let Some(mut browser) = guard.take() {
            tracing::info!("closing browser session");
            if let Err(e) = browser.close().await {
                tracing::warn!("browser close failed: {}", e);
            }
            let _ = browser.wait().await;
        }
        Ok(())
    }
}
