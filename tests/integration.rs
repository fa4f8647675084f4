//! Integration tests for the controller, gate, and dispatch layers.
//!
//! The controller is exercised against a scripted in-memory driver, so
//! these tests cover the full gate -> action -> stability-wait protocol
//! without a browser. Waits run under a paused tokio clock.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;

use notebook_puppet::{
    ActionPolicy, Config, ControllerState, Driver, Error, NotebookController, Result,
};

/// Scripted driver double. Records every call; probe-style reads pop
/// scripted responses and repeat the last one once the script runs out.
#[derive(Default)]
struct FakeDriver {
    calls: Mutex<Vec<String>>,
    exists: Mutex<HashMap<String, bool>>,
    counts: Mutex<HashMap<String, VecDeque<usize>>>,
    texts: Mutex<VecDeque<Option<String>>>,
    urls: Mutex<VecDeque<String>>,
}

fn pop_keeping_last<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl FakeDriver {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn set_exists(&self, selector: &str, value: bool) {
        self.exists.lock().insert(selector.to_string(), value);
    }

    fn script_counts(&self, selector: &str, counts: &[usize]) {
        self.counts
            .lock()
            .insert(selector.to_string(), counts.iter().copied().collect());
    }

    fn script_texts(&self, texts: &[&str]) {
        *self.texts.lock() = texts.iter().map(|t| Some(t.to_string())).collect();
    }

    fn script_urls(&self, urls: &[&str]) {
        *self.urls.lock() = urls.iter().map(|u| u.to_string()).collect();
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(format!("navigate:{url}"));
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.record("current_url");
        Ok(pop_keeping_last(&mut self.urls.lock()).unwrap_or_else(|| "about:blank".into()))
    }

    async fn element_exists(&self, selector: &str) -> Result<bool> {
        self.record(format!("exists:{selector}"));
        Ok(self.exists.lock().get(selector).copied().unwrap_or(false))
    }

    async fn element_count(&self, selector: &str) -> Result<usize> {
        self.record(format!("count:{selector}"));
        let mut counts = self.counts.lock();
        Ok(counts
            .get_mut(selector)
            .and_then(pop_keeping_last)
            .unwrap_or(0))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.record(format!("click:{selector}"));
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.record(format!("type:{selector}:{text}"));
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        self.record("press_enter");
        Ok(())
    }

    async fn text_of_last(&self, selector: &str) -> Result<Option<String>> {
        self.record(format!("text:{selector}"));
        Ok(pop_keeping_last(&mut self.texts.lock()).flatten())
    }

    async fn save_storage_state(&self, _path: &Path) -> Result<()> {
        self.record("save_storage_state");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record("close");
        Ok(())
    }
}

fn test_config(data_dir: &Path) -> Config {
    Config::builder()
        .machine_speed()
        .data_dir(data_dir.to_path_buf())
        .build()
}

fn controller_over(driver: FakeDriver, data_dir: &Path) -> (NotebookController, &'static FakeDriver) {
    // Leak the driver so the test can inspect calls after handing
    // ownership to the controller.
    let driver: &'static FakeDriver = Box::leak(Box::new(driver));
    let controller = NotebookController::new(Box::new(DriverRef(driver)), test_config(data_dir));
    (controller, driver)
}

/// Forwarding wrapper so the test keeps a handle to the leaked double.
struct DriverRef(&'static FakeDriver);

#[async_trait]
impl Driver for DriverRef {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.0.navigate(url).await
    }
    async fn current_url(&self) -> Result<String> {
        self.0.current_url().await
    }
    async fn element_exists(&self, selector: &str) -> Result<bool> {
        self.0.element_exists(selector).await
    }
    async fn element_count(&self, selector: &str) -> Result<usize> {
        self.0.element_count(selector).await
    }
    async fn click(&self, selector: &str) -> Result<()> {
        self.0.click(selector).await
    }
    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.0.type_text(selector, text).await
    }
    async fn press_enter(&self) -> Result<()> {
        self.0.press_enter().await
    }
    async fn text_of_last(&self, selector: &str) -> Result<Option<String>> {
        self.0.text_of_last(selector).await
    }
    async fn save_storage_state(&self, path: &Path) -> Result<()> {
        self.0.save_storage_state(path).await
    }
    async fn close(&self) -> Result<()> {
        self.0.close().await
    }
}

#[tokio::test]
async fn rejected_source_url_reaches_no_page_operation() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, driver) = controller_over(FakeDriver::default(), dir.path());

    let err = controller
        .add_source("https://evil.com/watch?v=dQw4w9WgXcQ")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(controller.state(), ControllerState::Closing);
    // Teardown is the only driver interaction.
    assert_eq!(driver.calls(), vec!["close".to_string()]);
}

#[tokio::test]
async fn rejected_notebook_url_reaches_no_page_operation() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, driver) = controller_over(FakeDriver::default(), dir.path());

    let err = controller
        .open_notebook("http://notebooklm.google.com/notebook/abc123")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(driver.calls(), vec!["close".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn ask_returns_the_answer_once_it_stops_streaming() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let fake = FakeDriver::default();
    fake.set_exists(&config.ui.ask_input, true);
    // Baseline count before submit is 0, then one answer block appears.
    fake.script_counts(&config.ui.answer_block, &[0, 1]);
    // The answer grows for a few polls before settling.
    fake.script_texts(&["The", "The answer", "The answer."]);

    let (mut controller, driver) = controller_over(fake, dir.path());

    let answer = controller.ask("What is the key point?").await.unwrap();
    assert_eq!(answer, "The answer.");
    assert_eq!(controller.state(), ControllerState::Ready);

    let calls = driver.calls();
    assert!(calls.iter().any(|c| c.starts_with("type:")));
    assert!(calls.contains(&"press_enter".to_string()));
}

#[tokio::test(start_paused = true)]
async fn ask_times_out_while_the_pending_indicator_stays_visible() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let fake = FakeDriver::default();
    fake.set_exists(&config.ui.ask_input, true);
    // Indicator never clears; any trailing text must be ignored.
    fake.set_exists(&config.ui.answer_pending_indicator, true);
    fake.script_counts(&config.ui.answer_block, &[0, 1]);
    fake.script_texts(&["partial text that never settles"]);

    let (mut controller, driver) = controller_over(fake, dir.path());

    let err = controller.ask("stalls forever").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Timeout {
            last_observed: None,
            ..
        }
    ));
    assert_eq!(controller.state(), ControllerState::Closing);
    assert!(driver.calls().contains(&"close".to_string()));
}

#[tokio::test(start_paused = true)]
async fn add_source_waits_for_the_entry_to_appear() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let fake = FakeDriver::default();
    // No processing indicator; source list grows from 0 to 1.
    fake.script_counts(&config.ui.source_entry, &[0, 1]);

    let (mut controller, driver) = controller_over(fake, dir.path());

    controller
        .add_source("https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap();
    assert_eq!(controller.state(), ControllerState::Ready);

    let calls = driver.calls();
    let click_add = calls
        .iter()
        .position(|c| c == &format!("click:{}", config.ui.add_source_button))
        .expect("add-source click");
    let click_insert = calls
        .iter()
        .position(|c| c == &format!("click:{}", config.ui.insert_button))
        .expect("insert click");
    assert!(click_add < click_insert);
}

#[tokio::test(start_paused = true)]
async fn authenticate_persists_state_after_landing() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let fake = FakeDriver::default();
    fake.set_exists(&config.ui.ask_input, true);
    // Sign-in redirect first, then the authenticated origin.
    fake.script_urls(&[
        "https://accounts.google.com/v3/signin",
        "https://notebooklm.google.com/",
    ]);

    let (mut controller, driver) = controller_over(fake, dir.path());

    controller.authenticate().await.unwrap();
    assert_eq!(controller.state(), ControllerState::Ready);
    assert!(driver.calls().contains(&"save_storage_state".to_string()));
    // Login metadata is recorded for staleness tracking.
    assert!(controller.auth_status().authenticated_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn authenticate_fails_when_login_never_completes() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeDriver::default();
    fake.script_urls(&["https://accounts.google.com/v3/signin"]);

    let (mut controller, driver) = controller_over(fake, dir.path());

    let err = controller.authenticate().await.unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed { .. }));
    assert_eq!(controller.state(), ControllerState::Closing);
    assert!(driver.calls().contains(&"close".to_string()));
}

#[tokio::test(start_paused = true)]
async fn authenticate_ignores_the_host_embedded_in_a_foreign_url() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let fake = FakeDriver::default();
    fake.set_exists(&config.ui.ask_input, true);
    // The authenticated host appears in the path of another origin; host
    // comparison must be exact, not substring.
    fake.script_urls(&["https://evil.com/notebooklm.google.com/"]);

    let (mut controller, driver) = controller_over(fake, dir.path());

    let err = controller.authenticate().await.unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed { .. }));
    assert!(!driver.calls().contains(&"save_storage_state".to_string()));
}

#[tokio::test(start_paused = true)]
async fn create_notebook_waits_until_the_ask_input_renders() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let fake = FakeDriver::default();
    fake.set_exists(&config.ui.ask_input, true);

    let (mut controller, driver) = controller_over(fake, dir.path());

    controller.create_notebook().await.unwrap();
    assert_eq!(controller.state(), ControllerState::Ready);
    assert!(driver
        .calls()
        .contains(&format!("click:{}", config.ui.new_notebook_button)));
}

#[tokio::test]
async fn close_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, driver) = controller_over(FakeDriver::default(), dir.path());

    controller.close().await.unwrap();
    controller.close().await.unwrap();
    assert_eq!(driver.calls(), vec!["close".to_string()]);
}

#[test]
fn allowlisted_traversal_entry_still_fails_containment() {
    // Even a misconfigured allowlist entry cannot escape the base dir:
    // the containment check is independent of whitelist membership.
    let allowed = ["../outside.py".to_string()].into_iter().collect();
    let policy = ActionPolicy::new(allowed, "/opt/skill/scripts", "scripts/", ".py").unwrap();
    let outcome = policy.validate_action("../outside.py");
    assert!(!outcome.allowed);
    assert!(outcome.reason.unwrap().contains("outside"));
}

#[test]
fn validation_errors_map_to_the_documented_exit_code() {
    let err = Error::Validation {
        reason: "host not allowed".into(),
    };
    assert_eq!(err.exit_code(), 2);
    assert!(!err.is_retryable());
}
