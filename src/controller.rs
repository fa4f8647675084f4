//! Session controller for one NotebookLM automation session.
//!
//! Owns exactly one driver end-to-end and sequences every privileged
//! action through the same protocol: gate first, then the DOM mutation,
//! then a stability wait. A gate rejection, a timeout, or a driver fault
//! all tear the session down; the controller never retries internally,
//! because remote UI state after a partial failure is not known to be
//! safe to resume from. Callers retry with a fresh controller if they
//! want to.
//!
//! Single-caller discipline: one in-flight action per controller. The
//! `&mut self` receivers encode that contract; there is no lock because
//! there is no concurrent access to defend against.

use url::Url;

use crate::auth::AuthStore;
use crate::config::Config;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::gate::{validate_url, UrlPolicy};
use crate::session::Session;
use crate::stabilize::{await_stable, StabilizeConfig};

/// Host component of a URL, or `None` when it does not parse as one.
fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Lifecycle of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Constructed, no action issued yet.
    Unstarted,
    /// Login flow in progress.
    Authenticating,
    /// Signed in, ready for actions.
    Ready,
    /// An action is in flight.
    Acting,
    /// Terminal; driver released. Reached from any state, including on
    /// failure.
    Closing,
}

/// Drives one NotebookLM session: authenticate, open a notebook, add
/// sources, ask questions.
pub struct NotebookController {
    driver: Box<dyn Driver>,
    config: Config,
    auth: AuthStore,
    source_policy: UrlPolicy,
    notebook_policy: UrlPolicy,
    state: ControllerState,
}

impl NotebookController {
    /// Build a controller over an already-launched driver.
    pub fn new(driver: Box<dyn Driver>, config: Config) -> Self {
        let auth = AuthStore::new(&config.storage);
        Self {
            driver,
            config,
            auth,
            source_policy: UrlPolicy::youtube(),
            notebook_policy: UrlPolicy::notebooklm(),
            state: ControllerState::Unstarted,
        }
    }

    /// Launch a browser session and build a controller over it.
    pub async fn connect(config: Config) -> Result<Self> {
        let session = Session::launch(&config).await?;
        Ok(Self::new(Box::new(session), config))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Stored authentication status (existence check only).
    pub fn auth_status(&self) -> crate::auth::AuthStatus {
        self.auth.status()
    }

    /// Sign in to NotebookLM.
    ///
    /// Navigates to the login URL and waits (bounded) for the session to
    /// land on the authenticated host with the ask input present. When
    /// the browser is visible this is where the user completes the
    /// interactive Google login. On success the cookies + storage
    /// snapshot is persisted for the next session.
    pub async fn authenticate(&mut self) -> Result<()> {
        self.state = ControllerState::Authenticating;
        match self.authenticate_inner().await {
            Ok(()) => {
                self.state = ControllerState::Ready;
                Ok(())
            }
            Err(e) => Err(self.fail_closed(e).await),
        }
    }

    /// Open a notebook by URL. The URL is gate-validated before any
    /// navigation is issued.
    pub async fn open_notebook(&mut self, url: &str) -> Result<()> {
        self.state = ControllerState::Acting;
        match self.open_notebook_inner(url).await {
            Ok(()) => {
                self.state = ControllerState::Ready;
                Ok(())
            }
            Err(e) => Err(self.fail_closed(e).await),
        }
    }

    /// Create a new notebook from the home page and wait for it to open.
    pub async fn create_notebook(&mut self) -> Result<()> {
        self.state = ControllerState::Acting;
        match self.create_notebook_inner().await {
            Ok(()) => {
                self.state = ControllerState::Ready;
                Ok(())
            }
            Err(e) => Err(self.fail_closed(e).await),
        }
    }

    /// Add a YouTube video as a source and wait for ingestion to finish.
    ///
    /// The URL is gate-validated before any driver call for this action;
    /// completion is inferred from the source list growing and the
    /// processing indicator disappearing, held stable across consecutive
    /// polls.
    pub async fn add_source(&mut self, url: &str) -> Result<()> {
        self.state = ControllerState::Acting;
        match self.add_source_inner(url).await {
            Ok(()) => {
                self.state = ControllerState::Ready;
                Ok(())
            }
            Err(e) => Err(self.fail_closed(e).await),
        }
    }

    /// Ask a question and return the answer once it stops streaming.
    ///
    /// On timeout the error carries the last partial text observed, so
    /// callers can distinguish a stalled stream from one that never
    /// started.
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        self.state = ControllerState::Acting;
        match self.ask_inner(question).await {
            Ok(answer) => {
                self.state = ControllerState::Ready;
                Ok(answer)
            }
            Err(e) => Err(self.fail_closed(e).await),
        }
    }

    /// Trigger audio overview generation. Fire-and-forget: generation
    /// continues remotely and no completion is tracked.
    pub async fn generate_audio_overview(&mut self) -> Result<()> {
        self.state = ControllerState::Acting;
        match self.generate_audio_inner().await {
            Ok(()) => {
                self.state = ControllerState::Ready;
                Ok(())
            }
            Err(e) => Err(self.fail_closed(e).await),
        }
    }

    /// Release the driver. Idempotent; safe on every exit path.
    pub async fn close(&mut self) -> Result<()> {
        if self.state != ControllerState::Closing {
            self.state = ControllerState::Closing;
            self.driver.close().await?;
        }
        Ok(())
    }

    async fn fail_closed(&mut self, err: Error) -> Error {
        self.state = ControllerState::Closing;
        if let Err(close_err) = self.driver.close().await {
            tracing::warn!("teardown after failure also failed: {}", close_err);
        }
        err
    }

    async fn authenticate_inner(&mut self) -> Result<()> {
        let ui = self.config.ui.clone();
        self.driver.navigate(&ui.login_url).await?;

        let current = self.driver.current_url().await?;
        if host_of(&current).as_deref() == Some(ui.signin_host.as_str()) {
            tracing::info!("waiting for Google login to complete in the browser window");
        }

        // The login has settled once we are on the NotebookLM origin and
        // the ask input is rendered. Two consecutive reads guard against
        // transient redirect states.
        let driver = self.driver.as_ref();
        let landed = await_stable(
            move || {
                let authenticated_host = ui.authenticated_host.clone();
                let ask_input = ui.ask_input.clone();
                async move {
                    let url = driver.current_url().await?;
                    // Exact host comparison; a host embedded elsewhere in
                    // the URL must not read as authenticated.
                    if host_of(&url).as_deref() != Some(authenticated_host.as_str()) {
                        return Ok(None);
                    }
                    if driver.element_exists(&ask_input).await? {
                        Ok(Some(url))
                    } else {
                        Ok(None)
                    }
                }
            },
            &StabilizeConfig {
                poll_interval: self.config.waits.poll_interval,
                deadline: self.config.waits.login_deadline,
                required_repeats: 2,
            },
        )
        .await
        .map_err(|e| match e.into_error() {
            Error::Timeout { .. } => Error::AuthenticationFailed {
                reason: "login did not complete before the deadline".into(),
            },
            other => other,
        })?;

        tracing::info!(url = %landed, "authenticated");
        self.driver
            .save_storage_state(self.auth.state_file())
            .await?;
        self.auth.record_authenticated()?;
        Ok(())
    }

    async fn open_notebook_inner(&mut self, url: &str) -> Result<()> {
        validate_url(url, &self.notebook_policy).into_result()?;

        self.driver.navigate(url).await?;
        self.wait_ready().await
    }

    async fn create_notebook_inner(&mut self) -> Result<()> {
        let button = self.config.ui.new_notebook_button.clone();
        self.driver.click(&button).await?;
        self.wait_ready().await?;
        tracing::info!("notebook created");
        Ok(())
    }

    async fn add_source_inner(&mut self, url: &str) -> Result<()> {
        // Total gate: rejection means zero driver calls for this action.
        validate_url(url, &self.source_policy).into_result()?;

        let ui = self.config.ui.clone();
        let baseline = self.driver.element_count(&ui.source_entry).await?;

        self.driver.click(&ui.add_source_button).await?;
        self.driver.type_text(&ui.source_url_input, url).await?;
        self.driver.click(&ui.insert_button).await?;

        let expected = baseline + 1;
        let driver = self.driver.as_ref();
        await_stable(
            move || {
                let entry = ui.source_entry.clone();
                let processing = ui.source_processing_indicator.clone();
                async move {
                    // Still processing counts as not yet observable.
                    if driver.element_exists(&processing).await? {
                        return Ok(None);
                    }
                    let count = driver.element_count(&entry).await?;
                    if count >= expected {
                        Ok(Some(count))
                    } else {
                        Ok(None)
                    }
                }
            },
            &StabilizeConfig {
                poll_interval: self.config.waits.poll_interval,
                deadline: self.config.waits.source_deadline,
                required_repeats: self.config.waits.required_repeats,
            },
        )
        .await
        .map_err(|e| e.into_error())?;

        tracing::info!(%url, "source ingested");
        Ok(())
    }

    async fn ask_inner(&mut self, question: &str) -> Result<String> {
        let ui = self.config.ui.clone();
        self.wait_ready().await?;

        let baseline = self.driver.element_count(&ui.answer_block).await?;

        self.driver.type_text(&ui.ask_input, question).await?;
        self.driver.press_enter().await?;

        let driver = self.driver.as_ref();
        let answer = await_stable(
            move || {
                let pending = ui.answer_pending_indicator.clone();
                let block = ui.answer_block.clone();
                async move {
                    // A visible in-progress indicator overrides any text:
                    // trailing text under it is still streaming.
                    if driver.element_exists(&pending).await? {
                        return Ok(None);
                    }
                    if driver.element_count(&block).await? <= baseline {
                        return Ok(None);
                    }
                    match driver.text_of_last(&block).await? {
                        Some(text) if !text.trim().is_empty() => Ok(Some(text)),
                        _ => Ok(None),
                    }
                }
            },
            &StabilizeConfig {
                poll_interval: self.config.waits.poll_interval,
                deadline: self.config.waits.answer_deadline,
                required_repeats: self.config.waits.required_repeats,
            },
        )
        .await
        .map_err(|e| e.into_error())?;

        tracing::info!(chars = answer.len(), "answer settled");
        Ok(answer)
    }

    async fn generate_audio_inner(&mut self) -> Result<()> {
        let ui = &self.config.ui;
        self.driver.click(&ui.audio_overview_button).await?;
        self.driver.click(&ui.audio_generate_button).await?;
        tracing::info!("audio overview generation started (continues remotely)");
        Ok(())
    }

    async fn wait_ready(&mut self) -> Result<()> {
        let ask_input = self.config.ui.ask_input.clone();
        let driver = self.driver.as_ref();
        await_stable(
            move || {
                let selector = ask_input.clone();
                async move {
                    if driver.element_exists(&selector).await? {
                        Ok(Some(true))
                    } else {
                        Ok(None)
                    }
                }
            },
            &StabilizeConfig {
                poll_interval: self.config.waits.poll_interval,
                deadline: self.config.waits.ready_deadline,
                required_repeats: 1,
            },
        )
        .await
        .map_err(|e| e.into_error())?;
        Ok(())
    }
}
