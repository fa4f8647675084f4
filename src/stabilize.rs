//! Completion detection for a UI that never says "done".
//!
//! NotebookLM streams answers and ingests sources without emitting any
//! completion event, so the only way to know an operation finished is to
//! watch the DOM settle. [`await_stable`] is the single polling primitive
//! for that: it repeatedly invokes a caller-supplied probe and declares the
//! value final once it has read the same non-null observation a configured
//! number of consecutive times, or gives up at a deadline.
//!
//! A single "looks done" read is not enough: a streamed answer that pauses
//! mid-sentence looks identical to a finished one, and returning early
//! truncates it. Requiring N consecutive byte-identical reads is the
//! minimum protocol that is both correct and bounded.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

/// Tuning for one wait operation.
#[derive(Debug, Clone)]
pub struct StabilizeConfig {
    /// Suspension between probes. Short enough to bound added latency,
    /// long enough not to hammer the remote renderer.
    pub poll_interval: Duration,
    /// Total wall-clock budget for the wait.
    pub deadline: Duration,
    /// Consecutive identical non-null reads required before the value is
    /// considered final.
    pub required_repeats: u32,
}

impl Default for StabilizeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(750),
            deadline: Duration::from_secs(120),
            required_repeats: 3,
        }
    }
}

impl StabilizeConfig {
    /// Config with a custom deadline and default interval/threshold.
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline,
            ..Self::default()
        }
    }
}

/// Why a wait ended without a stable value.
#[derive(Debug)]
pub enum WaitError<T> {
    /// Deadline elapsed. Carries the last non-null observation so callers
    /// can tell "never started" (`None`) from "started but never settled".
    TimedOut {
        /// How long the wait ran.
        waited: Duration,
        /// Last value the probe returned, if any.
        last_observed: Option<T>,
    },
    /// The probe itself failed (driver fault); propagated, not absorbed.
    Fault(Error),
}

impl<T: std::fmt::Display> WaitError<T> {
    /// Convert into the crate error type, rendering the last observation.
    pub fn into_error(self) -> Error {
        match self {
            WaitError::TimedOut {
                waited,
                last_observed,
            } => Error::Timeout {
                waited_ms: waited.as_millis() as u64,
                last_observed: last_observed.map(|v| v.to_string()),
            },
            WaitError::Fault(e) => e,
        }
    }
}

/// Poll `probe` until its value stabilizes or the deadline elapses.
///
/// The probe returns the current observable value, or `None` while nothing
/// is observable yet (callers must map any visible in-progress indicator to
/// `None`, even if partial text is present). The engine reasons only about
/// the sequence of returned values:
///
/// - a non-null value different from the previous read (including a grown
///   streaming prefix) resets the repeat count to 1;
/// - a byte-identical repeat increments it;
/// - reaching `required_repeats` returns the value as stable;
/// - the deadline is checked before every probe and wins unconditionally.
pub async fn await_stable<T, F, Fut>(
    mut probe: F,
    config: &StabilizeConfig,
) -> std::result::Result<T, WaitError<T>>
where
    T: PartialEq,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();
    let mut last_observed: Option<T> = None;
    let mut repeats: u32 = 0;

    loop {
        if started.elapsed() >= config.deadline {
            tracing::debug!(
                waited_ms = started.elapsed().as_millis() as u64,
                observed = last_observed.is_some(),
                "wait deadline elapsed"
            );
            return Err(WaitError::TimedOut {
                waited: started.elapsed(),
                last_observed,
            });
        }

        match probe().await {
            Err(e) => return Err(WaitError::Fault(e)),
            Ok(None) => {
                // Still waiting, or back in progress; any accumulated
                // repeats no longer count.
                repeats = 0;
            }
            Ok(Some(value)) => {
                if repeats > 0 && last_observed.as_ref() == Some(&value) {
                    repeats += 1;
                } else {
                    repeats = 1;
                    last_observed = Some(value);
                }

                if repeats >= config.required_repeats.max(1) {
                    tracing::debug!(
                        waited_ms = started.elapsed().as_millis() as u64,
                        repeats,
                        "observation stabilized"
                    );
                    return Ok(last_observed.expect("repeats > 0 implies an observation"));
                }
            }
        }

        tokio::time::sleep(config.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast(deadline_ms: u64) -> StabilizeConfig {
        StabilizeConfig {
            poll_interval: Duration::from_millis(10),
            deadline: Duration::from_millis(deadline_ms),
            required_repeats: 3,
        }
    }

    /// Probe that replays a scripted sequence, then repeats the final entry.
    fn scripted(
        values: Vec<Option<&'static str>>,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<Option<String>>> + Send>>
    {
        let step = Arc::new(AtomicUsize::new(0));
        move || {
            let step = step.clone();
            let values = values.clone();
            Box::pin(async move {
                let i = step.fetch_add(1, Ordering::SeqCst).min(values.len() - 1);
                Ok(values[i].map(String::from))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn three_identical_reads_are_stable() {
        let probe = scripted(vec![Some("a"), Some("a"), Some("a")]);
        let value = await_stable(probe, &fast(5_000)).await.unwrap();
        assert_eq!(value, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn growth_resets_the_counter() {
        // "a" then "ab" x3: must settle on "ab" only after three identical
        // reads of it, not on the first.
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_probe = calls.clone();
        let value = await_stable(
            move || {
                let calls = calls_probe.clone();
                async move {
                    let i = calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(if i == 0 { "a".to_string() } else { "ab".to_string() }))
                }
            },
            &fast(5_000),
        )
        .await
        .unwrap();
        assert_eq!(value, "ab");
        // 1 read of "a" + 3 reads of "ab".
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn null_forever_times_out_with_none() {
        let probe = scripted(vec![None]);
        let err = await_stable(probe, &fast(100)).await.unwrap_err();
        match err {
            WaitError::TimedOut { last_observed, .. } => assert!(last_observed.is_none()),
            WaitError::Fault(e) => panic!("unexpected fault: {e}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn endless_streaming_times_out_with_last_partial() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_probe = calls.clone();
        let err = await_stable(
            move || {
                let calls = calls_probe.clone();
                async move {
                    let i = calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some("x".repeat(i + 1)))
                }
            },
            &fast(100),
        )
        .await
        .unwrap_err();
        match err {
            WaitError::TimedOut { last_observed, .. } => {
                let last = last_observed.expect("streaming text was observed");
                assert!(last.starts_with('x'));
            }
            WaitError::Fault(e) => panic!("unexpected fault: {e}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn in_progress_relapse_resets_accumulation() {
        // Two identical reads, then the in-progress indicator reappears
        // (None), then the real final value.
        let probe = scripted(vec![
            Some("draft"),
            Some("draft"),
            None,
            Some("final"),
            Some("final"),
            Some("final"),
        ]);
        let value = await_stable(probe, &fast(5_000)).await.unwrap();
        assert_eq!(value, "final");
    }

    #[tokio::test(start_paused = true)]
    async fn probe_faults_propagate() {
        let err = await_stable::<String, _, _>(
            || async { Err(Error::Browser("tab crashed".into())) },
            &fast(5_000),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WaitError::Fault(Error::Browser(_))));
    }
}
