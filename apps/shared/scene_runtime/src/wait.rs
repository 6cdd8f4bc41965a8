//! Suspend a procedure until a predicate holds or its frame-measured timeout runs out.
//!
//! Elapsed time is the sum of the deltas handed to each drain, never a wall
//! clock sample, so a wait behaves the same under a paused or throttled host.

use std::time::Duration;

use tracing::trace;

use crate::error::{Result, RuntimeError};
use crate::scheduler::{FrameTime, TickScheduler};

/// Timeout and re-check cadence for a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    /// Predicate re-checks happen every N frames (values below 1 behave as 1)
    pub poll_interval_frames: u32,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval_frames: 1,
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    pub fn every(mut self, frames: u32) -> Self {
        self.poll_interval_frames = frames;
        self
    }
}

/// Frame-synchronized waits built on a [`TickScheduler`]
#[derive(Clone)]
pub struct ConditionWaiter {
    scheduler: TickScheduler,
    defaults: WaitOptions,
}

impl ConditionWaiter {
    pub fn new(scheduler: TickScheduler) -> Self {
        Self::with_defaults(scheduler, WaitOptions::default())
    }

    pub fn with_defaults(scheduler: TickScheduler, defaults: WaitOptions) -> Self {
        Self { scheduler, defaults }
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn defaults(&self) -> WaitOptions {
        self.defaults
    }

    /// Resolve once `predicate` returns true, re-checking every frame
    ///
    /// A predicate that already holds resolves without suspending. Otherwise the
    /// predicate is re-checked after each drain and the wait fails with
    /// `Timeout` once the accumulated frame deltas reach `timeout`.
    pub async fn wait_until<P>(&self, predicate: P, timeout: Duration) -> Result<()>
    where
        P: FnMut() -> bool,
    {
        let options = WaitOptions {
            timeout,
            ..self.defaults
        };
        self.wait_labeled("condition", predicate, options).await
    }

    /// Same as [`ConditionWaiter::wait_until`] with explicit options
    pub async fn wait_until_with<P>(&self, predicate: P, options: WaitOptions) -> Result<()>
    where
        P: FnMut() -> bool,
    {
        self.wait_labeled("condition", predicate, options).await
    }

    /// Resolve once `satisfied` holds for every handle, under one shared deadline
    ///
    /// The timeout error does not say which handle was still unsatisfied.
    pub async fn wait_all<H, F>(
        &self,
        handles: impl IntoIterator<Item = H>,
        satisfied: F,
        timeout: Duration,
    ) -> Result<()>
    where
        F: FnMut(&H) -> bool,
    {
        let options = WaitOptions {
            timeout,
            ..self.defaults
        };
        self.wait_all_labeled("all handles", handles, satisfied, options)
            .await
    }

    /// Suspend until the next drain
    pub async fn next_frame(&self) -> Result<FrameTime> {
        self.scheduler.next_tick().await
    }

    /// Suspend for `frames` drains; zero returns immediately
    pub async fn wait_frames(&self, frames: u32) -> Result<()> {
        for _ in 0..frames {
            self.scheduler.next_tick().await?;
        }
        Ok(())
    }

    /// Sleep until the accumulated frame deltas exceed `duration`
    ///
    /// # Returns
    /// The accumulated time, which overshoots `duration` by up to one frame
    pub async fn wait_time(&self, duration: Duration) -> Result<Duration> {
        let mut elapsed = Duration::ZERO;
        while elapsed <= duration {
            elapsed = elapsed.saturating_add(self.scheduler.next_tick().await?.delta);
        }
        Ok(elapsed)
    }

    /// Poll `probe` every frame until it yields a value
    pub async fn wait_for<T, F>(&self, mut probe: F, timeout: Duration) -> Result<T>
    where
        F: FnMut() -> Option<T>,
    {
        let options = WaitOptions {
            timeout,
            ..self.defaults
        };
        let mut found = None;
        self.wait_labeled(
            "value",
            || {
                if found.is_none() {
                    found = probe();
                }
                found.is_some()
            },
            options,
        )
        .await?;
        found.ok_or_else(|| RuntimeError::Assertion("probe reported no value".to_string()))
    }

    pub(crate) async fn wait_all_labeled<H, F>(
        &self,
        what: &'static str,
        handles: impl IntoIterator<Item = H>,
        mut satisfied: F,
        options: WaitOptions,
    ) -> Result<()>
    where
        F: FnMut(&H) -> bool,
    {
        let handles: Vec<H> = handles.into_iter().collect();
        self.wait_labeled(what, || handles.iter().all(&mut satisfied), options)
            .await
    }

    pub(crate) async fn wait_labeled<P>(
        &self,
        what: &'static str,
        mut predicate: P,
        options: WaitOptions,
    ) -> Result<()>
    where
        P: FnMut() -> bool,
    {
        if predicate() {
            return Ok(());
        }

        let interval = u64::from(options.poll_interval_frames.max(1));
        let mut elapsed = Duration::ZERO;
        let mut frames = 0u64;

        loop {
            if elapsed >= options.timeout {
                trace!("Wait for {} timed out after {} frame(s)", what, frames);
                return Err(RuntimeError::Timeout {
                    what,
                    elapsed,
                    timeout: options.timeout,
                    frames,
                });
            }

            let tick = self.scheduler.next_tick().await?;
            elapsed = elapsed.saturating_add(tick.delta);
            frames += 1;

            // The deadline frame always re-checks, whatever the interval
            let due = frames % interval == 0 || elapsed >= options.timeout;
            if due && predicate() {
                trace!("Wait for {} satisfied on frame {}", what, tick.frame);
                return Ok(());
            }
        }
    }
}
