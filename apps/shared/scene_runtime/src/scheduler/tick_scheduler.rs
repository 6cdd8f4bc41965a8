use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use tracing::trace;

use crate::error::{Result, RuntimeError};

type Continuation = Box<dyn FnOnce()>;

/// Frame index and delta of a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTime {
    /// 1-based index of the drained frame
    pub frame: u64,
    /// Time supplied by the host for this frame
    pub delta: Duration,
}

impl FrameTime {
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

struct SchedulerState {
    queue: RefCell<VecDeque<Continuation>>,
    frame: Cell<u64>,
    delta: Cell<Duration>,
    draining: Cell<bool>,
    closed: Cell<bool>,
}

impl SchedulerState {
    fn frame_time(&self) -> FrameTime {
        FrameTime {
            frame: self.frame.get(),
            delta: self.delta.get(),
        }
    }
}

/// Resets the draining flag even if a continuation panics
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// FIFO queue of continuations resumed once per frame
///
/// Cloning yields another handle to the same queue. The scheduler is bound to a
/// single thread and never locks; the only protection is the re-entrancy guard
/// on [`TickScheduler::drain_once`].
#[derive(Clone)]
pub struct TickScheduler {
    state: Rc<SchedulerState>,
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TickScheduler {
    pub fn new() -> Self {
        Self {
            state: Rc::new(SchedulerState {
                queue: RefCell::new(VecDeque::new()),
                frame: Cell::new(0),
                delta: Cell::new(Duration::ZERO),
                draining: Cell::new(false),
                closed: Cell::new(false),
            }),
        }
    }

    /// Append a continuation to run on the next drain
    ///
    /// On a closed scheduler the continuation is dropped without running.
    pub fn schedule(&self, continuation: impl FnOnce() + 'static) {
        if self.state.closed.get() {
            trace!("Scheduler closed, dropping continuation");
            return;
        }
        self.state.queue.borrow_mut().push_back(Box::new(continuation));
    }

    /// Run the continuations that were queued when the drain started
    ///
    /// Continuations scheduled while draining wait for the next call. A nested
    /// call from inside a continuation does nothing and returns 0.
    ///
    /// # Arguments
    /// * `delta` - Time elapsed since the previous frame
    ///
    /// # Returns
    /// The number of continuations invoked
    pub fn drain_once(&self, delta: Duration) -> usize {
        if self.state.draining.get() {
            trace!("Nested drain ignored");
            return 0;
        }
        if self.state.closed.get() {
            return 0;
        }

        self.state.draining.set(true);
        let _guard = DrainGuard(&self.state.draining);

        self.state.frame.set(self.state.frame.get() + 1);
        self.state.delta.set(delta);

        let due = self.state.queue.borrow().len();
        let mut invoked = 0;
        while invoked < due {
            // The borrow must end before the continuation runs, it may schedule again
            let next = self.state.queue.borrow_mut().pop_front();
            let Some(continuation) = next else {
                break;
            };
            continuation();
            invoked += 1;
        }

        trace!(
            "Frame {} drained {} continuation(s), {} deferred",
            self.state.frame.get(),
            invoked,
            self.state.queue.borrow().len()
        );
        invoked
    }

    /// Future resolving on the next drain with that drain's [`FrameTime`]
    ///
    /// The continuation is queued immediately, not on first poll, so resumption
    /// order follows call order. Resolves to `SchedulerClosed` if the scheduler
    /// is closed before the next drain.
    pub fn next_tick(&self) -> NextTick {
        let slot = Rc::new(RefCell::new(TickSlot::default()));
        let signal = TickSignal {
            slot: slot.clone(),
            scheduler: Rc::downgrade(&self.state),
            fired: false,
        };
        self.schedule(move || signal.fire());
        NextTick { slot }
    }

    /// Drop every pending continuation and refuse new ones
    pub fn close(&self) {
        if self.state.closed.replace(true) {
            return;
        }
        let pending = std::mem::take(&mut *self.state.queue.borrow_mut());
        trace!("Closing scheduler with {} pending continuation(s)", pending.len());
        drop(pending);
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.get()
    }

    /// Number of frames drained so far
    pub fn frame(&self) -> u64 {
        self.state.frame.get()
    }

    /// Frame index and delta of the latest drain
    pub fn frame_time(&self) -> FrameTime {
        self.state.frame_time()
    }

    /// Number of queued continuations
    pub fn pending(&self) -> usize {
        self.state.queue.borrow().len()
    }
}

#[derive(Default)]
struct TickSlot {
    fired: Option<FrameTime>,
    waker: Option<Waker>,
    closed: bool,
}

/// Scheduler side of a [`NextTick`]; completes the slot when invoked or dropped
struct TickSignal {
    slot: Rc<RefCell<TickSlot>>,
    scheduler: Weak<SchedulerState>,
    fired: bool,
}

impl TickSignal {
    fn fire(mut self) {
        let Some(state) = self.scheduler.upgrade() else {
            return;
        };
        let waker = {
            let mut slot = self.slot.borrow_mut();
            slot.fired = Some(state.frame_time());
            slot.waker.take()
        };
        self.fired = true;
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl Drop for TickSignal {
    fn drop(&mut self) {
        if self.fired {
            return;
        }
        let waker = {
            let mut slot = self.slot.borrow_mut();
            slot.closed = true;
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Future returned by [`TickScheduler::next_tick`]
pub struct NextTick {
    slot: Rc<RefCell<TickSlot>>,
}

impl NextTick {
    pub fn is_fired(&self) -> bool {
        self.slot.borrow().fired.is_some()
    }
}

impl Future for NextTick {
    type Output = Result<FrameTime>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        if let Some(time) = slot.fired {
            return Poll::Ready(Ok(time));
        }
        if slot.closed {
            return Poll::Ready(Err(RuntimeError::SchedulerClosed));
        }
        slot.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn poll_once(tick: &mut NextTick) -> Poll<Result<FrameTime>> {
        let mut cx = Context::from_waker(Waker::noop());
        Pin::new(tick).poll(&mut cx)
    }

    #[test]
    fn test_fifo_order() {
        let scheduler = TickScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..4 {
            let log = log.clone();
            scheduler.schedule(move || log.borrow_mut().push(i));
        }

        assert_eq!(scheduler.pending(), 4);
        assert_eq!(scheduler.drain_once(FRAME), 4);
        assert_eq!(*log.borrow(), vec![0, 1, 2, 3]);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.frame(), 1);
    }

    #[test]
    fn test_scheduled_during_drain_is_deferred() {
        let scheduler = TickScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_scheduler = scheduler.clone();
        let inner_log = log.clone();
        scheduler.schedule(move || {
            inner_log.borrow_mut().push("outer");
            let log = inner_log.clone();
            inner_scheduler.schedule(move || log.borrow_mut().push("inner"));
        });

        assert_eq!(scheduler.drain_once(FRAME), 1);
        assert_eq!(*log.borrow(), vec!["outer"]);
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.drain_once(FRAME), 1);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_nested_drain_is_noop() {
        let scheduler = TickScheduler::new();
        let nested = Rc::new(Cell::new(usize::MAX));

        let inner_scheduler = scheduler.clone();
        let inner_nested = nested.clone();
        scheduler.schedule(move || {
            inner_nested.set(inner_scheduler.drain_once(FRAME));
        });
        scheduler.schedule(|| {});

        assert_eq!(scheduler.drain_once(FRAME), 2);
        assert_eq!(nested.get(), 0);
        assert_eq!(scheduler.frame(), 1);
    }

    #[test]
    fn test_next_tick_reports_frame_time() {
        let scheduler = TickScheduler::new();
        scheduler.drain_once(FRAME);

        let mut tick = scheduler.next_tick();
        assert!(poll_once(&mut tick).is_pending());
        assert!(!tick.is_fired());

        scheduler.drain_once(Duration::from_millis(20));
        match poll_once(&mut tick) {
            Poll::Ready(Ok(time)) => {
                assert_eq!(time.frame, 2);
                assert_eq!(time.delta, Duration::from_millis(20));
            }
            other => panic!("unexpected poll result: {:?}", other),
        }
    }

    #[test]
    fn test_close_fails_pending_ticks() {
        let scheduler = TickScheduler::new();
        let mut tick = scheduler.next_tick();
        assert!(poll_once(&mut tick).is_pending());

        scheduler.close();
        assert!(scheduler.is_closed());
        assert_eq!(scheduler.pending(), 0);
        assert!(matches!(poll_once(&mut tick), Poll::Ready(Err(RuntimeError::SchedulerClosed))));

        let mut late = scheduler.next_tick();
        assert!(matches!(poll_once(&mut late), Poll::Ready(Err(RuntimeError::SchedulerClosed))));
        assert_eq!(scheduler.drain_once(FRAME), 0);
    }

    #[test]
    fn test_each_continuation_runs_once() {
        let scheduler = TickScheduler::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        scheduler.schedule(move || c.set(c.get() + 1));

        scheduler.drain_once(FRAME);
        scheduler.drain_once(FRAME);
        scheduler.drain_once(FRAME);
        assert_eq!(count.get(), 1);
        assert_eq!(scheduler.frame(), 3);
    }
}
