use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Wake, Waker};

use tracing::trace;

use crate::error::{Result, RuntimeError};

type LocalTask = Pin<Box<dyn Future<Output = ()>>>;
type ReadyQueue = Arc<Mutex<VecDeque<u64>>>;

/// Waker that queues its task id for the next poll pass
struct TaskWaker {
    id: u64,
    ready: ReadyQueue,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let mut ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        if !ready.contains(&self.id) {
            ready.push_back(self.id);
        }
    }
}

struct JoinState<T> {
    result: Option<T>,
    finished: bool,
    abandoned: bool,
    waker: Option<Waker>,
}

/// Task side of a [`TaskHandle`]; marks the task abandoned if dropped before completion
struct Completion<T> {
    join: Rc<RefCell<JoinState<T>>>,
    done: bool,
}

impl<T> Completion<T> {
    fn complete(mut self, value: T) {
        let waker = {
            let mut join = self.join.borrow_mut();
            join.result = Some(value);
            join.finished = true;
            join.waker.take()
        };
        self.done = true;
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let waker = {
            let mut join = self.join.borrow_mut();
            join.abandoned = true;
            join.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Handle to a task spawned on a [`TaskPool`]
///
/// Awaiting the handle yields the task output, or `SchedulerClosed` if the pool
/// dropped the task before it finished.
pub struct TaskHandle<T> {
    join: Rc<RefCell<JoinState<T>>>,
}

impl<T> TaskHandle<T> {
    pub fn is_finished(&self) -> bool {
        self.join.borrow().finished
    }

    /// True if the task was dropped before producing a value
    pub fn is_abandoned(&self) -> bool {
        self.join.borrow().abandoned
    }

    /// Take the output of a finished task
    pub fn try_take(&self) -> Option<T> {
        self.join.borrow_mut().result.take()
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut join = self.join.borrow_mut();
        if let Some(value) = join.result.take() {
            return Poll::Ready(Ok(value));
        }
        if join.finished {
            return Poll::Ready(Err(RuntimeError::Assertion(
                "task output was already taken".to_string(),
            )));
        }
        if join.abandoned {
            return Poll::Ready(Err(RuntimeError::SchedulerClosed));
        }
        join.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

struct PoolState {
    tasks: RefCell<HashMap<u64, LocalTask>>,
    ready: ReadyQueue,
    next_id: Cell<u64>,
    running: Cell<bool>,
}

struct RunGuard<'a>(&'a Cell<bool>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Single-threaded executor for scene procedures
///
/// Tasks are polled only from [`TaskPool::run_until_stalled`], in the order
/// their wakers fired. Nothing here is `Send`; the pool lives on the thread
/// that drives the frame callback.
#[derive(Clone)]
pub struct TaskPool {
    state: Rc<PoolState>,
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskPool {
    pub fn new() -> Self {
        Self {
            state: Rc::new(PoolState {
                tasks: RefCell::new(HashMap::new()),
                ready: Arc::new(Mutex::new(VecDeque::new())),
                next_id: Cell::new(1),
                running: Cell::new(false),
            }),
        }
    }

    /// Queue a future for polling and return a handle to its output
    ///
    /// The task is not polled until the next [`TaskPool::run_until_stalled`].
    pub fn spawn<F, T>(&self, future: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        let join = Rc::new(RefCell::new(JoinState {
            result: None,
            finished: false,
            abandoned: false,
            waker: None,
        }));
        let completion = Completion {
            join: join.clone(),
            done: false,
        };

        let id = self.state.next_id.get();
        self.state.next_id.set(id + 1);

        let task: LocalTask = Box::pin(async move {
            let value = future.await;
            completion.complete(value);
        });
        self.state.tasks.borrow_mut().insert(id, task);
        self.push_ready(id);
        trace!("Spawned task {}", id);

        TaskHandle { join }
    }

    /// Poll woken tasks until none is ready
    ///
    /// A call made from inside a running task returns 0 immediately.
    ///
    /// # Returns
    /// The number of polls performed
    pub fn run_until_stalled(&self) -> usize {
        if self.state.running.get() {
            return 0;
        }
        self.state.running.set(true);
        let _guard = RunGuard(&self.state.running);

        let mut polled = 0;
        loop {
            let next = self
                .state
                .ready
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(id) = next else {
                break;
            };

            // Removed while polling so the task may spawn onto this pool
            let Some(mut task) = self.state.tasks.borrow_mut().remove(&id) else {
                continue;
            };

            let waker = Waker::from(Arc::new(TaskWaker {
                id,
                ready: self.state.ready.clone(),
            }));
            let mut cx = Context::from_waker(&waker);
            polled += 1;

            match task.as_mut().poll(&mut cx) {
                Poll::Ready(()) => trace!("Task {} finished", id),
                Poll::Pending => {
                    self.state.tasks.borrow_mut().insert(id, task);
                }
            }
        }
        polled
    }

    /// Drop every task, finished or not
    pub fn clear(&self) {
        let tasks = std::mem::take(&mut *self.state.tasks.borrow_mut());
        if !tasks.is_empty() {
            trace!("Dropping {} unfinished task(s)", tasks.len());
        }
        drop(tasks);
        self.state
            .ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of unfinished tasks
    pub fn len(&self) -> usize {
        self.state.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_ready(&self, id: u64) {
        let mut ready = self.state.ready.lock().unwrap_or_else(PoisonError::into_inner);
        if !ready.contains(&id) {
            ready.push_back(id);
        }
    }
}
