//! Session object driving procedures and systems from the host frame callback.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::config::RuntimeConfig;
use crate::resolver::NodeResolver;
use crate::scheduler::{FrameTime, TaskHandle, TaskPool, TickScheduler};
use crate::wait::ConditionWaiter;
use crate::world::SceneWorld;

/// Per-frame callback with mutable access to the world
pub type System<W> = Box<dyn FnMut(&mut W, FrameTime)>;

type SystemQueue<W> = Rc<RefCell<Vec<System<W>>>>;

/// Everything a scene procedure needs, cheap to clone into a task
pub struct SceneContext<W: SceneWorld> {
    pub world: Rc<RefCell<W>>,
    pub waiter: ConditionWaiter,
    pub resolver: NodeResolver<W>,
    pub config: RuntimeConfig,
    incoming: SystemQueue<W>,
}

impl<W: SceneWorld> Clone for SceneContext<W> {
    fn clone(&self) -> Self {
        Self {
            world: self.world.clone(),
            waiter: self.waiter.clone(),
            resolver: self.resolver.clone(),
            config: self.config.clone(),
            incoming: self.incoming.clone(),
        }
    }
}

impl<W: SceneWorld> SceneContext<W> {
    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout()
    }

    /// Register a system from inside a procedure
    ///
    /// It joins the runtime's systems on the current frame, after the ones
    /// already registered.
    pub fn add_system(&self, system: impl FnMut(&mut W, FrameTime) + 'static) {
        self.incoming.borrow_mut().push(Box::new(system));
    }
}

/// One scene session: world, scheduler, procedures and systems
///
/// Each frame callback drains the scheduler, polls the procedures it woke,
/// then runs systems in registration order.
pub struct SceneRuntime<W: SceneWorld> {
    world: Rc<RefCell<W>>,
    scheduler: TickScheduler,
    tasks: TaskPool,
    waiter: ConditionWaiter,
    resolver: NodeResolver<W>,
    systems: Vec<System<W>>,
    incoming: SystemQueue<W>,
    config: RuntimeConfig,
}

impl<W: SceneWorld + 'static> SceneRuntime<W> {
    pub fn new(world: W, config: RuntimeConfig) -> Self {
        Self::with_shared_world(Rc::new(RefCell::new(world)), config)
    }

    /// Build a runtime around a world the caller keeps a handle to
    pub fn with_shared_world(world: Rc<RefCell<W>>, config: RuntimeConfig) -> Self {
        let scheduler = TickScheduler::new();
        let waiter = ConditionWaiter::with_defaults(scheduler.clone(), config.wait_options());
        let resolver = NodeResolver::new(world.clone(), waiter.clone());
        debug!(
            "Scene runtime created (timeout {} ms, poll every {} frame(s))",
            config.default_timeout_ms, config.poll_interval_frames
        );
        Self {
            world,
            scheduler,
            tasks: TaskPool::new(),
            waiter,
            resolver,
            systems: Vec::new(),
            incoming: Rc::new(RefCell::new(Vec::new())),
            config,
        }
    }

    pub fn world(&self) -> &Rc<RefCell<W>> {
        &self.world
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn waiter(&self) -> &ConditionWaiter {
        &self.waiter
    }

    pub fn resolver(&self) -> &NodeResolver<W> {
        &self.resolver
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn context(&self) -> SceneContext<W> {
        SceneContext {
            world: self.world.clone(),
            waiter: self.waiter.clone(),
            resolver: self.resolver.clone(),
            config: self.config.clone(),
            incoming: self.incoming.clone(),
        }
    }

    /// Start a procedure and run it up to its first suspension
    pub fn spawn<F, T>(&self, procedure: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        let handle = self.tasks.spawn(procedure);
        self.tasks.run_until_stalled();
        handle
    }

    /// Register a system run once per frame after procedures resume
    pub fn add_system(&mut self, system: impl FnMut(&mut W, FrameTime) + 'static) {
        self.systems.push(Box::new(system));
    }

    /// Unfinished procedures
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Host frame callback
    ///
    /// # Arguments
    /// * `delta_seconds` - Seconds since the previous frame; negative or
    ///   non-finite values count as zero
    pub fn on_frame(&mut self, delta_seconds: f32) -> FrameTime {
        let delta = Duration::try_from_secs_f32(delta_seconds).unwrap_or(Duration::ZERO);
        self.advance(delta)
    }

    /// Same as [`SceneRuntime::on_frame`] with a [`Duration`]
    pub fn advance(&mut self, delta: Duration) -> FrameTime {
        let resumed = self.scheduler.drain_once(delta);
        let polled = self.tasks.run_until_stalled();
        let time = FrameTime {
            frame: self.scheduler.frame(),
            delta,
        };

        self.systems.append(&mut self.incoming.borrow_mut());
        {
            let mut world = self.world.borrow_mut();
            for system in &mut self.systems {
                system(&mut world, time);
            }
        }

        trace!(
            "Frame {}: resumed {}, polled {}, {} task(s) pending",
            time.frame,
            resumed,
            polled,
            self.tasks.len()
        );
        time
    }

    /// Close the session; pending waits fail with `SchedulerClosed`
    ///
    /// Procedures get one last poll to observe the failure, then every task
    /// and system is dropped.
    pub fn shutdown(&mut self) {
        if self.scheduler.is_closed() {
            return;
        }
        self.scheduler.close();
        self.tasks.run_until_stalled();
        self.tasks.clear();
        self.systems.clear();
        self.incoming.borrow_mut().clear();
        debug!("Scene runtime shut down after {} frame(s)", self.scheduler.frame());
    }
}

impl<W: SceneWorld> Drop for SceneRuntime<W> {
    fn drop(&mut self) {
        self.scheduler.close();
        self.tasks.clear();
    }
}
