/// Single-threaded cooperative scheduler driven by a per-tick pump.
///
/// A task is polled once per `run` with the tick's delta time and
/// suspends by returning `Poll::Pending`. Freshly spawned tasks get a
/// start poll with `dt = 0` in the same pass that spawned them, so a
/// routine's leading instant steps take effect immediately.
///
/// Cancellation is by id, by predicate over `TaskMeta`, or globally by
/// bumping the generation counter: a slot whose generation is stale is
/// dropped without ever being polled again.
use rustc_hash::FxHashMap;

/// Upper bound on start rounds per flush (a task spawning a task that
/// spawns a task...). Anything still queued waits for the next flush.
const MAX_START_ROUNDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// What a task is for. Decides which tasks a teardown or join looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// A scene's entry routine.
    Routine,
    /// A finite décor animation.
    Decor,
    /// A décor animation that never finishes on its own.
    DecorLoop,
    /// Screen cover fade.
    Cover,
    /// Textbox open/close and typing.
    Textbox,
    /// Confirm teardown and hand-off to the next scene.
    Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskMeta {
    pub kind: TaskKind,
    /// Activation that started the task; `None` for system tasks.
    pub owner: Option<u64>,
}

impl TaskMeta {
    pub fn owned(kind: TaskKind, activation: u64) -> Self {
        Self {
            kind,
            owner: Some(activation),
        }
    }

    pub fn system(kind: TaskKind) -> Self {
        Self { kind, owner: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Pending,
    Ready,
}

/// A cooperative task over a shared world `W`.
pub trait Task<W> {
    fn poll(&mut self, world: &mut W, cx: &mut Context<'_, W>) -> Poll;
}

struct Slot<W> {
    id: TaskId,
    generation: u64,
    task: Box<dyn Task<W>>,
}

/// Task registry: spawning, cancellation and liveness queries.
pub struct Spawner<W> {
    next_id: u64,
    generation: u64,
    queue: Vec<Slot<W>>,
    live: FxHashMap<TaskId, TaskMeta>,
}

impl<W> Spawner<W> {
    fn new() -> Self {
        Self {
            next_id: 1,
            generation: 0,
            queue: Vec::new(),
            live: FxHashMap::default(),
        }
    }

    /// Queue a task. It gets its start poll at the next flush.
    pub fn spawn<T>(&mut self, meta: TaskMeta, task: T) -> TaskId
    where
        T: Task<W> + 'static,
    {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.live.insert(id, meta);
        self.queue.push(Slot {
            id,
            generation: self.generation,
            task: Box::new(task),
        });
        id
    }

    /// Cancel one task. Returns false if it had already finished.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.live.remove(&id).is_some()
    }

    /// Cancel every live task whose metadata matches.
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&TaskMeta) -> bool,
    {
        let before = self.live.len();
        self.live.retain(|_, meta| !predicate(meta));
        before - self.live.len()
    }

    /// Cancel everything, including tasks no one kept an id for.
    pub fn cancel_all(&mut self) {
        self.generation += 1;
        self.live.clear();
        self.queue.clear();
    }

    pub fn is_live(&self, id: TaskId) -> bool {
        self.live.contains_key(&id)
    }

    /// True once none of `ids` is still running.
    pub fn all_done(&self, ids: &[TaskId]) -> bool {
        ids.iter().all(|id| !self.is_live(*id))
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn is_current(&self, slot: &Slot<W>) -> bool {
        slot.generation == self.generation && self.live.contains_key(&slot.id)
    }

    fn retire(&mut self, id: TaskId) {
        self.live.remove(&id);
    }
}

/// Handed to a task while it is being polled.
pub struct Context<'a, W> {
    dt: f32,
    id: TaskId,
    spawner: &'a mut Spawner<W>,
}

impl<'a, W> Context<'a, W> {
    /// Seconds elapsed since this task's previous poll (0 on the start poll).
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Id of the task being polled.
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn spawner(&mut self) -> &mut Spawner<W> {
        &mut *self.spawner
    }

    pub fn spawn<T>(&mut self, meta: TaskMeta, task: T) -> TaskId
    where
        T: Task<W> + 'static,
    {
        self.spawner.spawn(meta, task)
    }

    pub fn all_done(&self, ids: &[TaskId]) -> bool {
        self.spawner.all_done(ids)
    }
}

pub struct Scheduler<W> {
    tasks: Vec<Slot<W>>,
    spawner: Spawner<W>,
}

impl<W> Default for Scheduler<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> Scheduler<W> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            spawner: Spawner::new(),
        }
    }

    pub fn spawner(&mut self) -> &mut Spawner<W> {
        &mut self.spawner
    }

    pub fn is_live(&self, id: TaskId) -> bool {
        self.spawner.is_live(id)
    }

    /// Number of tasks still running or waiting for their start poll.
    pub fn live_count(&self) -> usize {
        self.spawner.live_count()
    }

    /// One scheduler pass: poll every running task with `dt`, then start
    /// whatever got spawned along the way.
    pub fn run(&mut self, world: &mut W, dt: f32) {
        let mut active = std::mem::take(&mut self.tasks);
        for slot in active.iter_mut() {
            Self::poll_slot(&mut self.spawner, slot, world, dt);
        }
        let spawner = &self.spawner;
        active.retain(|slot| spawner.is_current(slot));
        self.tasks = active;
        self.flush(world);
    }

    /// Give queued tasks their start poll without advancing time.
    pub fn flush(&mut self, world: &mut W) {
        for _ in 0..MAX_START_ROUNDS {
            if self.spawner.queue.is_empty() {
                return;
            }
            let fresh = std::mem::take(&mut self.spawner.queue);
            for mut slot in fresh {
                if Self::poll_slot(&mut self.spawner, &mut slot, world, 0.0) {
                    self.tasks.push(slot);
                }
            }
        }
        if !self.spawner.queue.is_empty() {
            tracing::warn!(
                queued = self.spawner.queue.len(),
                "task start rounds exhausted, deferring to next flush"
            );
        }
    }

    /// Drop every task unconditionally.
    pub fn cancel_all(&mut self) {
        self.spawner.cancel_all();
        self.tasks.clear();
    }

    /// Returns true while the task should stay scheduled.
    fn poll_slot(spawner: &mut Spawner<W>, slot: &mut Slot<W>, world: &mut W, dt: f32) -> bool {
        if !spawner.is_current(slot) {
            return false;
        }
        let mut cx = Context {
            dt,
            id: slot.id,
            spawner: &mut *spawner,
        };
        match slot.task.poll(world, &mut cx) {
            Poll::Pending => spawner.is_current(slot),
            Poll::Ready => {
                spawner.retire(slot.id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log {
        lines: Vec<String>,
    }

    /// Finishes after `polls` polls, logging each one with its dt.
    struct Countdown {
        name: &'static str,
        polls: u32,
    }

    impl Task<Log> for Countdown {
        fn poll(&mut self, world: &mut Log, cx: &mut Context<'_, Log>) -> Poll {
            world.lines.push(format!("{} dt={}", self.name, cx.dt()));
            if self.polls <= 1 {
                return Poll::Ready;
            }
            self.polls -= 1;
            Poll::Pending
        }
    }

    /// Spawns a child on its first poll and waits for it.
    struct Parent {
        child: Option<TaskId>,
    }

    impl Task<Log> for Parent {
        fn poll(&mut self, world: &mut Log, cx: &mut Context<'_, Log>) -> Poll {
            match self.child {
                None => {
                    let id = cx.spawn(
                        TaskMeta::system(TaskKind::Decor),
                        Countdown {
                            name: "child",
                            polls: 2,
                        },
                    );
                    self.child = Some(id);
                    Poll::Pending
                }
                Some(id) if cx.all_done(&[id]) => {
                    world.lines.push("parent joined".to_string());
                    Poll::Ready
                }
                Some(_) => Poll::Pending,
            }
        }
    }

    /// Cancels everything the moment it is polled with time passing.
    struct Nuke;

    impl Task<Log> for Nuke {
        fn poll(&mut self, _world: &mut Log, cx: &mut Context<'_, Log>) -> Poll {
            if cx.dt() > 0.0 {
                cx.spawner().cancel_all();
            }
            Poll::Pending
        }
    }

    #[test]
    fn start_poll_happens_on_flush_with_zero_dt() {
        let mut log = Log::default();
        let mut sched = Scheduler::new();
        sched.spawner().spawn(
            TaskMeta::system(TaskKind::Decor),
            Countdown {
                name: "a",
                polls: 3,
            },
        );
        sched.flush(&mut log);
        assert_eq!(log.lines, vec!["a dt=0"]);
        sched.run(&mut log, 0.5);
        sched.run(&mut log, 0.5);
        assert_eq!(log.lines, vec!["a dt=0", "a dt=0.5", "a dt=0.5"]);
        assert_eq!(sched.live_count(), 0);
    }

    #[test]
    fn child_spawned_mid_pass_starts_same_pass() {
        let mut log = Log::default();
        let mut sched = Scheduler::new();
        sched
            .spawner()
            .spawn(TaskMeta::system(TaskKind::Routine), Parent { child: None });
        sched.flush(&mut log);
        assert_eq!(log.lines, vec!["child dt=0"]);
        sched.run(&mut log, 0.1);
        assert_eq!(log.lines, vec!["child dt=0", "child dt=0.1"]);
        sched.run(&mut log, 0.1);
        assert_eq!(log.lines.last().unwrap(), "parent joined");
        assert_eq!(sched.live_count(), 0);
    }

    #[test]
    fn cancel_by_id_stops_polling() {
        let mut log = Log::default();
        let mut sched = Scheduler::new();
        let id = sched.spawner().spawn(
            TaskMeta::system(TaskKind::Decor),
            Countdown {
                name: "a",
                polls: 10,
            },
        );
        sched.flush(&mut log);
        assert!(sched.spawner().cancel(id));
        sched.run(&mut log, 0.1);
        assert_eq!(log.lines.len(), 1);
        assert!(!sched.is_live(id));
        assert!(!sched.spawner().cancel(id));
    }

    #[test]
    fn cancel_where_matches_owner() {
        let mut log = Log::default();
        let mut sched = Scheduler::new();
        let mine = sched.spawner().spawn(
            TaskMeta::owned(TaskKind::DecorLoop, 1),
            Countdown {
                name: "mine",
                polls: 10,
            },
        );
        let other = sched.spawner().spawn(
            TaskMeta::owned(TaskKind::DecorLoop, 2),
            Countdown {
                name: "other",
                polls: 10,
            },
        );
        sched.flush(&mut log);
        let cancelled = sched.spawner().cancel_where(|m| m.owner == Some(1));
        assert_eq!(cancelled, 1);
        assert!(!sched.is_live(mine));
        assert!(sched.is_live(other));
    }

    #[test]
    fn cancel_all_bumps_generation() {
        let mut log = Log::default();
        let mut sched = Scheduler::new();
        for name in ["a", "b"] {
            sched.spawner().spawn(
                TaskMeta::system(TaskKind::Decor),
                Countdown { name, polls: 10 },
            );
        }
        sched.flush(&mut log);
        let before = sched.spawner().generation();
        sched.cancel_all();
        assert_eq!(sched.spawner().generation(), before + 1);
        assert_eq!(sched.live_count(), 0);
        sched.run(&mut log, 0.1);
        assert_eq!(log.lines.len(), 2);
    }

    #[test]
    fn cancel_all_from_inside_a_task_drops_later_slots() {
        let mut log = Log::default();
        let mut sched = Scheduler::new();
        sched.spawner().spawn(TaskMeta::system(TaskKind::Transition), Nuke);
        sched.spawner().spawn(
            TaskMeta::system(TaskKind::Decor),
            Countdown {
                name: "late",
                polls: 10,
            },
        );
        sched.flush(&mut log);
        assert_eq!(log.lines, vec!["late dt=0"]);
        sched.run(&mut log, 0.1);
        assert_eq!(log.lines, vec!["late dt=0"]);
        assert_eq!(sched.live_count(), 0);
    }
}
