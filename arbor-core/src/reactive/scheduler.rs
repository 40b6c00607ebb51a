//! Update Scheduler
//!
//! Watches that are not `sync` do not run on the mutation that triggers them.
//! They are queued here and run when the scheduler is flushed, so several
//! mutations in a row produce a single callback with the final value.
//!
//! # Algorithm
//!
//! A flush ("tick") repeats the following until both queues are empty:
//!
//! 1. Run the pre queue, ordered by subscriber id (registration order)
//! 2. Run the caller's update phase, on the first round only
//! 3. Run the post queue, ordered the same way
//!
//! Jobs queued while flushing are picked up by the next round. A job is queued
//! at most once per round no matter how many times it was triggered.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::runtime::Reactive;
use super::subscriber::SubscriberId;

/// Upper bound on flush rounds before we assume a watch keeps re-triggering itself.
const RECURSION_LIMIT: usize = 100;

/// The queue a job is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    /// Before the update phase.
    Pre,
    /// After the update phase.
    Post,
}

#[derive(Default)]
struct Queues {
    pre: IndexMap<SubscriberId, Rc<dyn Reactive>>,
    post: IndexMap<SubscriberId, Rc<dyn Reactive>>,
    flushing: bool,
}

impl Queues {
    fn queue_mut(&mut self, queue: Queue) -> &mut IndexMap<SubscriberId, Rc<dyn Reactive>> {
        match queue {
            Queue::Pre => &mut self.pre,
            Queue::Post => &mut self.post,
        }
    }
}

thread_local! {
    static QUEUES: RefCell<Queues> = RefCell::new(Queues::default());
}

/// Resets the flushing flag even if a job panics.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = QUEUES.try_with(|q| q.borrow_mut().flushing = false);
    }
}

/// Batches watch jobs until the next tick.
pub struct Scheduler;

impl Scheduler {
    /// Queue a job. Queuing the same subscriber twice before a flush is a no-op.
    pub fn enqueue(queue: Queue, job: Rc<dyn Reactive>) {
        QUEUES.with(|q| {
            q.borrow_mut()
                .queue_mut(queue)
                .entry(job.subscriber_id())
                .or_insert(job);
        });
    }

    /// Number of jobs waiting in both queues.
    pub fn pending() -> usize {
        QUEUES.with(|q| {
            let q = q.borrow();
            q.pre.len() + q.post.len()
        })
    }

    pub fn is_flushing() -> bool {
        QUEUES.with(|q| q.borrow().flushing)
    }

    fn take(queue: Queue) -> Vec<Rc<dyn Reactive>> {
        let mut jobs: Vec<(SubscriberId, Rc<dyn Reactive>)> =
            QUEUES.with(|q| q.borrow_mut().queue_mut(queue).drain(..).collect());
        jobs.sort_by_key(|(id, _)| *id);
        jobs.into_iter().map(|(_, job)| job).collect()
    }

    /// Run all queued jobs.
    pub fn flush() {
        Self::flush_with(|| {});
    }

    /// Run all queued jobs, calling `update` between the pre and post queues.
    ///
    /// A flush requested from inside a running flush only runs `update`; the
    /// outer flush picks up whatever was queued.
    pub fn flush_with(update: impl FnOnce()) {
        let started = QUEUES.with(|q| {
            let mut q = q.borrow_mut();
            if q.flushing {
                false
            } else {
                q.flushing = true;
                true
            }
        });
        if !started {
            update();
            return;
        }
        let _guard = FlushGuard;

        let mut update = Some(update);
        let mut rounds = 0;
        loop {
            let pre = Self::take(Queue::Pre);
            tracing::trace!(jobs = pre.len(), "flush pre queue");
            for job in pre {
                job.run();
            }

            if let Some(update) = update.take() {
                update();
            }

            let post = Self::take(Queue::Post);
            tracing::trace!(jobs = post.len(), "flush post queue");
            for job in post {
                job.run();
            }

            if Self::pending() == 0 {
                break;
            }

            rounds += 1;
            if rounds >= RECURSION_LIMIT {
                tracing::warn!(
                    pending = Self::pending(),
                    "maximum recursive updates exceeded, dropping queued watch jobs"
                );
                QUEUES.with(|q| {
                    let mut q = q.borrow_mut();
                    q.pre.clear();
                    q.post.clear();
                });
                break;
            }
        }
    }
}

/// Run every pending watch callback.
pub fn tick() {
    Scheduler::flush();
}

/// Run pending pre-flush callbacks, then `update`, then post-flush callbacks.
pub fn tick_with(update: impl FnOnce()) {
    Scheduler::flush_with(update);
}
