#![forbid(unsafe_code)]

//! Cooperative queue for deferred validation and submission work.
//!
//! Futures are lazy: nothing a validator or submit handler defers makes
//! progress until the queue is polled through
//! [`Form::run_until_stalled`](crate::Form::run_until_stalled) or
//! [`Form::settled`](crate::Form::settled).
//!
//! # Invariants
//!
//! 1. While polling, the task set is moved out of the queue, so a task that
//!    enqueues more work never observes a held borrow.
//! 2. Tasks enqueued during a poll are merged back and polled in the same
//!    call before it returns.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::task::{Context, Poll};

use futures_util::StreamExt;
use futures_util::future::LocalBoxFuture;
use futures_util::stream::FuturesUnordered;

type Task = LocalBoxFuture<'static, ()>;

#[derive(Default)]
pub(crate) struct TaskQueue {
    tasks: RefCell<FuturesUnordered<Task>>,
    /// Tasks moved out for polling.
    in_flight: Cell<usize>,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, task: Task) {
        self.tasks.borrow_mut().push(task);
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.borrow().len() + self.in_flight.get()
    }

    /// Poll until no task can make progress. Returns how many remain.
    pub(crate) fn poll_tasks(&self, cx: &mut Context<'_>) -> usize {
        loop {
            let mut polling = mem::take(&mut *self.tasks.borrow_mut());
            if polling.is_empty() {
                return 0;
            }
            self.in_flight.set(polling.len());
            let mut completed = 0usize;
            while let Poll::Ready(Some(())) = polling.poll_next_unpin(cx) {
                completed += 1;
                self.in_flight.set(polling.len());
            }
            self.in_flight.set(0);

            let mut tasks = self.tasks.borrow_mut();
            let added = mem::take(&mut *tasks);
            let grew = !added.is_empty();
            polling.extend(added);
            let remaining = polling.len();
            *tasks = polling;
            drop(tasks);

            tracing::trace!(message = "pending.poll", completed, remaining, grew);
            if !grew {
                return remaining;
            }
        }
    }

    /// Poll once with a waker that does nothing.
    pub(crate) fn run_until_stalled(&self) -> usize {
        let mut cx = Context::from_waker(futures_util::task::noop_waker_ref());
        self.poll_tasks(&mut cx)
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::rc::Rc;

    #[test]
    fn empty_queue_is_settled() {
        let queue = TaskQueue::new();
        assert_eq!(queue.run_until_stalled(), 0);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn ready_tasks_complete() {
        let queue = TaskQueue::new();
        let hits = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let hits = Rc::clone(&hits);
            queue.push(async move { hits.set(hits.get() + 1) }.boxed_local());
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.run_until_stalled(), 0);
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn blocked_task_stays_pending_until_released() {
        let queue = TaskQueue::new();
        let (tx, rx) = async_channel::bounded::<u8>(1);
        let got = Rc::new(Cell::new(None));
        let sink = Rc::clone(&got);
        queue.push(
            async move {
                sink.set(rx.recv().await.ok());
            }
            .boxed_local(),
        );
        assert_eq!(queue.run_until_stalled(), 1);
        tx.try_send(7).expect("channel has room");
        assert_eq!(queue.run_until_stalled(), 0);
        assert_eq!(got.get(), Some(7));
    }

    #[test]
    fn tasks_enqueued_while_polling_run_in_same_call() {
        let queue = Rc::new(TaskQueue::new());
        let hits = Rc::new(Cell::new(0));
        let inner_queue = Rc::clone(&queue);
        let inner_hits = Rc::clone(&hits);
        queue.push(
            async move {
                let hits = Rc::clone(&inner_hits);
                assert_eq!(inner_queue.len(), 1, "in-flight task is counted");
                inner_queue.push(async move { hits.set(hits.get() + 1) }.boxed_local());
                inner_hits.set(inner_hits.get() + 1);
            }
            .boxed_local(),
        );
        assert_eq!(queue.run_until_stalled(), 0);
        assert_eq!(hits.get(), 2);
    }
}
