use crate::event_wait::{EventWait, EventWaker};
use log::{debug, error, trace};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use thiserror::Error;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Dispatcher has been stopped")]
    Stopped,
    #[error("Task loop is already running")]
    LoopAlreadyStarted,
    #[error("Task was dropped before it could run")]
    Cancelled,
    #[error("Value can only be accessed from its loop thread")]
    WrongThread,
    #[error("Value is already borrowed on the loop thread")]
    AlreadyBorrowed,
    #[error("Value has already been released")]
    Released,
    #[error("Native event source failed: {0}")]
    EventSource(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

struct DispatcherShared {
    tasks: Mutex<Vec<Task>>,
    running: AtomicBool,
    loop_started: AtomicBool,
    loop_thread: OnceLock<ThreadId>,
    waker: Arc<dyn EventWaker>,
}

/// Work queue whose tasks run on the single thread that calls [`TaskDispatcher::run_loop`].
///
/// Cloning is cheap and every clone refers to the same queue, so handles can be given to any
/// thread that needs to post work.
#[derive(Clone)]
pub struct TaskDispatcher {
    shared: Arc<DispatcherShared>,
}

impl TaskDispatcher {
    pub fn new(waker: Arc<dyn EventWaker>) -> Self {
        Self {
            shared: Arc::new(DispatcherShared {
                tasks: Mutex::new(Vec::new()),
                running: AtomicBool::new(true),
                loop_started: AtomicBool::new(false),
                loop_thread: OnceLock::new(),
                waker,
            }),
        }
    }

    /// Queues a task and wakes the loop. Tasks submitted after [`stop`](Self::stop) are dropped.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(e) = self.try_submit(task) {
            trace!("Dropping task: {e}");
        }
    }

    pub fn try_submit<F>(&self, task: F) -> DispatchResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_running() {
            return Err(DispatchError::Stopped);
        }

        self.lock_tasks().push(Box::new(task));
        self.shared.waker.post_wake();
        Ok(())
    }

    /// Runs queued tasks until the dispatcher is stopped. Must be called once, from the thread
    /// that is to become the loop thread.
    pub fn run_loop<W>(&self, events: &mut W) -> DispatchResult<()>
    where
        W: EventWait + ?Sized,
    {
        if self.shared.loop_started.swap(true, Ordering::AcqRel) {
            return Err(DispatchError::LoopAlreadyStarted);
        }
        let _ = self.shared.loop_thread.set(thread::current().id());
        debug!("Task loop started");

        let mut batch: Vec<Task> = Vec::new();
        while self.is_running() {
            // The lock is only held for the swap, so tasks are free to submit more tasks.
            std::mem::swap(&mut *self.lock_tasks(), &mut batch);

            for task in batch.drain(..) {
                if !self.is_running() {
                    break;
                }
                Self::run_task(task);
            }

            if !self.is_running() {
                break;
            }
            events.wait()?;
        }

        let dropped = self.lock_tasks().drain(..).count();
        debug!("Task loop stopped, dropped {dropped} queued task(s)");
        Ok(())
    }

    /// Permanently stops the dispatcher. A loop blocked in its native wait is not woken.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
    }

    /// Stops the dispatcher and wakes the loop so it returns promptly.
    pub fn shutdown(&self) {
        self.stop();
        self.shared.waker.post_wake();
    }

    /// Wakes a loop blocked in its native wait without queueing a task.
    pub fn wake(&self) {
        self.shared.waker.post_wake();
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn loop_thread(&self) -> Option<ThreadId> {
        self.shared.loop_thread.get().copied()
    }

    pub fn is_loop_thread(&self) -> bool {
        self.loop_thread() == Some(thread::current().id())
    }

    /// Runs `f` on the loop thread and blocks until it returns. Runs inline on the loop thread.
    pub fn run_blocking<F, R>(&self, f: F) -> DispatchResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_loop_thread() {
            return Ok(f());
        }

        let (tx, rx) = mpsc::channel();
        self.try_submit(move || {
            let _ = tx.send(f());
        })?;

        rx.recv().map_err(|_| DispatchError::Cancelled)
    }

    pub async fn run_async<F, R>(&self, f: F) -> DispatchResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_loop_thread() {
            return Ok(f());
        }

        let (tx, rx) = tokio::sync::oneshot::channel::<R>();
        self.try_submit(move || {
            let _ = tx.send(f());
        })?;

        rx.await.map_err(|_| DispatchError::Cancelled)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<Task>> {
        // No task ever runs while the queue lock is held, so a poisoned lock still holds a
        // consistent queue.
        self.shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn run_task(task: Task) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            error!("Task panicked: {}", panic_message(payload.as_ref()));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_wait::CondvarEventWait;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn new_dispatcher() -> (TaskDispatcher, CondvarEventWait) {
        let events = CondvarEventWait::new();
        (TaskDispatcher::new(events.waker()), events)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < TIMEOUT {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    fn spawn_loop(
        dispatcher: &TaskDispatcher,
        mut events: CondvarEventWait,
    ) -> thread::JoinHandle<DispatchResult<()>> {
        let dispatcher = dispatcher.clone();
        thread::spawn(move || dispatcher.run_loop(&mut events))
    }

    #[test]
    fn test_runs_pre_submitted_tasks_in_order() {
        let (dispatcher, mut events) = new_dispatcher();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["T1", "T2", "T3"] {
            let order = order.clone();
            dispatcher.submit(move || order.lock().unwrap().push(name));
        }
        let stopper = dispatcher.clone();
        dispatcher.submit(move || stopper.stop());

        dispatcher.run_loop(&mut events).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["T1", "T2", "T3"]);
    }

    #[test]
    fn test_submit_wakes_blocked_loop() {
        let (dispatcher, events) = new_dispatcher();
        let handle = spawn_loop(&dispatcher, events);

        // Give the loop time to block in its wait.
        thread::sleep(Duration::from_millis(50));

        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = flag.clone();
        let producer = dispatcher.clone();
        thread::spawn(move || producer.submit(move || flag_clone.store(true, Ordering::SeqCst)))
            .join()
            .unwrap();

        assert!(wait_until(|| flag.load(Ordering::SeqCst)));
        dispatcher.shutdown();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_stop_leaves_blocked_loop_waiting_until_woken() {
        let (dispatcher, events) = new_dispatcher();
        let (ready_tx, ready_rx) = mpsc::channel();
        dispatcher.submit(move || ready_tx.send(()).unwrap());
        let handle = spawn_loop(&dispatcher, events);

        ready_rx.recv_timeout(TIMEOUT).unwrap();
        thread::sleep(Duration::from_millis(100));

        dispatcher.stop();
        thread::sleep(Duration::from_millis(100));
        assert!(!handle.is_finished());

        dispatcher.wake();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_submit_after_stop_never_runs() {
        let (dispatcher, events) = new_dispatcher();
        dispatcher.stop();

        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = flag.clone();
        dispatcher.submit(move || flag_clone.store(true, Ordering::SeqCst));

        let handle = spawn_loop(&dispatcher, events);
        handle.join().unwrap().unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_try_submit_reports_stopped() {
        let (dispatcher, _events) = new_dispatcher();
        dispatcher.stop();
        assert_eq!(dispatcher.try_submit(|| {}), Err(DispatchError::Stopped));
    }

    #[test]
    fn test_nested_submit_runs_in_later_iteration() {
        let (dispatcher, mut events) = new_dispatcher();
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_dispatcher = dispatcher.clone();
        let outer_log = log.clone();
        dispatcher.submit(move || {
            outer_log.lock().unwrap().push("outer start");
            let inner_log = outer_log.clone();
            let stopper = inner_dispatcher.clone();
            inner_dispatcher.submit(move || {
                inner_log.lock().unwrap().push("inner");
                stopper.stop();
            });
            outer_log.lock().unwrap().push("outer end");
        });
        // Queued in the same batch as the outer task, so it must run before the inner one.
        let sibling_log = log.clone();
        dispatcher.submit(move || sibling_log.lock().unwrap().push("sibling"));

        dispatcher.run_loop(&mut events).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer start", "outer end", "sibling", "inner"]
        );
    }

    #[test]
    fn test_stop_mid_batch_skips_remaining_tasks() {
        let (dispatcher, mut events) = new_dispatcher();
        let count = Arc::new(AtomicUsize::new(0));

        let first = count.clone();
        dispatcher.submit(move || {
            first.fetch_add(1, Ordering::SeqCst);
        });
        let stopper = dispatcher.clone();
        dispatcher.submit(move || stopper.stop());
        let last = count.clone();
        dispatcher.submit(move || {
            last.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.run_loop(&mut events).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_every_task_from_many_producers_runs_once() {
        let (dispatcher, events) = new_dispatcher();
        let handle = spawn_loop(&dispatcher, events);
        let count = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                let count = count.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        let count = count.clone();
                        dispatcher.submit(move || {
                            count.fetch_add(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        assert!(wait_until(|| count.load(Ordering::SeqCst) == 1000));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), 1000);

        dispatcher.shutdown();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_panicking_task_does_not_stop_loop() {
        let (dispatcher, mut events) = new_dispatcher();
        let flag = Arc::new(AtomicBool::new(false));

        dispatcher.submit(|| panic!("task failure"));
        let flag_clone = flag.clone();
        let stopper = dispatcher.clone();
        dispatcher.submit(move || {
            flag_clone.store(true, Ordering::SeqCst);
            stopper.stop();
        });

        dispatcher.run_loop(&mut events).unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_run_loop_can_only_start_once() {
        let (dispatcher, mut events) = new_dispatcher();
        dispatcher.stop();
        dispatcher.run_loop(&mut events).unwrap();
        assert_eq!(
            dispatcher.run_loop(&mut events),
            Err(DispatchError::LoopAlreadyStarted)
        );
    }

    #[test]
    fn test_run_blocking_returns_value_from_loop_thread() {
        let (dispatcher, events) = new_dispatcher();
        let handle = spawn_loop(&dispatcher, events);
        let loop_thread_id = handle.thread().id();

        let ran_on = dispatcher
            .run_blocking(|| thread::current().id())
            .unwrap();
        assert_eq!(ran_on, loop_thread_id);
        assert_eq!(dispatcher.loop_thread(), Some(loop_thread_id));

        dispatcher.shutdown();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_run_blocking_runs_inline_on_loop_thread() {
        let (dispatcher, mut events) = new_dispatcher();
        let result = Arc::new(Mutex::new(None));

        let inner = dispatcher.clone();
        let result_clone = result.clone();
        dispatcher.submit(move || {
            *result_clone.lock().unwrap() = Some(inner.run_blocking(|| 42));
            inner.stop();
        });

        dispatcher.run_loop(&mut events).unwrap();
        assert_eq!(*result.lock().unwrap(), Some(Ok(42)));
    }

    #[test]
    fn test_run_blocking_after_stop_fails() {
        let (dispatcher, _events) = new_dispatcher();
        dispatcher.stop();
        assert_eq!(dispatcher.run_blocking(|| 1), Err(DispatchError::Stopped));
    }

    #[tokio::test]
    async fn test_run_async_awaits_loop_result() {
        let (dispatcher, events) = new_dispatcher();
        let handle = spawn_loop(&dispatcher, events);

        let value = dispatcher.run_async(|| "from loop".to_string()).await;
        assert_eq!(value, Ok("from loop".to_string()));

        dispatcher.shutdown();
        handle.join().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_async_reports_cancelled_task() {
        let (dispatcher, mut events) = new_dispatcher();
        // Stop from inside the first task so the queued closure is dropped unrun.
        let stopper = dispatcher.clone();
        dispatcher.submit(move || stopper.stop());

        let pending = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.run_async(|| 7).await })
        };
        while dispatcher.shared.tasks.lock().unwrap().len() < 2 {
            tokio::task::yield_now().await;
        }

        dispatcher.run_loop(&mut events).unwrap();
        assert_eq!(pending.await.unwrap(), Err(DispatchError::Cancelled));
    }
}
