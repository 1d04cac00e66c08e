use crate::dispatcher::{DispatchError, DispatchResult, TaskDispatcher};
use log::warn;
use std::cell::RefCell;
use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// A value pinned to the dispatcher's loop thread, such as a GPU or raster surface that must
/// not move between threads.
pub struct LoopBound<T: 'static> {
    /// # Safety
    /// `RefCell` instead of `Mutex`: the value is only ever touched on `thread_id`, which every
    /// accessor checks before borrowing. Wrapped in `Option` so the owner can release it early.
    /// Only taken in `drop`.
    inner: ManuallyDrop<Arc<RefCell<Option<T>>>>,
    thread_id: ThreadId,
    dispatcher: TaskDispatcher,
}

/// # Safety
/// Handles may travel between threads, but the inner value is only borrowed or dropped on the
/// owning thread.
unsafe impl<T> Send for LoopBound<T> {}
unsafe impl<T> Sync for LoopBound<T> {}

impl<T> LoopBound<T> {
    /// Pins `value` to the current thread, which must be the thread that runs (or is about to
    /// run) the dispatcher's loop.
    pub fn new(dispatcher: TaskDispatcher, value: T) -> DispatchResult<Self> {
        let thread_id = thread::current().id();
        if dispatcher.loop_thread().is_some_and(|id| id != thread_id) {
            return Err(DispatchError::WrongThread);
        }

        Ok(Self {
            inner: ManuallyDrop::new(Arc::new(RefCell::new(Some(value)))),
            thread_id,
            dispatcher,
        })
    }

    pub fn is_owner_thread(&self) -> bool {
        self.thread_id == thread::current().id()
    }

    /// Borrows the value. Only succeeds on the owning thread.
    pub fn with<F, R>(&self, accessor: F) -> DispatchResult<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        if !self.is_owner_thread() {
            return Err(DispatchError::WrongThread);
        }

        let mut value = self
            .inner
            .try_borrow_mut()
            .map_err(|_| DispatchError::AlreadyBorrowed)?;
        let value = value.as_mut().ok_or(DispatchError::Released)?;
        Ok(accessor(value))
    }

    /// Takes the value out so it is dropped here, on the owning thread. Every handle sees
    /// [`DispatchError::Released`] afterwards.
    pub fn release(&self) -> DispatchResult<Option<T>> {
        if !self.is_owner_thread() {
            return Err(DispatchError::WrongThread);
        }

        let mut value = self
            .inner
            .try_borrow_mut()
            .map_err(|_| DispatchError::AlreadyBorrowed)?;
        Ok(value.take())
    }

    /// Runs `accessor` now when called on the owning thread, otherwise queues it on the loop.
    pub fn access<F>(&self, accessor: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        if self.is_owner_thread() {
            if let Err(e) = self.with(accessor) {
                warn!("Could not access loop-bound value: {e}");
            }
            return;
        }

        let lock = self.clone();
        self.dispatcher.submit(move || {
            if let Err(e) = lock.with(accessor) {
                warn!("Could not access loop-bound value: {e}");
            }
        });
    }

    pub async fn access_async<F, R>(&self, accessor: F) -> DispatchResult<R>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_owner_thread() {
            return self.with(accessor);
        }

        let lock = self.clone();
        self.dispatcher
            .run_async(move || lock.with(accessor))
            .await?
    }
}

/// # Safety
/// `Arc::into_inner` hands the cell to exactly one handle, the last one dropped. When that
/// happens off the owning thread the value is sent to the loop, so `T` is always dropped where
/// it was created.
impl<T> Drop for LoopBound<T> {
    fn drop(&mut self) {
        // `inner` is never used again after this.
        let inner = unsafe { ManuallyDrop::take(&mut self.inner) };
        let Some(cell) = Arc::into_inner(inner) else {
            return;
        };
        let Some(value) = cell.into_inner() else {
            return;
        };
        if self.is_owner_thread() {
            drop(value);
            return;
        }

        let orphan = Orphan {
            value: Some(value),
            thread_id: self.thread_id,
        };
        // A rejected task is dropped right here, and the orphan leaks its value.
        self.dispatcher.submit(move || drop(orphan));
    }
}

/// A loop-bound value on its way back to the loop thread.
struct Orphan<T> {
    value: Option<T>,
    thread_id: ThreadId,
}

/// # Safety
/// The value is only dropped on `thread_id`, and leaked anywhere else.
unsafe impl<T> Send for Orphan<T> {}

impl<T> Drop for Orphan<T> {
    fn drop(&mut self) {
        if self.thread_id == thread::current().id() {
            return;
        }
        if let Some(value) = self.value.take() {
            warn!("Loop has stopped, leaking loop-bound value");
            std::mem::forget(value);
        }
    }
}

impl<T> Clone for LoopBound<T> {
    fn clone(&self) -> Self {
        Self {
            inner: ManuallyDrop::new(Arc::clone(&*self.inner)),
            thread_id: self.thread_id,
            dispatcher: self.dispatcher.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_wait::{CondvarEventWait, EventWait};
    use std::rc::Rc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Barrier};
    use std::time::Duration;

    fn new_dispatcher() -> (TaskDispatcher, CondvarEventWait) {
        let events = CondvarEventWait::new();
        (TaskDispatcher::new(events.waker()), events)
    }

    struct DropFlag {
        dropped_on: Arc<std::sync::Mutex<Option<ThreadId>>>,
    }

    impl Drop for DropFlag {
        fn drop(&mut self) {
            *self.dropped_on.lock().unwrap() = Some(thread::current().id());
        }
    }

    #[test]
    fn test_with_on_owner_thread() {
        let (dispatcher, _events) = new_dispatcher();
        let bound = LoopBound::new(dispatcher, Rc::new(5)).unwrap();
        assert_eq!(bound.with(|value| **value + 1), Ok(6));
    }

    #[test]
    fn test_with_on_other_thread_fails() {
        let (dispatcher, _events) = new_dispatcher();
        let bound = LoopBound::new(dispatcher, 5).unwrap();
        let result = thread::scope(|s| s.spawn(|| bound.with(|value| *value)).join().unwrap());
        assert_eq!(result, Err(DispatchError::WrongThread));
    }

    #[test]
    fn test_reentrant_borrow_fails() {
        let (dispatcher, _events) = new_dispatcher();
        let bound = LoopBound::new(dispatcher, 0).unwrap();
        let nested = bound.with(|_| bound.with(|value| *value)).unwrap();
        assert_eq!(nested, Err(DispatchError::AlreadyBorrowed));
    }

    #[test]
    fn test_access_from_other_thread_runs_on_loop() {
        let (dispatcher, mut events) = new_dispatcher();
        let bound = LoopBound::new(dispatcher.clone(), Vec::<u32>::new()).unwrap();

        let remote = bound.clone();
        let stopper = dispatcher.clone();
        thread::spawn(move || {
            remote.access(|values| values.push(1));
            remote.access(move |values| {
                values.push(2);
                stopper.stop();
            });
        })
        .join()
        .unwrap();

        dispatcher.run_loop(&mut events).unwrap();
        assert_eq!(bound.with(|values| values.clone()), Ok(vec![1, 2]));
    }

    #[test]
    fn test_drop_off_thread_is_deferred_to_loop() {
        let (dispatcher, mut events) = new_dispatcher();
        let dropped_on = Arc::new(std::sync::Mutex::new(None));
        let bound = LoopBound::new(
            dispatcher.clone(),
            DropFlag {
                dropped_on: dropped_on.clone(),
            },
        )
        .unwrap();

        thread::spawn(move || drop(bound)).join().unwrap();
        assert!(dropped_on.lock().unwrap().is_none());

        let stopper = dispatcher.clone();
        dispatcher.submit(move || stopper.stop());
        dispatcher.run_loop(&mut events).unwrap();
        assert_eq!(*dropped_on.lock().unwrap(), Some(thread::current().id()));
    }

    #[test]
    fn test_concurrent_drops_off_thread_hand_value_back_once() {
        let (dispatcher, mut events) = new_dispatcher();
        let mut flags = Vec::new();

        for _ in 0..100 {
            let dropped_on = Arc::new(std::sync::Mutex::new(None));
            let first = LoopBound::new(
                dispatcher.clone(),
                DropFlag {
                    dropped_on: dropped_on.clone(),
                },
            )
            .unwrap();
            let second = first.clone();

            let barrier = Arc::new(Barrier::new(2));
            let threads: Vec<_> = [first, second]
                .into_iter()
                .map(|bound| {
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        drop(bound);
                    })
                })
                .collect();
            for handle in threads {
                handle.join().unwrap();
            }
            flags.push(dropped_on);
        }
        assert!(flags.iter().all(|flag| flag.lock().unwrap().is_none()));

        let stopper = dispatcher.clone();
        dispatcher.submit(move || stopper.stop());
        dispatcher.run_loop(&mut events).unwrap();

        let loop_thread = Some(thread::current().id());
        assert!(flags.iter().all(|flag| *flag.lock().unwrap() == loop_thread));
    }

    #[test]
    fn test_new_off_loop_thread_fails() {
        let (dispatcher, events) = new_dispatcher();
        let (ready_tx, ready_rx) = mpsc::channel();
        let loop_dispatcher = dispatcher.clone();
        let handle = thread::spawn(move || {
            let mut events = events;
            loop_dispatcher.submit(move || ready_tx.send(()).unwrap());
            loop_dispatcher.run_loop(&mut events)
        });
        ready_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(matches!(
            LoopBound::new(dispatcher.clone(), 1),
            Err(DispatchError::WrongThread)
        ));

        dispatcher.shutdown();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_release_drops_value_on_owner_thread() {
        let (dispatcher, _events) = new_dispatcher();
        let dropped_on = Arc::new(std::sync::Mutex::new(None));
        let bound = LoopBound::new(
            dispatcher.clone(),
            DropFlag {
                dropped_on: dropped_on.clone(),
            },
        )
        .unwrap();
        let remote = bound.clone();

        drop(bound.release().unwrap());
        assert_eq!(*dropped_on.lock().unwrap(), Some(thread::current().id()));
        assert!(matches!(bound.with(|_| ()), Err(DispatchError::Released)));

        // The last handle going away elsewhere has nothing left to hand back.
        dispatcher.stop();
        drop(bound);
        thread::spawn(move || drop(remote)).join().unwrap();
    }

    #[tokio::test]
    async fn test_access_async_on_owner_thread() {
        let (dispatcher, _events) = new_dispatcher();
        let bound = LoopBound::new(dispatcher, String::from("frame")).unwrap();
        let len = bound.access_async(|value| value.len()).await;
        assert_eq!(len, Ok(5));
    }

    #[test]
    fn test_drop_after_stop_leaks_instead_of_dropping_off_thread() {
        let (dispatcher, _events) = new_dispatcher();
        let dropped = Arc::new(AtomicBool::new(false));

        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let bound = LoopBound::new(dispatcher.clone(), Flag(dropped.clone())).unwrap();
        dispatcher.stop();
        thread::spawn(move || drop(bound)).join().unwrap();
        assert!(!dropped.load(Ordering::SeqCst));
    }
}
