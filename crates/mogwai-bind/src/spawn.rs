//! Spawn local async operations.
//!
//! In the browser tasks run on the JS microtask queue. Everywhere else they run on a
//! thread-local executor that is driven explicitly with [`run_until_stalled`].
use std::future::Future;

/// Spawn a fire-and-forget local task.
#[cfg(target_arch = "wasm32")]
pub fn spawn_local<Fut>(fut: Fut)
where
    Fut: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(fut)
}

#[cfg(not(target_arch = "wasm32"))]
thread_local! {
    static EXECUTOR: async_executor::LocalExecutor<'static> = async_executor::LocalExecutor::new();
}

/// Spawn a fire-and-forget local task.
///
/// The task makes progress whenever [`run_until_stalled`] is called on this thread.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_local<Fut>(fut: Fut)
where
    Fut: Future<Output = ()> + 'static,
{
    EXECUTOR.with(|executor| executor.spawn(fut).detach());
}

/// Run spawned tasks until none of them can make progress.
///
/// Returns the number of task polls.
#[cfg(not(target_arch = "wasm32"))]
pub fn run_until_stalled() -> usize {
    let mut ticks = 0;
    while EXECUTOR.with(|executor| executor.try_tick()) {
        ticks += 1;
    }
    ticks
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod test {
    use std::{cell::Cell, rc::Rc};

    use super::*;

    #[test]
    fn tasks_run_when_driven() {
        let done = Rc::new(Cell::new(0));
        spawn_local({
            let done = done.clone();
            async move {
                futures_lite::future::yield_now().await;
                done.set(done.get() + 1);
            }
        });
        assert_eq!(done.get(), 0);
        assert!(run_until_stalled() >= 2);
        assert_eq!(done.get(), 1);
        assert_eq!(run_until_stalled(), 0);
    }

    #[test]
    fn tasks_may_spawn_tasks() {
        let done = Rc::new(Cell::new(false));
        spawn_local({
            let done = done.clone();
            async move {
                spawn_local(async move { done.set(true) });
            }
        });
        run_until_stalled();
        assert!(done.get());
    }
}
