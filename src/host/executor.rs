use std::rc::Rc;

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use tracing::warn;

use super::Spawner;

/// Single-threaded executor polled once per frame by the native host.
///
/// The browser host does not need one; it hands futures to
/// `wasm_bindgen_futures::spawn_local` instead.
pub struct FrameExecutor {
    pool: LocalPool,
    spawner: LocalSpawner,
}

impl FrameExecutor {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self { pool, spawner }
    }

    pub fn spawner(&self) -> Spawner {
        let spawner = self.spawner.clone();
        Rc::new(move |fut| {
            if let Err(e) = spawner.spawn_local(fut) {
                warn!("failed to spawn task: {e}");
            }
        })
    }

    /// Poll every spawned future until none can make progress.
    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }
}

impl Default for FrameExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_spawned_future_runs_on_poll() {
        let mut exec = FrameExecutor::new();
        let hit = Rc::new(Cell::new(false));
        let flag = Rc::clone(&hit);
        (exec.spawner())(Box::pin(async move { flag.set(true) }));
        assert!(!hit.get());
        exec.run_until_stalled();
        assert!(hit.get());
    }
}
