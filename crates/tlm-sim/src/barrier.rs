//! Stage synchronization and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tlm_components::ComponentError;

/// How long a waiting thread sleeps before re-checking for a stop request.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Shared flag a host uses to stop a running simulation from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Re-arm for the next run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Stop state shared by every thread of one run.
///
/// A run stops either on user cancellation or on the first component
/// failure; only the first failure is kept.
#[derive(Debug)]
pub struct RunControl {
    cancel: CancelToken,
    failed: AtomicBool,
    failure: Mutex<Option<(String, ComponentError)>>,
}

impl RunControl {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            failed: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    pub fn should_stop(&self) -> bool {
        self.failed.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record a component failure and stop the run.
    pub fn fail(&self, component: &str, error: ComponentError) {
        let mut slot = self.failure.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            tracing::error!(component, error = %error, "component failed, stopping run");
            *slot = Some((component.to_string(), error));
        }
        self.failed.store(true, Ordering::Release);
    }

    /// The first recorded failure, if any.
    pub fn take_failure(&self) -> Option<(String, ComponentError)> {
        self.failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
}

/// Reusable generation barrier separating the stages of one timestep.
///
/// Unlike `std::sync::Barrier`, waiting threads wake periodically and give
/// up once the run is stopped, so a thread that leaves early can never
/// leave the others blocked.
#[derive(Debug)]
pub struct StageBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl StageBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            parties: parties.max(1),
            state: Mutex::new(BarrierState::default()),
            released: Condvar::new(),
        }
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Wait until every party has arrived.
    ///
    /// # Returns
    /// `false` when the run was stopped before or during the wait; the
    /// caller must leave its step loop.
    pub fn wait(&self, control: &RunControl) -> bool {
        if control.should_stop() {
            self.released.notify_all();
            return false;
        }
        let mut state = self.lock();
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = generation.wrapping_add(1);
            self.released.notify_all();
            return true;
        }
        while state.generation == generation {
            if control.should_stop() {
                return false;
            }
            let (guard, _) = self
                .released
                .wait_timeout(state, POLL_INTERVAL)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn all_parties_pass_each_generation() {
        let barrier = StageBarrier::new(4);
        let control = RunControl::new(CancelToken::new());
        let passed = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        assert!(barrier.wait(&control));
                        passed.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(passed.load(Ordering::Relaxed), 200);
    }

    #[test]
    fn cancel_releases_waiting_threads() {
        let barrier = StageBarrier::new(3);
        let token = CancelToken::new();
        let control = RunControl::new(token.clone());
        std::thread::scope(|s| {
            let waiter = s.spawn(|| barrier.wait(&control));
            std::thread::sleep(Duration::from_millis(20));
            token.cancel();
            assert!(!waiter.join().unwrap(), "waiter should report the stop");
        });
    }

    #[test]
    fn only_first_failure_is_kept() {
        let control = RunControl::new(CancelToken::new());
        assert!(!control.should_stop());
        control.fail("a", ComponentError::NotInitialized { what: "x" });
        control.fail("b", ComponentError::NotInitialized { what: "y" });
        assert!(control.should_stop());
        assert!(!control.is_cancelled());
        let (name, _) = control.take_failure().unwrap();
        assert_eq!(name, "a");
        assert!(control.take_failure().is_none());
    }
}
