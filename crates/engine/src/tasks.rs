//! Periodic background tasks on dedicated threads
//!
//! A [`TimerTask`] runs a closure at a fixed period on its own named
//! thread, sleeping on a condvar so `stop()` interrupts the wait
//! immediately instead of waiting out the period. All of the system's
//! timers (expiration sweep, AOF everysec flush, provisioning sweep,
//! latency probe) are instances of this one mechanism, and every one of
//! them is stopped and joined on shutdown — no detached tasks.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

struct TimerShared {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// A named periodic task with clean shutdown
pub struct TimerTask {
    name: String,
    shared: Arc<TimerShared>,
    handle: Option<JoinHandle<()>>,
}

impl TimerTask {
    /// Spawn a thread running `tick` every `period` until stopped.
    ///
    /// The first tick happens one period after spawn, not immediately.
    pub fn spawn<F>(name: &str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(TimerShared {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let thread_name = name.to_string();
        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut stopped = thread_shared.stopped.lock();
                loop {
                    let timed_out = thread_shared
                        .wake
                        .wait_for(&mut stopped, period)
                        .timed_out();
                    if *stopped {
                        break;
                    }
                    if timed_out {
                        // Run the tick without holding the stop lock so a
                        // long tick never delays stop() itself.
                        MutexGuard::unlocked(&mut stopped, &mut tick);
                    }
                }
                debug!(task = %thread_name, "timer task stopped");
            })
            .expect("failed to spawn timer thread");

        Self {
            name: name.to_string(),
            shared,
            handle: Some(handle),
        }
    }

    /// The task's thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the task to stop and join its thread. Idempotent.
    pub fn stop(&mut self) {
        {
            let mut stopped = self.shared.stopped.lock();
            *stopped = true;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TimerTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_tick_runs_repeatedly() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let mut task = TimerTask::spawn("test-tick", Duration::from_millis(10), move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        std::thread::sleep(Duration::from_millis(100));
        task.stop();
        let ticks = counter.load(Ordering::Relaxed);
        assert!(ticks >= 3, "expected several ticks, got {}", ticks);
    }

    #[test]
    fn test_stop_is_prompt_and_idempotent() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        // Long period: stop must not wait out the full hour
        let mut task = TimerTask::spawn("test-stop", Duration::from_secs(3600), move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        let started = std::time::Instant::now();
        task.stop();
        task.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_drop_stops_the_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        {
            let _task = TimerTask::spawn("test-drop", Duration::from_millis(5), move || {
                c.fetch_add(1, Ordering::Relaxed);
            });
            std::thread::sleep(Duration::from_millis(30));
        }
        let after_drop = counter.load(Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.load(Ordering::Relaxed), after_drop);
    }

    #[test]
    fn test_name_is_kept() {
        let mut task = TimerTask::spawn("sweeper", Duration::from_secs(60), || {});
        assert_eq!(task.name(), "sweeper");
        task.stop();
    }
}
