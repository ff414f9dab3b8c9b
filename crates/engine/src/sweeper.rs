//! The 1-second expiration sweeper

use crate::engine::Engine;
use crate::tasks::TimerTask;
use std::sync::Arc;
use std::time::Duration;

/// How often the sweep pops due entries from the expiration heap
pub const SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Spawn the expiration sweep for `engine`.
///
/// The returned task stops (and joins) on drop or [`TimerTask::stop`];
/// lazy expiry on access keeps correctness even while no sweeper runs.
pub fn spawn_expiry_sweeper(engine: Arc<Engine>) -> TimerTask {
    TimerTask::spawn("brine-expiry-sweep", SWEEP_PERIOD, move || {
        engine.sweep_expired();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::strings::SetOptions;

    #[test]
    fn test_sweeper_removes_expired_entries() {
        let engine = Arc::new(Engine::new(EngineConfig::default()));
        engine
            .set(
                "default",
                b"k",
                b"v".to_vec(),
                SetOptions::default().with_ttl(Duration::from_millis(50)),
            )
            .unwrap();

        let mut task = spawn_expiry_sweeper(Arc::clone(&engine));
        std::thread::sleep(Duration::from_millis(1300));
        task.stop();

        // Removed by the sweep itself, not by a read
        assert_eq!(engine.key_count(), 0);
        assert_eq!(engine.stats().expirations, 1);
    }
}
