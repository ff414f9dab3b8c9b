//! Durability scenarios: write, stop, restart with the same log path,
//! and observe equivalent state.

use brinedb::{AofConfig, AofLog, Engine, EngineConfig, FsyncPolicy, SetOptions};
use brine_durability::replay_into;
use std::sync::Arc;
use tempfile::tempdir;

const NS: &str = "default";

fn durable_engine(path: &std::path::Path) -> (Engine, Arc<AofLog>) {
    let engine = Engine::new(EngineConfig::default());
    replay_into(path, &engine).unwrap();
    let log = Arc::new(
        AofLog::open(AofConfig {
            path: path.to_path_buf(),
            fsync: FsyncPolicy::Always,
            rewrite_threshold: u64::MAX,
        })
        .unwrap(),
    );
    engine.set_mutation_log(Arc::clone(&log) as _);
    (engine, log)
}

#[test]
fn scenario_f_restart_reproduces_keyspace() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("brine.aof");

    // First lifetime: SET x 1 EX 3600, HSET h f v, RPUSH L a b
    {
        let (engine, _log) = durable_engine(&path);
        engine.setex(NS, b"x", 3600, b"1".to_vec()).unwrap();
        engine
            .hset(NS, b"h", vec![(b"f".to_vec(), b"v".to_vec())])
            .unwrap();
        engine
            .rpush(NS, b"L", vec![b"a".to_vec(), b"b".to_vec()])
            .unwrap();
    }

    // Second lifetime: same log path
    let (engine, _log) = durable_engine(&path);
    assert_eq!(engine.get(NS, b"x").unwrap(), Some(b"1".to_vec()));
    assert!(engine.ttl(NS, b"x").unwrap() > 0, "TTL survives restart");
    assert_eq!(engine.hget(NS, b"h", b"f").unwrap(), Some(b"v".to_vec()));
    assert_eq!(
        engine.lrange(NS, b"L", 0, -1).unwrap(),
        vec![b"a".to_vec(), b"b".to_vec()]
    );
}

#[test]
fn property_replay_equals_final_state_modulo_expiry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("brine.aof");

    let final_state: Vec<(Vec<u8>, Option<Vec<u8>>)> = {
        let (engine, _log) = durable_engine(&path);
        // A churny history: sets, overwrites, deletes, counters
        for i in 0..100u32 {
            let key = format!("k{}", i % 10);
            engine
                .set(NS, key.as_bytes(), format!("v{}", i).into_bytes(), SetOptions::default())
                .unwrap();
        }
        engine.del(NS, &[b"k3".to_vec(), b"k7".to_vec()]).unwrap();
        engine.incr_by(NS, b"counter", 41).unwrap();
        engine.incr_by(NS, b"counter", 1).unwrap();

        (0..10u32)
            .map(|i| format!("k{}", i).into_bytes())
            .chain([b"counter".to_vec()])
            .map(|k| {
                let v = engine.get(NS, &k).unwrap();
                (k, v)
            })
            .collect()
    };

    let (engine, _log) = durable_engine(&path);
    for (key, expected) in final_state {
        assert_eq!(
            engine.get(NS, &key).unwrap(),
            expected,
            "key {:?} diverged after replay",
            String::from_utf8_lossy(&key)
        );
    }
}

#[test]
fn replay_after_compaction_is_equivalent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("brine.aof");

    {
        let engine = Engine::new(EngineConfig::default());
        let log = Arc::new(
            AofLog::open(AofConfig {
                path: path.clone(),
                fsync: FsyncPolicy::Always,
                rewrite_threshold: 512,
            })
            .unwrap(),
        );
        engine.set_mutation_log(Arc::clone(&log) as _);

        for i in 0..200u32 {
            engine
                .set(NS, b"churned", format!("v{}", i).into_bytes(), SetOptions::default())
                .unwrap();
        }
        engine.sadd(NS, b"s", vec![b"m1".to_vec(), b"m2".to_vec()]).unwrap();
        engine.zadd(NS, b"z", vec![(2.0, b"two".to_vec())]).unwrap();

        assert!(brine_durability::maybe_rewrite(&log, &engine).unwrap());
    }

    let (engine, _log) = durable_engine(&path);
    assert_eq!(engine.get(NS, b"churned").unwrap(), Some(b"v199".to_vec()));
    assert_eq!(engine.scard(NS, b"s").unwrap(), 2);
    assert_eq!(engine.zscore(NS, b"z", b"two").unwrap(), Some(2.0));
}

#[test]
fn corrupt_lines_do_not_poison_recovery() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("brine.aof");

    {
        let (engine, _log) = durable_engine(&path);
        engine.set(NS, b"good", b"1".to_vec(), SetOptions::default()).unwrap();
    }
    // Corruption in the middle of the file
    {
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "this is not a log line").unwrap();
        writeln!(f, "9999|set|default|half").unwrap();
    }
    {
        let (engine, _log) = durable_engine(&path);
        engine.set(NS, b"after", b"2".to_vec(), SetOptions::default()).unwrap();
    }

    let engine = Engine::new(EngineConfig::default());
    let stats = replay_into(&path, &engine).unwrap();
    assert_eq!(stats.skipped, 2);
    assert_eq!(engine.get(NS, b"good").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(NS, b"after").unwrap(), Some(b"2".to_vec()));
}
