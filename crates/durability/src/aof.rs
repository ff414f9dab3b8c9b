//! Append-only log writer
//!
//! A buffered writer behind a mutex, flushed under one of three fsync
//! policies:
//!
//! - `always`: flush + fsync inside every append; failures surface as
//!   the originating write's error
//! - `everysec` (default): a 1 s timer task flushes and fsyncs; append
//!   failures are counted, not surfaced
//! - `no`: the OS decides; nothing fsyncs explicitly
//!
//! The writer implements [`MutationLog`], so attaching it to an engine
//! is the whole integration.

use crate::record::encode_line;
use brine_core::{now_ms, Result};
use brine_engine::{MutationLog, MutationRecord, TimerTask};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default rewrite threshold: 64 MiB
pub const DEFAULT_REWRITE_THRESHOLD: u64 = 64 * 1024 * 1024;

/// When the log reaches disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FsyncPolicy {
    /// fsync inside every append
    Always,
    /// flush + fsync once per second
    #[default]
    EverySec,
    /// never fsync explicitly
    No,
}

/// Writer configuration
#[derive(Debug, Clone)]
pub struct AofConfig {
    /// Log file path; parent directories are created on open
    pub path: PathBuf,
    /// Fsync cadence
    pub fsync: FsyncPolicy,
    /// File size that triggers compaction
    pub rewrite_threshold: u64,
}

impl AofConfig {
    /// Config with defaults for everything but the path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fsync: FsyncPolicy::default(),
            rewrite_threshold: DEFAULT_REWRITE_THRESHOLD,
        }
    }
}

struct AofInner {
    writer: BufWriter<File>,
    bytes_written: u64,
    dirty: bool,
    // Lines appended while a rewrite snapshot is being written; replayed
    // onto the new file before the rename so nothing is lost.
    rewrite_buffer: Option<Vec<String>>,
}

/// The append-only log
pub struct AofLog {
    config: AofConfig,
    inner: Mutex<AofInner>,
    write_errors: AtomicU64,
}

impl AofLog {
    /// Open (or create) the log for appending
    pub fn open(config: AofConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;
        let bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);
        info!(path = %config.path.display(), size = bytes_written, "append-only log opened");
        Ok(Self {
            config,
            inner: Mutex::new(AofInner {
                writer: BufWriter::new(file),
                bytes_written,
                dirty: false,
                rewrite_buffer: None,
            }),
            write_errors: AtomicU64::new(0),
        })
    }

    /// The log file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Current file size including unflushed buffer
    pub fn size_bytes(&self) -> u64 {
        self.inner.lock().bytes_written
    }

    /// Appends that failed under `everysec`/`no`
    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// True when the log has grown past the rewrite threshold
    pub fn needs_rewrite(&self) -> bool {
        self.size_bytes() > self.config.rewrite_threshold
    }

    /// Append one record under the configured policy
    pub fn append(&self, rec: &MutationRecord) -> Result<()> {
        let line = encode_line(now_ms(), rec);
        let result = self.append_line(&line);
        match self.config.fsync {
            FsyncPolicy::Always => result,
            FsyncPolicy::EverySec | FsyncPolicy::No => {
                if let Err(e) = result {
                    self.write_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "append-only log write failed");
                }
                Ok(())
            }
        }
    }

    fn append_line(&self, line: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.writer.write_all(line.as_bytes())?;
        inner.writer.write_all(b"\n")?;
        inner.bytes_written += line.len() as u64 + 1;
        inner.dirty = true;
        if let Some(buffer) = &mut inner.rewrite_buffer {
            buffer.push(line.to_string());
        }
        if self.config.fsync == FsyncPolicy::Always {
            inner.writer.flush()?;
            inner.writer.get_ref().sync_all()?;
            inner.dirty = false;
        }
        Ok(())
    }

    /// Flush buffered lines and fsync. The `everysec` timer calls this;
    /// it is also the final step of a clean shutdown.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.dirty {
            return Ok(());
        }
        inner.writer.flush()?;
        if self.config.fsync != FsyncPolicy::No {
            inner.writer.get_ref().sync_all()?;
        }
        inner.dirty = false;
        Ok(())
    }

    /// Rewrite the log from a keyspace snapshot.
    ///
    /// Mutations keep appending to the live log while the snapshot is
    /// written to a sibling file; they are also buffered and replayed
    /// onto the sibling before the atomic rename, so the swap loses
    /// nothing. The engine is only locked while `ops` is being dumped by
    /// the caller.
    pub fn rewrite_with(&self, ops: &[MutationRecord]) -> Result<()> {
        // Start buffering concurrent appends
        {
            let mut inner = self.inner.lock();
            if inner.rewrite_buffer.is_some() {
                return Ok(()); // rewrite already in flight
            }
            inner.rewrite_buffer = Some(Vec::new());
        }

        let result = self.rewrite_inner(ops);
        if result.is_err() {
            // The live log kept every append; just stop buffering
            self.inner.lock().rewrite_buffer = None;
        }
        result
    }

    fn rewrite_inner(&self, ops: &[MutationRecord]) -> Result<()> {
        let sibling = self.config.path.with_extension("rewrite");
        let ts = now_ms();
        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&sibling)?;
            let mut writer = BufWriter::new(file);
            for op in ops {
                writer.write_all(encode_line(ts, op).as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        // Swap: drain the buffer onto the sibling, rename, reopen
        let mut inner = self.inner.lock();
        inner.writer.flush()?;
        let buffered = inner.rewrite_buffer.take().unwrap_or_default();
        {
            let mut tail = OpenOptions::new().append(true).open(&sibling)?;
            for line in &buffered {
                tail.write_all(line.as_bytes())?;
                tail.write_all(b"\n")?;
            }
            tail.sync_all()?;
        }
        std::fs::rename(&sibling, &self.config.path)?;
        let file = OpenOptions::new().append(true).open(&self.config.path)?;
        inner.bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);
        inner.writer = BufWriter::new(file);
        inner.dirty = false;
        info!(size = inner.bytes_written, "append-only log rewritten");
        Ok(())
    }

    /// Spawn the `everysec` flusher. Flush errors are counted, matching
    /// the policy's contract.
    pub fn start_flusher(log: Arc<AofLog>) -> TimerTask {
        TimerTask::spawn("brine-aof-flush", Duration::from_secs(1), move || {
            if let Err(e) = log.flush() {
                log.write_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "append-only log flush failed");
            }
        })
    }
}

impl MutationLog for AofLog {
    fn record(&self, rec: MutationRecord) -> Result<()> {
        self.append(&rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn set_rec(key: &[u8], value: &[u8]) -> MutationRecord {
        MutationRecord::Set {
            namespace: "default".into(),
            key: key.to_vec(),
            value: value.to_vec(),
            expires_at_ms: None,
        }
    }

    #[test]
    fn test_append_always_is_immediately_durable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.aof");
        let log = AofLog::open(AofConfig {
            path: path.clone(),
            fsync: FsyncPolicy::Always,
            rewrite_threshold: DEFAULT_REWRITE_THRESHOLD,
        })
        .unwrap();

        log.append(&set_rec(b"k", b"v")).unwrap();
        // Readable without any flush call
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("|set|default|k|"));
    }

    #[test]
    fn test_everysec_buffers_until_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.aof");
        let log = AofLog::open(AofConfig::new(path.clone())).unwrap();

        log.append(&set_rec(b"k", b"v")).unwrap();
        log.flush().unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert_eq!(log.write_errors(), 0);
    }

    #[test]
    fn test_size_tracking_and_threshold() {
        let dir = tempdir().unwrap();
        let log = AofLog::open(AofConfig {
            path: dir.path().join("test.aof"),
            fsync: FsyncPolicy::No,
            rewrite_threshold: 64,
        })
        .unwrap();
        assert!(!log.needs_rewrite());
        for i in 0..10 {
            log.append(&set_rec(format!("key{}", i).as_bytes(), b"some value"))
                .unwrap();
        }
        assert!(log.size_bytes() > 64);
        assert!(log.needs_rewrite());
    }

    #[test]
    fn test_reopen_resumes_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.aof");
        {
            let log = AofLog::open(AofConfig::new(path.clone())).unwrap();
            log.append(&set_rec(b"k", b"v")).unwrap();
            log.flush().unwrap();
        }
        let log = AofLog::open(AofConfig::new(path)).unwrap();
        assert!(log.size_bytes() > 0);
    }

    #[test]
    fn test_rewrite_shrinks_and_keeps_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.aof");
        let log = AofLog::open(AofConfig {
            path: path.clone(),
            fsync: FsyncPolicy::No,
            rewrite_threshold: 1,
        })
        .unwrap();

        // Many superseded writes to one key
        for i in 0..100 {
            log.append(&set_rec(b"k", format!("v{}", i).as_bytes()))
                .unwrap();
        }
        let before = log.size_bytes();

        // Compaction replaces history with the single live value
        log.rewrite_with(&[set_rec(b"k", b"v99")]).unwrap();
        assert!(log.size_bytes() < before);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);

        // Appends after the rewrite land on the new file
        log.append(&set_rec(b"k2", b"w")).unwrap();
        log.flush().unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
