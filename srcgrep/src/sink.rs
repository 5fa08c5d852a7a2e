use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::error;

use crate::errors::{SearchError, SearchResult};

/// The serialized output destination for formatted match blocks.
///
/// Workers hand over finished blocks only, so the mutex is held for exactly
/// one write per file. After a write failure the sink reports once and
/// discards everything else; the failure surfaces as exit code 2 after the
/// pool drains.
pub struct MatchSink {
    out: Mutex<Box<dyn Write + Send>>,
    matched: AtomicBool,
    failed: AtomicBool,
}

impl MatchSink {
    pub fn stdout() -> Self {
        MatchSink::sink_to(Box::new(io::stdout()))
    }

    pub fn sink_to(out: Box<dyn Write + Send>) -> Self {
        MatchSink {
            out: Mutex::new(out),
            matched: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        }
    }

    /// Appends one formatted block atomically.
    pub fn append(&self, block: &[u8]) {
        self.matched.store(true, Ordering::Relaxed);
        if self.failed.load(Ordering::Relaxed) {
            return;
        }
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(err) = out.write_all(block) {
            if !self.failed.swap(true, Ordering::Relaxed) {
                error!("failed writing matches: {}", err);
            }
        }
    }

    /// True once any block has been appended.
    pub fn matched(&self) -> bool {
        self.matched.load(Ordering::Relaxed)
    }

    /// Flushes the sink and reports whether any write failed during the run.
    pub fn finish(&self) -> SearchResult<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(err) = out.flush() {
            if !self.failed.swap(true, Ordering::Relaxed) {
                error!("failed flushing matches: {}", err);
            }
        }
        drop(out);
        if self.failed.load(Ordering::Relaxed) {
            return Err(SearchError::SinkWrite);
        }
        Ok(())
    }
}
