// ─── Readiness Detection ───
// Tails the server log until the "Done (…)! For help, type "help"" line
// shows up. The file is reopened on every poll so the server can rotate or
// truncate it freely.

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::core::downloader::cancellable;
use crate::core::error::{LauncherError, LauncherResult};

/// Substrings that must both appear on one log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessMarkers {
    pub started: String,
    pub help_hint: String,
}

impl Default for ReadinessMarkers {
    fn default() -> Self {
        Self {
            started: "Done (".to_string(),
            help_hint: ")! For help, type \"help\"".to_string(),
        }
    }
}

impl ReadinessMarkers {
    pub fn matches(&self, line: &str) -> bool {
        line.contains(&self.started) && line.contains(&self.help_hint)
    }
}

/// Time source for the poll loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Byte cursor into a log file that may be rotated underneath it.
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    offset: Option<u64>,
    partial: String,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: None,
            partial: String::new(),
        }
    }

    /// `None` until the first successful poll.
    #[cfg(test)]
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Complete lines appended since the last poll.
    ///
    /// The first poll only records the current size, so earlier content is
    /// never reported. A file shorter than the cursor is read again from the
    /// start. Rotation is detected by size alone; a file rewritten past the
    /// old offset between two polls is indistinguishable from growth.
    pub fn poll(&mut self) -> std::io::Result<Vec<String>> {
        let mut file = std::fs::File::open(&self.path)?;
        let len = file.metadata()?.len();

        let offset = match self.offset {
            None => {
                self.offset = Some(len);
                return Ok(Vec::new());
            }
            Some(offset) if len < offset => {
                debug!("{:?} shrank ({} < {}), rescanning", self.path, len, offset);
                self.partial.clear();
                0
            }
            Some(offset) => offset,
        };

        file.seek(SeekFrom::Start(offset))?;
        let mut fresh = Vec::new();
        file.read_to_end(&mut fresh)?;
        self.offset = Some(offset + fresh.len() as u64);

        self.partial.push_str(&String::from_utf8_lossy(&fresh));
        let Some(last_newline) = self.partial.rfind('\n') else {
            return Ok(Vec::new());
        };
        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        Ok(complete
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect())
    }
}

/// Poll settings for [`wait_for_ready`].
#[derive(Debug, Clone)]
pub struct ReadyWait<'a> {
    pub markers: &'a ReadinessMarkers,
    pub timeout: Duration,
    pub interval: Duration,
}

/// Block until a readiness line is appended to `log_path`.
///
/// Waiting for the file to appear and waiting for the line share one
/// `timeout`. Read errors are retried on the next poll.
#[instrument(skip(wait, clock, cancel))]
pub async fn wait_for_ready(
    log_path: &Path,
    wait: ReadyWait<'_>,
    clock: &dyn Clock,
    cancel: &CancellationToken,
) -> LauncherResult<()> {
    let deadline = clock.now() + wait.timeout;

    while !log_path.exists() {
        if clock.now() >= deadline {
            return Err(LauncherError::Timeout(format!(
                "log file {:?} did not appear within {}s",
                log_path,
                wait.timeout.as_secs()
            )));
        }
        pause(clock, wait.interval, cancel).await?;
    }

    let mut tail = LogTail::new(log_path);
    loop {
        match tail.poll() {
            Ok(lines) => {
                if let Some(line) = lines.iter().find(|l| wait.markers.matches(l)) {
                    info!("Server ready: {}", line.trim());
                    return Ok(());
                }
            }
            Err(err) => debug!("Could not read {:?}: {}", log_path, err),
        }

        if clock.now() >= deadline {
            return Err(LauncherError::Timeout(format!(
                "server did not report ready within {}s",
                wait.timeout.as_secs()
            )));
        }
        pause(clock, wait.interval, cancel).await?;
    }
}

async fn pause(
    clock: &dyn Clock,
    interval: Duration,
    cancel: &CancellationToken,
) -> LauncherResult<()> {
    cancellable(cancel, async {
        clock.sleep(interval).await;
        Ok::<_, LauncherError>(())
    })
    .await
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    pub type Step = Box<dyn FnOnce() + Send>;

    /// Fake clock: every `sleep` advances time and runs the next scripted
    /// step (usually a write to the log file).
    pub struct ScriptedClock {
        now: Mutex<Instant>,
        steps: Mutex<VecDeque<Step>>,
        applied: AtomicUsize,
    }

    impl ScriptedClock {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                now: Mutex::new(Instant::now()),
                steps: Mutex::new(steps.into()),
                applied: AtomicUsize::new(0),
            }
        }

        pub fn applied(&self) -> usize {
            self.applied.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Clock for ScriptedClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            *self.now.lock().unwrap() += duration;
            let step = self.steps.lock().unwrap().pop_front();
            if let Some(step) = step {
                step();
                self.applied.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    pub fn append(path: &Path, text: &'static str) -> Step {
        let path = path.to_path_buf();
        Box::new(move || {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .unwrap();
            file.write_all(text.as_bytes()).unwrap();
        })
    }

    pub fn truncate(path: &Path) -> Step {
        let path = path.to_path_buf();
        Box::new(move || std::fs::write(&path, "").unwrap())
    }

    pub fn nothing() -> Step {
        Box::new(|| {})
    }
}
