// ─── Prompts ───
// Yes/no questions asked during the pipeline. Kept behind a trait so the
// pipeline can run unattended (`--yes`) and tests can script the answers.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::downloader::cancellable;
use crate::core::error::{LauncherError, LauncherResult};

#[async_trait]
pub trait Prompt: Send + Sync {
    /// Ask `question`; `Ok(true)` means the user agreed.
    async fn confirm(&self, question: &str) -> LauncherResult<bool>;
}

/// Asks on stdout and reads the answer from stdin.
///
/// Accepts `y`, `ye`, `yes`, `n` and `no` (any case) and asks again
/// otherwise. A closed stdin counts as "no". The read runs on a blocking
/// thread so Ctrl-C can abandon it with [`LauncherError::Cancelled`].
#[derive(Debug, Clone)]
pub struct TerminalPrompt {
    cancel: CancellationToken,
}

impl TerminalPrompt {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

#[async_trait]
impl Prompt for TerminalPrompt {
    async fn confirm(&self, question: &str) -> LauncherResult<bool> {
        if self.cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }
        let question = question.trim_end().to_string();
        let ask = tokio::task::spawn_blocking(move || ask_on_terminal(&question));
        cancellable(&self.cancel, async {
            ask.await
                .map_err(|e| LauncherError::Other(format!("prompt failed: {}", e)))
        })
        .await
    }
}

fn ask_on_terminal(question: &str) -> bool {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        let _ = write!(stdout, "{} [y/n] ", question);
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        if let Some(answer) = parse_answer(&line) {
            return answer;
        }
    }
}

/// Answers every question with "yes".
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysYes;

#[async_trait]
impl Prompt for AlwaysYes {
    async fn confirm(&self, question: &str) -> LauncherResult<bool> {
        tracing::info!("{} -> yes (--yes)", question.trim_end());
        Ok(true)
    }
}

fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "ye" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
