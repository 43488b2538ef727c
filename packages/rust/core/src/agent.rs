//! AI-agent collaborator: one prompt in, free text out.
//!
//! The agent is an external command (default `claude -p`) that receives the
//! task on stdin. Its reply is advisory; callers pull a JSON payload out of
//! it and validate every value before use.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use conftrack_shared::{AgentConfig, ConfTrackError, Result};

/// Runs one natural-language task and returns the raw reply.
pub trait AgentRunner: Send + Sync {
    fn run(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Agent spawned as a subprocess per task, bounded by a timeout.
pub struct CommandAgent {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAgent {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    /// Command line from `[agent]`, honouring the environment override.
    pub fn from_config(config: &AgentConfig) -> Self {
        let (command, args) = config.command_line();
        Self::new(command, args, Duration::from_secs(config.timeout_secs))
    }
}

impl AgentRunner for CommandAgent {
    #[instrument(skip_all, fields(cmd = %self.command))]
    async fn run(&self, prompt: &str) -> Result<String> {
        info!(prompt_len = prompt.len(), "starting agent");

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ConfTrackError::Agent(format!(
                    "failed to spawn agent: {e}. Is `{}` installed?",
                    self.command
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConfTrackError::Agent("failed to capture agent stdin".into()))?;
        // The prompt is written while stdout drains; both count against the timeout.
        let write = async move {
            let written = stdin.write_all(prompt.as_bytes()).await;
            drop(stdin);
            written
        };
        let exchange = async { tokio::join!(write, child.wait_with_output()) };
        let (written, output) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                ConfTrackError::Agent(format!("agent timed out after {:?}", self.timeout))
            })?;
        written.map_err(|e| ConfTrackError::Agent(format!("failed to write prompt: {e}")))?;
        let output = output.map_err(|e| ConfTrackError::Agent(format!("agent failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "agent exited with failure");
            return Err(ConfTrackError::Agent(format!("agent exited with {}", output.status)));
        }

        let reply = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(reply_len = reply.len(), "agent replied");
        Ok(reply)
    }
}

/// Reply text with Markdown code fences removed.
pub fn strip_fences(reply: &str) -> String {
    reply
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The span from the first `open` to the last `close`, fences removed.
pub fn json_span(reply: &str, open: char, close: char) -> Option<String> {
    let text = strip_fences(reply);
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| text[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans() {
        let reply = "Here you go:\n```json\n[{\"id\": 1}]\n```\nDone.";
        assert_eq!(json_span(reply, '[', ']').as_deref(), Some("[{\"id\": 1}]"));
        assert_eq!(json_span("no json", '[', ']'), None);
        assert_eq!(json_span("] backwards [", '[', ']'), None);
    }

    #[tokio::test]
    async fn command_agent_round_trip() {
        let agent = CommandAgent::new("cat", vec![], Duration::from_secs(5));
        let reply = agent.run("[{\"verdict\":\"unknown\",\"id\":1}]").await.unwrap();
        assert!(reply.contains("unknown"));
    }

    #[tokio::test]
    async fn agent_that_never_reads_times_out() {
        // Larger than a pipe buffer, so the write alone would block.
        let prompt = "x".repeat(1 << 20);
        let agent = CommandAgent::new("sleep", vec!["30".into()], Duration::from_millis(500));
        let started = std::time::Instant::now();
        let err = agent.run(&prompt).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_command_is_agent_error() {
        let agent = CommandAgent::new("conftrack-no-such-agent", vec![], Duration::from_secs(5));
        let err = agent.run("hi").await.unwrap_err();
        assert!(matches!(err, ConfTrackError::Agent(_)));
    }
}
