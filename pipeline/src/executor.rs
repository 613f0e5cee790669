use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use async_fn_stream::try_fn_stream;
use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;
use crate::error::{PipelineError, Result};
use crate::stage::StageInvocation;

/// How a tool process ended.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExitOutcome {
    Success,
    Code(i32),
    Signal(i32),
    Unknown,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            return ExitOutcome::Success;
        }
        if let Some(code) = status.code() {
            return ExitOutcome::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitOutcome::Signal(signal);
            }
        }
        ExitOutcome::Unknown
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Success => write!(f, "exited successfully"),
            ExitOutcome::Code(code) => write!(f, "exited with status {code}"),
            ExitOutcome::Signal(signal) => write!(f, "killed by signal {signal}"),
            ExitOutcome::Unknown => write!(f, "exited abnormally"),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Line(OutputLine),
    /// Always the last event of a process stream.
    Exited(ExitOutcome),
}

pub type ProcessStream = Pin<Box<dyn Stream<Item = Result<ProcessEvent>> + Send>>;

/// Runs one stage's program to completion.
pub trait Executor: Send + Sync {
    fn execute(&self, invocation: &StageInvocation) -> ProcessStream;
}

/// Launches stage programs as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    working_dir: Option<PathBuf>,
}

impl SystemExecutor {
    pub fn new(working_dir: Option<PathBuf>) -> Self {
        Self { working_dir }
    }
}

impl Executor for SystemExecutor {
    fn execute(&self, invocation: &StageInvocation) -> ProcessStream {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        let program = invocation.program.to_string_lossy().into_owned();

        Box::pin(try_fn_stream(|emitter| async move {
            let mut child = command
                .spawn()
                .map_err(|source| PipelineError::Spawn { program: program.clone(), source })?;
            debug!("Spawned {} (pid {:?})", program, child.id());

            let mut stdout = child.stdout.take().map(PipeLines::new);
            let mut stderr = child.stderr.take().map(PipeLines::new);

            // Forward whichever pipe has a line ready until both are closed.
            while stdout.is_some() || stderr.is_some() {
                let (stream, line) = tokio::select! {
                    line = next_line(&mut stdout), if stdout.is_some() => (OutputStream::Stdout, line?),
                    line = next_line(&mut stderr), if stderr.is_some() => (OutputStream::Stderr, line?),
                };
                match line {
                    Some(text) => emitter.emit(ProcessEvent::Line(OutputLine { stream, text })).await,
                    None => match stream {
                        OutputStream::Stdout => stdout = None,
                        OutputStream::Stderr => stderr = None,
                    },
                }
            }

            let status = child.wait().await?;
            emitter.emit(ProcessEvent::Exited(status.into())).await;
            Ok::<(), PipelineError>(())
        }))
    }
}

/// Line reader over a child pipe that tolerates output that is not UTF-8.
///
/// Partial lines stay in `buf` between polls, so a read dropped by `select!`
/// loses nothing.
struct PipeLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> PipeLines<R> {
    fn new(pipe: R) -> Self {
        Self {
            reader: BufReader::new(pipe),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

async fn next_line<R>(lines: &mut Option<PipeLines<R>>) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await,
        None => Ok(None),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::ffi::OsString;
    use futures::StreamExt;
    use crate::stage::Stage;
    use super::*;

    fn shell(script: &str) -> StageInvocation {
        StageInvocation {
            stage: Stage::ComputeMatches,
            program: PathBuf::from("sh"),
            args: vec![OsString::from("-c"), OsString::from(script)],
            requires: vec![],
            produces: vec![],
        }
    }

    async fn collect(executor: &SystemExecutor, invocation: &StageInvocation) -> Result<Vec<ProcessEvent>> {
        let mut stream = executor.execute(invocation);
        let mut events = vec![];
        while let Some(event) = stream.next().await {
            events.push(event?);
        }
        Ok(events)
    }

    #[tokio::test]
    async fn streams_both_pipes_then_exit() {
        let events = collect(&SystemExecutor::default(), &shell("echo one; echo two 1>&2; echo three"))
            .await
            .unwrap();

        let stdout: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                ProcessEvent::Line(OutputLine { stream: OutputStream::Stdout, text }) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(stdout, vec!["one", "three"]);
        assert!(events.contains(&ProcessEvent::Line(OutputLine {
            stream: OutputStream::Stderr,
            text: String::from("two"),
        })));
        assert_eq!(events.last(), Some(&ProcessEvent::Exited(ExitOutcome::Success)));
    }

    #[tokio::test]
    async fn undecodable_output_is_forwarded_lossily() {
        let events = collect(&SystemExecutor::default(), &shell("printf 'caf\\351\\n'; echo done; exit 0"))
            .await
            .unwrap();

        assert_eq!(
            events,
            vec![
                ProcessEvent::Line(OutputLine {
                    stream: OutputStream::Stdout,
                    text: String::from("caf\u{FFFD}"),
                }),
                ProcessEvent::Line(OutputLine {
                    stream: OutputStream::Stdout,
                    text: String::from("done"),
                }),
                ProcessEvent::Exited(ExitOutcome::Success),
            ]
        );
    }

    #[tokio::test]
    async fn last_line_without_newline_is_kept() {
        let events = collect(&SystemExecutor::default(), &shell("printf 'no newline\\r\\n'; printf tail"))
            .await
            .unwrap();

        let lines: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                ProcessEvent::Line(line) => Some(line.text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec!["no newline", "tail"]);
    }

    #[tokio::test]
    async fn reports_exit_code() {
        let events = collect(&SystemExecutor::default(), &shell("echo failing; exit 3")).await.unwrap();
        assert_eq!(events.last(), Some(&ProcessEvent::Exited(ExitOutcome::Code(3))));
    }

    #[tokio::test]
    async fn reports_signal() {
        let events = collect(&SystemExecutor::default(), &shell("kill -9 $$")).await.unwrap();
        assert_eq!(events.last(), Some(&ProcessEvent::Exited(ExitOutcome::Signal(9))));
    }

    #[tokio::test]
    async fn runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let executor = SystemExecutor::new(Some(dir.path().to_path_buf()));
        collect(&executor, &shell("touch marker.log")).await.unwrap();
        assert!(dir.path().join("marker.log").is_file());
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let invocation = StageInvocation {
            program: PathBuf::from("/nonexistent/openMVG_main_ComputeFeatures"),
            ..shell("")
        };
        match collect(&SystemExecutor::default(), &invocation).await {
            Err(PipelineError::Spawn { program, .. }) => {
                assert_eq!(program, "/nonexistent/openMVG_main_ComputeFeatures")
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }
}
