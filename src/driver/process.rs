//! External process execution with output capture and an optional deadline.

use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{RenderError, RenderResult};
use crate::toolchain::{CompilerLookup, Rasterizer};

use super::{ProcessOutput, TexBackend};

/// Poll interval while waiting for a child to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Compiler arguments: non-interactive, shell-escape on, stop at first error.
pub fn compiler_args(tex_path: &Path, output_dir: &Path) -> Vec<OsString> {
    vec![
        OsString::from("-shell-escape"),
        OsString::from("-halt-on-error"),
        OsString::from("-interaction=nonstopmode"),
        OsString::from("-output-directory"),
        output_dir.as_os_str().to_owned(),
        tex_path.as_os_str().to_owned(),
    ]
}

/// Runs the real TeX compiler and rasterizer.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    compiler: CompilerLookup,
    rasterizer: Rasterizer,
    timeout: Option<Duration>,
}

impl ProcessBackend {
    pub fn new(compiler: CompilerLookup) -> Self {
        Self {
            compiler,
            rasterizer: Rasterizer::default(),
            timeout: None,
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: Rasterizer) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Kill either tool if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn compiler(&self) -> &CompilerLookup {
        &self.compiler
    }
}

impl TexBackend for ProcessBackend {
    fn compile(&self, tex_path: &Path, output_dir: &Path) -> RenderResult<ProcessOutput> {
        let compiler = self.compiler.require()?;
        run_command(
            compiler,
            &compiler_args(tex_path, output_dir),
            output_dir,
            self.timeout,
        )
    }

    fn rasterize(&self, pdf_path: &Path, png_path: &Path, dpi: u32) -> RenderResult<ProcessOutput> {
        let work_dir = pdf_path.parent().unwrap_or_else(|| Path::new("."));
        run_command(
            &self.rasterizer.program,
            &self.rasterizer.args(pdf_path, png_path, dpi),
            work_dir,
            self.timeout,
        )
    }
}

/// Run `program` to completion, capturing stdout and stderr.
///
/// Stdin is closed so a tool waiting for input fails instead of hanging.
/// The child leads its own process group. With a timeout, one deadline
/// covers both the child's exit and the close of its output pipes; when it
/// passes, the whole group is killed so helpers started through
/// `-shell-escape` die with it.
pub fn run_command(
    program: &Path,
    args: &[OsString],
    work_dir: &Path,
    timeout: Option<Duration>,
) -> RenderResult<ProcessOutput> {
    tracing::debug!(program = %program.display(), ?args, "spawning");

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut child = command.spawn().map_err(|error| RenderError::Spawn {
        program: program.to_path_buf(),
        error,
    })?;

    let deadline = timeout.map(|limit| Instant::now() + limit);
    let (tx, rx) = mpsc::channel();
    let mut pipes = 0;
    if let Some(pipe) = child.stdout.take() {
        drain(pipe, Stream::Stdout, tx.clone());
        pipes += 1;
    }
    if let Some(pipe) = child.stderr.take() {
        drain(pipe, Stream::Stderr, tx.clone());
        pipes += 1;
    }
    drop(tx);

    let timed_out = |child: &mut Child, what: &str| {
        kill_process_group(child);
        let limit = timeout.unwrap_or_default();
        tracing::warn!(program = %program.display(), ?limit, "killed after timeout ({what})");
        RenderError::Timeout {
            program: program.to_path_buf(),
            limit,
        }
    };

    let status = match wait_with_deadline(&mut child, deadline) {
        Ok(Some(status)) => status,
        Ok(None) => return Err(timed_out(&mut child, "still running")),
        Err(error) => {
            return Err(RenderError::Spawn {
                program: program.to_path_buf(),
                error,
            })
        }
    };

    let Some((stdout, stderr)) = collect_output(&rx, pipes, deadline) else {
        return Err(timed_out(&mut child, "output pipes held open"));
    };

    let output = ProcessOutput {
        exit_code: status.code(),
        success: status.success(),
        stdout,
        stderr,
    };
    tracing::debug!(program = %program.display(), exit_code = ?output.exit_code, "process exited");
    Ok(output)
}

/// `Ok(None)` means the deadline passed with the child still running.
fn wait_with_deadline(
    child: &mut Child,
    deadline: Option<Instant>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(mut pipe: R, stream: Stream, tx: Sender<(Stream, String)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send((stream, String::from_utf8_lossy(&buf).into_owned()));
    });
}

/// Wait for `pipes` drained streams. `None` if the deadline passes first.
fn collect_output(
    rx: &Receiver<(Stream, String)>,
    pipes: usize,
    deadline: Option<Instant>,
) -> Option<(String, String)> {
    let mut stdout = String::new();
    let mut stderr = String::new();
    for _ in 0..pipes {
        let received = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(remaining) {
                    Ok(received) => received,
                    Err(RecvTimeoutError::Timeout) => return None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(received) => received,
                Err(_) => break,
            },
        };
        match received {
            (Stream::Stdout, text) => stdout = text,
            (Stream::Stderr, text) => stderr = text,
        }
    }
    Some((stdout, stderr))
}

/// Kill the child's process group, then the child itself, and reap it.
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let _ = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL);
    }
    let _ = child.kill();
    let _ = child.wait();
}
