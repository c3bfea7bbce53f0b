//! Launching the worker process.
//!
//! A [`WorkerSpawner`] turns a listener port into a running worker that will
//! connect back to `ws://127.0.0.1:<port>`. Two strategies exist: a packaged
//! executable ([`ExecutableSpawner`]) and the client sources run by an
//! interpreter from a virtual environment ([`SourceSpawner`]). Which one is
//! used is decided by configuration, see [`spawner_from_settings`].

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

use super::error::{WorkerError, WorkerResult};
use crate::config::{expand_env_vars, SpawnMode, WorkerSettings};

/// File name stem of the packaged worker executable.
pub const EXECUTABLE_STEM: &str = "SympyClient";

/// Which output stream a diagnostic reader comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Diagnostic output of the worker, forwarded to the log.
pub struct DiagnosticStream {
    pub stream: OutputStream,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

/// Handle to a running worker.
#[async_trait]
pub trait WorkerProcess: Send {
    /// OS process id, if there is one.
    fn id(&self) -> Option<u32> {
        None
    }

    /// Take the diagnostic output streams. Called once, right after spawn.
    fn take_diagnostics(&mut self) -> Vec<DiagnosticStream> {
        Vec::new()
    }

    /// Wait for the worker to exit, returning its exit code if known.
    async fn wait(&mut self) -> io::Result<Option<i32>>;

    /// Forcefully terminate the worker.
    async fn kill(&mut self) -> io::Result<()>;
}

#[async_trait]
impl WorkerProcess for Child {
    fn id(&self) -> Option<u32> {
        Child::id(self)
    }

    fn take_diagnostics(&mut self) -> Vec<DiagnosticStream> {
        let mut streams = Vec::new();
        if let Some(stdout) = self.stdout.take() {
            streams.push(DiagnosticStream {
                stream: OutputStream::Stdout,
                reader: Box::new(stdout),
            });
        }
        if let Some(stderr) = self.stderr.take() {
            streams.push(DiagnosticStream {
                stream: OutputStream::Stderr,
                reader: Box::new(stderr),
            });
        }
        streams
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Child::wait(self).await.map(|status| status.code())
    }

    async fn kill(&mut self) -> io::Result<()> {
        Child::kill(self).await
    }
}

/// Strategy for starting a worker that connects back to `port`.
pub trait WorkerSpawner: Send + Sync {
    fn spawn_client(&self, port: u16) -> WorkerResult<Box<dyn WorkerProcess>>;
}

/// Runs a packaged worker executable.
#[derive(Debug, Clone)]
pub struct ExecutableSpawner {
    path: PathBuf,
}

impl ExecutableSpawner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the executable bundled for the current platform under
    /// `<root>/bin`.
    pub fn for_current_platform(root: &Path) -> WorkerResult<Self> {
        let platform = Platform::current().ok_or_else(|| {
            WorkerError::SpawnFailed(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported platform {:?}", std::env::consts::OS),
            ))
        })?;
        Ok(Self::new(platform.executable_path(root)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkerSpawner for ExecutableSpawner {
    fn spawn_client(&self, port: u16) -> WorkerResult<Box<dyn WorkerProcess>> {
        tracing::debug!(path = %self.path.display(), port, "spawning packaged worker");
        let child = worker_command(&self.path)
            .arg(port.to_string())
            .spawn()
            .map_err(WorkerError::SpawnFailed)?;
        Ok(Box::new(child))
    }
}

/// Runs the worker sources with an interpreter from a virtual environment.
#[derive(Debug, Clone)]
pub struct SourceSpawner {
    root: PathBuf,
    python: String,
    venv: PathBuf,
    script: PathBuf,
}

impl SourceSpawner {
    pub fn new(
        root: impl Into<PathBuf>,
        python: impl Into<String>,
        venv: impl Into<PathBuf>,
        script: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            python: python.into(),
            venv: venv.into(),
            script: script.into(),
        }
    }

    /// Interpreter inside the virtual environment.
    pub fn interpreter(&self) -> PathBuf {
        let venv = self.root.join(&self.venv);
        if cfg!(windows) {
            let exe = if Path::new(&self.python).extension().is_some() {
                self.python.clone()
            } else {
                format!("{}.exe", self.python)
            };
            venv.join("Scripts").join(exe)
        } else {
            venv.join("bin").join(&self.python)
        }
    }

    pub fn script(&self) -> PathBuf {
        self.root.join(&self.script)
    }
}

impl WorkerSpawner for SourceSpawner {
    fn spawn_client(&self, port: u16) -> WorkerResult<Box<dyn WorkerProcess>> {
        let interpreter = self.interpreter();
        let script = self.script();
        tracing::debug!(
            interpreter = %interpreter.display(),
            script = %script.display(),
            port,
            "spawning worker from sources"
        );
        let child = worker_command(&interpreter)
            .arg(script)
            .arg(port.to_string())
            .spawn()
            .map_err(WorkerError::SpawnFailed)?;
        Ok(Box::new(child))
    }
}

fn worker_command(program: &Path) -> Command {
    let mut command = Command::new(program);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Platforms a packaged worker is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Option<Self> {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Option<Self> {
        match os {
            "windows" => Some(Self::Windows),
            "macos" => Some(Self::MacOs),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "win",
            Self::MacOs => "macos",
            Self::Linux => "linux",
        }
    }

    /// `<root>/bin/SympyClient-<platform>.bin`
    pub fn executable_path(&self, root: &Path) -> PathBuf {
        root.join("bin")
            .join(format!("{}-{}.bin", EXECUTABLE_STEM, self.as_str()))
    }
}

/// Build the spawner selected by `[worker] mode`.
pub fn spawner_from_settings(settings: &WorkerSettings) -> WorkerResult<Box<dyn WorkerSpawner>> {
    let root = expand_env_vars(&settings.root)
        .map(PathBuf::from)
        .map_err(|err| {
            WorkerError::SpawnFailed(io::Error::new(io::ErrorKind::NotFound, err.to_string()))
        })?;

    match settings.mode {
        SpawnMode::Executable => {
            let spawner = match &settings.executable {
                Some(path) => {
                    let path = expand_env_vars(path).map_err(|err| {
                        WorkerError::SpawnFailed(io::Error::new(
                            io::ErrorKind::NotFound,
                            err.to_string(),
                        ))
                    })?;
                    ExecutableSpawner::new(path)
                }
                None => ExecutableSpawner::for_current_platform(&root)?,
            };
            Ok(Box::new(spawner))
        }
        SpawnMode::Source => Ok(Box::new(SourceSpawner::new(
            root,
            settings.python.clone(),
            settings.venv.clone(),
            settings.script.clone(),
        ))),
    }
}
