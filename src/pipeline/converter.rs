//! External converter invocation.
//!
//! Runs LibreOffice headless against one input file. Completion of the child
//! races a deadline timer; the loser is cleaned up either way. The child is
//! spawned with `kill_on_drop`, so dropping the future (for example when the
//! HTTP request is cancelled) also kills the subprocess.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::resolver::resolve_converter;
use super::PipelineError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const TARGET_FORMAT: &str = "pdf";

/// Upper bound on waiting for the output pipes to close after the child is gone.
/// Grandchildren that inherited the pipes can otherwise hold them open.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ConverterInvoker {
    candidates: Vec<PathBuf>,
    timeout: Duration,
    home_dir: PathBuf,
}

impl ConverterInvoker {
    pub fn new(candidates: Vec<PathBuf>, timeout: Duration) -> Self {
        Self {
            candidates,
            timeout,
            home_dir: std::env::temp_dir(),
        }
    }

    /// Override the `HOME` handed to the subprocess.
    pub fn with_home_dir(mut self, home_dir: impl Into<PathBuf>) -> Self {
        self.home_dir = home_dir.into();
        self
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Convert `input` to PDF, writing the result into `output_dir`.
    ///
    /// The binary is re-resolved on every call.
    pub async fn convert(&self, input: &Path, output_dir: &Path) -> Result<(), PipelineError> {
        let binary = resolve_converter(&self.candidates, Path::exists).ok_or_else(|| {
            PipelineError::ConverterUnavailable {
                searched: self.candidates.clone(),
            }
        })?;

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| PipelineError::Staging {
                path: output_dir.to_path_buf(),
                source,
            })?;

        // A private profile per run; concurrent headless instances sharing one
        // profile can exit 0 without writing anything.
        let profile = tempfile::Builder::new()
            .prefix("soffice-profile-")
            .tempdir()
            .map_err(|source| PipelineError::Staging {
                path: std::env::temp_dir(),
                source,
            })?;

        log::info!("Using converter at: {}", binary.display());
        log::debug!(
            "Converting {} into {}",
            input.display(),
            output_dir.display()
        );

        let mut child = Command::new(&binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg(TARGET_FORMAT)
            .arg("--outdir")
            .arg(output_dir)
            .arg(input)
            .arg(user_installation_arg(profile.path()))
            .env("HOME", &self.home_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::ConversionFailed {
                reason: format!("failed to launch {}: {}", binary.display(), e),
                output: String::new(),
            })?;

        let output = Arc::new(Mutex::new(String::new()));
        let mut collectors = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            collectors.push(spawn_collector(stdout, output.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            collectors.push(spawn_collector(stderr, output.clone()));
        }

        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = tokio::time::sleep(self.timeout) => None,
        };

        if finished.is_none() {
            log::error!(
                "Converter exceeded {}s, killing pid {:?}",
                self.timeout.as_secs(),
                child.id()
            );
            if let Err(e) = child.kill().await {
                log::warn!("Failed to kill converter process: {}", e);
            }
        }

        drain_collectors(collectors).await;
        let output = std::mem::take(&mut *output.lock());

        match finished {
            Some(Ok(status)) if status.success() => {
                log::debug!("Converter finished: {}", output.trim_end());
                Ok(())
            }
            Some(Ok(status)) => {
                log::error!("Converter output: {}", output);
                Err(PipelineError::ConversionFailed {
                    reason: format!("converter exited with {}", status),
                    output,
                })
            }
            Some(Err(e)) => Err(PipelineError::ConversionFailed {
                reason: format!("failed to wait for converter: {}", e),
                output,
            }),
            None => Err(PipelineError::ConversionTimeout {
                timeout_secs: self.timeout.as_secs(),
                output,
            }),
        }
    }
}

fn user_installation_arg(profile: &Path) -> String {
    format!("-env:UserInstallation=file://{}", profile.display())
}

/// Append everything `reader` produces to `sink`, line by line.
fn spawn_collector<R>(reader: R, sink: Arc<Mutex<String>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => sink.lock().push_str(&String::from_utf8_lossy(&line)),
            }
        }
    })
}

async fn drain_collectors(collectors: Vec<JoinHandle<()>>) {
    for mut handle in collectors {
        if tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut handle)
            .await
            .is_err()
        {
            handle.abort();
        }
    }
}
