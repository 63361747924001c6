//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use vt_models::Stats;

use crate::error::{MediaError, MediaResult};
use crate::progress::ProgressParser;

/// Bytes of stderr kept for error reports.
const STDERR_TAIL: usize = 2048;

/// Split a free-form argument string on whitespace.
///
/// No shell is involved, so quoting is not interpreted.
pub fn split_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(str::to_string).collect()
}

/// Builder for FFmpeg commands.
///
/// Produces `{global} {input args} -i {input} {output args} {output}`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCommand {
    /// Arguments before everything else
    global_args: Vec<String>,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Input path or URL
    input: String,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Output path or URL
    output: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    /// Add global arguments from a whitespace-separated string.
    pub fn global_args_str(mut self, args: &str) -> Self {
        self.global_args.extend(split_args(args));
        self
    }

    /// Add input arguments from a whitespace-separated string.
    pub fn input_args_str(mut self, args: &str) -> Self {
        self.input_args.extend(split_args(args));
        self
    }

    /// Add output arguments from a whitespace-separated string.
    pub fn output_args_str(mut self, args: &str) -> Self {
        self.output_args.extend(split_args(args));
        self
    }

    /// Overwrite the output without asking.
    pub fn overwrite(mut self) -> Self {
        self.global_args.insert(0, "-y".to_string());
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(
            self.global_args.len() + self.input_args.len() + self.output_args.len() + 3,
        );

        args.extend(self.global_args.iter().cloned());
        args.extend(self.input_args.iter().cloned());

        args.push("-i".to_string());
        args.push(self.input.clone());

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.clone());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking and cancellation.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// FFmpeg binary
    binary: PathBuf,
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner for the given binary.
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            cancel_rx: None,
            timeout_secs: None,
        }
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command, invoking `on_progress` whenever the parsed stats change.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, on_progress: F) -> MediaResult<()>
    where
        F: FnMut(Stats) + Send + 'static,
    {
        let binary = check_ffmpeg(&self.binary)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", binary.display(), args.join(" "));

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;

        let progress_handle = tokio::spawn(read_progress(stderr, on_progress));

        let result = self.wait_for_completion(&mut child).await;

        let status = match result {
            Ok(status) => status,
            Err(e) => {
                progress_handle.abort();
                return Err(e);
            }
        };

        let stderr_tail = progress_handle.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                format!("FFmpeg exited with {}", status),
                Some(stderr_tail),
                status.code(),
            ))
        }
    }

    /// Wait for child process with cancellation and timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<ExitStatus> {
        let mut cancel_rx = self.cancel_rx.clone();
        let timeout_secs = self.timeout_secs;

        let cancelled = async {
            match cancel_rx.as_mut() {
                Some(rx) => wait_for_cancel(rx).await,
                None => std::future::pending().await,
            }
        };
        let timed_out = async {
            match timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            status = child.wait() => Ok(status?),
            _ = cancelled => {
                info!("FFmpeg cancelled, killing process");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
            _ = timed_out => {
                let secs = timeout_secs.unwrap_or_default();
                warn!("FFmpeg timed out after {} seconds, killing process", secs);
                let _ = child.kill().await;
                Err(MediaError::Timeout(secs))
            }
        }
    }
}

/// Resolves once the signal reads `true`. Never resolves if the sender is gone.
async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Feed stderr into a parser until EOF, returning the tail of the output.
async fn read_progress<R, F>(mut stderr: R, mut on_progress: F) -> String
where
    R: tokio::io::AsyncRead + Unpin,
    F: FnMut(Stats),
{
    let mut parser = ProgressParser::new();
    let mut tail = String::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match stderr.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let text = String::from_utf8_lossy(&chunk[..n]);

        if let Some(stats) = parser.feed(&text) {
            on_progress(stats);
        }

        tail.push_str(&text);
        if tail.len() > STDERR_TAIL * 2 {
            let mut cut = tail.len() - STDERR_TAIL;
            while !tail.is_char_boundary(cut) {
                cut += 1;
            }
            tail.drain(..cut);
        }
    }

    tail
}

/// Check that an FFmpeg binary is available, resolving it via `PATH`.
pub fn check_ffmpeg(binary: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let binary = binary.as_ref();
    which::which(binary).map_err(|_| MediaError::FfmpegNotFound(binary.to_path_buf()))
}

/// First line of `ffmpeg -version`.
pub async fn ffmpeg_version(binary: impl AsRef<Path>) -> MediaResult<String> {
    let binary = check_ffmpeg(binary)?;
    let output = Command::new(&binary)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffmpeg_failed(
            "FFmpeg version check failed",
            Some(String::from_utf8_lossy(&output.stderr).into_owned()),
            output.status.code(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("http://cdn/in.mkv", "out.mp4")
            .global_args_str("-hide_banner")
            .input_args_str("  -re ")
            .output_args_str("-c:v libx264 -crf 18")
            .overwrite();

        assert_eq!(
            cmd.build_args(),
            vec![
                "-y",
                "-hide_banner",
                "-re",
                "-i",
                "http://cdn/in.mkv",
                "-c:v",
                "libx264",
                "-crf",
                "18",
                "out.mp4"
            ]
        );
    }

    #[test]
    fn test_split_args_empty() {
        assert!(split_args("   ").is_empty());
    }

    #[test]
    fn test_missing_binary() {
        let err = tokio_test::assert_err!(check_ffmpeg("/nonexistent/ffmpeg-binary"));
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::{Arc, Mutex};

        fn fake_ffmpeg(dir: &Path, script: &str) -> PathBuf {
            let path = dir.join("ffmpeg");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_progress_reported() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ffmpeg(
                dir.path(),
                r#"printf '  Duration: 00:00:10.00, start: 0.0\n' >&2
printf 'frame=  100 fps=50 size=  10kB time=00:00:05.00 bitrate=16.4kbits/s\r' >&2
exit 0"#,
            );

            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            FfmpegRunner::new(&bin)
                .run_with_progress(&FfmpegCommand::new("in", "out"), move |s| {
                    sink.lock().unwrap().push(s.percentage)
                })
                .await
                .unwrap();

            let seen = seen.lock().unwrap();
            assert_eq!(seen.last(), Some(&50));
        }

        #[tokio::test]
        async fn test_non_zero_exit() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ffmpeg(dir.path(), "echo 'in: No such file' >&2\nexit 1");

            let err = FfmpegRunner::new(&bin)
                .run(&FfmpegCommand::new("in", "out"))
                .await
                .unwrap_err();
            match err {
                MediaError::FfmpegFailed {
                    exit_code, stderr, ..
                } => {
                    assert_eq!(exit_code, Some(1));
                    assert!(stderr.unwrap_or_default().contains("No such file"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_cancel_kills_process() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ffmpeg(dir.path(), "exec sleep 30");
            let (tx, rx) = watch::channel(false);

            let runner = FfmpegRunner::new(&bin).with_cancel(rx);
            let handle = tokio::spawn(async move {
                runner.run(&FfmpegCommand::new("in", "out")).await
            });

            tokio::time::sleep(Duration::from_millis(200)).await;
            tx.send(true).unwrap();

            let result = tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("runner should stop promptly")
                .unwrap();
            assert!(matches!(result, Err(MediaError::Cancelled)));
        }

        #[tokio::test]
        async fn test_timeout() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ffmpeg(dir.path(), "exec sleep 30");

            let result = FfmpegRunner::new(&bin)
                .with_timeout(1)
                .run(&FfmpegCommand::new("in", "out"))
                .await;
            assert!(matches!(result, Err(MediaError::Timeout(1))));
        }

        #[tokio::test]
        async fn test_version() {
            let dir = tempfile::tempdir().unwrap();
            let bin = fake_ffmpeg(dir.path(), "echo 'ffmpeg version 6.1 Copyright'");
            let version = ffmpeg_version(&bin).await.unwrap();
            assert_eq!(version, "ffmpeg version 6.1 Copyright");
        }
    }
}
