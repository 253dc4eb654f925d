use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use rust_embed::RustEmbed;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};
use tracing::{debug, info, warn};

use crate::error::ConverterError;
use crate::model::{AUDIO_EXTENSION, ConversionRequest};
use crate::progress::{PROGRESS_TEMPLATE, parse_progress_from_line};

/// How many trailing stderr lines are kept for the failure message.
const STDERR_TAIL_LINES: usize = 8;

/// The opaque tool that downloads a URL and leaves audio in the output
/// directory. Progress fractions may be sent on `progress_tx`; sending is
/// optional and may stop at any time.
#[async_trait]
pub trait ExternalConverter: Send + Sync {
    fn name(&self) -> &str;

    async fn convert(
        &self,
        request: &ConversionRequest,
        progress_tx: UnboundedSender<f32>,
    ) -> Result<(), ConverterError>;
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

fn bundled_name() -> &'static str {
    if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" }
}

/// yt-dlp driven as a child process.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    /// Resolves the executable: an explicit path wins, then a binary bundled
    /// under `assets/`, then `yt-dlp` on `PATH`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, ConverterError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConverterError::MissingBinary(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
            info!(program = %path.display(), "using configured converter");
            return Ok(Self::new(path));
        }

        if let Some(path) = extract_bundled()? {
            info!(program = %path.display(), "using bundled converter");
            return Ok(Self::new(path));
        }

        warn!("no bundled converter found, falling back to yt-dlp on PATH");
        Ok(Self::new(bundled_name()))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn build_args(request: &ConversionRequest) -> Vec<OsString> {
        let output = request.output_path_template().into_os_string();

        vec![
            "-x".into(),
            "--audio-format".into(),
            AUDIO_EXTENSION.into(),
            "--audio-quality".into(),
            "0".into(),
            "--newline".into(),
            "--progress-template".into(),
            PROGRESS_TEMPLATE.into(),
            "-o".into(),
            output,
            request.source_url().into(),
        ]
    }
}

/// Writes the embedded binary into the temp dir once and returns its path.
fn extract_bundled() -> Result<Option<PathBuf>, ConverterError> {
    let bin = bundled_name();
    let Some(data) = Asset::get(bin) else {
        return Ok(None);
    };

    let target = std::env::temp_dir().join(bin);
    if !target.exists() {
        std::fs::write(&target, &data.data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755))?;
        }
        debug!(path = %target.display(), bytes = data.data.len(), "extracted bundled converter");
    }
    Ok(Some(target))
}

#[async_trait]
impl ExternalConverter for YtDlp {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        progress_tx: UnboundedSender<f32>,
    ) -> Result<(), ConverterError> {
        let program = self.program.display().to_string();
        let args = Self::build_args(request);
        debug!(%program, ?args, "spawning converter");

        // Dropping this future (on cancel) drops the child, which kills it.
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConverterError::Spawn { program: program.clone(), source })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConverterError::Failed("converter stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConverterError::Failed("converter stderr was not captured".into()))?;

        let (read_result, stderr_tail) =
            tokio::join!(forward_progress(stdout, &progress_tx), collect_tail(stderr));
        read_result?;

        let status = child.wait().await?;
        if status.success() {
            info!(%program, "converter finished");
            Ok(())
        } else {
            let stderr = if stderr_tail.is_empty() {
                "no error output".to_owned()
            } else {
                stderr_tail
            };
            Err(ConverterError::Exit { program, status: status.to_string(), stderr })
        }
    }
}

async fn forward_progress<R>(stdout: R, progress_tx: &UnboundedSender<f32>) -> Result<(), ConverterError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    while let Some(line) = next_lossy_line(&mut reader, &mut buf).await? {
        match parse_progress_from_line(&line) {
            Some(pct) => {
                let _ = progress_tx.send(pct);
            }
            None => debug!(target: "converter::stdout", "{line}"),
        }
    }
    Ok(())
}

async fn collect_tail<R>(stderr: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    while let Ok(Some(line)) = next_lossy_line(&mut reader, &mut buf).await {
        debug!(target: "converter::stderr", "{line}");
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect::<Vec<_>>().join("\n")
}

/// Reads one line, replacing invalid UTF-8. yt-dlp writes titles in the
/// locale encoding when its output is a pipe.
async fn next_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
}
