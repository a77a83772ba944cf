//! Text recognition.
//!
//! The recognizer is an external collaborator behind [`TextRecognizer`].
//! The stock implementation shells out to the `tesseract` CLI, feeding the
//! image on stdin and reading plain text from stdout:
//!
//! ```text
//! tesseract stdin stdout -l spa
//! ```
//!
//! OCR is enrichment, not a requirement: the pipeline calls
//! [`recognize_or_empty`], which turns any failure into empty text plus a
//! recorded reason. One attempt, no retries.

use crate::config::OcrConfig;
use crate::types::TextLine;
use serde::Serialize;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR is disabled")]
    Disabled,
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("OCR I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),
    #[error("OCR exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Turns image bytes into raw text.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Runs an OCR command that reads the image on stdin and prints text.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl TesseractRecognizer {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            program: config.command.clone(),
            args: vec![
                "stdin".to_string(),
                "stdout".to_string(),
                "-l".to_string(),
                config.language.clone(),
            ],
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Arbitrary command with the same stdin/stdout contract.
    pub fn with_command<I, S>(program: &str, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| OcrError::Spawn {
                command: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let input = image.to_vec();
        // Closing stdin on drop signals end of input.
        let writer = thread::spawn(move || match stdin {
            Some(mut stdin) => stdin.write_all(&input),
            None => Ok(()),
        });
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(err) => {
                    abandon(&mut child);
                    return Err(err.into());
                }
            }
            if Instant::now() >= deadline {
                abandon(&mut child);
                return Err(OcrError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        // The command may exit without draining stdin; a broken pipe is not an error.
        let _ = writer.join();
        let stdout = join_reader(stdout)?;
        let stderr = join_reader(stderr)?;

        if !status.success() {
            return Err(OcrError::Failed {
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        debug!("OCR produced {} bytes of text", stdout.len());
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// Kill and reap a child we stopped waiting for.
fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_reader(handle: Option<JoinHandle<io::Result<Vec<u8>>>>) -> Result<Vec<u8>, OcrError> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| OcrError::Io(io::Error::other("pipe reader panicked")))?
            .map_err(OcrError::Io),
        None => Ok(Vec::new()),
    }
}

/// Recognizer used when OCR is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRecognizer;

impl TextRecognizer for DisabledRecognizer {
    fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::Disabled)
    }
}

/// Recognizer selected by `[ocr] enabled`.
pub fn recognizer_from_config(config: &OcrConfig) -> Arc<dyn TextRecognizer> {
    if config.enabled {
        Arc::new(TesseractRecognizer::new(config))
    } else {
        Arc::new(DisabledRecognizer)
    }
}

/// Result of the OCR step as seen by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OcrOutcome {
    /// Raw recognized text; empty on failure.
    pub text: String,
    /// Why recognition failed, if it did.
    pub failure: Option<String>,
}

impl OcrOutcome {
    pub fn lines(&self) -> Vec<TextLine> {
        TextLine::from_ocr(&self.text)
    }
}

/// Run recognition once, absorbing any failure into the outcome.
pub fn recognize_or_empty(recognizer: &dyn TextRecognizer, image: &[u8]) -> OcrOutcome {
    match recognizer.recognize(image) {
        Ok(text) => OcrOutcome {
            text,
            failure: None,
        },
        Err(OcrError::Disabled) => OcrOutcome {
            text: String::new(),
            failure: Some(OcrError::Disabled.to_string()),
        },
        Err(e) => {
            warn!("OCR failed, continuing without text: {e}");
            OcrOutcome {
                text: String::new(),
                failure: Some(e.to_string()),
            }
        }
    }
}
