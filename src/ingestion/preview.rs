//! First-page previews.
//!
//! Rasterizing PDFs is left to an external program. Whatever goes wrong there
//! ends up as "no preview"; ingestion never fails because of it.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    /// Render the first page of `pdf` as a displayable image string, or
    /// `None` if that is not possible.
    async fn render(&self, pdf: &[u8]) -> Option<String>;
}

/// Renderer used when previews are disabled.
pub struct NoPreview;

#[async_trait]
impl PreviewRenderer for NoPreview {
    async fn render(&self, _pdf: &[u8]) -> Option<String> {
        None
    }
}

/// Encode raw image bytes as a `data:` URL. Returns `None` when the bytes are
/// not a recognizable image.
pub fn image_data_url(image: &[u8]) -> Option<String> {
    let kind = infer::get(image)?;
    if !matches!(kind.matcher_type(), infer::MatcherType::Image) {
        return None;
    }
    Some(format!(
        "data:{};base64,{}",
        kind.mime_type(),
        STANDARD.encode(image)
    ))
}

pub const DEFAULT_PREVIEW_PROGRAM: &str = "pdftoppm";

/// Arguments making `pdftoppm` read the PDF from stdin and write a PNG of
/// page one to stdout.
pub const DEFAULT_PREVIEW_ARGS: &[&str] = &[
    "-png",
    "-f",
    "1",
    "-l",
    "1",
    "-singlefile",
    "-scale-to",
    "320",
    "-",
    "-",
];

/// Pipes the PDF into an external rasterizer and reads an image back from
/// its standard output.
pub struct CommandPreviewRenderer {
    program: String,
    args: Vec<String>,
}

impl CommandPreviewRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn pdftoppm() -> Self {
        Self::new(
            DEFAULT_PREVIEW_PROGRAM,
            DEFAULT_PREVIEW_ARGS.iter().map(|a| a.to_string()).collect(),
        )
    }

    async fn run(&self, pdf: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("rasterizer stdin unavailable"))?;
        let input = pdf.to_vec();
        let writer = tokio::spawn(async move {
            // The program may stop reading early; that is its call to make.
            let _ = stdin.write_all(&input).await;
        });

        let output = child.wait_with_output().await?;
        let _ = writer.await;
        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "rasterizer exited with {}",
                output.status
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl PreviewRenderer for CommandPreviewRenderer {
    async fn render(&self, pdf: &[u8]) -> Option<String> {
        match self.run(pdf).await {
            Ok(image) => {
                let url = image_data_url(&image);
                if url.is_none() {
                    warn!(
                        "{} produced {} bytes that are not an image",
                        self.program,
                        image.len()
                    );
                } else {
                    debug!("Rendered preview ({} bytes)", image.len());
                }
                url
            }
            Err(e) => {
                warn!("Preview rendering with {} failed: {}", self.program, e);
                None
            }
        }
    }
}
