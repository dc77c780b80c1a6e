//! Login QR output: a PNG file plus optional terminal art.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use qrcode::{render::unicode, QrCode};
use tracing::info;

use stb_core::{errors::Error, messaging::port::ChallengeRenderer, Result};

const QR_MIN_PIXELS: u32 = 256;

pub struct QrRenderer {
    image_path: PathBuf,
    terminal: bool,
}

impl QrRenderer {
    pub fn new(image_path: impl Into<PathBuf>, terminal: bool) -> Self {
        Self {
            image_path: image_path.into(),
            terminal,
        }
    }
}

#[async_trait]
impl ChallengeRenderer for QrRenderer {
    async fn render(&self, payload: &str) -> Result<Option<PathBuf>> {
        let payload = payload.to_string();
        let path = self.image_path.clone();
        let terminal = self.terminal;

        let art = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let code = QrCode::new(payload.as_bytes())
                .map_err(|e| Error::Render(format!("invalid QR payload: {e}")))?;
            write_png(&code, &path)?;
            Ok(terminal.then(|| terminal_art(&code)))
        })
        .await
        .map_err(|e| Error::Render(format!("QR render task failed: {e}")))??;

        if let Some(art) = art {
            println!("{art}");
        }
        info!(path = %self.image_path.display(), "scan the QR code to link this device");
        Ok(Some(self.image_path.clone()))
    }
}

fn write_png(code: &QrCode, path: &Path) -> Result<()> {
    code.render::<image::Luma<u8>>()
        .min_dimensions(QR_MIN_PIXELS, QR_MIN_PIXELS)
        .build()
        .save(path)
        .map_err(|e| Error::Render(format!("failed to write {}: {e}", path.display())))
}

/// Half-block rendering, inverted so it scans on dark terminals.
fn terminal_art(code: &QrCode) -> String {
    code.render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build()
}
