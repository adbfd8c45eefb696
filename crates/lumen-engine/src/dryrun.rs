use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use crate::client::{ContentRequest, GenerativeModel, ImageBytes, ModelResponse, ResponseKind};

const DRYRUN_SIZE: u32 = 256;

/// Offline stand-in for the hosted model.
///
/// Image requests get a solid PNG coloured by a hash of the instruction;
/// text requests get a short deterministic echo.
#[derive(Debug, Clone)]
pub struct DryrunModel {
    width: u32,
    height: u32,
}

impl DryrunModel {
    pub fn new() -> Self {
        Self::with_size(DRYRUN_SIZE, DRYRUN_SIZE)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }
}

impl Default for DryrunModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerativeModel for DryrunModel {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_content(&self, request: &ContentRequest) -> Result<ModelResponse> {
        let instruction = request.instruction();
        let tag = short_id(instruction);
        match request.kind {
            ResponseKind::Text => Ok(ModelResponse {
                text: Some(format!("dryrun {tag}: {}", instruction.trim())),
                finish_reason: Some("STOP".to_string()),
                ..ModelResponse::default()
            }),
            ResponseKind::Image => {
                let bytes = render_png(self.width, self.height, instruction)?;
                Ok(ModelResponse {
                    images: vec![ImageBytes {
                        bytes,
                        mime_type: Some("image/png".to_string()),
                    }],
                    text: Some(format!("dryrun {tag}")),
                    finish_reason: Some("STOP".to_string()),
                    block_reason: None,
                })
            }
        }
    }
}

fn render_png(width: u32, height: u32, prompt: &str) -> Result<Vec<u8>> {
    let (r, g, b) = color_from_prompt(prompt);
    let image = RgbImage::from_pixel(width, height, Rgb([r, g, b]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .context("dryrun PNG encode failed")?;
    Ok(out.into_inner())
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(prompt.as_bytes());
    (digest[0], digest[1], digest[2])
}

fn short_id(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    hex::encode(&digest[..4])
}
