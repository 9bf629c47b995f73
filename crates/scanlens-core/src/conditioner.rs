//! Image conditioning for backend size and token-budget profiles.
//!
//! Each provider advertises a profile: a bounding box, a JPEG quality, and an
//! optional token budget. Conditioning resizes into the box (never upscaling),
//! encodes, and estimates token cost from the base64 length. When the estimate
//! blows the budget, one escalation pass re-encodes at the profile's smaller
//! fallback box and quality. Never more than two encode passes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::{ImageError, Result};

/// Size/quality profile an encoded image must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionProfile {
    /// Bounding box for the first encode pass (longest edge, pixels)
    pub max_dimension: u32,
    /// JPEG quality for the first pass (1-100)
    pub quality: u8,
    /// Estimated-token ceiling; `None` disables the budget check
    pub token_budget: Option<u64>,
    /// Bounding box for the escalation pass
    pub retry_dimension: u32,
    /// JPEG quality for the escalation pass
    pub retry_quality: u8,
}

impl Default for ConditionProfile {
    fn default() -> Self {
        // Cloud vision profile: 2048px box at q85, no token budget.
        Self {
            max_dimension: 2048,
            quality: 85,
            token_budget: None,
            retry_dimension: 512,
            retry_quality: 70,
        }
    }
}

impl ConditionProfile {
    /// Profile for text-only backends that receive the image inline: tighter
    /// box, explicit token budget, aggressive escalation pass.
    pub fn text_inline() -> Self {
        Self {
            max_dimension: 1024,
            quality: 80,
            token_budget: Some(100_000),
            retry_dimension: 512,
            retry_quality: 70,
        }
    }
}

/// A conditioned image ready to attach to a provider payload.
#[derive(Debug, Clone)]
pub struct ConditionedImage {
    /// Base64-encoded JPEG bytes
    pub data: String,
    /// Always "image/jpeg" after conditioning
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    /// base64 length / 4, the token proxy used for budget checks
    pub estimated_tokens: u64,
    /// How many encode passes were needed (1 or 2)
    pub passes: u8,
}

impl ConditionedImage {
    /// Data URL form for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }

    /// Wrap already-encoded bytes without conditioning.
    ///
    /// Used for the local provider, which takes the caller's image as-is.
    pub fn passthrough(bytes: &[u8], media_type: &str) -> Self {
        let data = BASE64.encode(bytes);
        let estimated_tokens = data.len() as u64 / 4;
        Self {
            data,
            media_type: media_type.to_string(),
            width: 0,
            height: 0,
            estimated_tokens,
            passes: 0,
        }
    }
}

/// Reject payloads above the configured upload limit before decoding.
pub fn check_upload_size(bytes: &[u8], max_mb: u64) -> Result<()> {
    if bytes.len() as u64 > max_mb * 1024 * 1024 {
        return Err(ImageError::TooLarge {
            size_mb: bytes.len() as u64 / (1024 * 1024),
            max_mb,
        }
        .into());
    }
    Ok(())
}

/// Condition raw image bytes to satisfy `profile`.
///
/// Deterministic for identical input and profile. A decode failure is
/// terminal — the caller's payload is not an image and no retry can fix it.
pub fn condition(bytes: &[u8], profile: &ConditionProfile) -> Result<ConditionedImage> {
    let source = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;

    let mut result = encode_pass(&source, profile.max_dimension, profile.quality, 1)?;

    if let Some(budget) = profile.token_budget {
        if result.estimated_tokens > budget {
            tracing::debug!(
                estimated = result.estimated_tokens,
                budget,
                "Conditioned image over token budget, escalating compression"
            );
            result = encode_pass(&source, profile.retry_dimension, profile.retry_quality, 2)?;
        }
    }

    Ok(result)
}

/// One resize-and-encode pass.
fn encode_pass(
    source: &DynamicImage,
    max_dimension: u32,
    quality: u8,
    pass: u8,
) -> Result<ConditionedImage> {
    // Fit inside the bounding box, never upscale
    let resized = if source.width() > max_dimension || source.height() > max_dimension {
        source.resize(max_dimension, max_dimension, image::imageops::FilterType::Lanczos3)
    } else {
        source.clone()
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut buffer = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))
        .map_err(|e| ImageError::Encode(e.to_string()))?;

    let data = BASE64.encode(buffer.into_inner());
    let estimated_tokens = data.len() as u64 / 4;

    Ok(ConditionedImage {
        data,
        media_type: "image/jpeg".to_string(),
        width: rgb.width(),
        height: rgb.height(),
        estimated_tokens,
        passes: pass,
    })
}
