//! # clarity-image
//!
//! **Tier 0 (Raster Substrate)**
//!
//! Deterministic image handling for the sweep pipeline. Decoding accepts any
//! raster format the imaging library reads; the working representation is a
//! flat RGB8 buffer; emission is always PNG. The perturbation transforms use
//! integer and 8.8 fixed-point arithmetic so the perturbed bytes hash
//! identically across machines.
//!
//! ## What belongs here
//! * Raster decode/encode and the RGB8 working buffer
//! * The four perturbation transforms
//! * Normalized-rectangle mask fills with the neutral value
//!
//! ## What does NOT belong here
//! * Sweep orchestration or directory layout
//! * Anything that consults a clock, an RNG, or the environment

use std::io::Cursor;

use thiserror::Error;

use clarity_types::PerturbationKind;
use clarity_types::probe::RegionMask;

/// The fixed neutral fill for occlusion and counterfactual masks.
///
/// Pinned; making it histogram-dependent would couple bundle hashes to
/// image statistics.
pub const NEUTRAL_FILL: u8 = 128;

/// Largest number of box-blur passes the blur axis accepts.
pub const MAX_BLUR_PASSES: u32 = 8;

/// Largest affine scale factor the brightness and contrast axes accept.
pub const MAX_SCALE_FACTOR: f64 = 4.0;

/// Failures of decoding, validation, or transformation.
#[derive(Debug, Error)]
pub enum PerturbationError {
    #[error("image bytes could not be decoded: {source}")]
    Decode {
        #[source]
        source: image::ImageError,
    },

    #[error("image could not be encoded as png: {source}")]
    Encode {
        #[source]
        source: image::ImageError,
    },

    #[error("{kind} value {value} is out of range: {reason}")]
    ValueOutOfRange {
        kind: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("region {region_id} is not a valid normalized rectangle")]
    InvalidRegion { region_id: String },
}

/// A decoded image as a flat row-major RGB8 buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    /// Decode any supported raster format into RGB8.
    pub fn decode(bytes: &[u8]) -> Result<Self, PerturbationError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|source| PerturbationError::Decode { source })?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgb.into_raw(),
        })
    }

    /// A uniform gray raster; the canonical synthetic baseline in tests.
    pub fn uniform(width: u32, height: u32, gray: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![gray; (width as usize) * (height as usize) * 3],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGB triple at `(x, y)`. Panics on out-of-bounds coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = self.offset(x, y);
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * 3
    }

    /// Encode as PNG; the only emission format the pipeline uses.
    pub fn encode_png(&self) -> Result<Vec<u8>, PerturbationError> {
        let buffer: image::RgbImage =
            image::ImageBuffer::from_raw(self.width, self.height, self.pixels.clone())
                .expect("raster buffer length matches its dimensions");
        let mut out = Cursor::new(Vec::new());
        buffer
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|source| PerturbationError::Encode { source })?;
        Ok(out.into_inner())
    }
}

/// Apply one perturbation to a raster, producing a new raster.
///
/// Brightness and contrast are affine pixel scalings in 8.8 fixed point;
/// blur is `value` passes of an integer 3×3 box kernel with clamp-to-edge
/// borders; occlusion fills the centered rectangle whose side fractions
/// equal `value` with [`NEUTRAL_FILL`].
pub fn apply(
    raster: &Raster,
    kind: PerturbationKind,
    value: f64,
) -> Result<Raster, PerturbationError> {
    match kind {
        PerturbationKind::Brightness => {
            let factor = scale_factor(kind, value)?;
            Ok(map_pixels(raster, |px| scale_u8(px, factor)))
        }
        PerturbationKind::Contrast => {
            let factor = scale_factor(kind, value)?;
            Ok(map_pixels(raster, |px| contrast_u8(px, factor)))
        }
        PerturbationKind::Blur => {
            let passes = blur_passes(value)?;
            let mut current = raster.clone();
            for _ in 0..passes {
                current = box_blur(&current);
            }
            Ok(current)
        }
        PerturbationKind::Occlusion => {
            let fraction = occlusion_fraction(value)?;
            Ok(occlude_center(raster, fraction))
        }
    }
}

/// Fill a normalized-coordinate rectangle with [`NEUTRAL_FILL`].
///
/// Cell boundaries snap to the pixel grid with round-half-up; no other
/// pixels change.
pub fn fill_region(raster: &Raster, mask: &RegionMask) -> Result<Raster, PerturbationError> {
    let valid = (0.0..=1.0).contains(&mask.x_min)
        && (0.0..=1.0).contains(&mask.x_max)
        && (0.0..=1.0).contains(&mask.y_min)
        && (0.0..=1.0).contains(&mask.y_max)
        && mask.x_min < mask.x_max
        && mask.y_min < mask.y_max;
    if !valid {
        return Err(PerturbationError::InvalidRegion {
            region_id: mask.region_id.clone(),
        });
    }
    let x0 = snap(mask.x_min, raster.width);
    let x1 = snap(mask.x_max, raster.width);
    let y0 = snap(mask.y_min, raster.height);
    let y1 = snap(mask.y_max, raster.height);
    let mut out = raster.clone();
    for y in y0..y1 {
        for x in x0..x1 {
            let idx = out.offset(x, y);
            out.pixels[idx] = NEUTRAL_FILL;
            out.pixels[idx + 1] = NEUTRAL_FILL;
            out.pixels[idx + 2] = NEUTRAL_FILL;
        }
    }
    Ok(out)
}

/// Decode, perturb, re-encode. The convenience path the orchestrator uses.
pub fn perturb_png(
    bytes: &[u8],
    kind: PerturbationKind,
    value: f64,
) -> Result<Vec<u8>, PerturbationError> {
    let raster = Raster::decode(bytes)?;
    apply(&raster, kind, value)?.encode_png()
}

/// Decode, mask, re-encode. The convenience path the probe engine uses.
pub fn mask_png(bytes: &[u8], mask: &RegionMask) -> Result<Vec<u8>, PerturbationError> {
    let raster = Raster::decode(bytes)?;
    fill_region(&raster, mask)?.encode_png()
}

fn scale_factor(kind: PerturbationKind, value: f64) -> Result<u32, PerturbationError> {
    if !value.is_finite() || value < 0.0 || value > MAX_SCALE_FACTOR {
        return Err(PerturbationError::ValueOutOfRange {
            kind: kind.as_str(),
            value,
            reason: "affine scale factors must lie in [0, 4]",
        });
    }
    // 8.8 fixed point; 1.0 maps to 256 and is an exact identity.
    Ok((value * 256.0 + 0.5).floor() as u32)
}

fn blur_passes(value: f64) -> Result<u32, PerturbationError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > f64::from(MAX_BLUR_PASSES)
    {
        return Err(PerturbationError::ValueOutOfRange {
            kind: PerturbationKind::Blur.as_str(),
            value,
            reason: "blur values are whole pass counts in [0, 8]",
        });
    }
    Ok(value as u32)
}

fn occlusion_fraction(value: f64) -> Result<f64, PerturbationError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(PerturbationError::ValueOutOfRange {
            kind: PerturbationKind::Occlusion.as_str(),
            value,
            reason: "occlusion fractions must lie in [0, 1]",
        });
    }
    Ok(value)
}

fn map_pixels(raster: &Raster, f: impl Fn(u8) -> u8) -> Raster {
    Raster {
        width: raster.width,
        height: raster.height,
        pixels: raster.pixels.iter().map(|px| f(*px)).collect(),
    }
}

fn scale_u8(px: u8, factor_fp: u32) -> u8 {
    let scaled = (u32::from(px) * factor_fp + 128) >> 8;
    scaled.min(255) as u8
}

fn contrast_u8(px: u8, factor_fp: u32) -> u8 {
    let centered = i64::from(px) - i64::from(NEUTRAL_FILL);
    let scaled = (centered * i64::from(factor_fp) + 128) >> 8;
    (scaled + i64::from(NEUTRAL_FILL)).clamp(0, 255) as u8
}

fn box_blur(raster: &Raster) -> Raster {
    let mut out = raster.clone();
    let w = raster.width as i64;
    let h = raster.height as i64;
    for y in 0..h {
        for x in 0..w {
            for channel in 0..3usize {
                let mut sum: u32 = 0;
                for dy in -1..=1i64 {
                    for dx in -1..=1i64 {
                        let sx = (x + dx).clamp(0, w - 1) as u32;
                        let sy = (y + dy).clamp(0, h - 1) as u32;
                        sum += u32::from(raster.pixels[raster.offset(sx, sy) + channel]);
                    }
                }
                let idx = out.offset(x as u32, y as u32) + channel;
                out.pixels[idx] = ((sum + 4) / 9) as u8;
            }
        }
    }
    out
}

fn occlude_center(raster: &Raster, fraction: f64) -> Raster {
    let ow = snap(fraction, raster.width);
    let oh = snap(fraction, raster.height);
    if ow == 0 || oh == 0 {
        return raster.clone();
    }
    let x0 = (raster.width - ow) / 2;
    let y0 = (raster.height - oh) / 2;
    let mut out = raster.clone();
    for y in y0..y0 + oh {
        for x in x0..x0 + ow {
            let idx = out.offset(x, y);
            out.pixels[idx] = NEUTRAL_FILL;
            out.pixels[idx + 1] = NEUTRAL_FILL;
            out.pixels[idx + 2] = NEUTRAL_FILL;
        }
    }
    out
}

/// Round-half-up snap of a normalized coordinate onto a pixel count.
fn snap(fraction: f64, extent: u32) -> u32 {
    let snapped = (fraction * f64::from(extent) + 0.5).floor() as u32;
    snapped.min(extent)
}
