//! Linear min-max contrast stretch to 8-bit.
//!
//! Thermal and scientific cameras deliver 8- or 16-bit samples that rarely
//! span their full range. `normalize` maps the observed `[min, max]` of one
//! frame onto `[0, 255]`:
//!
//! ```text
//! scale = 255 / (max - min)
//! out   = trunc((sample - min) * scale + 0.5)
//! ```
//!
//! Depth is chosen by whole bytes per pixel (`bits_per_pixel / 8`): one byte
//! takes the 8-bit path, two bytes the 16-bit little-endian path. Mono10 and
//! Mono12 arrive in 16-bit containers and stretch like Mono16. Every other
//! depth produces an all-zero frame of the right length rather than an error.
//!
//! A flat frame (`max == min`) also produces zeros.

use crate::error::{AcqError, AcqResult};

/// Sample container width the stretch understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDepth {
    /// One byte per sample.
    Eight,
    /// Two little-endian bytes per sample.
    Sixteen,
}

impl SampleDepth {
    /// Classify a pixel depth, `None` for depths that degrade to zeros.
    #[must_use]
    pub fn from_bits(bits_per_pixel: u32) -> Option<Self> {
        match bits_per_pixel / 8 {
            1 => Some(SampleDepth::Eight),
            2 => Some(SampleDepth::Sixteen),
            _ => None,
        }
    }

    /// Bytes occupied by one sample.
    #[must_use]
    pub fn bytes(&self) -> usize {
        match self {
            SampleDepth::Eight => 1,
            SampleDepth::Sixteen => 2,
        }
    }
}

/// Contrast-stretch one raw frame into `width * height` 8-bit samples.
///
/// An empty `raw` yields an empty output. `raw` may be longer than the frame
/// (pooled buffers are sized from the payload); trailing bytes are ignored.
///
/// # Errors
///
/// - `AcqError::Allocation` if `width * height` overflows or the output
///   cannot be allocated
/// - `AcqError::TruncatedFrame` if `raw` is non-empty but shorter than the
///   geometry requires
pub fn normalize(raw: &[u8], width: u32, height: u32, bits_per_pixel: u32) -> AcqResult<Vec<u8>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let npix = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| AcqError::allocation(usize::MAX, "frame dimensions overflow"))?;

    let mut out = Vec::new();
    out.try_reserve_exact(npix)
        .map_err(|e| AcqError::allocation(npix, e.to_string()))?;

    let Some(depth) = SampleDepth::from_bits(bits_per_pixel) else {
        tracing::trace!(bits_per_pixel, "Unsupported depth, emitting blank frame");
        out.resize(npix, 0);
        return Ok(out);
    };

    let expected = npix * depth.bytes();
    if raw.len() < expected {
        return Err(AcqError::TruncatedFrame {
            expected,
            actual: raw.len(),
        });
    }
    let raw = &raw[..expected];

    match depth {
        SampleDepth::Eight => stretch(raw.iter().map(|&s| u32::from(s)), npix, &mut out),
        SampleDepth::Sixteen => stretch(
            raw.chunks_exact(2)
                .map(|c| u32::from(u16::from_le_bytes([c[0], c[1]]))),
            npix,
            &mut out,
        ),
    }
    Ok(out)
}

fn stretch<I>(samples: I, npix: usize, out: &mut Vec<u8>)
where
    I: Iterator<Item = u32> + Clone,
{
    let (min, max) = samples
        .clone()
        .fold((u32::MAX, 0u32), |(lo, hi), s| (lo.min(s), hi.max(s)));

    if max > min {
        let scale = 255.0f32 / (max - min) as f32;
        // Float-to-int casts saturate, so the top sample cannot wrap past 255.
        out.extend(samples.map(|s| ((s - min) as f32 * scale + 0.5) as u8));
    } else {
        out.resize(npix, 0);
    }
}
