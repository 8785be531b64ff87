//! Two-row serpentine error diffusion.
//!
//! Even rows run left to right, odd rows right to left. Errors live in two
//! `i16` rows of four lanes per pixel, carried in sixteenths: the pixel ahead
//! gets 7, below-behind 3, below 5 and below-ahead 1. The next-row buffer is
//! filled back to front so the following scanline, which runs the other way,
//! reads it front to back.

use crate::argb::{self, AlphaProfile};
use crate::histogram::{BucketMode, BUCKET_COUNT};
use crate::remap::PaletteMapper;

/// Lanes per pixel in the error rows.
const DJ: usize = 4;
/// Residuals are limited to this magnitude per channel.
const DITHER_MAX: i32 = 20;

/// Dithering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DitherMode {
    /// Map each pixel independently.
    None,
    /// Serpentine error diffusion.
    ErrorDiffusion,
}

impl From<bool> for DitherMode {
    fn from(dither: bool) -> Self {
        if dither {
            Self::ErrorDiffusion
        } else {
            Self::None
        }
    }
}

/// Fixed bit depth for the palette-less path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectDepth {
    /// Four bits per channel.
    Argb4444,
    /// Alpha thresholded to 0 or 255, color in 5-6-5.
    BinaryAlphaRgb565,
    /// Opaque 5-6-5.
    Rgb565,
}

impl DirectDepth {
    pub fn for_profile(profile: &AlphaProfile) -> Self {
        if profile.has_semi_transparency {
            Self::Argb4444
        } else if profile.has_transparency {
            Self::BinaryAlphaRgb565
        } else {
            Self::Rgb565
        }
    }

    /// Truncate `c` to this depth, keeping the result in ARGB layout.
    pub fn reduce(self, c: u32) -> u32 {
        let [a, r, g, b] = argb::channels(c);
        match self {
            Self::Argb4444 => argb::pack(a & 0xF0, r & 0xF0, g & 0xF0, b & 0xF0),
            Self::BinaryAlphaRgb565 => {
                let a = if a < u8::MAX { 0 } else { u8::MAX };
                argb::pack(a, r & 0xF8, g & 0xFC, b & 0xF8)
            }
            Self::Rgb565 => argb::pack(u8::MAX, r & 0xF8, g & 0xFC, b & 0xF8),
        }
    }
}

struct Tables {
    /// `clamp[v + 256]` is `v` saturated to 0..=255.
    clamp: [u8; 1024],
    /// `limit[v + 256]` is `v` saturated to ±DITHER_MAX.
    limit: [i16; 512],
}

impl Tables {
    fn new() -> Self {
        let mut clamp = [u8::MAX; 1024];
        clamp[..256].fill(0);
        for (i, v) in clamp[256..512].iter_mut().enumerate() {
            *v = i as u8;
        }
        let mut limit = [0i16; 512];
        for (i, v) in limit.iter_mut().enumerate() {
            *v = (i as i32 - 256).clamp(-DITHER_MAX, DITHER_MAX) as i16;
        }
        Self { clamp, limit }
    }
}

/// Scan `pixels` in serpentine order, quantizing each error-corrected pixel
/// with `pick`, which returns the output value and the color it stands for.
///
/// `pick` runs at most once per bucket of `mode`; later pixels landing in the
/// same bucket reuse its answer.
fn serpentine<T, F>(
    pixels: &[u32],
    width: usize,
    height: usize,
    mode: BucketMode,
    mut pick: F,
) -> Vec<T>
where
    T: Copy + Default,
    F: FnMut(u32) -> (T, u32),
{
    let tables = Tables::new();
    let mut out = vec![T::default(); pixels.len()];
    let mut lookup: Vec<Option<(T, u32)>> = vec![None; BUCKET_COUNT];
    let err_len = (width + 2) * DJ;
    let mut even = vec![0i16; err_len];
    let mut odd = vec![0i16; err_len];

    for y in 0..height {
        let reverse = y % 2 == 1;
        let (row0, row1) = if reverse {
            (&mut odd, &mut even)
        } else {
            (&mut even, &mut odd)
        };

        let mut cursor0 = DJ;
        let mut cursor1 = width * DJ;
        // Lanes from here on are only ever added to, never assigned.
        row1[cursor1..].fill(0);

        for j in 0..width {
            let x = if reverse { width - 1 - j } else { j };
            let idx = y * width + x;
            let src = argb::channels(pixels[idx]);

            let mut corrected = [0u8; DJ];
            for ch in 0..DJ {
                let carry = (row0[cursor0 + ch] as i32 + 0x1008) >> 4;
                corrected[ch] = tables.clamp[(carry + src[ch] as i32) as usize];
            }
            let c1 = argb::pack(corrected[0], corrected[1], corrected[2], corrected[3]);

            let key = mode.key(c1) as usize;
            let (value, chosen) = match lookup[key] {
                Some(hit) => hit,
                None => {
                    let hit = pick(c1);
                    lookup[key] = Some(hit);
                    hit
                }
            };
            out[idx] = value;

            let dst = argb::channels(chosen);
            for ch in 0..DJ {
                let diff = corrected[ch] as i32 - dst[ch] as i32;
                let mut e = tables.limit[(diff + 256) as usize];
                let k = e * 2;
                row1[cursor1 - DJ + ch] = e;
                e += k;
                row1[cursor1 + DJ + ch] += e;
                e += k;
                row1[cursor1 + ch] += e;
                e += k;
                row0[cursor0 + DJ + ch] += e;
            }

            cursor0 += DJ;
            cursor1 -= DJ;
        }
    }

    out
}

/// Dither against a palette, returning one palette index per pixel.
pub fn dither_to_palette(
    pixels: &[u32],
    width: usize,
    height: usize,
    mapper: &PaletteMapper<'_>,
    mode: BucketMode,
) -> Vec<u8> {
    let palette = mapper.palette();
    serpentine(pixels, width, height, mode, |c| {
        let k = mapper.nearest(c);
        (k, palette.get(k))
    })
}

/// Dither to a fixed bit depth, returning reduced ARGB pixels.
pub fn dither_direct(
    pixels: &[u32],
    width: usize,
    height: usize,
    depth: DirectDepth,
    mode: BucketMode,
) -> Vec<u32> {
    serpentine(pixels, width, height, mode, |c| {
        let q = depth.reduce(c);
        (q, q)
    })
}
