#![forbid(unsafe_code)]

//! Palette quantization by pairwise nearest neighbor clustering.
//!
//! Pixels are packed ARGB (`0xAARRGGBB`). [`quantize`] either clusters the
//! image down to at most `max_colors` palette entries and maps every pixel to
//! one of them, or, for `max_colors > 256`, dithers the image straight to a
//! reduced bit depth with no palette.

pub mod argb;
pub mod dither;
pub mod error;
pub mod histogram;
pub mod palette;
pub mod pnn;
pub mod remap;

pub use argb::AlphaProfile;
pub use dither::{DirectDepth, DitherMode};
pub use error::QuantizeError;
pub use palette::Palette;
pub use remap::MapStrategy;

use histogram::{build_histogram, compact_bins};
use remap::PaletteMapper;
use rgb::RGBA8;

/// Largest `max_colors` served by the indexed path.
pub const MAX_PALETTE_COLORS: u32 = 256;

/// Palettes larger than this flatten bin counts before merging.
const QUAN_SQRT_THRESHOLD: u32 = 127;

/// Layout a downstream encoder should use for the quantized raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Full ARGB; the image has at least one pixel with alpha below 255.
    Argb8888,
    /// Opaque 5-6-5.
    Rgb565,
}

/// Configuration for palette quantization.
#[derive(Debug, Clone)]
pub struct QuantizeConfig {
    /// Maximum number of palette colors. At least 2; above 256 selects the
    /// direct reduced-depth path.
    pub max_colors: u32,
    /// Dithering mode for the indexed path. The direct path always diffuses.
    pub dither: DitherMode,
    /// Seed for the closest-color tie-break.
    pub seed: u64,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            max_colors: MAX_PALETTE_COLORS,
            dither: DitherMode::ErrorDiffusion,
            seed: 0,
        }
    }
}

impl QuantizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_colors(mut self, n: u32) -> Self {
        self.max_colors = n;
        self
    }

    pub fn dither(mut self, mode: impl Into<DitherMode>) -> Self {
        self.dither = mode.into();
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Quantized pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raster {
    /// One palette index per pixel.
    Indexed { palette: Palette, indices: Vec<u8> },
    /// Reduced-depth ARGB pixels.
    Direct(Vec<u32>),
}

/// Quantization result.
#[derive(Debug, Clone)]
pub struct QuantizeResult {
    width: usize,
    height: usize,
    pixel_format: PixelFormat,
    raster: Raster,
}

impl QuantizeResult {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn into_raster(self) -> Raster {
        self.raster
    }

    /// Palette entries, for indexed results.
    pub fn palette(&self) -> Option<&[u32]> {
        match &self.raster {
            Raster::Indexed { palette, .. } => Some(palette.entries()),
            Raster::Direct(_) => None,
        }
    }

    /// Palette entries as `rgb` pixels, for indexed results.
    pub fn palette_rgba(&self) -> Option<Vec<RGBA8>> {
        match &self.raster {
            Raster::Indexed { palette, .. } => Some(palette.entries_rgba()),
            Raster::Direct(_) => None,
        }
    }

    /// Number of palette entries, zero for direct results.
    pub fn palette_len(&self) -> usize {
        self.palette().map_or(0, <[u32]>::len)
    }

    /// Palette index of each pixel, for indexed results.
    pub fn indices(&self) -> Option<&[u8]> {
        match &self.raster {
            Raster::Indexed { indices, .. } => Some(indices),
            Raster::Direct(_) => None,
        }
    }

    /// Reduced-depth pixels, for direct results.
    pub fn direct_pixels(&self) -> Option<&[u32]> {
        match &self.raster {
            Raster::Direct(pixels) => Some(pixels),
            Raster::Indexed { .. } => None,
        }
    }

    /// Index 0 when the palette reserves it for transparency.
    pub fn transparent_index(&self) -> Option<u8> {
        match &self.raster {
            Raster::Indexed { palette, .. } => palette.transparent_index(),
            Raster::Direct(_) => None,
        }
    }

    /// The quantized image as ARGB pixels.
    pub fn to_argb(&self) -> Vec<u32> {
        match &self.raster {
            Raster::Indexed { palette, indices } => {
                indices.iter().map(|&k| palette.get(k)).collect()
            }
            Raster::Direct(pixels) => pixels.clone(),
        }
    }

    /// The quantized image packed as 5-6-5, alpha dropped.
    pub fn to_rgb565(&self) -> Vec<u16> {
        self.to_argb().into_iter().map(argb::to_rgb565).collect()
    }
}

/// Quantize an ARGB image.
pub fn quantize(
    pixels: &[u32],
    width: usize,
    height: usize,
    config: &QuantizeConfig,
) -> Result<QuantizeResult, QuantizeError> {
    validate_inputs(pixels.len(), width, height, config)?;

    let profile = AlphaProfile::scan(pixels);
    let mode = profile.bucket_mode();
    let pixel_format = if profile.has_semi_transparency || profile.has_transparency {
        PixelFormat::Argb8888
    } else {
        PixelFormat::Rgb565
    };
    log::debug!(
        "quantize {width}x{height}: max_colors={} dither={:?} alpha={profile:?}",
        config.max_colors,
        config.dither
    );

    if config.max_colors > MAX_PALETTE_COLORS {
        let depth = DirectDepth::for_profile(&profile);
        log::debug!("direct path at {depth:?}");
        let out = dither::dither_direct(pixels, width, height, depth, mode);
        return Ok(QuantizeResult {
            width,
            height,
            pixel_format,
            raster: Raster::Direct(out),
        });
    }

    let palette = if config.max_colors <= 2 {
        Palette::fixed_pair(profile.has_semi_transparency)
    } else {
        build_palette(pixels, config.max_colors, &profile)
    };
    log::debug!("palette: {} entries", palette.len());

    let indices = {
        let mut mapper = PaletteMapper::new(&palette, config.seed);
        let indices = match config.dither {
            DitherMode::ErrorDiffusion => {
                dither::dither_to_palette(pixels, width, height, &mapper, mode)
            }
            DitherMode::None => {
                let strategy = MapStrategy::select(&profile, palette.len());
                mapper.remap(pixels, strategy)
            }
        };
        mapper.clear_cache();
        indices
    };

    Ok(QuantizeResult {
        width,
        height,
        pixel_format,
        raster: Raster::Indexed { palette, indices },
    })
}

/// Quantize an image of `rgb` pixels.
pub fn quantize_rgba(
    pixels: &[RGBA8],
    width: usize,
    height: usize,
    config: &QuantizeConfig,
) -> Result<QuantizeResult, QuantizeError> {
    let packed: Vec<u32> = pixels.iter().map(|&p| argb::from_rgba(p)).collect();
    quantize(&packed, width, height, config)
}

/// Cluster `pixels` into at most `max_colors` entries.
pub fn build_palette(pixels: &[u32], max_colors: u32, profile: &AlphaProfile) -> Palette {
    let quan_sqrt = max_colors > QUAN_SQRT_THRESHOLD;
    let mut bins = compact_bins(build_histogram(pixels, profile.bucket_mode()), quan_sqrt);
    pnn::merge_bins(&mut bins, max_colors as usize);
    Palette::from_bins(&bins, profile.transparent_color)
}

fn validate_inputs(
    pixel_count: usize,
    width: usize,
    height: usize,
    config: &QuantizeConfig,
) -> Result<(), QuantizeError> {
    if width == 0 || height == 0 {
        return Err(QuantizeError::ZeroDimension);
    }
    if width.checked_mul(height) != Some(pixel_count) {
        return Err(QuantizeError::DimensionMismatch {
            len: pixel_count,
            width,
            height,
        });
    }
    if config.max_colors < 2 {
        return Err(QuantizeError::InvalidMaxColors(config.max_colors));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use argb::pack;

    #[test]
    fn config_builder() {
        let config = QuantizeConfig::new().max_colors(16).dither(false).seed(9);
        assert_eq!(config.max_colors, 16);
        assert_eq!(config.dither, DitherMode::None);
        assert_eq!(config.seed, 9);
        let config = QuantizeConfig::new().dither(DitherMode::ErrorDiffusion);
        assert_eq!(config.dither, DitherMode::ErrorDiffusion);
    }

    #[test]
    fn validation() {
        let config = QuantizeConfig::default();
        assert_eq!(
            validate_inputs(0, 0, 4, &config),
            Err(QuantizeError::ZeroDimension)
        );
        assert_eq!(
            validate_inputs(3, 2, 2, &config),
            Err(QuantizeError::DimensionMismatch {
                len: 3,
                width: 2,
                height: 2
            })
        );
        assert_eq!(
            validate_inputs(4, 2, 2, &config.clone().max_colors(1)),
            Err(QuantizeError::InvalidMaxColors(1))
        );
        assert_eq!(validate_inputs(4, 2, 2, &config.max_colors(100_000)), Ok(()));
    }

    #[test]
    fn build_palette_respects_limit() {
        let pixels: Vec<u32> = (0..4096u32)
            .map(|i| pack(255, (i & 0xFF) as u8, (i >> 4) as u8, (i * 3) as u8))
            .collect();
        let profile = AlphaProfile::scan(&pixels);
        for max in [3u32, 16, 128, 200, 256] {
            let palette = build_palette(&pixels, max, &profile);
            assert_eq!(palette.len(), max as usize);
        }
    }

    #[test]
    fn pixel_format_follows_alpha() {
        let opaque = vec![pack(255, 1, 2, 3); 4];
        let result = quantize(&opaque, 2, 2, &QuantizeConfig::new().max_colors(8)).unwrap();
        assert_eq!(result.pixel_format(), PixelFormat::Rgb565);

        let semi = vec![pack(200, 1, 2, 3); 4];
        let result = quantize(&semi, 2, 2, &QuantizeConfig::new().max_colors(8)).unwrap();
        assert_eq!(result.pixel_format(), PixelFormat::Argb8888);
    }
}
