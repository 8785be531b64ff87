//! Packed 32-bit ARGB pixels: alpha in the top byte, blue in the bottom.

use rgb::RGBA8;

pub const OPAQUE_BLACK: u32 = 0xFF00_0000;
pub const OPAQUE_WHITE: u32 = 0xFFFF_FFFF;
pub const TRANSPARENT: u32 = 0x0000_0000;

#[inline(always)]
pub const fn alpha(c: u32) -> u8 {
    (c >> 24) as u8
}

#[inline(always)]
pub const fn red(c: u32) -> u8 {
    (c >> 16) as u8
}

#[inline(always)]
pub const fn green(c: u32) -> u8 {
    (c >> 8) as u8
}

#[inline(always)]
pub const fn blue(c: u32) -> u8 {
    c as u8
}

/// Pack four channels into one ARGB value.
#[inline(always)]
pub const fn pack(a: u8, r: u8, g: u8, b: u8) -> u32 {
    (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Channels in `[a, r, g, b]` order.
#[inline(always)]
pub const fn channels(c: u32) -> [u8; 4] {
    [alpha(c), red(c), green(c), blue(c)]
}

pub fn from_rgba(p: RGBA8) -> u32 {
    pack(p.a, p.r, p.g, p.b)
}

pub fn to_rgba(c: u32) -> RGBA8 {
    RGBA8 {
        r: red(c),
        g: green(c),
        b: blue(c),
        a: alpha(c),
    }
}

/// Pack into the 16-bit 5-6-5 layout, dropping alpha and the low bits.
pub const fn to_rgb565(c: u32) -> u16 {
    ((red(c) as u16 & 0xF8) << 8) | ((green(c) as u16 & 0xFC) << 3) | (blue(c) as u16 >> 3)
}

/// Transparency facts about one image, gathered in a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlphaProfile {
    /// Some pixel has alpha == 0.
    pub has_transparency: bool,
    /// Some pixel has alpha < 255.
    pub has_semi_transparency: bool,
    /// The first fully transparent pixel, as found in the source.
    pub transparent_color: Option<u32>,
}

impl AlphaProfile {
    pub fn scan(pixels: &[u32]) -> Self {
        let mut profile = Self::default();
        for &c in pixels {
            let a = alpha(c);
            if a == u8::MAX {
                continue;
            }
            profile.has_semi_transparency = true;
            if a == 0 {
                profile.has_transparency = true;
                if profile.transparent_color.is_none() {
                    profile.transparent_color = Some(c);
                }
            }
        }
        profile
    }

    pub fn bucket_mode(&self) -> crate::histogram::BucketMode {
        use crate::histogram::BucketMode;
        if self.has_semi_transparency {
            BucketMode::SemiTransparent
        } else if self.has_transparency {
            BucketMode::Transparent
        } else {
            BucketMode::Opaque
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_roundtrip() {
        let c = pack(0x12, 0x34, 0x56, 0x78);
        assert_eq!(c, 0x1234_5678);
        assert_eq!(channels(c), [0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn rgba_interop() {
        let p = RGBA8 {
            r: 10,
            g: 20,
            b: 30,
            a: 40,
        };
        assert_eq!(from_rgba(p), 0x280A_141E);
        assert_eq!(to_rgba(from_rgba(p)), p);
    }

    #[test]
    fn rgb565_packing() {
        assert_eq!(to_rgb565(OPAQUE_WHITE), 0xFFFF);
        assert_eq!(to_rgb565(OPAQUE_BLACK), 0x0000);
        assert_eq!(to_rgb565(pack(255, 0xFF, 0, 0)), 0xF800);
        assert_eq!(to_rgb565(pack(255, 0, 0xFF, 0)), 0x07E0);
        assert_eq!(to_rgb565(pack(255, 0, 0, 0xFF)), 0x001F);
    }

    #[test]
    fn opaque_profile() {
        let profile = AlphaProfile::scan(&[OPAQUE_BLACK, OPAQUE_WHITE]);
        assert!(!profile.has_semi_transparency);
        assert!(!profile.has_transparency);
        assert_eq!(profile.transparent_color, None);
    }

    #[test]
    fn semi_transparent_profile() {
        let profile = AlphaProfile::scan(&[OPAQUE_BLACK, pack(128, 1, 2, 3)]);
        assert!(profile.has_semi_transparency);
        assert!(!profile.has_transparency);
    }

    #[test]
    fn first_transparent_color_is_recorded() {
        let first = pack(0, 1, 2, 3);
        let second = pack(0, 4, 5, 6);
        let profile = AlphaProfile::scan(&[OPAQUE_WHITE, first, second]);
        assert!(profile.has_transparency);
        assert!(profile.has_semi_transparency);
        assert_eq!(profile.transparent_color, Some(first));
    }
}
