use crate::argb;

/// Number of representable bucket keys.
pub const BUCKET_COUNT: usize = 1 << 16;

/// How a pixel's channels are truncated to form its 16-bit bucket key.
///
/// Alpha gets the fewest bits and green the most, so the keys spend their
/// precision where the eye is most sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketMode {
    /// 4-4-4-4: alpha is a full dimension.
    SemiTransparent,
    /// 1-5-5-5: alpha only distinguishes transparent from opaque.
    Transparent,
    /// 5-6-5: alpha ignored.
    Opaque,
}

impl BucketMode {
    /// Map an ARGB pixel to its bucket key.
    #[inline]
    pub fn key(self, c: u32) -> u16 {
        let a = argb::alpha(c) as u32;
        let r = argb::red(c) as u32;
        let g = argb::green(c) as u32;
        let b = argb::blue(c) as u32;
        let key = match self {
            Self::SemiTransparent => (a & 0xF0) << 8 | (r & 0xF0) << 4 | (g & 0xF0) | (b >> 4),
            Self::Transparent => (a & 0x80) << 8 | (r & 0xF8) << 7 | (g & 0xF8) << 2 | (b >> 3),
            Self::Opaque => (r & 0xF8) << 8 | (g & 0xFC) << 3 | (b >> 3),
        };
        key as u16
    }
}

/// Accumulator for one color bucket, and later one node of the merge list.
///
/// Channel fields hold raw sums during the histogram pass and means afterwards.
/// `fw`/`bk` link surviving bins in key order; slot 0 heads the list and is
/// never consumed by a merge, so `fw == 0` terminates it.
#[derive(Debug, Clone, Default)]
pub struct Bin {
    pub ac: f64,
    pub rc: f64,
    pub gc: f64,
    pub bc: f64,
    pub count: u32,
    /// Cached cost of merging with `nn`.
    pub err: f64,
    pub nn: usize,
    pub fw: usize,
    pub bk: usize,
    /// Merge step at which `err`/`nn` were last computed.
    pub tm: u32,
    /// Merge step at which this bin last absorbed another, or `DELETED`.
    pub mtm: u32,
}

impl Bin {
    pub const DELETED: u32 = u32::MAX;

    pub fn is_deleted(&self) -> bool {
        self.mtm == Self::DELETED
    }

    /// Mean color rounded half away from zero.
    pub fn color(&self) -> u32 {
        let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
        argb::pack(
            channel(self.ac),
            channel(self.rc),
            channel(self.gc),
            channel(self.bc),
        )
    }
}

/// Accumulate every pixel into the bin at its bucket key.
///
/// Returns the full key-addressed arena; untouched buckets have `count == 0`.
pub fn build_histogram(pixels: &[u32], mode: BucketMode) -> Vec<Bin> {
    let mut bins = vec![Bin::default(); BUCKET_COUNT];
    for &c in pixels {
        let bin = &mut bins[mode.key(c) as usize];
        bin.ac += argb::alpha(c) as f64;
        bin.rc += argb::red(c) as f64;
        bin.gc += argb::green(c) as f64;
        bin.bc += argb::blue(c) as f64;
        bin.count += 1;
    }
    bins
}

/// Turn sums into means, drop empty buckets and link the rest in key order.
///
/// With `quan_sqrt`, each count is replaced by its integer square root so huge
/// flat regions don't swallow small distinct clusters during merging.
pub fn compact_bins(bins: Vec<Bin>, quan_sqrt: bool) -> Vec<Bin> {
    let mut compact: Vec<Bin> = bins
        .into_iter()
        .filter(|b| b.count > 0)
        .map(|mut b| {
            let d = 1.0 / b.count as f64;
            b.ac *= d;
            b.rc *= d;
            b.gc *= d;
            b.bc *= d;
            if quan_sqrt {
                b.count = b.count.isqrt();
            }
            b
        })
        .collect();

    for i in 1..compact.len() {
        compact[i - 1].fw = i;
        compact[i].bk = i - 1;
    }
    log::trace!("histogram: {} populated buckets", compact.len());
    compact
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argb::pack;

    #[test]
    fn opaque_keys() {
        let mode = BucketMode::Opaque;
        assert_eq!(mode.key(pack(255, 0, 0, 0)), 0x0000);
        assert_eq!(
            mode.key(pack(255, 0xFF, 0xFF, 0xFF)) as u32,
            (0xF8 << 8 | 0xFC << 3 | 0x1F) as u32
        );
        assert_eq!(mode.key(pack(255, 0xFF, 0xFF, 0xFF)), 0xFFFF);
        // Alpha does not participate.
        assert_eq!(mode.key(pack(0, 0x80, 0x80, 0x80)), mode.key(pack(255, 0x80, 0x80, 0x80)));
        assert_eq!(mode.key(pack(255, 0x80, 0x80, 0x80)), 0x8410);
    }

    #[test]
    fn semi_transparent_keys() {
        let mode = BucketMode::SemiTransparent;
        assert_eq!(mode.key(pack(0, 0, 0, 0)), 0x0000);
        assert_eq!(mode.key(pack(255, 0, 0, 0)), 0xF000);
        assert_eq!(mode.key(pack(255, 0xFF, 0xFF, 0xFF)), 0xFFFF);
        assert_eq!(mode.key(pack(0x80, 0x80, 0x80, 0x80)), 0x8888);
    }

    #[test]
    fn transparent_keys() {
        let mode = BucketMode::Transparent;
        assert_eq!(mode.key(pack(0, 0, 0, 0)), 0x0000);
        assert_eq!(mode.key(pack(255, 0, 0, 0)), 0x8000);
        assert_eq!(mode.key(pack(255, 0xFF, 0xFF, 0xFF)), 0xFFFF);
        assert_eq!(mode.key(pack(0x80, 0x80, 0x80, 0x80)), 0xC210);
    }

    #[test]
    fn counts_sum_to_pixel_count() {
        let pixels: Vec<u32> = (0..1000u32).map(|i| pack(255, i as u8, (i * 7) as u8, 3)).collect();
        let bins = build_histogram(&pixels, BucketMode::Opaque);
        let total: u64 = bins.iter().map(|b| b.count as u64).sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn compaction_keeps_key_order_and_links() {
        let pixels = [
            pack(255, 0xFF, 0xFF, 0xFF),
            pack(255, 0, 0, 0),
            pack(255, 0x80, 0x80, 0x80),
            pack(255, 0, 0, 0),
        ];
        let bins = compact_bins(build_histogram(&pixels, BucketMode::Opaque), false);
        assert_eq!(bins.len(), 3);
        assert_eq!(bins[0].color(), pack(255, 0, 0, 0));
        assert_eq!(bins[0].count, 2);
        assert_eq!(bins[2].color(), pack(255, 0xFF, 0xFF, 0xFF));
        assert_eq!((bins[0].fw, bins[1].fw, bins[2].fw), (1, 2, 0));
        assert_eq!((bins[1].bk, bins[2].bk), (0, 1));
    }

    #[test]
    fn means_average_bucket_members() {
        let pixels = [pack(255, 0x80, 0, 0), pack(255, 0x83, 0, 0)];
        let bins = compact_bins(build_histogram(&pixels, BucketMode::Opaque), false);
        assert_eq!(bins.len(), 1);
        assert!((bins[0].rc - 129.5).abs() < 1e-9);
        // 129.5 rounds away from zero.
        assert_eq!(argb::red(bins[0].color()), 130);
    }

    #[test]
    fn sqrt_flattens_counts() {
        let pixels = vec![pack(255, 10, 10, 10); 100];
        let bins = compact_bins(build_histogram(&pixels, BucketMode::Opaque), true);
        assert_eq!(bins[0].count, 10);
    }

    #[test]
    fn empty_input_has_no_bins() {
        let bins = compact_bins(build_histogram(&[], BucketMode::Opaque), false);
        assert!(bins.is_empty());
    }
}
