use std::collections::BTreeMap;

use rand::{Rng as _, SeedableRng as _};
use rand_xoshiro::Xoroshiro128PlusPlus;

use crate::argb::{self, AlphaProfile};
use crate::palette::{Palette, SquareTable};

/// Upper bound of the tie-break draw and the "no runner-up" distance.
const SHORT_MAX: u16 = i16::MAX as u16;

/// How a pixel picks its palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapStrategy {
    /// Exact minimum squared distance.
    Nearest,
    /// Best two by Manhattan distance, one chosen at random weighted toward
    /// the closer. Breaks up banding in large flat areas.
    Closest,
}

impl MapStrategy {
    /// Closest is only worth its noise on full opaque palettes.
    pub fn select(profile: &AlphaProfile, palette_len: usize) -> Self {
        if profile.has_semi_transparency || palette_len < 256 {
            Self::Nearest
        } else {
            Self::Closest
        }
    }
}

/// The two best palette candidates for one source color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosestPair {
    pub best: u8,
    pub second: u8,
    pub best_dist: u16,
    pub second_dist: u16,
}

/// Per-run pixel mapping state.
///
/// Owns the closest-color cache and the tie-break generator. Build one for
/// each quantization run and drop it afterwards; nothing here outlives the
/// image it was built for.
#[derive(Debug)]
pub struct PaletteMapper<'a> {
    palette: &'a Palette,
    squares: SquareTable,
    closest_cache: BTreeMap<u32, ClosestPair>,
    rng: Xoroshiro128PlusPlus,
}

impl<'a> PaletteMapper<'a> {
    pub fn new(palette: &'a Palette, seed: u64) -> Self {
        Self {
            palette,
            squares: SquareTable::new(),
            closest_cache: BTreeMap::new(),
            rng: Xoroshiro128PlusPlus::seed_from_u64(seed),
        }
    }

    pub fn palette(&self) -> &'a Palette {
        self.palette
    }

    #[inline]
    pub fn nearest(&self, c: u32) -> u8 {
        self.palette.nearest(c, &self.squares)
    }

    /// Pick between the two closest entries for `c`.
    ///
    /// The best entry wins with probability roughly
    /// `second_dist / (best_dist + second_dist)`, and always on an exact hit.
    pub fn closest(&mut self, c: u32) -> u8 {
        let pair = match self.closest_cache.get(&c) {
            Some(&pair) => pair,
            None => {
                let pair = closest_pair(self.palette, c);
                self.closest_cache.insert(c, pair);
                pair
            }
        };

        if pair.best_dist == 0 {
            return pair.best;
        }
        let span = (pair.best_dist + pair.second_dist) as u32;
        let draw = self.rng.random_range(0..SHORT_MAX as u32);
        if draw % span <= pair.second_dist as u32 {
            pair.best
        } else {
            pair.second
        }
    }

    #[inline]
    pub fn map(&mut self, c: u32, strategy: MapStrategy) -> u8 {
        match strategy {
            MapStrategy::Nearest => self.nearest(c),
            MapStrategy::Closest => self.closest(c),
        }
    }

    /// Map every pixel independently.
    pub fn remap(&mut self, pixels: &[u32], strategy: MapStrategy) -> Vec<u8> {
        pixels.iter().map(|&c| self.map(c, strategy)).collect()
    }

    pub fn cached_colors(&self) -> usize {
        self.closest_cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.closest_cache.clear();
    }
}

/// Scan the palette for the two smallest Manhattan distances to `c`.
pub fn closest_pair(palette: &Palette, c: u32) -> ClosestPair {
    let src = argb::channels(c);
    let mut pair = ClosestPair {
        best: 0,
        second: 0,
        best_dist: SHORT_MAX,
        second_dist: SHORT_MAX,
    };

    for (k, &c2) in palette.entries().iter().enumerate() {
        let dst = argb::channels(c2);
        let dist: u16 = src
            .iter()
            .zip(dst.iter())
            .map(|(&x, &y)| x.abs_diff(y) as u16)
            .sum();
        if dist < pair.best_dist {
            pair.second = pair.best;
            pair.second_dist = pair.best_dist;
            pair.best = k as u8;
            pair.best_dist = dist;
        } else if dist < pair.second_dist {
            pair.second = k as u8;
            pair.second_dist = dist;
        }
    }

    // Without a runner-up the best entry must always win.
    if pair.second_dist == SHORT_MAX {
        pair.best_dist = 0;
    }
    pair
}
