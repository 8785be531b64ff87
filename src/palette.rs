use rgb::RGBA8;

use crate::argb;
use crate::histogram::Bin;
use crate::pnn;

/// Squares of absolute channel differences, indexed by `|a - b|`.
#[derive(Debug, Clone)]
pub struct SquareTable([u32; 256]);

impl SquareTable {
    pub fn new() -> Self {
        let mut table = [0u32; 256];
        for (i, sq) in table.iter_mut().enumerate() {
            *sq = (i * i) as u32;
        }
        Self(table)
    }

    #[inline(always)]
    pub fn get(&self, a: u8, b: u8) -> u32 {
        self.0[a.abs_diff(b) as usize]
    }
}

impl Default for SquareTable {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered set of ARGB colors.
///
/// When the source image has a transparent color and clustering reproduced it,
/// it sits at index 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<u32>,
}

impl Palette {
    pub fn new(entries: Vec<u32>) -> Self {
        Self { entries }
    }

    /// Read the surviving merge list into a palette.
    pub fn from_bins(bins: &[Bin], transparent_color: Option<u32>) -> Self {
        let mut entries: Vec<u32> = pnn::survivors(bins)
            .into_iter()
            .map(|i| bins[i].color())
            .collect();

        if let Some(t) = transparent_color {
            if let Some(pos) = entries.iter().position(|&c| c == t) {
                entries.swap(0, pos);
            }
        }
        Self { entries }
    }

    /// The two-color palette used when clustering is skipped.
    pub fn fixed_pair(semi_transparent: bool) -> Self {
        let entries = if semi_transparent {
            vec![argb::TRANSPARENT, argb::OPAQUE_BLACK]
        } else {
            vec![argb::OPAQUE_BLACK, argb::OPAQUE_WHITE]
        };
        Self { entries }
    }

    pub fn entries(&self) -> &[u32] {
        &self.entries
    }

    pub fn entries_rgba(&self) -> Vec<RGBA8> {
        self.entries.iter().map(|&c| argb::to_rgba(c)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, index: u8) -> u32 {
        self.entries[index as usize]
    }

    /// Index 0 when it holds a fully transparent entry.
    pub fn transparent_index(&self) -> Option<u8> {
        match self.entries.first() {
            Some(&c) if argb::alpha(c) == 0 => Some(0),
            _ => None,
        }
    }

    /// Index of the entry with the smallest squared ARGB distance to `c`.
    ///
    /// Each candidate is abandoned as soon as its partial sum reaches the
    /// current best, so ties keep the earliest index.
    pub fn nearest(&self, c: u32, squares: &SquareTable) -> u8 {
        let [a, r, g, b] = argb::channels(c);
        let mut best = 0u8;
        let mut min_dist = u32::MAX;
        for (i, &c2) in self.entries.iter().enumerate() {
            let mut dist = squares.get(argb::alpha(c2), a);
            if dist >= min_dist {
                continue;
            }
            dist += squares.get(argb::red(c2), r);
            if dist >= min_dist {
                continue;
            }
            dist += squares.get(argb::green(c2), g);
            if dist >= min_dist {
                continue;
            }
            dist += squares.get(argb::blue(c2), b);
            if dist >= min_dist {
                continue;
            }
            min_dist = dist;
            best = i as u8;
        }
        best
    }
}
