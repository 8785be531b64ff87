//! Pairwise nearest neighbor clustering over histogram bins.
//!
//! Every bin caches the cost of merging with its nearest forward neighbor. A
//! binary min-heap orders bins by that cost; entries are never updated in place.
//! Instead the root is validated when popped: if either side of its cached pair
//! was merged since the cost was computed, the cost is recomputed and the root
//! pushed back down.

use crate::histogram::Bin;

/// 1-indexed binary min-heap of bin indices keyed by `Bin::err`.
#[derive(Debug)]
pub struct BinHeap {
    slots: Vec<usize>,
}

impl BinHeap {
    pub fn with_capacity(n: usize) -> Self {
        let mut slots = Vec::with_capacity(n + 1);
        slots.push(0);
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn peek(&self) -> Option<usize> {
        self.slots.get(1).copied()
    }

    /// Sift `idx` up from the end.
    pub fn push(&mut self, bins: &[Bin], idx: usize) {
        let err = bins[idx].err;
        self.slots.push(idx);
        let mut l = self.len();
        while l > 1 {
            let parent = l >> 1;
            let h = self.slots[parent];
            if bins[h].err <= err {
                break;
            }
            self.slots[l] = h;
            l = parent;
        }
        self.slots[l] = idx;
    }

    /// Restore heap order after the root's key changed.
    pub fn sift_down_root(&mut self, bins: &[Bin]) {
        let len = self.len();
        if len == 0 {
            return;
        }
        let b1 = self.slots[1];
        let err = bins[b1].err;
        let mut l = 1;
        loop {
            let mut child = l + l;
            if child > len {
                break;
            }
            if child < len && bins[self.slots[child]].err > bins[self.slots[child + 1]].err {
                child += 1;
            }
            let h = self.slots[child];
            if err <= bins[h].err {
                break;
            }
            self.slots[l] = h;
            l = child;
        }
        self.slots[l] = b1;
    }

    /// Drop the root, replacing it with the last slot.
    pub fn remove_root(&mut self, bins: &[Bin]) {
        if let Some(last) = self.slots.pop() {
            if self.len() > 0 {
                self.slots[1] = last;
                self.sift_down_root(bins);
            }
        }
    }

    #[cfg(test)]
    fn entries(&self) -> &[usize] {
        &self.slots[1..]
    }
}

/// Squared (a,r,g,b) distance scaled by `n1*n2/(n1+n2)`.
#[inline]
fn merge_cost(a: &Bin, b: &Bin) -> f64 {
    let sq = |v: f64| v * v;
    let dist = sq(b.ac - a.ac) + sq(b.rc - a.rc) + sq(b.gc - a.gc) + sq(b.bc - a.bc);
    let n1 = a.count as f64;
    let n2 = b.count as f64;
    dist * (n1 * n2) / (n1 + n2)
}

/// Find the cheapest merge partner of `idx`, scanning forward only.
///
/// Ties keep the first candidate in list order. A bin with no forward
/// neighbors gets `err = 1e100`, `nn = 0`.
pub fn find_nn(bins: &mut [Bin], idx: usize) {
    let mut nn = 0;
    let mut err = 1e100;
    let mut i = bins[idx].fw;
    while i != 0 {
        let nerr = merge_cost(&bins[idx], &bins[i]);
        if nerr < err {
            err = nerr;
            nn = i;
        }
        i = bins[i].fw;
    }
    bins[idx].err = err;
    bins[idx].nn = nn;
}

/// Merge bins until at most `target` remain. Returns the number of merges.
///
/// `bins` must be compacted and linked (see [`crate::histogram::compact_bins`]).
/// The survivors are reachable by walking `fw` from slot 0.
pub fn merge_bins(bins: &mut [Bin], target: usize) -> usize {
    let maxbins = bins.len();
    let extbins = maxbins.saturating_sub(target);
    if extbins == 0 {
        return 0;
    }

    let mut heap = BinHeap::with_capacity(maxbins);
    for i in 0..maxbins {
        find_nn(bins, i);
        heap.push(bins, i);
    }

    let mut merges = 0u32;
    while (merges as usize) < extbins {
        let Some(b1) = next_fresh(bins, &mut heap, merges) else {
            break;
        };

        let nb_idx = bins[b1].nn;
        let nb = bins[nb_idx].clone();
        let tb = &mut bins[b1];
        let n1 = tb.count as f64;
        let n2 = nb.count as f64;
        let d = 1.0 / (n1 + n2);
        tb.ac = d * (n1 * tb.ac + n2 * nb.ac);
        tb.rc = d * (n1 * tb.rc + n2 * nb.rc);
        tb.gc = d * (n1 * tb.gc + n2 * nb.gc);
        tb.bc = d * (n1 * tb.bc + n2 * nb.bc);
        tb.count += nb.count;
        merges += 1;
        tb.mtm = merges;

        // Unchain the consumed bin. When it is the tail, `nb.fw == 0` and the
        // head's unused back link absorbs the write.
        bins[nb.bk].fw = nb.fw;
        bins[nb.fw].bk = nb.bk;
        bins[nb_idx].mtm = Bin::DELETED;
    }

    log::trace!("pnn: {merges} merges, {} bins remain", maxbins - merges as usize);
    merges as usize
}

/// Validate heap roots until one holds an up-to-date merge cost.
fn next_fresh(bins: &mut [Bin], heap: &mut BinHeap, merges: u32) -> Option<usize> {
    loop {
        let b1 = heap.peek()?;
        let tb = &bins[b1];
        if tb.tm >= tb.mtm && bins[tb.nn].mtm <= tb.tm {
            return Some(b1);
        }
        if tb.is_deleted() {
            heap.remove_root(bins);
        } else {
            find_nn(bins, b1);
            bins[b1].tm = merges;
            heap.sift_down_root(bins);
        }
    }
}

/// Indices of surviving bins in list order.
pub fn survivors(bins: &[Bin]) -> Vec<usize> {
    let mut out = Vec::new();
    if bins.is_empty() {
        return out;
    }
    let mut i = 0;
    loop {
        out.push(i);
        i = bins[i].fw;
        if i == 0 {
            break;
        }
    }
    out
}
