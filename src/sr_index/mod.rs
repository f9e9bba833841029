//! The subsampled r-index (SR-index): locate support for the move structure
//! without storing a full suffix array.
//!
//! Three pieces of data make `locate` possible in `O(r + n/s)` space:
//! a piecewise-linear `phi` function (one `(sa, predecessor)` pair per BWT
//! run), toeholds (one SA value per run, always kept), and a subsampled SA
//! (one value every `s` text positions). `locate_one` walks LF until it
//! hits a subsampled position; `locate_all` walks `phi` backwards from a
//! toehold. Like [`MoveTable`](crate::move_table::MoveTable), the struct is
//! laid out as parallel arrays rather than an array of `(sa, da)` structs.

mod serialize;
pub use serialize::{SRI_MAGIC_V1, SRI_MAGIC_V3};

use vers_vecs::BitVec;

use crate::alphabet::Fmi;
use crate::error::{Error, Result};
use crate::move_table::MoveTable;
use crate::parallel::{ParallelFor, Sequential};

/// The subsampled r-index.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SrIndex {
    /// SA values at each run start, sorted ascending by SA value.
    phi_sa: Vec<u64>,
    /// `phi_da[k]` is the predecessor of `phi_sa[k]`'s suffix, or `None` if
    /// that run starts at BWT position 0 (no predecessor exists).
    phi_da: Vec<Option<u64>>,
    /// BWT position of the last row of each run, ascending.
    run_pos: Vec<u64>,
    /// SA value at `run_pos[i]`.
    run_sa: Vec<u64>,
    /// Subsampled BWT positions, ascending. Aliases `run_pos` when `s <= 1`.
    sub_pos: Vec<u64>,
    /// SA value at `sub_pos[i]`.
    sub_sa: Vec<u64>,
    /// Membership bitvector over `[0, n)`: `sub_bv[p]` iff `p` is in `sub_pos`.
    sub_bv: BitVec,
    /// Cumulative text lengths in chain-traversal order, length `m + 1`,
    /// `cum_len[m] == n`.
    cum_len: Vec<u64>,
    /// `text_order_sid[k]` is the sentinel row whose document is the `k`-th
    /// one visited in chain order.
    text_order_sid: Vec<u64>,
    /// Subsampling stride.
    s: u64,
    /// Number of sentinel rows (documents).
    m: u64,
    /// Length of the indexed text.
    n: u64,
}

impl SrIndex {
    pub fn s(&self) -> u64 {
        self.s
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn m(&self) -> u64 {
        self.m
    }

    pub fn n_runs(&self) -> usize {
        self.phi_sa.len()
    }

    pub fn n_samples(&self) -> usize {
        self.sub_pos.len()
    }

    /// Builds an SR-index from an FM-index backend, subsampling every `s`
    /// text positions (`s <= 1` keeps only run-boundary toeholds).
    ///
    /// Construction walks, for each of the `m` sentinel rows `0..m`, the LF
    /// chain forward until it lands back on a row `< m`. Unlike the
    /// simplified single-cycle account of this walk, this does not assume
    /// that chain closes on the same row it started from (`dest_sentinel[k]
    /// == k`): it follows wherever the chain actually leads, which recovers
    /// exact SA values regardless of how sentinel rows interleave. The
    /// chain's visitation order becomes `cum_len`/`text_order_sid`, so a
    /// joined multi-string BWT whose sentinels don't simply self-loop is
    /// still handled correctly; see `DESIGN.md`.
    pub fn build(fmi: &impl Fmi, s: u64) -> Result<SrIndex> {
        Self::build_with(fmi, s, &Sequential)
    }

    /// Same as [`build`](Self::build), driving the per-sentinel LF walks
    /// through `par` instead of running them sequentially.
    pub fn build_with(fmi: &impl Fmi, s: u64, par: &impl ParallelFor) -> Result<SrIndex> {
        if fmi.is_empty() {
            return Err(Error::EmptyIndex);
        }
        let n = fmi.len();
        let acc = fmi.acc();
        let m = (acc[1] - acc[0]) as usize;
        let s = s.max(1);

        // Phase 1: maximal run boundaries, merging adjacent same-char runs
        // the way MoveTable::build and LcpIndex::build do.
        let (bwt_start, bwt_end) = run_boundaries(fmi);
        let n_runs = bwt_start.len();

        // Phase 2: per-sentinel LF-chain walk. `full_len[k]` is the number
        // of LF applications from row `k` until landing back on a row < m;
        // `next_sentinel[k]` is that landing row.
        let mut full_len = vec![0u64; m];
        let mut next_sentinel = vec![0usize; m];
        {
            let full_len_ptr = SyncPtr(full_len.as_mut_ptr());
            let next_sentinel_ptr = SyncPtr(next_sentinel.as_mut_ptr());
            par.for_each(m, |k| {
                let mut pos = k as u64;
                let mut steps = 0u64;
                loop {
                    let (c, ok) = fmi.rank1a(pos);
                    pos = acc[c as usize] + ok[c as usize];
                    steps += 1;
                    if (pos as usize) < m {
                        break;
                    }
                }
                // SAFETY: each k in 0..m owns a disjoint slot in both arrays.
                unsafe {
                    *full_len_ptr.0.add(k) = steps;
                    *next_sentinel_ptr.0.add(k) = pos as usize;
                }
            });
        }

        // Phase 3: chain-traversal order fixes `base[k]`, the global start
        // offset of the document whose terminator is sentinel row `k`, plus
        // `cum_len`/`text_order_sid` in the same order.
        let mut base = vec![0u64; m];
        let mut cum_len = Vec::with_capacity(m + 1);
        let mut text_order_sid = Vec::with_capacity(m);
        {
            let mut visited = vec![false; m];
            let mut running = 0u64;
            for start_k in 0..m {
                if visited[start_k] {
                    continue;
                }
                let mut k = start_k;
                loop {
                    if visited[k] {
                        break;
                    }
                    visited[k] = true;
                    base[k] = running;
                    cum_len.push(running);
                    text_order_sid.push(k as u64);
                    running += full_len[k];
                    k = next_sentinel[k];
                }
            }
            cum_len.push(n);
            debug_assert_eq!(running, n);
        }

        // Phase 4: fill a dense, build-time-only SA array by re-walking each
        // chain. Discarded once targets and subsamples are extracted, so the
        // final structure stays O(r + n/s) even though this is O(n).
        let mut sa_dense = vec![0u64; n as usize];
        for k in 0..m {
            sa_dense[k] = base[k] + full_len[k] - 1;
            let mut pos = k as u64;
            for step in 0..full_len[k].saturating_sub(1) {
                let (c, ok) = fmi.rank1a(pos);
                pos = acc[c as usize] + ok[c as usize];
                let local = full_len[k] - 2 - step;
                sa_dense[pos as usize] = base[k] + local;
            }
        }

        // Phase 5a: toeholds, one SA value per run, keyed by the run's last
        // BWT position (already ascending since runs are BWT-ordered).
        let run_pos: Vec<u64> = bwt_end.clone();
        let run_sa: Vec<u64> = bwt_end.iter().map(|&p| sa_dense[p as usize]).collect();

        // Phase 5b: subsampled SA, one value at every BWT position whose SA
        // value is a multiple of `s`. `s <= 1` aliases the toeholds, since
        // every position would qualify and the set collapses to run ends.
        let (sub_pos, sub_sa) = if s <= 1 {
            (run_pos.clone(), run_sa.clone())
        } else {
            let mut pairs: Vec<(u64, u64)> = (0..n)
                .filter(|&p| sa_dense[p as usize] % s == 0)
                .map(|p| (p, sa_dense[p as usize]))
                .collect();
            pairs.sort_unstable();
            (
                pairs.iter().map(|&(p, _)| p).collect(),
                pairs.iter().map(|&(_, v)| v).collect(),
            )
        };
        let mut sub_bv = BitVec::with_capacity(n as usize);
        {
            let mut j = 0usize;
            for p in 0..n {
                if j < sub_pos.len() && sub_pos[j] == p {
                    sub_bv.append(true);
                    j += 1;
                } else {
                    sub_bv.append(false);
                }
            }
        }

        // Phase 5c: phi, one `(sa_at_start, sa_at_prev)` pair per run start,
        // sorted ascending by SA value.
        let mut phi_pairs: Vec<(u64, Option<u64>)> = Vec::with_capacity(n_runs);
        for &p in &bwt_start {
            let sa_start = sa_dense[p as usize];
            let sa_prev = if p > 0 {
                Some(sa_dense[(p - 1) as usize])
            } else {
                None
            };
            phi_pairs.push((sa_start, sa_prev));
        }
        phi_pairs.sort_unstable_by_key(|&(sa, _)| sa);
        let phi_sa: Vec<u64> = phi_pairs.iter().map(|&(sa, _)| sa).collect();
        let phi_da: Vec<Option<u64>> = phi_pairs.iter().map(|&(_, da)| da).collect();

        Ok(SrIndex {
            phi_sa,
            phi_da,
            run_pos,
            run_sa,
            sub_pos,
            sub_sa,
            sub_bv,
            cum_len,
            text_order_sid,
            s,
            m: m as u64,
            n,
        })
    }

    /// `phi(v)`: the SA value one less than `v`, or `None` at `v = SA[0]`
    /// (the lexicographically smallest suffix has no predecessor).
    pub fn phi(&self, v: u64) -> Option<u64> {
        let k = upper_bound(&self.phi_sa, v)?;
        self.phi_da[k].map(|da| da + (v - self.phi_sa[k]))
    }

    /// The SA value at `bwt_pos` if it happens to be a run boundary.
    pub fn toehold(&self, bwt_pos: u64) -> Option<u64> {
        self.run_pos
            .binary_search(&bwt_pos)
            .ok()
            .map(|k| self.run_sa[k])
    }

    /// Recovers the SA value at `bwt_pos` by walking LF (via `mv`, for
    /// O(1)-amortized steps) until landing on a subsampled position. Also
    /// shortcuts the moment LF is about to cross a sentinel (`c == 0`):
    /// the destination row is then some document's own start, so the
    /// answer falls straight out of `cum_len`/`text_order_sid` without
    /// needing a sample there at all.
    /// Bounded by `s + n` steps, matching the construction's subsampling
    /// guarantee (every document's own start, SA value 0, is always a
    /// subsample regardless of `s`).
    pub fn locate_one(&self, mv: &MoveTable, bwt_pos: u64) -> Result<u64> {
        let mut run_idx = find_run(mv, bwt_pos);
        let mut pos = bwt_pos;
        let mut steps = 0u64;
        let bound = self.s + self.n + 1;
        loop {
            if self.sub_bv.get_bits_unchecked(pos as usize, 1) == 1 {
                if let Ok(k) = self.sub_pos.binary_search(&pos) {
                    return Ok(self.sub_sa[k] + steps);
                }
            }
            if steps > bound {
                return Err(Error::Incomplete);
            }
            let c = mv.c(run_idx);
            pos = mv.lf(pos, &mut run_idx);
            steps += 1;
            if c == 0 {
                return match self.sentinel_base(pos) {
                    Some(base) => Ok(base + (steps - 1)),
                    None => Err(Error::Incomplete),
                };
            }
        }
    }

    /// Recovers every SA value in `[lo, hi)`, capped at `max_pos` entries,
    /// by taking a toehold (or [`locate_one`](Self::locate_one)) at the last
    /// row and walking `phi` backwards for the rest.
    pub fn locate_all(&self, mv: &MoveTable, lo: u64, hi: u64, max_pos: usize) -> Result<Vec<u64>> {
        if hi <= lo {
            return Ok(Vec::new());
        }
        let n_out = ((hi - lo) as usize).min(max_pos);
        if n_out == 0 {
            return Ok(Vec::new());
        }
        let mut out = vec![0u64; n_out];
        let last = hi - 1;
        out[n_out - 1] = match self.toehold(last) {
            Some(v) => v,
            None => self.locate_one(mv, last)?,
        };
        for i in (0..n_out - 1).rev() {
            out[i] = self.phi(out[i + 1]).ok_or(Error::Incomplete)?;
        }
        Ok(out)
    }

    /// Maps a global SA value to `(sentinel row, local offset within that
    /// document)`.
    pub fn multi_locate(&self, sa_val: u64) -> (u64, u64) {
        let j = match self.cum_len.binary_search(&sa_val) {
            Ok(j) => j,
            Err(j) => j - 1,
        };
        (self.text_order_sid[j], sa_val - self.cum_len[j])
    }

    /// The global base offset of the document whose sentinel sits at BWT
    /// row `row` (one of the `m` rows with character 0). `text_order_sid`
    /// is recorded in chain-traversal order, not sorted by row, so this
    /// scans it rather than indexing `cum_len` directly by `row` — direct
    /// indexing only works under the simplifying single-cycle assumption
    /// this crate's `build` deliberately doesn't make (see `DESIGN.md`).
    fn sentinel_base(&self, row: u64) -> Option<u64> {
        self.text_order_sid
            .iter()
            .position(|&r| r == row)
            .map(|j| self.cum_len[j])
    }
}

/// Largest index `k` with `arr[k] <= v`, or `None` if `v` is smaller than
/// every element.
fn upper_bound(arr: &[u64], v: u64) -> Option<usize> {
    match arr.binary_search(&v) {
        Ok(k) => Some(k),
        Err(0) => None,
        Err(k) => Some(k - 1),
    }
}

fn find_run(mv: &MoveTable, pos: u64) -> usize {
    let mut lo = 0usize;
    let mut hi = mv.n_runs() - 1;
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if mv.p(mid) <= pos {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Merges an FM-index's run iterator into maximal same-character runs and
/// returns `(bwt_start, bwt_end)` per run, mirroring
/// [`MoveTable::build`](crate::move_table::MoveTable::build)'s merge step.
fn run_boundaries(fmi: &impl Fmi) -> (Vec<u64>, Vec<u64>) {
    let mut bwt_start = Vec::new();
    let mut bwt_end = Vec::new();
    let mut last_c: Option<u8> = None;
    let mut start = 0u64;
    let mut pos = 0u64;
    for run in fmi.run_iter() {
        match last_c {
            Some(lc) if lc == run.c => {}
            Some(_) => {
                bwt_start.push(start);
                bwt_end.push(pos - 1);
                start = pos;
            }
            None => start = pos,
        }
        last_c = Some(run.c);
        pos += run.len;
    }
    if last_c.is_some() {
        bwt_start.push(start);
        bwt_end.push(pos - 1);
    }
    (bwt_start, bwt_end)
}

/// A raw pointer wrapper so `ParallelFor::for_each`'s `Sync` closure can
/// write into disjoint slots of a preallocated buffer. Each `k` in `0..n`
/// only ever touches index `k`, so concurrent writers never alias.
struct SyncPtr(*mut u64);
unsafe impl Sync for SyncPtr {}
