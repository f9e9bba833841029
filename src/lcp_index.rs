//! Per-run LCP samples, MONI thresholds and matching-statistics queries.
//!
//! This is the layer that turns a move structure's O(1) LF steps into
//! matching statistics (MS, the exact longest match at every pattern
//! position) and pseudo-matching-lengths (PML, a cheap under-approximation),
//! following the MONI construction: every run boundary carries an exact LCP
//! sample, and a per-run threshold lets backward search recover in O(1)
//! amortized time instead of re-deriving the LCP on every mismatch.
use crate::alphabet::{Fmi, ALPHABET_SIZE};
use crate::error::{Error, Result};
use crate::move_table::MoveTable;

/// ψ, LCP samples, MONI τ partitions and within-run minima, one entry per
/// unsplit BWT run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LcpIndex {
    run_starts: Vec<u64>,
    lcp_samples: Vec<u64>,
    tau: Vec<u64>,
    within_min: Vec<u64>,
    thresholds: Vec<u64>,
    n: u64,
}

const INF: u64 = u64::MAX;

impl LcpIndex {
    pub fn n_runs(&self) -> usize {
        self.run_starts.len()
    }

    pub fn run_start(&self, i: usize) -> u64 {
        self.run_starts[i]
    }

    pub fn lcp_sample(&self, i: usize) -> u64 {
        self.lcp_samples[i]
    }

    pub fn threshold(&self, i: usize) -> u64 {
        self.thresholds[i]
    }

    /// Builds run boundaries, exact LCP samples, and MONI τ/within_min for
    /// every run, plus `thresholds[i] = min(lcp_samples[i], lcp_samples[i+1])`.
    pub fn build(fmi: &impl Fmi) -> Result<LcpIndex> {
        if fmi.is_empty() {
            return Err(Error::EmptyIndex);
        }
        let n = fmi.len();

        let mut run_starts = Vec::new();
        let mut pos = 0u64;
        for run in fmi.run_iter() {
            run_starts.push(pos);
            pos += run.len;
        }
        debug_assert_eq!(pos, n);
        let n_runs = run_starts.len();

        let mut lcp_samples = vec![0u64; n_runs];
        for i in 1..n_runs {
            lcp_samples[i] = lcp_at(fmi, run_starts[i]);
        }

        let mut tau = vec![0u64; n_runs];
        let mut within_min = vec![INF; n_runs];
        for i in 0..n_runs {
            let s = run_starts[i];
            let e = if i + 1 < n_runs { run_starts[i + 1] } else { n };
            let right_lcp = if i + 1 < n_runs { lcp_samples[i + 1] } else { 0 };
            if e - s <= 1 {
                tau[i] = s;
                within_min[i] = INF;
                continue;
            }
            tau[i] = e - 1;
            let mut running_min = INF;
            let mut overall_min = INF;
            let mut j = e - 1;
            while j > s {
                let val = lcp_at(fmi, j);
                overall_min = overall_min.min(val);
                running_min = running_min.min(val);
                if running_min >= right_lcp {
                    tau[i] = j - 1;
                }
                j -= 1;
            }
            within_min[i] = overall_min;
        }

        let mut thresholds = vec![0u64; n_runs];
        for i in 0..n_runs {
            let left = lcp_samples[i];
            let right = if i + 1 < n_runs { lcp_samples[i + 1] } else { 0 };
            thresholds[i] = left.min(right);
        }

        log::debug!("lcp index built over {} runs", n_runs);
        Ok(LcpIndex {
            run_starts,
            lcp_samples,
            tau,
            within_min,
            thresholds,
            n,
        })
    }

    /// Exact LCP between `SA[pos-1]` and `SA[pos]`, computed fresh via a
    /// ψ-walk. `pos == 0` returns 0 by convention.
    pub fn lcp_at_position(&self, fmi: &impl Fmi, pos: u64) -> u64 {
        if pos == 0 {
            return 0;
        }
        lcp_at(fmi, pos)
    }

    /// Sampled LCP at the run containing `bwt_pos` (not the exact LCP at
    /// that position unless `bwt_pos` is itself a run start).
    pub fn query(&self, bwt_pos: u64) -> u64 {
        self.lcp_samples[self.find_run(bwt_pos)]
    }

    fn find_run(&self, pos: u64) -> usize {
        let mut lo = 0usize;
        let mut hi = self.run_starts.len() - 1;
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if self.run_starts[mid] <= pos {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    /// Exact matching statistics: `ms[i]` is the length of the longest
    /// substring of `pattern[i..]` occurring in the indexed text. Backward
    /// search is attempted at every step; on failure the interval is
    /// shrunk using exact LCP values (always re-derived via ψ-walk) and
    /// widened to the narrowest run-aligned interval that preserves it,
    /// then retried. `pattern` must already be nt6-encoded.
    pub fn ms(&self, fmi: &impl Fmi, pattern: &[u8]) -> Vec<i64> {
        if pattern.is_empty() {
            return Vec::new();
        }
        let acc = fmi.acc();
        let mut ms = vec![0i64; pattern.len()];
        let mut k = 0u64;
        let mut l = acc[ALPHABET_SIZE];
        let mut d = 0u64;

        for i in (0..pattern.len()).rev() {
            let c = pattern[i] as usize;
            let (ok, ol) = fmi.rank2a(k, l);
            let mut nk = acc[c] + ok[c];
            let mut nl = acc[c] + ol[c];

            if nk < nl {
                k = nk;
                l = nl;
                d += 1;
            } else {
                while d > 0 {
                    let lcp_k = if k > 0 { lcp_at(fmi, k) } else { 0 };
                    let lcp_l = if l > 0 && l < acc[ALPHABET_SIZE] {
                        lcp_at(fmi, l)
                    } else {
                        0
                    };
                    let th = lcp_k.max(lcp_l);
                    if th < d {
                        d = th;
                    } else {
                        d -= 1;
                    }

                    let fc = (0..ALPHABET_SIZE).find(|&fc| k < acc[fc + 1]).unwrap_or(0);

                    let run_idx = self.find_run(k);
                    let mut lo_run = run_idx;
                    let mut hi_run = self.find_run(if l > 0 { l - 1 } else { 0 });
                    while lo_run > 0 && self.lcp_samples[lo_run] >= d {
                        lo_run -= 1;
                    }
                    while hi_run + 1 < self.n_runs() && self.lcp_samples[hi_run + 1] >= d {
                        hi_run += 1;
                    }
                    k = self.run_starts[lo_run];
                    l = if hi_run + 1 < self.n_runs() {
                        self.run_starts[hi_run + 1]
                    } else {
                        acc[ALPHABET_SIZE]
                    };

                    if d > 0 {
                        k = k.max(acc[fc]);
                        l = l.min(acc[fc + 1]);
                    }
                    if d == 0 {
                        break;
                    }

                    let (ok, ol) = fmi.rank2a(k, l);
                    nk = acc[c] + ok[c];
                    nl = acc[c] + ol[c];
                    if nk < nl {
                        k = nk;
                        l = nl;
                        d += 1;
                        break;
                    }
                }
                if d == 0 {
                    k = acc[c];
                    l = acc[c + 1];
                    if k < l {
                        d = 1;
                    }
                }
            }
            ms[i] = d as i64;
        }
        ms
    }

    /// Pseudo-matching lengths: identical driving loop to [`ms`](Self::ms),
    /// but a mismatch is resolved with one precomputed-threshold shrink and
    /// at most one re-extension attempt rather than an exact retry loop.
    pub fn pml(&self, fmi: &impl Fmi, pattern: &[u8]) -> Vec<i64> {
        if pattern.is_empty() {
            return Vec::new();
        }
        let acc = fmi.acc();
        let mut pml = vec![0i64; pattern.len()];
        let mut k = 0u64;
        let mut l = acc[ALPHABET_SIZE];
        let mut d = 0u64;

        for i in (0..pattern.len()).rev() {
            let c = pattern[i] as usize;
            let (ok, ol) = fmi.rank2a(k, l);
            let mut nk = acc[c] + ok[c];
            let mut nl = acc[c] + ol[c];

            if nk < nl {
                k = nk;
                l = nl;
                d += 1;
            } else {
                let run_idx = self.find_run(k);
                let th = self.thresholds[run_idx];
                d = d.min(th);

                if d > 0 {
                    let mut lo_run = run_idx;
                    let mut hi_run = run_idx;
                    while lo_run > 0 && self.lcp_samples[lo_run] >= d {
                        lo_run -= 1;
                    }
                    while hi_run + 1 < self.n_runs() && self.lcp_samples[hi_run + 1] >= d {
                        hi_run += 1;
                    }
                    k = self.run_starts[lo_run];
                    l = if hi_run + 1 < self.n_runs() {
                        self.run_starts[hi_run + 1]
                    } else {
                        acc[ALPHABET_SIZE]
                    };

                    let (ok, ol) = fmi.rank2a(k, l);
                    nk = acc[c] + ok[c];
                    nl = acc[c] + ol[c];
                    if nk < nl {
                        k = nk;
                        l = nl;
                        d += 1;
                    }
                }
                if d == 0 {
                    k = acc[c];
                    l = acc[c + 1];
                    if k < l {
                        d = 1;
                    }
                }
            }
            pml[i] = d as i64;
        }
        pml
    }

    /// Maps every run of `mv` to the LCP run that contains its start
    /// position, a prerequisite for [`ms_step`](Self::ms_step).
    pub fn build_run_map(&self, mv: &MoveTable) -> Vec<usize> {
        let mut rm = Vec::with_capacity(mv.n_runs());
        let mut j = 0usize;
        for i in 0..mv.n_runs() {
            while j + 1 < self.n_runs() && self.run_starts[j + 1] <= mv.p(i) {
                j += 1;
            }
            rm.push(j);
        }
        rm
    }

    /// One step of the move+LCP matching-statistics recurrence: if the
    /// current run's character already matches `ch`, a plain LF step
    /// extends the match; otherwise the position is repositioned to the
    /// nearest run of `ch` and `match_len` is truncated to the MONI
    /// threshold appropriate to the direction of the reposition before the
    /// LF step. Returns the new BWT position, or `None` if `ch` does not
    /// occur in the BWT at all.
    #[allow(clippy::too_many_arguments)]
    pub fn ms_step(
        &self,
        mv: &MoveTable,
        run_map: &[usize],
        pos: u64,
        run_idx: &mut usize,
        match_len: &mut u64,
        ch: u8,
    ) -> Option<u64> {
        let acc = mv.acc();
        if ch == 0 || ch as usize >= ALPHABET_SIZE || acc[ch as usize] == acc[ch as usize + 1] {
            return None;
        }

        let new_pos;
        if mv.c(*run_idx) == ch {
            new_pos = mv.lf(pos, run_idx);
            *match_len += 1;
        } else {
            let old_lcp_run = run_map[*run_idx];
            let i = mv.reposition(*run_idx, ch);
            let new_lcp_run = run_map[i];

            let threshold = if new_lcp_run < old_lcp_run {
                if pos < self.tau[old_lcp_run] {
                    self.lcp_samples[old_lcp_run]
                } else {
                    self.within_min[old_lcp_run]
                }
            } else if pos >= self.tau[old_lcp_run] {
                if old_lcp_run + 1 < self.n_runs() {
                    self.lcp_samples[old_lcp_run + 1]
                } else {
                    0
                }
            } else {
                self.within_min[old_lcp_run]
            };

            let (lo, hi) = (old_lcp_run.min(new_lcp_run), old_lcp_run.max(new_lcp_run));
            let mut threshold = threshold;
            for j in (lo + 1)..=hi {
                threshold = threshold.min(self.lcp_samples[j]);
            }
            if *match_len > threshold {
                *match_len = threshold;
            }

            *run_idx = i;
            new_pos = mv.lf(mv.p(i), run_idx);
            *match_len += 1;
        }
        Some(new_pos)
    }
}

fn f_char(acc: &[u64; ALPHABET_SIZE + 1], pos: u64) -> usize {
    (0..ALPHABET_SIZE).find(|&c| pos < acc[c + 1]).unwrap_or(ALPHABET_SIZE - 1)
}

/// Smallest BWT position `p` such that `rank(c, p+1) >= r + 1`, i.e. the
/// position of the `r`-th (0-indexed) occurrence of `c` in the BWT.
fn select(fmi: &impl Fmi, c: usize, r: u64) -> u64 {
    let acc = fmi.acc();
    let mut lo = 0u64;
    let mut hi = acc[ALPHABET_SIZE] - 1;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let (_, ok) = fmi.rank1a(mid + 1);
        if ok[c] >= r + 1 {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

fn psi(fmi: &impl Fmi, acc: &[u64; ALPHABET_SIZE + 1], pos: u64) -> u64 {
    let c = f_char(acc, pos);
    select(fmi, c, pos - acc[c])
}

/// LCP between `SA[pos-1]` and `SA[pos]` via a ψ-walk comparing F-column
/// characters at each step; two sentinels meeting counts as a mismatch.
fn lcp_at(fmi: &impl Fmi, pos: u64) -> u64 {
    let acc = fmi.acc();
    let mut p1 = pos - 1;
    let mut p2 = pos;
    let mut lcp = 0u64;
    loop {
        let c1 = f_char(&acc, p1);
        let c2 = f_char(&acc, p2);
        if c1 != c2 || c1 == 0 {
            break;
        }
        lcp += 1;
        p1 = psi(fmi, &acc, p1);
        p2 = psi(fmi, &acc, p2);
    }
    lcp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::test_support::NaiveFmi;

    fn brute_ms(text: &[u8], pattern: &[u8]) -> Vec<i64> {
        // text already includes its trailing sentinel.
        let n = text.len();
        let mut ms = vec![0i64; pattern.len()];
        for i in 0..pattern.len() {
            let mut best = 0usize;
            for start in 0..n {
                let mut l = 0usize;
                while i + l < pattern.len()
                    && start + l < n
                    && text[start + l] == pattern[i + l]
                    && text[start + l] != 0
                {
                    l += 1;
                }
                best = best.max(l);
            }
            ms[i] = best as i64;
        }
        ms
    }

    fn bwt_of(text: &[u8]) -> Vec<u8> {
        let n = text.len();
        let mut rotations: Vec<usize> = (0..n).collect();
        rotations.sort_by(|&a, &b| {
            for k in 0..n {
                let ca = text[(a + k) % n];
                let cb = text[(b + k) % n];
                if ca != cb {
                    return ca.cmp(&cb);
                }
            }
            std::cmp::Ordering::Equal
        });
        rotations.iter().map(|&r| text[(r + n - 1) % n]).collect()
    }

    #[test]
    fn ms_matches_brute_force_on_aacg() {
        // text "AACG" + sentinel, nt6: A=1 C=2 G=3
        let text = vec![1u8, 1, 2, 3, 0];
        let bwt = bwt_of(&text);
        let fmi = NaiveFmi::new(bwt);
        let lcp = LcpIndex::build(&fmi).unwrap();

        let pattern = vec![1u8, 1, 2, 3, 4]; // "AACGT"
        let ms = lcp.ms(&fmi, &pattern);
        let expected = brute_ms(&text, &pattern);
        assert_eq!(ms, expected);
    }

    #[test]
    fn ms_matches_brute_force_on_acacac() {
        let text = vec![1u8, 2, 1, 2, 1, 2, 0]; // "ACACAC$"
        let bwt = bwt_of(&text);
        let fmi = NaiveFmi::new(bwt);
        let lcp = LcpIndex::build(&fmi).unwrap();

        let pattern = vec![1u8, 2, 1, 2]; // "ACAC"
        let ms = lcp.ms(&fmi, &pattern);
        let expected = brute_ms(&text, &pattern);
        assert_eq!(ms, expected);
    }

    #[test]
    fn pml_never_exceeds_ms() {
        let text = vec![1u8, 2, 1, 2, 1, 2, 0];
        let bwt = bwt_of(&text);
        let fmi = NaiveFmi::new(bwt);
        let lcp = LcpIndex::build(&fmi).unwrap();

        let pattern = vec![1u8, 2, 1, 2];
        let ms = lcp.ms(&fmi, &pattern);
        let pml = lcp.pml(&fmi, &pattern);
        for i in 0..pattern.len() {
            assert!(pml[i] >= 0);
            assert!(pml[i] <= ms[i], "i={} pml={} ms={}", i, pml[i], ms[i]);
        }
    }

    #[test]
    fn lcp_samples_zero_at_index_zero() {
        let text = vec![1u8, 1, 2, 3, 0];
        let bwt = bwt_of(&text);
        let fmi = NaiveFmi::new(bwt);
        let lcp = LcpIndex::build(&fmi).unwrap();
        assert_eq!(lcp.lcp_sample(0), 0);
    }

    #[test]
    fn ms_step_matches_exact_ms() {
        let text = vec![1u8, 2, 1, 2, 1, 2, 0];
        let bwt = bwt_of(&text);
        let fmi = NaiveFmi::new(bwt);
        let lcp = LcpIndex::build(&fmi).unwrap();
        let mv = MoveTable::build(&fmi).unwrap();
        let run_map = lcp.build_run_map(&mv);

        let pattern = vec![1u8, 2, 1, 2];
        let expected = lcp.ms(&fmi, &pattern);

        let mut run_idx = 0usize;
        let mut pos = 0u64;
        let mut match_len = 0u64;
        let mut ms = vec![0i64; pattern.len()];
        for i in (0..pattern.len()).rev() {
            pos = lcp
                .ms_step(&mv, &run_map, pos, &mut run_idx, &mut match_len, pattern[i])
                .unwrap();
            ms[i] = match_len as i64;
        }
        let _ = pos;
        assert_eq!(ms, expected);
    }
}
