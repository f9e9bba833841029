//! Bidirectional extension over a [`MoveTable`], sampled cumulative rank,
//! and SMEM (super-maximal exact match) search.
use crate::alphabet::{complement, ALPHABET_SIZE};
use crate::move_table::MoveTable;

/// Sample stride for the cumulative-rank table: `rank1a` scans at most this
/// many runs sequentially after a `O(log r)` binary search.
pub const CUMRANK_SAMPLE: usize = 64;

/// A bidirectional BWT interval: `x[0]`/`x[1]` are the forward/backward
/// interval starts, `size` is the shared interval width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct BiInterval {
    pub x: [u64; 2],
    pub size: u64,
}

/// A super-maximal exact match: the matched pattern span `[start, end)` and
/// the bidirectional interval of its occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Mem {
    pub start: usize,
    pub end: usize,
    pub interval: BiInterval,
}

/// A [`MoveTable`] plus a sampled cumulative-rank table, enabling
/// `rank1a`/`rank2a` in `O(log r + CUMRANK_SAMPLE)` and FMD-style
/// bidirectional extension on top of it.
pub struct BMove<'a> {
    mv: &'a MoveTable,
    /// `cumrank[s * 6 + c]` = total count of `c` in runs `[0, s * CUMRANK_SAMPLE)`.
    /// One extra trailing sample holds the grand totals.
    cumrank: Vec<u64>,
    n_samples: usize,
}

impl<'a> BMove<'a> {
    /// Builds the sampled cumulative-rank table over `mv`.
    pub fn build(mv: &'a MoveTable) -> BMove<'a> {
        let n_samples = mv.n_runs() / CUMRANK_SAMPLE + 1;
        let mut cumrank = vec![0u64; (n_samples + 1) * ALPHABET_SIZE];

        let mut running = [0u64; ALPHABET_SIZE];
        let mut sample_idx = 0usize;
        for i in 0..mv.n_runs() {
            if i > 0 && i % CUMRANK_SAMPLE == 0 {
                sample_idx += 1;
                cumrank[sample_idx * ALPHABET_SIZE..sample_idx * ALPHABET_SIZE + ALPHABET_SIZE]
                    .copy_from_slice(&running);
            }
            running[mv.c(i) as usize] += mv.len_of(i);
        }
        sample_idx += 1;
        cumrank[sample_idx * ALPHABET_SIZE..sample_idx * ALPHABET_SIZE + ALPHABET_SIZE]
            .copy_from_slice(&running);

        BMove {
            mv,
            cumrank,
            n_samples,
        }
    }

    fn find_run(&self, pos: u64) -> usize {
        let mut lo = 0usize;
        let mut hi = self.mv.n_runs() - 1;
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if self.mv.p(mid) <= pos {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    /// `ok[c]` = count of `c` in `BWT[0..pos)`, for every `c` in `[0, 6)`.
    pub fn rank1a(&self, pos: u64) -> [u64; ALPHABET_SIZE] {
        if pos == 0 {
            return [0; ALPHABET_SIZE];
        }
        if pos >= self.mv.bwt_len() {
            let last = self.n_samples;
            let mut ok = [0u64; ALPHABET_SIZE];
            ok.copy_from_slice(&self.cumrank[last * ALPHABET_SIZE..last * ALPHABET_SIZE + ALPHABET_SIZE]);
            return ok;
        }

        let run = self.find_run(pos);
        let sample = run / CUMRANK_SAMPLE;
        let scan_start = sample * CUMRANK_SAMPLE;

        let mut ok = [0u64; ALPHABET_SIZE];
        ok.copy_from_slice(&self.cumrank[sample * ALPHABET_SIZE..sample * ALPHABET_SIZE + ALPHABET_SIZE]);
        for i in scan_start..run {
            ok[self.mv.c(i) as usize] += self.mv.len_of(i);
        }
        ok[self.mv.c(run) as usize] += pos - self.mv.p(run);
        ok
    }

    /// Two independent [`rank1a`](Self::rank1a) calls.
    pub fn rank2a(&self, k: u64, l: u64) -> ([u64; ALPHABET_SIZE], [u64; ALPHABET_SIZE]) {
        (self.rank1a(k), self.rank1a(l))
    }

    fn set_intv(&self, c: u8) -> BiInterval {
        let acc = self.mv.acc();
        BiInterval {
            x: [acc[c as usize], acc[complement(c) as usize]],
            size: acc[c as usize + 1] - acc[c as usize],
        }
    }

    /// Bidirectional FMD-style extension of `ik` by every character in the
    /// alphabet at once, extending the forward strand if `is_back` is
    /// false, the backward strand if true.
    pub fn extend(&self, ik: &BiInterval, is_back: bool) -> [BiInterval; ALPHABET_SIZE] {
        let idx = if is_back { 0usize } else { 1usize };
        let other = 1 - idx;

        let k = ik.x[idx];
        let l = k + ik.size;
        let (tk, tl_full) = self.rank2a(k, l);
        let mut tl = tl_full;
        for c in 0..ALPHABET_SIZE {
            tl[c] -= tk[c];
        }

        let acc = self.mv.acc();
        let mut ok = [BiInterval::default(); ALPHABET_SIZE];
        for c in 0..ALPHABET_SIZE {
            ok[c].x[idx] = acc[c] + tk[c];
            ok[c].size = tl[c];
        }
        ok[0].x[other] = ik.x[other];
        ok[4].x[other] = ok[0].x[other] + tl[0];
        ok[3].x[other] = ok[4].x[other] + tl[4];
        ok[2].x[other] = ok[3].x[other] + tl[3];
        ok[1].x[other] = ok[2].x[other] + tl[2];
        ok[5].x[other] = ok[1].x[other] + tl[1];
        ok
    }

    /// Finds every SMEM in `q` using the original ping-pong forward/backward
    /// extension algorithm: forward-extend from a seed until the interval
    /// drops below `min_occ` or the pattern ends, then backward-extend the
    /// candidate list, discarding contained matches.
    pub fn smem(&self, q: &[u8], min_occ: u64, min_len: usize) -> Vec<Mem> {
        let mut mem = Vec::new();
        let mut curr: Vec<(BiInterval, usize)> = Vec::new();
        let mut prev: Vec<(BiInterval, usize)> = Vec::new();
        let mut x = 0usize;
        while x < q.len() {
            x = self.smem1(min_occ, min_len, q, x, &mut mem, &mut curr, &mut prev);
        }
        mem
    }

    fn smem1(
        &self,
        min_occ: u64,
        min_len: usize,
        q: &[u8],
        x: usize,
        mem: &mut Vec<Mem>,
        curr: &mut Vec<(BiInterval, usize)>,
        prev: &mut Vec<(BiInterval, usize)>,
    ) -> usize {
        let len = q.len();
        let mut ik = self.set_intv(q[x]);
        let mut ik_info = x + 1;
        if ik.size == 0 {
            return x + 1;
        }

        curr.clear();
        let mut i = x + 1;
        while i < len {
            let cc = complement(q[i]) as usize;
            let ok = self.extend(&ik, false);
            if ok[cc].size != ik.size {
                curr.push((ik, ik_info));
                if ok[cc].size < min_occ {
                    break;
                }
            }
            ik = ok[cc];
            ik_info = i + 1;
            i += 1;
        }
        if i == len {
            curr.push((ik, ik_info));
        }
        curr.reverse();
        let ret = curr[0].1;
        std::mem::swap(curr, prev);

        let oldn = mem.len();
        let mut i: isize = x as isize - 1;
        while i >= -1 {
            let cc: u8 = if i < 0 { 0 } else { q[i as usize] };
            curr.clear();
            for &(piv, pinfo) in prev.iter() {
                let ok = self.extend(&piv, true);
                if cc == 0 || ok[cc as usize].size < min_occ {
                    if curr.is_empty() {
                        let end = pinfo;
                        let start = (i + 1) as usize;
                        if end - start >= min_len
                            && (mem.len() == oldn || start < mem[mem.len() - 1].start)
                        {
                            mem.push(Mem {
                                start,
                                end,
                                interval: piv,
                            });
                        }
                    }
                } else if curr.is_empty() || ok[cc as usize].size != curr.last().unwrap().0.size {
                    curr.push((ok[cc as usize], pinfo));
                }
            }
            if curr.is_empty() {
                break;
            }
            std::mem::swap(curr, prev);
            i -= 1;
        }
        mem[oldn..].reverse();
        ret
    }

    /// Finds every SMEM in `q` using the Travis-Gagie fixed-window
    /// algorithm: backward-extend a fixed `min_len` window first, then
    /// forward- and backward-extend around it, emitting one MEM per window.
    pub fn smem_tg(&self, q: &[u8], min_occ: u64, min_len: usize) -> Vec<Mem> {
        let mut mem = Vec::new();
        let mut x = 0usize;
        while x < q.len() {
            x = self.smem1_tg(min_occ, min_len, q, x, &mut mem);
        }
        mem
    }

    fn smem1_tg(&self, min_occ: u64, min_len: usize, q: &[u8], x: usize, mem: &mut Vec<Mem>) -> usize {
        let len = q.len();
        if len - x < min_len {
            return len;
        }

        let mut ik = self.set_intv(q[x + min_len - 1]);
        let mut i: isize = x as isize + min_len as isize - 2;
        while i >= x as isize {
            let cc = q[i as usize] as usize;
            let ok = self.extend(&ik, true);
            if ok[cc].size < min_occ {
                break;
            }
            ik = ok[cc];
            i -= 1;
        }
        if i >= x as isize {
            return (i + 1) as usize;
        }

        let mut j = x + min_len;
        while j < len {
            let cc = complement(q[j]) as usize;
            let ok = self.extend(&ik, false);
            if ok[cc].size < min_occ {
                break;
            }
            ik = ok[cc];
            j += 1;
        }
        mem.push(Mem {
            start: x,
            end: j,
            interval: ik,
        });
        if j == len {
            return len;
        }

        ik = self.set_intv(q[j]);
        let mut i: isize = j as isize - 1;
        while i > x as isize {
            let cc = q[i as usize] as usize;
            let ok = self.extend(&ik, true);
            if ok[cc].size < min_occ {
                break;
            }
            ik = ok[cc];
            i -= 1;
        }
        (i + 1) as usize
    }
}
