//! Randomized cross-checks of the invariants enumerated in this crate's
//! design notes, run over small generated BWTs rather than hand-picked
//! literals (those are already covered by each module's own `#[cfg(test)]`
//! fixtures and by `tests/integration.rs`).
use proptest::prelude::*;

use r_index_core::lcp_index::LcpIndex;
use r_index_core::move_table::MoveTable;
use r_index_core::sr_index::SrIndex;
use r_index_core::{Fmi, Run, ALPHABET_SIZE};

/// A linear-scan `Fmi` over a literal BWT, built from a genuine suffix sort
/// so SA/LCP ground truth is available alongside it.
struct LiteralFmi {
    bwt: Vec<u8>,
    acc: [u64; ALPHABET_SIZE + 1],
}

impl LiteralFmi {
    fn from_text(text: &[u8]) -> (Self, Vec<u64>) {
        let n = text.len();
        let mut sa: Vec<usize> = (0..n).collect();
        sa.sort_by(|&a, &b| text[a..].cmp(&text[b..]));
        let bwt: Vec<u8> = sa
            .iter()
            .map(|&p| if p == 0 { text[n - 1] } else { text[p - 1] })
            .collect();
        let mut counts = [0u64; ALPHABET_SIZE];
        for &c in &bwt {
            counts[c as usize] += 1;
        }
        let mut acc = [0u64; ALPHABET_SIZE + 1];
        for c in 0..ALPHABET_SIZE {
            acc[c + 1] = acc[c] + counts[c];
        }
        let sa_u64 = sa.iter().map(|&p| p as u64).collect();
        (LiteralFmi { bwt, acc }, sa_u64)
    }
}

impl Fmi for LiteralFmi {
    fn len(&self) -> u64 {
        self.bwt.len() as u64
    }

    fn acc(&self) -> [u64; ALPHABET_SIZE + 1] {
        self.acc
    }

    fn rank1a(&self, pos: u64) -> (u8, [u64; ALPHABET_SIZE]) {
        let pos = pos as usize;
        let mut ok = [0u64; ALPHABET_SIZE];
        for &c in &self.bwt[..pos] {
            ok[c as usize] += 1;
        }
        let c = if pos < self.bwt.len() {
            self.bwt[pos]
        } else {
            0
        };
        (c, ok)
    }

    fn extend1(&self, lo: &mut u64, hi: &mut u64, c: u8) -> u64 {
        let (_, ok_lo) = self.rank1a(*lo);
        let (_, ok_hi) = self.rank1a(*hi);
        let acc = self.acc[c as usize];
        *lo = acc + ok_lo[c as usize];
        *hi = acc + ok_hi[c as usize];
        *hi - *lo
    }

    fn run_iter(&self) -> Box<dyn Iterator<Item = Run> + '_> {
        Box::new(LiteralRunIter {
            bwt: &self.bwt,
            pos: 0,
        })
    }

    fn is_symmetric(&self) -> bool {
        false
    }
}

struct LiteralRunIter<'a> {
    bwt: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for LiteralRunIter<'a> {
    type Item = Run;
    fn next(&mut self) -> Option<Run> {
        if self.pos >= self.bwt.len() {
            return None;
        }
        let c = self.bwt[self.pos];
        let start = self.pos;
        while self.pos < self.bwt.len() && self.bwt[self.pos] == c {
            self.pos += 1;
        }
        Some(Run {
            c,
            len: (self.pos - start) as u64,
        })
    }
}

/// A random single-string text over `A,C,G,T,N` (no embedded sentinel),
/// terminated with its own `$`.
fn text_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(1u8..=5u8, 1..24).prop_map(|mut t| {
        t.push(0);
        t
    })
}

fn find_run_of(mv: &MoveTable, pos: u64) -> usize {
    (0..mv.n_runs())
        .find(|&i| mv.p(i) <= pos && pos < mv.p(i) + mv.len_of(i))
        .unwrap()
}

proptest! {
    /// Invariant 1: `p[0] = 0`, runs tile `[0, n)` with no gaps, and the
    /// total covered length equals the BWT length.
    #[test]
    fn move_table_p_array_tiles_the_bwt(text in text_strategy()) {
        let (fmi, _) = LiteralFmi::from_text(&text);
        let mv = MoveTable::build(&fmi).unwrap();

        prop_assert_eq!(mv.p(0), 0);
        for i in 0..mv.n_runs() - 1 {
            prop_assert_eq!(mv.p(i) + mv.len_of(i), mv.p(i + 1));
        }
        let last = mv.n_runs() - 1;
        prop_assert_eq!(mv.p(last) + mv.len_of(last), mv.bwt_len());
    }

    /// Invariant 5: `move.LF(p)` agrees with rank-based LF at every BWT
    /// position, both before and after splitting.
    #[test]
    fn lf_matches_rank_based_lf_before_and_after_split(text in text_strategy(), d in 1u32..4) {
        let (fmi, _) = LiteralFmi::from_text(&text);
        let mut mv = MoveTable::build(&fmi).unwrap();
        let n = fmi.len();

        let check = |mv: &MoveTable| {
            for pos in 0..n {
                let mut run_idx = find_run_of(mv, pos);
                let lf = mv.lf(pos, &mut run_idx);
                let (f_char, ok) = fmi.rank1a(pos);
                let expected = fmi.acc()[f_char as usize] + ok[f_char as usize];
                assert_eq!(lf, expected, "pos={pos}");
            }
        };
        check(&mv);
        mv.split(d);
        mv.precompute_dist();
        check(&mv);
    }

    /// Invariant 4: `reposition(i, c)` lands on a run of character `c` with
    /// no run of that character strictly between `i` and the result.
    #[test]
    fn reposition_has_no_intervening_run_of_the_same_char(text in text_strategy()) {
        let (fmi, _) = LiteralFmi::from_text(&text);
        let mut mv = MoveTable::build(&fmi).unwrap();
        mv.precompute_dist();

        for i in 0..mv.n_runs() {
            for ch in 0..ALPHABET_SIZE as u8 {
                if !(0..mv.n_runs()).any(|j| mv.c(j) == ch) {
                    continue;
                }
                let j = mv.reposition(i, ch);
                prop_assert_eq!(mv.c(j), ch);
                let (lo, hi) = (i.min(j), i.max(j));
                for k in (lo + 1)..hi {
                    prop_assert_ne!(mv.c(k), ch);
                }
            }
        }
    }

    /// Invariant 8: `phi(SA[k]) == SA[k-1]` for every `k >= 1`.
    #[test]
    fn phi_recovers_sa_predecessor(text in text_strategy()) {
        let (fmi, sa) = LiteralFmi::from_text(&text);
        let sr = SrIndex::build(&fmi, 2).unwrap();

        for k in 1..sa.len() {
            prop_assert_eq!(sr.phi(sa[k]), Some(sa[k - 1]), "k={}", k);
        }
        prop_assert_eq!(sr.phi(sa[0]), None);
    }

    /// Invariant 10/11: `locate_one` recovers the exact SA value at every
    /// BWT row, and `locate_all(0, n)` recovers the SA in ascending BWT
    /// order.
    #[test]
    fn locate_one_and_locate_all_match_genuine_sa(text in text_strategy()) {
        let (fmi, sa) = LiteralFmi::from_text(&text);
        let mv = MoveTable::build(&fmi).unwrap();
        let sr = SrIndex::build(&fmi, 3).unwrap();

        for pos in 0..fmi.len() {
            let v = sr.locate_one(&mv, pos).unwrap();
            prop_assert_eq!(v, sa[pos as usize], "pos={}", pos);
        }

        let n = fmi.len() as usize;
        let all = sr.locate_all(&mv, 0, fmi.len(), n).unwrap();
        prop_assert_eq!(all, sa);
    }

    /// Invariant 13: `0 <= PML[i] <= MS[i]` for every pattern position,
    /// over both the indexed text's own substrings and random patterns.
    #[test]
    fn pml_is_bounded_by_ms(text in text_strategy(), pattern in prop::collection::vec(1u8..=5u8, 1..10)) {
        let (fmi, _) = LiteralFmi::from_text(&text);
        let lcp = LcpIndex::build(&fmi).unwrap();

        let ms = lcp.ms(&fmi, &pattern);
        let pml = lcp.pml(&fmi, &pattern);
        for i in 0..pattern.len() {
            prop_assert!(pml[i] >= 0);
            prop_assert!(pml[i] <= ms[i], "i={} pml={} ms={}", i, pml[i], ms[i]);
        }
    }

    /// Invariant 2/3: `pi[i]` is the LF image of `p[i]` under the FM-index's
    /// own rank, and `xi[i]` names the run actually containing it.
    #[test]
    fn pi_and_xi_are_consistent_with_fmi_rank(text in text_strategy()) {
        let (fmi, _) = LiteralFmi::from_text(&text);
        let mv = MoveTable::build(&fmi).unwrap();

        for i in 0..mv.n_runs() {
            let (_, ok) = fmi.rank1a(mv.p(i));
            let expected_pi = fmi.acc()[mv.c(i) as usize] + ok[mv.c(i) as usize];
            prop_assert_eq!(mv.pi(i), expected_pi, "run={}", i);

            let xi = mv.xi(i);
            prop_assert!(mv.p(xi) <= mv.pi(i));
            prop_assert!(mv.pi(i) < mv.p(xi) + mv.len_of(xi));
        }
    }
}
