//! A random single-string `Fmi` for the construction benchmarks. Built by
//! sorting genuine suffixes (fine for benchmark input sizes, unlike the
//! linear-scan `NaiveFmi` used in unit tests) and backed by one rank/select
//! bitvector per symbol for O(1)-ish rank queries.
use r_index_core::{Fmi, Run, ALPHABET_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vers_vecs::{BitVec, RsVec};

pub struct RandomDnaFmi {
    bwt: Vec<u8>,
    acc: [u64; ALPHABET_SIZE + 1],
    ranks: [RsVec; ALPHABET_SIZE],
}

impl RandomDnaFmi {
    /// Builds a random DNA-like text of length `n` (plus its own `$`), with
    /// `n_fraction` of bases replaced by `N`.
    pub fn random(n: usize, n_fraction: f64) -> RandomDnaFmi {
        let mut rng: StdRng = SeedableRng::from_seed([0; 32]);
        let mut text: Vec<u8> = (0..n)
            .map(|_| {
                if rng.gen_bool(n_fraction) {
                    5u8
                } else {
                    1 + rng.gen_range(0, 4)
                }
            })
            .collect();
        text.push(0);

        let mut sa: Vec<usize> = (0..text.len()).collect();
        sa.sort_by(|&a, &b| text[a..].cmp(&text[b..]));
        let bwt: Vec<u8> = sa
            .iter()
            .map(|&p| {
                if p == 0 {
                    text[text.len() - 1]
                } else {
                    text[p - 1]
                }
            })
            .collect();

        let mut counts = [0u64; ALPHABET_SIZE];
        for &c in &bwt {
            counts[c as usize] += 1;
        }
        let mut acc = [0u64; ALPHABET_SIZE + 1];
        for c in 0..ALPHABET_SIZE {
            acc[c + 1] = acc[c] + counts[c];
        }

        let ranks = std::array::from_fn(|c| {
            let mut bv = BitVec::with_capacity(bwt.len());
            for &b in &bwt {
                bv.append(b as usize == c);
            }
            RsVec::from_bit_vec(bv)
        });

        RandomDnaFmi { bwt, acc, ranks }
    }
}

impl Fmi for RandomDnaFmi {
    fn len(&self) -> u64 {
        self.bwt.len() as u64
    }

    fn acc(&self) -> [u64; ALPHABET_SIZE + 1] {
        self.acc
    }

    fn rank1a(&self, pos: u64) -> (u8, [u64; ALPHABET_SIZE]) {
        let mut ok = [0u64; ALPHABET_SIZE];
        for (c, ok_c) in ok.iter_mut().enumerate() {
            *ok_c = self.ranks[c].rank1(pos as usize) as u64;
        }
        let c = if (pos as usize) < self.bwt.len() {
            self.bwt[pos as usize]
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
        Box::new(RunIter {
            bwt: &self.bwt,
            pos: 0,
        })
    }

    fn is_symmetric(&self) -> bool {
        false
    }
}

struct RunIter<'a> {
    bwt: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for RunIter<'a> {
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
