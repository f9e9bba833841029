//! The on-disk `.mvi` move-table format: a fixed 96-byte header followed by
//! either 48-byte-per-run rows (v1, legacy) or a compact column layout (v2)
//! that reconstructs `p[]`/`pi[]` from prefix sums at load time.
use std::io::{Read, Write};

use super::MoveTable;
use crate::alphabet::ALPHABET_SIZE;
use crate::error::{Error, Result};

pub const MVI_MAGIC_V1: [u8; 4] = *b"MVI\x01";
pub const MVI_MAGIC_V2: [u8; 4] = *b"MVI\x02";
const HDR_SIZE: usize = 96;
const ROW_SIZE_V1: u32 = 48;

fn checksum_v2(m: &MoveTable) -> u64 {
    let mut cs: u64 = 0;
    for i in 0..m.n_runs() {
        let word = (m.xi[i] as u64) << 32 | ((m.len[i] as u16) as u64) << 16 | (m.c[i] as u64);
        cs ^= word;
        cs = cs.rotate_left(7);
    }
    cs
}

impl MoveTable {
    /// Writes the table in the v2 compact `.mvi` layout: requires every run
    /// length to fit in a `u16` (always true after [`split`](Self::split)
    /// with any `d >= 1`, since max_len is bounded well under 65536 for any
    /// realistic run count).
    pub fn save(&self, w: &mut impl Write) -> Result<()> {
        let can_v2 = self.len.iter().all(|&l| l < 1 << 16);
        if !can_v2 {
            return self.save_v1(w);
        }

        let mut header = [0u8; HDR_SIZE];
        header[0..4].copy_from_slice(&MVI_MAGIC_V2);
        header[8..16].copy_from_slice(&(self.n_runs() as u64).to_le_bytes());
        header[16..24].copy_from_slice(&self.bwt_len.to_le_bytes());
        for (i, &a) in self.acc.iter().enumerate() {
            header[24 + i * 8..24 + i * 8 + 8].copy_from_slice(&a.to_le_bytes());
        }
        header[80..84].copy_from_slice(&self.d.to_le_bytes());
        header[84..88].copy_from_slice(&0u32.to_le_bytes());
        header[88..96].copy_from_slice(&checksum_v2(self).to_le_bytes());
        w.write_all(&header)?;

        for &xi in &self.xi {
            w.write_all(&xi.to_le_bytes())?;
        }
        for &len in &self.len {
            w.write_all(&(len as u16).to_le_bytes())?;
        }
        for &c in &self.c {
            w.write_all(&[c])?;
        }
        if self.dist.is_empty() {
            for _ in 0..(self.n_runs() * ALPHABET_SIZE) {
                w.write_all(&0i16.to_le_bytes())?;
            }
        } else {
            for &d in &self.dist {
                w.write_all(&d.to_le_bytes())?;
            }
        }
        Ok(())
    }

    fn save_v1(&self, w: &mut impl Write) -> Result<()> {
        let mut header = [0u8; HDR_SIZE];
        header[0..4].copy_from_slice(&MVI_MAGIC_V1);
        header[8..16].copy_from_slice(&(self.n_runs() as u64).to_le_bytes());
        header[16..24].copy_from_slice(&self.bwt_len.to_le_bytes());
        for (i, &a) in self.acc.iter().enumerate() {
            header[24 + i * 8..24 + i * 8 + 8].copy_from_slice(&a.to_le_bytes());
        }
        header[80..84].copy_from_slice(&self.d.to_le_bytes());
        header[84..88].copy_from_slice(&ROW_SIZE_V1.to_le_bytes());
        header[88..96].copy_from_slice(&checksum_v2(self).to_le_bytes());
        w.write_all(&header)?;

        for i in 0..self.n_runs() {
            w.write_all(&self.p[i].to_le_bytes())?;
            w.write_all(&self.pi[i].to_le_bytes())?;
            w.write_all(&(self.xi[i] as u64).to_le_bytes())?;
            w.write_all(&self.len[i].to_le_bytes())?;
            for ch in 0..ALPHABET_SIZE {
                let d = self.dist.get(i * ALPHABET_SIZE + ch).copied().unwrap_or(0);
                w.write_all(&d.to_le_bytes())?;
            }
            w.write_all(&[self.c[i] as u8])?;
            w.write_all(&[0u8; 3])?;
        }
        Ok(())
    }

    /// Loads a `.mvi` file written by [`save`](Self::save), dispatching on
    /// the magic to the v1 or v2 body layout.
    pub fn load(r: &mut impl Read) -> Result<MoveTable> {
        let mut header = [0u8; HDR_SIZE];
        r.read_exact(&mut header)?;

        let magic = &header[0..4];
        let n_runs = u64::from_le_bytes(header[8..16].try_into().unwrap()) as usize;
        let bwt_len = u64::from_le_bytes(header[16..24].try_into().unwrap());
        let mut acc = [0u64; ALPHABET_SIZE + 1];
        for i in 0..=ALPHABET_SIZE {
            acc[i] = u64::from_le_bytes(header[24 + i * 8..24 + i * 8 + 8].try_into().unwrap());
        }
        let d = u32::from_le_bytes(header[80..84].try_into().unwrap());
        let checksum = u64::from_le_bytes(header[88..96].try_into().unwrap());

        let table = if magic == MVI_MAGIC_V1 {
            Self::load_v1_body(r, n_runs, acc, bwt_len, d)?
        } else if magic == MVI_MAGIC_V2 {
            Self::load_v2_body(r, n_runs, acc, bwt_len, d)?
        } else {
            return Err(Error::CorruptFile(format!("bad magic {:?}", magic)));
        };

        if checksum_v2(&table) != checksum {
            return Err(Error::CorruptFile("checksum mismatch".into()));
        }
        Ok(table)
    }

    fn load_v1_body(
        r: &mut impl Read,
        n_runs: usize,
        acc: [u64; ALPHABET_SIZE + 1],
        bwt_len: u64,
        d: u32,
    ) -> Result<MoveTable> {
        let mut p = Vec::with_capacity(n_runs);
        let mut pi = Vec::with_capacity(n_runs);
        let mut xi = Vec::with_capacity(n_runs);
        let mut len = Vec::with_capacity(n_runs);
        let mut c = Vec::with_capacity(n_runs);
        let mut dist = Vec::with_capacity(n_runs * ALPHABET_SIZE);

        for _ in 0..n_runs {
            let mut buf8 = [0u8; 8];
            r.read_exact(&mut buf8)?;
            p.push(u64::from_le_bytes(buf8));
            r.read_exact(&mut buf8)?;
            pi.push(u64::from_le_bytes(buf8));
            r.read_exact(&mut buf8)?;
            xi.push(u64::from_le_bytes(buf8) as u32);
            r.read_exact(&mut buf8)?;
            len.push(u64::from_le_bytes(buf8));
            for _ in 0..ALPHABET_SIZE {
                let mut buf2 = [0u8; 2];
                r.read_exact(&mut buf2)?;
                dist.push(i16::from_le_bytes(buf2));
            }
            let mut row_tail = [0u8; 4];
            r.read_exact(&mut row_tail)?;
            c.push(row_tail[0] as u8);
        }

        Ok(MoveTable {
            p,
            pi,
            xi,
            len,
            c,
            dist,
            acc,
            bwt_len,
            d,
        })
    }

    fn load_v2_body(
        r: &mut impl Read,
        n_runs: usize,
        acc: [u64; ALPHABET_SIZE + 1],
        bwt_len: u64,
        d: u32,
    ) -> Result<MoveTable> {
        let mut xi = Vec::with_capacity(n_runs);
        for _ in 0..n_runs {
            let mut buf4 = [0u8; 4];
            r.read_exact(&mut buf4)?;
            xi.push(u32::from_le_bytes(buf4));
        }
        let mut len = Vec::with_capacity(n_runs);
        for _ in 0..n_runs {
            let mut buf2 = [0u8; 2];
            r.read_exact(&mut buf2)?;
            len.push(u16::from_le_bytes(buf2) as u64);
        }
        let mut c = Vec::with_capacity(n_runs);
        for _ in 0..n_runs {
            let mut buf1 = [0u8; 1];
            r.read_exact(&mut buf1)?;
            c.push(buf1[0] as u8);
        }
        let mut dist = Vec::with_capacity(n_runs * ALPHABET_SIZE);
        for _ in 0..(n_runs * ALPHABET_SIZE) {
            let mut buf2 = [0u8; 2];
            r.read_exact(&mut buf2)?;
            dist.push(i16::from_le_bytes(buf2));
        }

        let mut p = Vec::with_capacity(n_runs);
        let mut pos = 0u64;
        for &l in &len {
            p.push(pos);
            pos += l;
        }
        if pos != bwt_len {
            return Err(Error::CorruptFile(format!(
                "run lengths sum to {} but header declares bwt_len={}",
                pos, bwt_len
            )));
        }

        let mut cnt = [0u64; ALPHABET_SIZE];
        let mut pi = Vec::with_capacity(n_runs);
        for i in 0..n_runs {
            let cc = c[i] as usize;
            pi.push(acc[cc] + cnt[cc]);
            cnt[cc] += len[i];
        }

        Ok(MoveTable {
            p,
            pi,
            xi,
            len,
            c,
            dist,
            acc,
            bwt_len,
            d,
        })
    }
}
