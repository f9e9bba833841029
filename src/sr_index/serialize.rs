//! The on-disk `.sri` SR-index format: a fixed header followed by either raw
//! `u64`/`i64` columns (v1) or delta-coded/bit-packed columns (v3), mirroring
//! `move_table::serialize`'s v1/v2 split. v2 (an intermediate layout with
//! raw columns but a leaner header) isn't implemented; v1 already covers the
//! uncompressed case and v3 the compressed one, so it would add a format
//! with no use this crate has for it.
use std::io::{Read, Write};

use vers_vecs::BitVec;

use super::SrIndex;
use crate::error::{Error, Result};
use crate::util::bit_width;

pub const SRI_MAGIC_V1: [u8; 4] = *b"SRI\x01";
pub const SRI_MAGIC_V3: [u8; 4] = *b"SRI\x03";
const HDR_SIZE: usize = 52;
const HDR_SIZE_V3: usize = 56;

fn write_header(
    w: &mut impl Write,
    magic: [u8; 4],
    sr: &SrIndex,
    n_sub_stored: u64,
) -> Result<()> {
    let mut header = [0u8; HDR_SIZE];
    header[0..4].copy_from_slice(&magic);
    // header[4..8] reserved, mirrors move_table::serialize's header gap.
    header[8..12].copy_from_slice(&(sr.s as i32).to_le_bytes());
    header[12..20].copy_from_slice(&(sr.m as i64).to_le_bytes());
    header[20..28].copy_from_slice(&(sr.n as i64).to_le_bytes());
    header[28..36].copy_from_slice(&(sr.phi_sa.len() as i64).to_le_bytes());
    header[36..44].copy_from_slice(&(sr.sub_pos.len() as i64).to_le_bytes());
    header[44..52].copy_from_slice(&(n_sub_stored as i64).to_le_bytes());
    w.write_all(&header)?;
    Ok(())
}

struct Header {
    s: u64,
    m: u64,
    n: u64,
    n_runs: usize,
    n_samples: usize,
    n_sub_stored: usize,
}

fn read_header(r: &mut impl Read) -> Result<(Header, [u8; 4])> {
    let mut header = [0u8; HDR_SIZE];
    r.read_exact(&mut header)?;
    let magic: [u8; 4] = header[0..4].try_into().unwrap();
    let h = Header {
        s: i32::from_le_bytes(header[8..12].try_into().unwrap()) as u64,
        m: i64::from_le_bytes(header[12..20].try_into().unwrap()) as u64,
        n: i64::from_le_bytes(header[20..28].try_into().unwrap()) as u64,
        n_runs: i64::from_le_bytes(header[28..36].try_into().unwrap()) as usize,
        n_samples: i64::from_le_bytes(header[36..44].try_into().unwrap()) as usize,
        n_sub_stored: i64::from_le_bytes(header[44..52].try_into().unwrap()) as usize,
    };
    Ok((h, magic))
}

impl SrIndex {
    /// Writes the v1 (raw column) layout.
    pub fn save(&self, w: &mut impl Write) -> Result<()> {
        let n_sub_stored = if self.s <= 1 { 0 } else { self.sub_pos.len() };
        write_header(w, SRI_MAGIC_V1, self, n_sub_stored as u64)?;

        for &v in &self.phi_sa {
            w.write_all(&v.to_le_bytes())?;
        }
        for &d in &self.phi_da {
            let raw: i64 = d.map(|v| v as i64).unwrap_or(-1);
            w.write_all(&raw.to_le_bytes())?;
        }
        for &v in &self.run_pos {
            w.write_all(&v.to_le_bytes())?;
        }
        for &v in &self.run_sa {
            w.write_all(&v.to_le_bytes())?;
        }
        if n_sub_stored > 0 {
            for &v in &self.sub_pos {
                w.write_all(&v.to_le_bytes())?;
            }
            for &v in &self.sub_sa {
                w.write_all(&v.to_le_bytes())?;
            }
        }
        for &v in &self.cum_len {
            w.write_all(&v.to_le_bytes())?;
        }
        for &v in &self.text_order_sid {
            w.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }

    /// Writes the v3 layout: sorted columns (`phi_sa`, `run_pos`, `sub_pos`,
    /// `cum_len`) delta-coded against their predecessor at one shared
    /// `delta_bits` width, unsorted columns (`phi_da`, `run_sa`, `sub_sa`,
    /// `text_order_sid`) bit-packed at one shared `bit_width`. `phi_da` gets
    /// one extra bit so its all-ones pattern can stand in for the `-1`
    /// no-predecessor sentinel.
    pub fn save_compact(&self, w: &mut impl Write) -> Result<()> {
        let n_sub_stored = if self.s <= 1 { 0 } else { self.sub_pos.len() };
        write_header(w, SRI_MAGIC_V3, self, n_sub_stored as u64)?;

        let delta_bits = [
            delta_width(&self.phi_sa),
            delta_width(&self.run_pos),
            delta_width(&self.sub_pos),
            delta_width(&self.cum_len),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        let max_da = self.phi_da.iter().filter_map(|&d| d).max().unwrap_or(0);
        let bit_w = [
            bit_width(max_da),
            bit_width(self.run_sa.iter().copied().max().unwrap_or(0)),
            bit_width(self.sub_sa.iter().copied().max().unwrap_or(0)),
            bit_width(self.text_order_sid.iter().copied().max().unwrap_or(0)),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        let bw_phi_da = bit_w + 1;

        w.write_all(&[bit_w as u8, delta_bits as u8, 0, 0])?;

        let mut bits = BitVec::new();
        append_delta(&mut bits, &self.phi_sa, delta_bits);
        for &d in &self.phi_da {
            let raw = match d {
                Some(v) => v,
                None => (1u64 << bw_phi_da) - 1,
            };
            bits.append_bits(raw, bw_phi_da as usize);
        }
        append_delta(&mut bits, &self.run_pos, delta_bits);
        for &v in &self.run_sa {
            bits.append_bits(v, bit_w as usize);
        }
        if n_sub_stored > 0 {
            append_delta(&mut bits, &self.sub_pos, delta_bits);
            for &v in &self.sub_sa {
                bits.append_bits(v, bit_w as usize);
            }
        }
        append_delta(&mut bits, &self.cum_len, delta_bits);
        for &v in &self.text_order_sid {
            bits.append_bits(v, bit_w as usize);
        }

        let total_bits = self.phi_sa.len() as u64 * delta_bits as u64
            + self.phi_da.len() as u64 * bw_phi_da as u64
            + self.run_pos.len() as u64 * delta_bits as u64
            + self.run_sa.len() as u64 * bit_w as u64
            + n_sub_stored as u64 * delta_bits as u64
            + n_sub_stored as u64 * bit_w as u64
            + self.cum_len.len() as u64 * delta_bits as u64
            + self.text_order_sid.len() as u64 * bit_w as u64;
        let n_words = total_bits.div_ceil(64) as usize;
        let mut off = 0usize;
        for _ in 0..n_words {
            let word = bits.get_bits_unchecked(off, 64);
            w.write_all(&word.to_le_bytes())?;
            off += 64;
        }
        Ok(())
    }

    /// Loads a `.sri` file written by [`save`](Self::save) or
    /// [`save_compact`](Self::save_compact), dispatching on the magic.
    pub fn load(r: &mut impl Read) -> Result<SrIndex> {
        let (h, magic) = read_header(r)?;
        if magic == SRI_MAGIC_V1 {
            Self::load_v1_body(r, &h)
        } else if magic == SRI_MAGIC_V3 {
            Self::load_v3_body(r, &h)
        } else {
            Err(Error::CorruptFile(format!("bad magic {:?}", magic)))
        }
    }

    fn load_v1_body(r: &mut impl Read, h: &Header) -> Result<SrIndex> {
        let read_u64_vec = |r: &mut dyn Read, n: usize| -> Result<Vec<u64>> {
            let mut out = Vec::with_capacity(n);
            for _ in 0..n {
                let mut buf = [0u8; 8];
                r.read_exact(&mut buf)?;
                out.push(u64::from_le_bytes(buf));
            }
            Ok(out)
        };

        let phi_sa = read_u64_vec(r, h.n_runs)?;
        let mut phi_da = Vec::with_capacity(h.n_runs);
        for _ in 0..h.n_runs {
            let mut buf = [0u8; 8];
            r.read_exact(&mut buf)?;
            let raw = i64::from_le_bytes(buf);
            phi_da.push(if raw < 0 { None } else { Some(raw as u64) });
        }
        let run_pos = read_u64_vec(r, h.n_runs)?;
        let run_sa = read_u64_vec(r, h.n_runs)?;
        let (sub_pos, sub_sa) = if h.n_sub_stored > 0 {
            (
                read_u64_vec(r, h.n_sub_stored)?,
                read_u64_vec(r, h.n_sub_stored)?,
            )
        } else {
            (run_pos.clone(), run_sa.clone())
        };
        let cum_len = read_u64_vec(r, h.m as usize + 1)?;
        let text_order_sid = read_u64_vec(r, h.m as usize)?;
        debug_assert_eq!(sub_pos.len(), h.n_samples);
        let sub_bv = rebuild_sub_bv(&sub_pos, h.n);

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
            s: h.s,
            m: h.m,
            n: h.n,
        })
    }

    fn load_v3_body(r: &mut impl Read, h: &Header) -> Result<SrIndex> {
        let mut w = [0u8; 4];
        r.read_exact(&mut w)?;
        let bit_w = w[0] as u32;
        let delta_bits = w[1] as u32;
        let bw_phi_da = bit_w + 1;

        let n_sub = h.n_sub_stored;
        let total_bits = h.n_runs as u64 * delta_bits as u64
            + h.n_runs as u64 * bw_phi_da as u64
            + h.n_runs as u64 * delta_bits as u64
            + h.n_runs as u64 * bit_w as u64
            + n_sub as u64 * delta_bits as u64
            + n_sub as u64 * bit_w as u64
            + (h.m + 1) * delta_bits as u64
            + h.m * bit_w as u64;
        let n_words = total_bits.div_ceil(64) as usize;
        let mut bits = BitVec::with_capacity(n_words * 64);
        for _ in 0..n_words {
            let mut buf = [0u8; 8];
            r.read_exact(&mut buf)?;
            bits.append_bits(u64::from_le_bytes(buf), 64);
        }

        let mut off = 0usize;
        let phi_sa = read_delta(&bits, &mut off, h.n_runs, delta_bits);
        let mut phi_da = Vec::with_capacity(h.n_runs);
        let sentinel = (1u64 << bw_phi_da) - 1;
        for _ in 0..h.n_runs {
            let raw = bits.get_bits_unchecked(off, bw_phi_da as usize);
            off += bw_phi_da as usize;
            phi_da.push(if raw == sentinel { None } else { Some(raw) });
        }
        let run_pos = read_delta(&bits, &mut off, h.n_runs, delta_bits);
        let run_sa = read_plain(&bits, &mut off, h.n_runs, bit_w);
        let (sub_pos, sub_sa) = if n_sub > 0 {
            let sp = read_delta(&bits, &mut off, n_sub, delta_bits);
            let ss = read_plain(&bits, &mut off, n_sub, bit_w);
            (sp, ss)
        } else {
            (run_pos.clone(), run_sa.clone())
        };
        let cum_len = read_delta(&bits, &mut off, h.m as usize + 1, delta_bits);
        let text_order_sid = read_plain(&bits, &mut off, h.m as usize, bit_w);
        debug_assert_eq!(sub_pos.len(), h.n_samples);

        Ok(SrIndex {
            phi_sa,
            phi_da,
            run_pos,
            run_sa,
            sub_bv: rebuild_sub_bv(&sub_pos, h.n),
            sub_pos,
            sub_sa,
            cum_len,
            text_order_sid,
            s: h.s,
            m: h.m,
            n: h.n,
        })
    }
}

fn rebuild_sub_bv(sub_pos: &[u64], n: u64) -> BitVec {
    let mut bv = BitVec::with_capacity(n as usize);
    let mut j = 0usize;
    for p in 0..n {
        if j < sub_pos.len() && sub_pos[j] == p {
            bv.append(true);
            j += 1;
        } else {
            bv.append(false);
        }
    }
    bv
}

fn delta_width(sorted: &[u64]) -> u32 {
    let mut max_delta = sorted.first().copied().unwrap_or(0);
    for w in sorted.windows(2) {
        max_delta = max_delta.max(w[1] - w[0]);
    }
    bit_width(max_delta)
}

fn append_delta(bits: &mut BitVec, sorted: &[u64], bw: u32) {
    let mut prev = 0u64;
    for &v in sorted {
        bits.append_bits(v - prev, bw as usize);
        prev = v;
    }
}

fn read_delta(bits: &BitVec, off: &mut usize, n: usize, bw: u32) -> Vec<u64> {
    let mut out = Vec::with_capacity(n);
    let mut prev = 0u64;
    for _ in 0..n {
        let d = bits.get_bits_unchecked(*off, bw as usize);
        *off += bw as usize;
        prev += d;
        out.push(prev);
    }
    out
}

fn read_plain(bits: &BitVec, off: &mut usize, n: usize, bw: u32) -> Vec<u64> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(bits.get_bits_unchecked(*off, bw as usize));
        *off += bw as usize;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::test_support::NaiveFmi;

    fn single_string_fmi(text: &[u8]) -> NaiveFmi {
        let n = text.len();
        let mut sa: Vec<usize> = (0..n).collect();
        sa.sort_by(|&a, &b| text[a..].cmp(&text[b..]));
        let bwt: Vec<u8> = sa
            .iter()
            .map(|&p| if p == 0 { text[n - 1] } else { text[p - 1] })
            .collect();
        NaiveFmi::new(bwt)
    }

    #[test]
    fn round_trips_through_v1() {
        let text = vec![1u8, 2, 1, 2, 1, 2, 0];
        let fmi = single_string_fmi(&text);
        let sr = SrIndex::build(&fmi, 2).unwrap();

        let mut buf = Vec::new();
        sr.save(&mut buf).unwrap();
        let loaded = SrIndex::load(&mut &buf[..]).unwrap();

        assert_eq!(loaded.phi_sa, sr.phi_sa);
        assert_eq!(loaded.phi_da, sr.phi_da);
        assert_eq!(loaded.run_pos, sr.run_pos);
        assert_eq!(loaded.run_sa, sr.run_sa);
        assert_eq!(loaded.sub_pos, sr.sub_pos);
        assert_eq!(loaded.sub_sa, sr.sub_sa);
        assert_eq!(loaded.cum_len, sr.cum_len);
        assert_eq!(loaded.text_order_sid, sr.text_order_sid);
    }

    #[test]
    fn round_trips_through_v3_compact() {
        let text: Vec<u8> = (0..16)
            .flat_map(|_| vec![1u8, 2, 3, 4])
            .chain(std::iter::once(0u8))
            .collect();
        let fmi = single_string_fmi(&text);
        let sr = SrIndex::build(&fmi, 16).unwrap();

        let mut buf = Vec::new();
        sr.save_compact(&mut buf).unwrap();
        let loaded = SrIndex::load(&mut &buf[..]).unwrap();

        assert_eq!(loaded.phi_sa, sr.phi_sa);
        assert_eq!(loaded.phi_da, sr.phi_da);
        assert_eq!(loaded.run_sa, sr.run_sa);
        assert_eq!(loaded.sub_pos, sr.sub_pos);
        assert_eq!(loaded.cum_len, sr.cum_len);
    }

    #[test]
    fn header_is_spec_sized() {
        let text = vec![1u8, 2, 1, 2, 1, 2, 0];
        let fmi = single_string_fmi(&text);
        let sr = SrIndex::build(&fmi, 2).unwrap();

        assert_eq!(HDR_SIZE, 52);
        let mut buf = Vec::new();
        sr.save(&mut buf).unwrap();
        assert!(buf.len() > HDR_SIZE);

        assert_eq!(HDR_SIZE_V3, 56);
        let mut buf3 = Vec::new();
        sr.save_compact(&mut buf3).unwrap();
        assert!(buf3.len() > HDR_SIZE_V3);
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = [0u8; HDR_SIZE];
        assert!(matches!(
            SrIndex::load(&mut &buf[..]),
            Err(Error::CorruptFile(_))
        ));
    }
}
