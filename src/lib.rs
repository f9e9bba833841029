//! A run-length compressed full-text index over the 6-symbol DNA-like
//! alphabet `$,A,C,G,T,N`: a move structure for O(r)-space LF-mapping, a
//! bidirectional sampled-rank layer for SMEM search, a MONI-style LCP index
//! for exact and threshold-based matching statistics, and a subsampled
//! r-index for locate.
//!
//! None of these own an FM-index. Each borrows one through the [`alphabet::Fmi`]
//! trait, the seam at which this crate treats the BWT/rank backend as an
//! external collaborator (see `DESIGN.md`).

pub mod alphabet;
pub mod bmove;
pub mod error;
pub mod lcp_index;
pub mod move_table;
pub mod parallel;
pub mod sr_index;
mod util;

pub use alphabet::{Fmi, Run, ALPHABET_SIZE};
pub use bmove::{BMove, BiInterval, Mem};
pub use error::{Error, Result};
pub use lcp_index::LcpIndex;
pub use move_table::MoveTable;
pub use parallel::{ParallelFor, Sequential};
pub use sr_index::SrIndex;
