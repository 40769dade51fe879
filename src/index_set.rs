//! Index sets ("straddling sets"): the level bookkeeping behind every encoding.
//!
//! An index set is a fixed-length vector of non-negative levels recording how
//! many multiplicative factors of each component an encoding has absorbed.
//! Layout for an `n`-slot scheme (`nzs = 1 + 2n`): position 0 is Z, positions
//! `1..=n` are the W output-aggregation components, positions `n+1..=2n` are
//! the X input-level components. The position helpers live on
//! [`CircuitParams`](crate::params::CircuitParams).

use crate::error::MifeError;
use crate::serialize::{read_len, read_u32, write_u32, write_u64, DeserializeBytes, SerializeBytes};
use bytes::{Buf, BufMut};
use itertools::izip;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Vector of `nzs` non-negative levels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSet {
    pows: Vec<u32>,
}

impl IndexSet {
    /// The zero vector of length `nzs`.
    #[must_use]
    pub fn new(nzs: usize) -> Self {
        Self { pows: vec![0; nzs] }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pows.is_empty()
    }

    /// Elementwise maximum: the common level two encodings must be raised to
    /// before they can be added or subtracted.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        assert_eq!(self.len(), other.len(), "index set length mismatch");
        Self {
            pows: izip!(&self.pows, &other.pows).map(|(&a, &b)| a.max(b)).collect(),
        }
    }

    /// Elementwise sum: the level an encoding lands on after a multiplication.
    #[must_use]
    pub fn plus(&self, other: &Self) -> Self {
        assert_eq!(self.len(), other.len(), "index set length mismatch");
        Self {
            pows: izip!(&self.pows, &other.pows).map(|(&a, &b)| a + b).collect(),
        }
    }

    /// Elementwise subtraction `self - current`. Any negative component is a
    /// scheme or programming error, surfaced as [`MifeError::LevelUnderflow`].
    pub fn difference(&self, current: &Self) -> Result<Self, MifeError> {
        assert_eq!(self.len(), current.len(), "index set length mismatch");
        izip!(&self.pows, &current.pows)
            .map(|(&t, &c)| t.checked_sub(c))
            .collect::<Option<Vec<u32>>>()
            .map(|pows| Self { pows })
            .ok_or_else(|| MifeError::LevelUnderflow {
                target: self.clone(),
                current: current.clone(),
            })
    }

    /// Componentwise `self <= other`; every well-formed encoding satisfies
    /// this with respect to the toplevel.
    #[must_use]
    pub fn le(&self, other: &Self) -> bool {
        self.len() == other.len()
            && izip!(&self.pows, &other.pows).all(|(&a, &b)| a <= b)
    }
}

impl Index<usize> for IndexSet {
    type Output = u32;

    fn index(&self, i: usize) -> &u32 {
        &self.pows[i]
    }
}

impl IndexMut<usize> for IndexSet {
    fn index_mut(&mut self, i: usize) -> &mut u32 {
        &mut self.pows[i]
    }
}

impl fmt::Display for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, p) in self.pows.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, "]")
    }
}

impl SerializeBytes for IndexSet {
    fn serialize(&self, buf: &mut impl BufMut) -> Result<(), MifeError> {
        write_u64(buf, self.pows.len() as u64)?;
        for &p in &self.pows {
            write_u32(buf, p)?;
        }
        Ok(())
    }
}

impl DeserializeBytes for IndexSet {
    fn deserialize(buf: &mut impl Buf) -> Result<Self, MifeError> {
        let len = read_len(buf, 4)?;
        let mut pows = Vec::with_capacity(len);
        for _ in 0..len {
            pows.push(read_u32(buf)?);
        }
        Ok(Self { pows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ix(pows: &[u32]) -> IndexSet {
        let mut s = IndexSet::new(pows.len());
        for (i, &p) in pows.iter().enumerate() {
            s[i] = p;
        }
        s
    }

    #[test]
    fn union_is_commutative_and_idempotent() {
        let a = ix(&[1, 0, 3, 2]);
        let b = ix(&[0, 2, 3, 1]);
        assert_eq!(a.union(&b), b.union(&a));
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn difference_recovers_the_union() {
        let a = ix(&[1, 0, 3, 2]);
        let b = ix(&[0, 2, 3, 1]);
        let u = a.union(&b);
        let d = u.difference(&a).unwrap();
        // no negative component by construction, and a ∪ (u - a) = u
        assert_eq!(a.union(&d), u);
    }

    #[test]
    fn difference_underflows_loudly() {
        let a = ix(&[1, 1]);
        let b = ix(&[0, 2]);
        match a.difference(&b) {
            Err(MifeError::LevelUnderflow { target, current }) => {
                assert_eq!(target, a);
                assert_eq!(current, b);
            }
            other => panic!("expected LevelUnderflow, got {other:?}"),
        }
    }

    #[test]
    fn plus_tracks_multiplication() {
        let a = ix(&[1, 0, 2]);
        let b = ix(&[0, 1, 2]);
        assert_eq!(a.plus(&b), ix(&[1, 1, 4]));
    }

    #[test]
    fn byte_roundtrip() {
        let a = ix(&[5, 0, 1 << 20, 7]);
        let mut buf = Vec::new();
        a.serialize(&mut buf).unwrap();
        assert_eq!(IndexSet::deserialize(&mut buf.as_slice()).unwrap(), a);
    }
}
