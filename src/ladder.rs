//! Power ladder: precomputed encodings for cheap level-raising.
//!
//! `uhat[i][p]` encodes the all-ones vector at `{X_i = 2^p}`. Raising an
//! encoding to a target X-level greedily multiplies in the largest fitting
//! power, which is binary decomposition when `npowers` is large enough and
//! degrades to repeated use of the top power otherwise. Each multiplication
//! consumes one unit of kappa, so the multiplication count is the cost.

use crate::backend::GradedBackend;
use crate::error::MifeError;
use crate::index_set::IndexSet;
use crate::params::{CircuitParams, PublicParams};

pub struct PowerLadder<B: GradedBackend> {
    pub npowers: usize,
    /// `uhat[slot][power]`, `npowers` entries per slot.
    pub uhat: Vec<Vec<B::Encoding>>,
}

impl<B: GradedBackend> PowerLadder<B> {
    pub(crate) fn new(npowers: usize, uhat: Vec<Vec<B::Encoding>>) -> Self {
        debug_assert!(uhat.iter().all(|row| row.len() == npowers));
        Self { npowers, uhat }
    }

    /// Raise `enc` so its X components match `target`'s exactly. Z and W
    /// components cannot be raised here; the caller's final toplevel check
    /// catches any residual mismatch.
    pub fn raise(
        &self,
        cp: &CircuitParams,
        pp: &PublicParams<B>,
        mut enc: B::Encoding,
        target: &IndexSet,
    ) -> Result<B::Encoding, MifeError> {
        let diff = target.difference(B::index_set(&enc))?;
        for slot in 0..cp.n {
            let mut rem = u64::from(diff[cp.ix_x(slot)]);
            while rem > 0 {
                let mut p = 0;
                while (1u64 << (p + 1)) <= rem && p + 1 < self.npowers {
                    p += 1;
                }
                enc = B::mul(&pp.key, &enc, &self.uhat[slot][p])?;
                rem -= 1 << p;
            }
        }
        Ok(enc)
    }

    /// Raise both encodings to the union of their levels, the precondition
    /// for addition or subtraction.
    pub fn raise_pair(
        &self,
        cp: &CircuitParams,
        pp: &PublicParams<B>,
        a: B::Encoding,
        b: B::Encoding,
    ) -> Result<(B::Encoding, B::Encoding), MifeError> {
        let target = B::index_set(&a).union(B::index_set(&b));
        let a = self.raise(cp, pp, a, &target)?;
        let b = self.raise(cp, pp, b, &target)?;
        if B::index_set(&a) != B::index_set(&b) {
            return Err(MifeError::InconsistentLevel {
                left: B::index_set(&a).clone(),
                right: B::index_set(&b).clone(),
            });
        }
        Ok((a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Circuit, CircOp, Gate};
    use crate::dummy::DummyBackend;
    use crate::params::SecretParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    /// One slot of width 1 with a degree-13 output: x^13.
    fn high_degree_circuit() -> Circuit {
        let mut gates = vec![Gate::Input(0)];
        for i in 1..13 {
            gates.push(Gate::Op { op: CircOp::Mul, lhs: i - 1, rhs: 0 });
        }
        let out = gates.len() - 1;
        Circuit::new(gates, vec![out], vec![1], vec![false], vec![], true, vec![]).unwrap()
    }

    fn ladder_fixture(
        npowers: usize,
    ) -> (CircuitParams, SecretParams<DummyBackend>, PublicParams<DummyBackend>, PowerLadder<DummyBackend>)
    {
        let cp = CircuitParams::new(Arc::new(high_degree_circuit()));
        let mut rng = StdRng::seed_from_u64(7);
        let sp = SecretParams::<DummyBackend>::setup(&cp, 8, cp.kappa(0), 1, &mut rng).unwrap();
        let pp = PublicParams::new(&sp);
        let uhat = (0..cp.n)
            .map(|i| {
                (0..npowers)
                    .map(|p| {
                        let mut ix = IndexSet::new(cp.nzs());
                        ix[cp.ix_x(i)] = 1 << p;
                        DummyBackend::encode(&sp.key, &ix, &[1, 1]).unwrap()
                    })
                    .collect()
            })
            .collect();
        let ladder = PowerLadder::new(npowers, uhat);
        (cp, sp, pp, ladder)
    }

    #[test]
    fn raise_reaches_the_target_exactly() {
        let (cp, sp, pp, ladder) = ladder_fixture(8);
        let mut ix = IndexSet::new(cp.nzs());
        ix[cp.ix_x(0)] = 1;
        let enc = DummyBackend::encode(&sp.key, &ix, &[1, 5]).unwrap();

        let mut target = IndexSet::new(cp.nzs());
        target[cp.ix_x(0)] = 13;
        let raised = ladder.raise(&cp, &pp, enc, &target).unwrap();
        assert_eq!(DummyBackend::index_set(&raised), &target);
        // diff = 12 = 8 + 4: two multiplications on top of the encode
        assert_eq!(DummyBackend::degree(&raised), 3);
    }

    #[test]
    fn small_ladder_loops_instead_of_failing() {
        let (cp, sp, pp, ladder) = ladder_fixture(1);
        let ix = IndexSet::new(cp.nzs());
        let enc = DummyBackend::encode(&sp.key, &ix, &[1, 1]).unwrap();
        let mut target = IndexSet::new(cp.nzs());
        target[cp.ix_x(0)] = 5;
        let raised = ladder.raise(&cp, &pp, enc, &target).unwrap();
        assert_eq!(DummyBackend::index_set(&raised), &target);
        // only 2^0 available: five multiplications
        assert_eq!(DummyBackend::degree(&raised), 6);
    }

    #[test]
    fn raise_pair_meets_at_the_union() {
        let (cp, sp, pp, ladder) = ladder_fixture(4);
        let mut ix_a = IndexSet::new(cp.nzs());
        ix_a[cp.ix_x(0)] = 3;
        let mut ix_b = IndexSet::new(cp.nzs());
        ix_b[cp.ix_x(0)] = 7;
        let a = DummyBackend::encode(&sp.key, &ix_a, &[1, 2]).unwrap();
        let b = DummyBackend::encode(&sp.key, &ix_b, &[1, 4]).unwrap();
        let (a, b) = ladder.raise_pair(&cp, &pp, a, b).unwrap();
        assert_eq!(DummyBackend::index_set(&a), &ix_a.union(&ix_b));
        assert_eq!(DummyBackend::index_set(&a), DummyBackend::index_set(&b));
    }
}
