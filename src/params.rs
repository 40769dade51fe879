//! Scheme parameters derived from circuit shape.
//!
//! [`CircuitParams`] fixes the slot layout (including the synthetic constants
//! slot) and the index-set geometry; [`SecretParams`]/[`PublicParams`] wrap
//! the backend's key material together with the toplevel index set.

use crate::backend::{GradedBackend, KeygenParams};
use crate::circuit::Circuit;
use crate::error::MifeError;
use crate::index_set::IndexSet;
use bytes::{Buf, BufMut};
use rand::Rng;
use std::sync::Arc;
use tracing::debug;

/// Slot layout shared read-only by every other entity.
///
/// When the circuit carries constants or secrets they occupy one extra
/// synthetic slot at position `n - 1`, encrypted once at setup.
#[derive(Clone, Debug)]
pub struct CircuitParams {
    circ: Arc<Circuit>,
    /// Slot count, including the synthetic constants slot when present.
    pub n: usize,
    /// Per-slot bit-width.
    pub ds: Vec<usize>,
    /// Per-slot symbol alphabet size.
    pub qs: Vec<usize>,
    /// Output count.
    pub m: usize,
    has_consts: bool,
}

impl CircuitParams {
    #[must_use]
    pub fn new(circ: Arc<Circuit>) -> Self {
        let has_consts = circ.nconsts() > 0;
        let n = circ.nsymbols() + usize::from(has_consts);
        let mut ds: Vec<usize> = (0..circ.nsymbols()).map(|i| circ.symlen(i)).collect();
        let mut qs: Vec<usize> = (0..circ.nsymbols())
            .map(|i| if circ.is_sigma(i) { circ.symlen(i) } else { 2 })
            .collect();
        if has_consts {
            ds.push(circ.nconsts());
            qs.push(1);
        }
        let m = circ.noutputs();
        Self { circ, n, ds, qs, m, has_consts }
    }

    #[must_use]
    pub fn circ(&self) -> &Circuit {
        &self.circ
    }

    #[must_use]
    pub fn has_consts(&self) -> bool {
        self.has_consts
    }

    /// Slots a client can actually encrypt into.
    #[must_use]
    pub fn nreal_slots(&self) -> usize {
        self.n - usize::from(self.has_consts)
    }

    /// Index-set length: one Z, `n` W components, `n` X components.
    #[must_use]
    pub fn nzs(&self) -> usize {
        1 + 2 * self.n
    }

    /// Position of the Z component.
    #[must_use]
    pub fn ix_z(&self) -> usize {
        0
    }

    /// Position of slot `i`'s W (output-aggregation) component.
    #[must_use]
    pub fn ix_w(&self, i: usize) -> usize {
        1 + i
    }

    /// Position of slot `i`'s X (input-level) component.
    #[must_use]
    pub fn ix_x(&self, i: usize) -> usize {
        1 + self.n + i
    }

    /// Maximum circuit degree in each slot's variables; sizes level-raising.
    #[must_use]
    pub fn deg_max(&self) -> Vec<u64> {
        let mut degs: Vec<u64> = (0..self.circ.nsymbols())
            .map(|i| self.circ.max_var_degree(i))
            .collect();
        if self.has_consts {
            degs.push(self.circ.max_const_degree());
        }
        degs
    }

    /// The unique index set at which zero-testing is permitted:
    /// Z = 1, every W = 1, every X at that slot's maximum degree.
    pub fn toplevel(&self) -> Result<IndexSet, MifeError> {
        let mut ix = IndexSet::new(self.nzs());
        ix[self.ix_z()] = 1;
        for (i, &deg) in self.deg_max().iter().enumerate() {
            ix[self.ix_w(i)] = 1;
            ix[self.ix_x(i)] =
                u32::try_from(deg).map_err(|_| MifeError::BackendKeygenFailed)?;
        }
        Ok(ix)
    }

    /// Required multilinearity depth: the override if nonzero, else
    /// `max(delta + 1, nsymbols)`.
    #[must_use]
    pub fn kappa(&self, force: usize) -> usize {
        if force != 0 {
            force
        } else {
            usize::try_from(self.circ.delta() + 1)
                .unwrap_or(usize::MAX)
                .max(self.circ.nsymbols())
        }
    }

    /// Map a flat input index to its `(slot, bit)` position.
    #[must_use]
    pub fn slot_of_input(&self, input: usize) -> (usize, usize) {
        self.circ.symbol_of(input)
    }

    /// Encodings a full setup produces, for progress reporting.
    #[must_use]
    pub fn num_encodings_setup(&self, npowers: usize) -> usize {
        let nconsts = if self.has_consts { self.ds[self.n - 1] } else { 1 };
        1 + self.n * npowers + nconsts
    }

    /// Encodings one encryption produces, for progress reporting.
    #[must_use]
    pub fn num_encodings_encrypt(&self, slot: usize) -> usize {
        self.ds[slot] + self.m
    }
}

/// Backend secret key plus the toplevel index set.
pub struct SecretParams<B: GradedBackend> {
    pub key: B::SecretKey,
    pub toplevel: IndexSet,
}

impl<B: GradedBackend> SecretParams<B> {
    /// Invoke the backend's key generation once, sized by the toplevel's
    /// component count and kappa.
    pub fn setup<R: Rng>(
        cp: &CircuitParams,
        secparam: usize,
        kappa: usize,
        nthreads: usize,
        rng: &mut R,
    ) -> Result<Self, MifeError> {
        let toplevel = cp.toplevel()?;
        let pows: Vec<u32> = (0..toplevel.len()).map(|i| toplevel[i]).collect();
        let params = KeygenParams {
            secparam,
            kappa,
            pows: &pows,
            nslots: 1 + cp.n,
            modulus: cp.circ().is_binary().then_some(2),
            nthreads,
        };
        debug!(kappa, nzs = cp.nzs(), nslots = params.nslots, "backend keygen");
        let key = B::keygen(&params, rng).map_err(|_| MifeError::BackendKeygenFailed)?;
        Ok(Self { key, toplevel })
    }

    pub fn write_bytes(&self, buf: &mut impl BufMut) -> Result<(), MifeError> {
        B::write_secret_key(&self.key, buf)
    }

    /// The toplevel is recomputed from the circuit rather than stored.
    pub fn read_bytes(cp: &CircuitParams, buf: &mut impl Buf) -> Result<Self, MifeError> {
        let key = B::read_secret_key(buf)?;
        Ok(Self { key, toplevel: cp.toplevel()? })
    }
}

/// Backend public key plus the toplevel index set.
pub struct PublicParams<B: GradedBackend> {
    pub key: B::PublicKey,
    pub toplevel: IndexSet,
}

impl<B: GradedBackend> PublicParams<B> {
    #[must_use]
    pub fn new(sp: &SecretParams<B>) -> Self {
        Self {
            key: B::public_key(&sp.key),
            toplevel: sp.toplevel.clone(),
        }
    }

    pub fn write_bytes(&self, buf: &mut impl BufMut) -> Result<(), MifeError> {
        B::write_public_key(&self.key, buf)
    }

    pub fn read_bytes(cp: &CircuitParams, buf: &mut impl Buf) -> Result<Self, MifeError> {
        let key = B::read_public_key(buf)?;
        Ok(Self { key, toplevel: cp.toplevel()? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::testing::{const_circuit, xor_circuit};
    use crate::dummy::DummyBackend;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn slot_layout_without_consts() {
        let cp = CircuitParams::new(Arc::new(xor_circuit()));
        assert_eq!(cp.n, 2);
        assert_eq!(cp.nreal_slots(), 2);
        assert_eq!(cp.ds, vec![1, 1]);
        assert_eq!(cp.nzs(), 5);
        let top = cp.toplevel().unwrap();
        assert_eq!(top[cp.ix_z()], 1);
        assert_eq!(top[cp.ix_w(0)], 1);
        assert_eq!(top[cp.ix_x(0)], 1);
        assert_eq!(top[cp.ix_x(1)], 1);
    }

    #[test]
    fn constants_get_a_synthetic_slot() {
        let cp = CircuitParams::new(Arc::new(const_circuit()));
        assert_eq!(cp.n, 3);
        assert_eq!(cp.nreal_slots(), 2);
        assert_eq!(cp.ds, vec![1, 1, 1]);
        assert_eq!(cp.qs[2], 1);
        let top = cp.toplevel().unwrap();
        assert_eq!(top[cp.ix_x(2)], 1); // constants appear at degree 1
    }

    #[test]
    fn kappa_uses_override_or_delta() {
        let cp = CircuitParams::new(Arc::new(xor_circuit()));
        assert_eq!(cp.kappa(7), 7);
        assert_eq!(cp.kappa(0), 3); // max(delta + 1, nsymbols) = max(3, 2)
    }

    #[test]
    fn secret_params_roundtrip() {
        let cp = CircuitParams::new(Arc::new(xor_circuit()));
        let mut rng = StdRng::seed_from_u64(1);
        let sp = SecretParams::<DummyBackend>::setup(&cp, 8, cp.kappa(0), 1, &mut rng).unwrap();
        let mut buf = Vec::new();
        sp.write_bytes(&mut buf).unwrap();
        let sp2 = SecretParams::<DummyBackend>::read_bytes(&cp, &mut buf.as_slice()).unwrap();
        assert_eq!(sp2.toplevel, sp.toplevel);
        assert_eq!(
            DummyBackend::moduli(&sp2.key),
            DummyBackend::moduli(&sp.key)
        );
    }
}
