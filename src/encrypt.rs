//! Per-slot encryption.
//!
//! A ciphertext carries one encoding per input bit (`xhat`) and one
//! output-coefficient encoding per circuit output (`what`). The `what`
//! coefficients come from evaluating the circuit symbolically with this
//! slot's variables bound to the blinding factors and every other slot bound
//! to one; at decryption they cancel the blinding on the right-hand side.

use crate::backend::GradedBackend;
use crate::error::MifeError;
use crate::index_set::IndexSet;
use crate::params::{CircuitParams, SecretParams};
use crate::serialize::{read_u64, write_u64};
use crate::work_queue::{EncodeJob, Progress, WorkQueue};
use bytes::{Buf, BufMut};
use rand::Rng;
use tracing::debug;

/// Ciphertext for one slot.
#[derive(Clone, Debug, PartialEq)]
pub struct Ciphertext<B: GradedBackend> {
    pub slot: usize,
    /// One encoding per input bit of this slot.
    pub xhat: Vec<B::Encoding>,
    /// One output-coefficient encoding per circuit output. Empty for the
    /// constants ciphertext produced at setup, whose contribution is folded
    /// into slot 0's `what` instead.
    pub what: Vec<B::Encoding>,
}

impl<B: GradedBackend> Ciphertext<B> {
    pub fn write_bytes(&self, buf: &mut impl BufMut) -> Result<(), MifeError> {
        write_u64(buf, self.slot as u64)?;
        for x in &self.xhat {
            B::write_encoding(x, buf)?;
        }
        for w in &self.what {
            B::write_encoding(w, buf)?;
        }
        Ok(())
    }

    /// Counts are derived from the parameters, never from the input; the
    /// slot index is validated before anything is allocated.
    pub fn read_bytes(cp: &CircuitParams, buf: &mut impl Buf) -> Result<Self, MifeError> {
        let slot = read_u64(buf)?;
        let slot = usize::try_from(slot)
            .ok()
            .filter(|&s| s < cp.n)
            .ok_or(MifeError::Serialization("slot index out of range"))?;
        let ninputs = cp.ds[slot];
        let nwhat = if cp.has_consts() && slot == cp.n - 1 { 0 } else { cp.m };
        let xhat = (0..ninputs)
            .map(|_| B::read_encoding(buf))
            .collect::<Result<_, _>>()?;
        let what = (0..nwhat)
            .map(|_| B::read_encoding(buf))
            .collect::<Result<_, _>>()?;
        Ok(Self { slot, xhat, what })
    }
}

/// Shared encryption path. When `capture_alphas` is set (the constants slot
/// at setup) the drawn blinding factors are handed back to the caller and no
/// `what` encodings are produced.
#[allow(clippy::too_many_arguments)]
pub(crate) fn encrypt_inner<B: GradedBackend, R: Rng>(
    cp: &CircuitParams,
    sp: &SecretParams<B>,
    const_alphas: Option<&[u64]>,
    slot: usize,
    inputs: &[u64],
    queue: &WorkQueue,
    progress: &Progress,
    capture_alphas: Option<&mut Vec<u64>>,
    rng: &mut R,
) -> Result<Ciphertext<B>, MifeError> {
    let ninputs = cp.ds[slot];
    if inputs.len() != ninputs {
        return Err(MifeError::invalid(format!(
            "slot {slot} expects {ninputs} inputs, got {}",
            inputs.len()
        )));
    }
    let moduli = B::moduli(&sp.key);
    let field = moduli[1 + slot];
    debug!(slot, ninputs, "encrypt");

    // Independent uniform units; confined to this thread.
    let alphas: Vec<u64> = (0..ninputs).map(|_| rng.gen_range(1..field)).collect();

    let mut jobs: Vec<EncodeJob> = Vec::with_capacity(ninputs + cp.m);

    // xhat_j = [input_j, 1, ..., 1, alpha_j, 1, ..., 1] at {X_slot = 1}
    let mut ix = IndexSet::new(cp.nzs());
    ix[cp.ix_x(slot)] = 1;
    for (j, &input) in inputs.iter().enumerate() {
        let mut values = vec![1u64; 1 + cp.n];
        values[0] = input;
        values[1 + slot] = alphas[j];
        jobs.push(EncodeJob { ix: ix.clone(), values });
    }

    if capture_alphas.is_none() {
        // Evaluate the circuit with this slot bound to alpha, everything
        // else bound to one; that coefficient is what decryption cancels.
        let circ = cp.circ();
        let mut circ_inputs = vec![1u64; circ.ninputs()];
        for (i, v) in circ_inputs.iter_mut().enumerate() {
            let (s, bit) = cp.slot_of_input(i);
            if s == slot {
                *v = alphas[bit];
            }
        }
        let ones = vec![1u64; circ.nconsts()];
        let cs = circ.eval_mod(&circ_inputs, &ones, field);

        // Slot 0 additionally carries the constants cross-term.
        let cross = slot == 0 && cp.has_consts();
        let const_cs = if cross {
            let ca = const_alphas
                .ok_or_else(|| MifeError::invalid("secret key lacks constant blinding factors"))?;
            let all_ones = vec![1u64; circ.ninputs()];
            Some(circ.eval_mod(&all_ones, ca, moduli[cp.n]))
        } else {
            None
        };

        let mut ix = IndexSet::new(cp.nzs());
        ix[cp.ix_w(slot)] = 1;
        if cross {
            for i in 0..cp.n {
                ix[cp.ix_x(i)] = sp.toplevel[cp.ix_x(i)];
            }
            ix[cp.ix_w(cp.n - 1)] = 1;
            ix[cp.ix_z()] = 1;
        }
        for o in 0..cp.m {
            let mut values = vec![1u64; 1 + cp.n];
            values[0] = 0;
            values[1 + slot] = cs[o];
            if let Some(ref ccs) = const_cs {
                values[cp.n] = ccs[o];
            }
            jobs.push(EncodeJob { ix: ix.clone(), values });
        }
    }

    let mut encs = queue.encode_all::<B>(&sp.key, jobs, progress)?;
    let what = encs.split_off(ninputs);
    if let Some(out) = capture_alphas {
        *out = alphas;
    }
    Ok(Ciphertext { slot, xhat: encs, what })
}
