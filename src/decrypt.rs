//! Decryption: concurrent, memoized evaluation of the circuit DAG over
//! encodings, followed by the toplevel zero-test decision per output.
//!
//! Every DAG node is evaluated exactly once regardless of fan-out; the memo
//! is an arena indexed by gate id whose slots are claimed through `OnceLock`,
//! so concurrent workers block on a node being computed instead of
//! duplicating it. Outputs are independent once the shared values exist and
//! run in parallel.

use crate::backend::GradedBackend;
use crate::circuit::{CircOp, Gate, GateId};
use crate::encrypt::Ciphertext;
use crate::error::MifeError;
use crate::mife::EvalKey;
use rayon::prelude::*;
use std::sync::OnceLock;
use tracing::debug;

struct Evaluator<'a, B: GradedBackend> {
    ek: &'a EvalKey<B>,
    cts: &'a [Ciphertext<B>],
    memo: Vec<OnceLock<Result<B::Encoding, MifeError>>>,
}

impl<'a, B: GradedBackend> Evaluator<'a, B> {
    fn new(ek: &'a EvalKey<B>, cts: &'a [Ciphertext<B>]) -> Self {
        let memo = (0..ek.cp.circ().gates().len()).map(|_| OnceLock::new()).collect();
        Self { ek, cts, memo }
    }

    /// Claim-once lookup: the first worker to reach a node computes it, any
    /// other worker blocks until the value is available.
    fn eval(&self, id: GateId) -> Result<&B::Encoding, MifeError> {
        self.memo[id]
            .get_or_init(|| self.compute(id))
            .as_ref()
            .map_err(Clone::clone)
    }

    fn compute(&self, id: GateId) -> Result<B::Encoding, MifeError> {
        let ek = self.ek;
        match ek.cp.circ().gates()[id] {
            Gate::Input(i) => {
                let (slot, bit) = ek.cp.slot_of_input(i);
                Ok(self.cts[slot].xhat[bit].clone())
            }
            Gate::Const(bit) => {
                let constants = ek
                    .constants
                    .as_ref()
                    .ok_or_else(|| MifeError::invalid("evaluation key has no constants"))?;
                Ok(constants.xhat[bit].clone())
            }
            Gate::Op { op, lhs, rhs } => {
                let x = self.eval(lhs)?;
                let y = self.eval(rhs)?;
                match op {
                    // index sets add componentwise; always compatible
                    CircOp::Mul => B::mul(&ek.pp.key, x, y),
                    CircOp::Add | CircOp::Sub => {
                        if B::index_set(x) == B::index_set(y) {
                            match op {
                                CircOp::Add => B::add(&ek.pp.key, x, y),
                                _ => B::sub(&ek.pp.key, x, y),
                            }
                        } else {
                            let (x, y) =
                                ek.ladder.raise_pair(&ek.cp, &ek.pp, x.clone(), y.clone())?;
                            match op {
                                CircOp::Add => B::add(&ek.pp.key, &x, &y),
                                _ => B::sub(&ek.pp.key, &x, &y),
                            }
                        }
                    }
                }
            }
        }
    }

    /// Zero-test decision for output `o`: returns the output bit and the
    /// multiplicative degree of the zero-tested value.
    fn output(&self, o: usize) -> Result<(u64, u64), MifeError> {
        let ek = self.ek;
        let toplevel = &ek.pp.toplevel;
        let root = self.eval(ek.cp.circ().outputs()[o])?;

        let lhs = B::mul(&ek.pp.key, root, &ek.zhat)?;
        let lhs = ek.ladder.raise(&ek.cp, &ek.pp, lhs, toplevel)?;
        if B::index_set(&lhs) != toplevel {
            return Err(MifeError::LevelMismatch {
                found: B::index_set(&lhs).clone(),
                expected: toplevel.clone(),
            });
        }

        let rhs = match &ek.chatstar {
            Some(chatstar) => {
                let mut acc = chatstar.clone();
                for ct in self.cts {
                    acc = B::mul(&ek.pp.key, &acc, &ct.what[o])?;
                }
                acc
            }
            // Constants case: the constants contribution is folded into
            // slot 0's what, so the product runs over the real slots only.
            None => {
                let mut acc = self.cts[0].what[o].clone();
                for ct in &self.cts[1..] {
                    acc = B::mul(&ek.pp.key, &acc, &ct.what[o])?;
                }
                acc
            }
        };
        if B::index_set(&rhs) != toplevel {
            return Err(MifeError::LevelMismatch {
                found: B::index_set(&rhs).clone(),
                expected: toplevel.clone(),
            });
        }

        let out = B::sub(&ek.pp.key, &lhs, &rhs)?;
        let bit = u64::from(!B::is_zero(&ek.pp.key, &out));
        Ok((bit, B::degree(&out)))
    }
}

impl<B: GradedBackend> EvalKey<B> {
    /// Decrypt: one output bit per circuit output.
    pub fn decrypt(
        &self,
        cts: &[Ciphertext<B>],
        nthreads: usize,
    ) -> Result<Vec<u64>, MifeError> {
        self.decrypt_with_degree(cts, nthreads).map(|(bits, _)| bits)
    }

    /// Decrypt, also reporting the maximum multiplicative degree observed
    /// across outputs (the kappa this circuit actually consumed).
    pub fn decrypt_with_degree(
        &self,
        cts: &[Ciphertext<B>],
        nthreads: usize,
    ) -> Result<(Vec<u64>, u64), MifeError> {
        let cp = &self.cp;
        if cts.len() != cp.nreal_slots() {
            return Err(MifeError::invalid(format!(
                "expected {} ciphertexts, got {}",
                cp.nreal_slots(),
                cts.len()
            )));
        }
        for (i, ct) in cts.iter().enumerate() {
            if ct.slot != i || ct.xhat.len() != cp.ds[i] || ct.what.len() != cp.m {
                return Err(MifeError::invalid(format!("malformed ciphertext for slot {i}")));
            }
        }
        if cp.has_consts() && self.constants.is_none() {
            return Err(MifeError::invalid("evaluation key has no constants"));
        }
        debug!(noutputs = cp.m, "decrypt");

        let queue = crate::work_queue::WorkQueue::new(nthreads)?;
        let ev = Evaluator::new(self, cts);
        let results: Vec<(u64, u64)> = queue.install(|| {
            (0..cp.m)
                .into_par_iter()
                .map(|o| ev.output(o))
                .collect::<Result<_, _>>()
        })?;

        let bits = results.iter().map(|&(b, _)| b).collect();
        let kappa = results.iter().map(|&(_, d)| d).max().unwrap_or(0);
        Ok((bits, kappa))
    }
}
