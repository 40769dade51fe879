//! MIFE instance: setup, key splitting, key wire formats.
//!
//! Setup derives the scheme parameters, precomputes the power ladder and the
//! auxiliary encodings, and (when the circuit carries constants or secrets)
//! pre-encrypts those into a ciphertext whose blinding factors are retained
//! for the encryptor. The instance then splits by ownership into a
//! [`SecretKey`] (encryption side) and an [`EvalKey`] (decryption side);
//! parameters shared by both sides live behind `Arc`.

use crate::backend::GradedBackend;
use crate::circuit::Circuit;
use crate::dummy::DummyBackend;
use crate::encrypt::{encrypt_inner, Ciphertext};
use crate::error::MifeError;
use crate::index_set::IndexSet;
use crate::ladder::PowerLadder;
use crate::params::{CircuitParams, PublicParams, SecretParams};
use crate::serialize::{read_bool, read_u64, write_bool, write_u64};
use crate::work_queue::{EncodeJob, Progress, WorkQueue};
use bytes::{Buf, BufMut};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

/// Largest power-of-two exponent the ladder may precompute; index-set
/// components are 32-bit.
const MAX_NPOWERS: usize = 32;

/// A fully set-up scheme instance, prior to the key split.
pub struct MifeInstance<B: GradedBackend> {
    cp: Arc<CircuitParams>,
    sp: Arc<SecretParams<B>>,
    pp: Arc<PublicParams<B>>,
    kappa: usize,
    deg_max: Vec<u64>,
    ladder: PowerLadder<B>,
    zhat: B::Encoding,
    chatstar: Option<B::Encoding>,
    constants: Option<Ciphertext<B>>,
    const_alphas: Option<Vec<u64>>,
}

impl<B: GradedBackend> MifeInstance<B> {
    /// Run the full three-stage setup. `kappa` of zero means derive it from
    /// the circuit; any encode failure aborts the whole call.
    pub fn setup<R: Rng>(
        cp: Arc<CircuitParams>,
        secparam: usize,
        kappa: usize,
        npowers: usize,
        nthreads: usize,
        rng: &mut R,
    ) -> Result<Self, MifeError> {
        if npowers == 0 || npowers > MAX_NPOWERS {
            return Err(MifeError::invalid(format!(
                "npowers must be in 1..={MAX_NPOWERS}, got {npowers}"
            )));
        }
        let kappa = cp.kappa(kappa);
        let sp = SecretParams::<B>::setup(&cp, secparam, kappa, nthreads, rng)?;
        let pp = PublicParams::new(&sp);
        let deg_max = cp.deg_max();
        let queue = WorkQueue::new(nthreads)?;
        let progress = Progress::new(cp.num_encodings_setup(npowers));
        info!(
            kappa,
            npowers,
            encodings = cp.num_encodings_setup(npowers),
            "mife setup"
        );

        let moduli = B::moduli(&sp.key);
        let nslots = 1 + cp.n;

        let mut jobs: Vec<EncodeJob> = Vec::with_capacity(1 + cp.n * npowers + 1);

        // zhat = [delta, 1, ..., 1] at {Z = 1, W_i = 1 for all i}
        let delta = if moduli[0] == 2 { 1 } else { rng.gen_range(1..moduli[0]) };
        let mut ix = IndexSet::new(cp.nzs());
        ix[cp.ix_z()] = 1;
        for i in 0..cp.n {
            ix[cp.ix_w(i)] = 1;
        }
        let mut values = vec![1u64; nslots];
        values[0] = delta;
        jobs.push(EncodeJob { ix, values });

        // uhat[i][p] = [1, ..., 1] at {X_i = 2^p}
        for i in 0..cp.n {
            for p in 0..npowers {
                let mut ix = IndexSet::new(cp.nzs());
                ix[cp.ix_x(i)] = 1 << p;
                jobs.push(EncodeJob { ix, values: vec![1u64; nslots] });
            }
        }

        // Chatstar = [0, 1, ..., 1] at {Z = 1, X_i = deg_max[i]}; only when
        // there is no constants ciphertext to take its place.
        if !cp.has_consts() {
            let mut ix = IndexSet::new(cp.nzs());
            ix[cp.ix_z()] = 1;
            for i in 0..cp.n {
                ix[cp.ix_x(i)] = sp.toplevel[cp.ix_x(i)];
            }
            let mut values = vec![1u64; nslots];
            values[0] = 0;
            jobs.push(EncodeJob { ix, values });
        }

        let mut encs = queue.encode_all::<B>(&sp.key, jobs, &progress)?;
        let chatstar = if cp.has_consts() { None } else { encs.pop() };
        let zhat = encs.remove(0);
        let uhat = (0..cp.n)
            .map(|_| encs.drain(..npowers).collect())
            .collect::<Vec<Vec<_>>>();
        let ladder = PowerLadder::new(npowers, uhat);

        // Encrypt constants/secrets into the synthetic last slot, keeping the
        // blinding factors for the encryptor's slot-0 cross-term.
        let (constants, const_alphas) = if cp.has_consts() {
            let consts: Vec<u64> = cp.circ().consts().to_vec();
            let mut alphas = Vec::new();
            let ct = encrypt_inner::<B, R>(
                &cp,
                &sp,
                None,
                cp.n - 1,
                &consts,
                &queue,
                &progress,
                Some(&mut alphas),
                rng,
            )?;
            (Some(ct), Some(alphas))
        } else {
            (None, None)
        };

        Ok(Self {
            cp,
            sp: Arc::new(sp),
            pp: Arc::new(pp),
            kappa,
            deg_max,
            ladder,
            zhat,
            chatstar,
            constants,
            const_alphas,
        })
    }

    /// The multilinearity degree this instance was set up with.
    #[must_use]
    pub fn kappa(&self) -> usize {
        self.kappa
    }

    /// Split into the encryption and decryption views. Nothing is copied;
    /// shared parameters stay behind `Arc`.
    #[must_use]
    pub fn into_keys(self) -> (SecretKey<B>, EvalKey<B>) {
        let sk = SecretKey {
            cp: self.cp.clone(),
            sp: self.sp,
            pp: self.pp.clone(),
            const_alphas: self.const_alphas,
            deg_max: self.deg_max,
        };
        let ek = EvalKey {
            cp: self.cp,
            pp: self.pp,
            ladder: self.ladder,
            zhat: self.zhat,
            chatstar: self.chatstar,
            constants: self.constants,
        };
        (sk, ek)
    }
}

/// Everything the encryptor needs: parameters, blinding data, degree bounds.
pub struct SecretKey<B: GradedBackend> {
    pub(crate) cp: Arc<CircuitParams>,
    pub(crate) sp: Arc<SecretParams<B>>,
    pub(crate) pp: Arc<PublicParams<B>>,
    pub(crate) const_alphas: Option<Vec<u64>>,
    pub(crate) deg_max: Vec<u64>,
}

impl<B: GradedBackend> SecretKey<B> {
    /// Encrypt `inputs` into slot `slot`. Synchronous; the independent encode
    /// operations run on an internal worker pool.
    pub fn encrypt<R: Rng>(
        &self,
        slot: usize,
        inputs: &[u64],
        nthreads: usize,
        rng: &mut R,
    ) -> Result<Ciphertext<B>, MifeError> {
        if slot >= self.cp.nreal_slots() {
            return Err(MifeError::invalid(format!(
                "slot {slot} out of range (have {})",
                self.cp.nreal_slots()
            )));
        }
        let queue = WorkQueue::new(nthreads)?;
        let progress = Progress::new(self.cp.num_encodings_encrypt(slot));
        encrypt_inner::<B, R>(
            &self.cp,
            &self.sp,
            self.const_alphas.as_deref(),
            slot,
            inputs,
            &queue,
            &progress,
            None,
            rng,
        )
    }

    /// Layout: public params, secret params, constant blinding factors (when
    /// the circuit has constants), then each slot's maximum degree.
    pub fn write_bytes(&self, buf: &mut impl BufMut) -> Result<(), MifeError> {
        self.pp.write_bytes(buf)?;
        self.sp.write_bytes(buf)?;
        if let Some(ref alphas) = self.const_alphas {
            for &a in alphas {
                write_u64(buf, a)?;
            }
        }
        for &d in &self.deg_max {
            write_u64(buf, d)?;
        }
        Ok(())
    }

    pub fn read_bytes(cp: Arc<CircuitParams>, buf: &mut impl Buf) -> Result<Self, MifeError> {
        let pp = PublicParams::read_bytes(&cp, buf)?;
        let sp = SecretParams::read_bytes(&cp, buf)?;
        let const_alphas = if cp.has_consts() {
            let n = cp.circ().nconsts();
            let mut alphas = Vec::with_capacity(n);
            for _ in 0..n {
                alphas.push(read_u64(buf)?);
            }
            Some(alphas)
        } else {
            None
        };
        let mut deg_max = Vec::with_capacity(cp.n);
        for _ in 0..cp.n {
            deg_max.push(read_u64(buf)?);
        }
        Ok(Self {
            cp,
            sp: Arc::new(sp),
            pp: Arc::new(pp),
            const_alphas,
            deg_max,
        })
    }
}

/// Everything the decryptor needs: parameters, the power ladder, `zhat`, and
/// either the `Chatstar` placeholder or the pre-encrypted constants.
pub struct EvalKey<B: GradedBackend> {
    pub(crate) cp: Arc<CircuitParams>,
    pub(crate) pp: Arc<PublicParams<B>>,
    pub(crate) ladder: PowerLadder<B>,
    pub(crate) zhat: B::Encoding,
    pub(crate) chatstar: Option<B::Encoding>,
    pub(crate) constants: Option<Ciphertext<B>>,
}

impl<B: GradedBackend> EvalKey<B> {
    /// Layout: public params, constants flag, constants ciphertext or
    /// `Chatstar`, `zhat`, `npowers`, then the full power ladder.
    pub fn write_bytes(&self, buf: &mut impl BufMut) -> Result<(), MifeError> {
        self.pp.write_bytes(buf)?;
        match (&self.constants, &self.chatstar) {
            (Some(ct), _) => {
                write_bool(buf, true)?;
                ct.write_bytes(buf)?;
            }
            (None, Some(cs)) => {
                write_bool(buf, false)?;
                B::write_encoding(cs, buf)?;
            }
            (None, None) => return Err(MifeError::Serialization("evaluation key incomplete")),
        }
        B::write_encoding(&self.zhat, buf)?;
        write_u64(buf, self.ladder.npowers as u64)?;
        for row in &self.ladder.uhat {
            for u in row {
                B::write_encoding(u, buf)?;
            }
        }
        Ok(())
    }

    pub fn read_bytes(cp: Arc<CircuitParams>, buf: &mut impl Buf) -> Result<Self, MifeError> {
        let pp = PublicParams::read_bytes(&cp, buf)?;
        let has_consts = read_bool(buf)?;
        if has_consts != cp.has_consts() {
            return Err(MifeError::Serialization("constants flag mismatch"));
        }
        let (constants, chatstar) = if has_consts {
            (Some(Ciphertext::read_bytes(&cp, buf)?), None)
        } else {
            (None, Some(B::read_encoding(buf)?))
        };
        let zhat = B::read_encoding(buf)?;
        let npowers = read_u64(buf)?;
        let npowers = usize::try_from(npowers)
            .ok()
            .filter(|&p| p >= 1 && p <= MAX_NPOWERS)
            .ok_or(MifeError::Serialization("npowers out of range"))?;
        let mut uhat = Vec::with_capacity(cp.n);
        for _ in 0..cp.n {
            let mut row = Vec::with_capacity(npowers);
            for _ in 0..npowers {
                row.push(B::read_encoding(buf)?);
            }
            uhat.push(row);
        }
        Ok(Self {
            cp,
            pp: Arc::new(pp),
            ladder: PowerLadder::new(npowers, uhat),
            zhat,
            chatstar,
            constants,
        })
    }
}

/// Measure the kappa a circuit actually needs: set up over the plaintext
/// backend, encrypt all-zero inputs, and run a degree-tracked decryption.
/// The result feeds a real setup's kappa override.
pub fn smart_kappa<R: Rng>(
    circ: Arc<Circuit>,
    npowers: usize,
    nthreads: usize,
    rng: &mut R,
) -> Result<u64, MifeError> {
    let cp = Arc::new(CircuitParams::new(circ));
    debug!("measuring kappa over the plaintext backend");
    let inst = MifeInstance::<DummyBackend>::setup(cp.clone(), 8, 1, npowers, nthreads, rng)?;
    let (sk, ek) = inst.into_keys();
    let cts = (0..cp.nreal_slots())
        .map(|i| sk.encrypt(i, &vec![0; cp.ds[i]], nthreads, &mut *rng))
        .collect::<Result<Vec<_>, _>>()?;
    let (_, kappa) = ek.decrypt_with_degree(&cts, nthreads)?;
    Ok(kappa)
}
