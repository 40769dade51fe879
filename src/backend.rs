//! The graded-encoding backend contract.
//!
//! The engine is generic over the multilinear-map primitive. A backend owns
//! opaque key material and an opaque encoding value; the engine only asks it
//! to encode plaintext vectors at an index set, combine encodings, zero-test
//! at the toplevel, and serialize everything. No concrete cryptographic
//! construction lives in this crate; [`DummyBackend`](crate::dummy::DummyBackend)
//! is a plaintext stand-in for tests and kappa measurement.

use crate::error::MifeError;
use crate::index_set::IndexSet;
use bytes::{Buf, BufMut};
use rand::Rng;
use std::fmt::Debug;

/// Sizing information handed to the backend's key generation.
#[derive(Clone, Debug)]
pub struct KeygenParams<'a> {
    /// Security parameter (lambda).
    pub secparam: usize,
    /// Required multilinearity degree.
    pub kappa: usize,
    /// The toplevel index set, one power per component.
    pub pows: &'a [u32],
    /// Number of plaintext slots (1 + scheme slots).
    pub nslots: usize,
    /// Force the value slot's plaintext field (binary circuits use 2).
    pub modulus: Option<u64>,
    /// Parallelism hint for key generation.
    pub nthreads: usize,
}

/// Operations the engine requires from a graded-encoding scheme.
pub trait GradedBackend {
    type SecretKey: Send + Sync;
    type PublicKey: Send + Sync;
    type Encoding: Clone + PartialEq + Debug + Send + Sync;

    /// Generate key material sized by the toplevel and kappa. Returning an
    /// error here surfaces as [`MifeError::BackendKeygenFailed`].
    fn keygen<R: Rng>(params: &KeygenParams<'_>, rng: &mut R) -> Result<Self::SecretKey, MifeError>;

    /// Derive the public evaluation key.
    fn public_key(sk: &Self::SecretKey) -> Self::PublicKey;

    /// Plaintext field modulus of every slot; index 0 is the value slot.
    fn moduli(sk: &Self::SecretKey) -> &[u64];

    /// Encode a plaintext vector (one entry per slot) at the given index set.
    fn encode(
        sk: &Self::SecretKey,
        ix: &IndexSet,
        values: &[u64],
    ) -> Result<Self::Encoding, MifeError>;

    /// Homomorphic addition; operands must sit at the same index set.
    fn add(
        pp: &Self::PublicKey,
        a: &Self::Encoding,
        b: &Self::Encoding,
    ) -> Result<Self::Encoding, MifeError>;

    /// Homomorphic subtraction; operands must sit at the same index set.
    fn sub(
        pp: &Self::PublicKey,
        a: &Self::Encoding,
        b: &Self::Encoding,
    ) -> Result<Self::Encoding, MifeError>;

    /// Homomorphic multiplication; index sets add componentwise.
    fn mul(
        pp: &Self::PublicKey,
        a: &Self::Encoding,
        b: &Self::Encoding,
    ) -> Result<Self::Encoding, MifeError>;

    /// Zero test; only meaningful at the toplevel index set.
    fn is_zero(pp: &Self::PublicKey, enc: &Self::Encoding) -> bool;

    /// The index set this encoding currently occupies.
    fn index_set(enc: &Self::Encoding) -> &IndexSet;

    /// Multiplicative degree consumed so far (encode = 1, mul sums, add maxes).
    fn degree(enc: &Self::Encoding) -> u64;

    fn write_secret_key(sk: &Self::SecretKey, buf: &mut impl BufMut) -> Result<(), MifeError>;
    fn read_secret_key(buf: &mut impl Buf) -> Result<Self::SecretKey, MifeError>;
    fn write_public_key(pk: &Self::PublicKey, buf: &mut impl BufMut) -> Result<(), MifeError>;
    fn read_public_key(buf: &mut impl Buf) -> Result<Self::PublicKey, MifeError>;
    fn write_encoding(enc: &Self::Encoding, buf: &mut impl BufMut) -> Result<(), MifeError>;
    fn read_encoding(buf: &mut impl Buf) -> Result<Self::Encoding, MifeError>;
}
