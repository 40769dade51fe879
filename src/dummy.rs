//! Plaintext-only backend.
//!
//! Carries values in the clear, tracks index sets and multiplicative degree
//! exactly, and zero-tests by inspection. Useful for validating the protocol
//! and for measuring the kappa a circuit actually needs before paying for a
//! real multilinear map.

use crate::backend::{GradedBackend, KeygenParams};
use crate::error::MifeError;
use crate::index_set::IndexSet;
use crate::serialize::{read_len, read_u64, write_u64, DeserializeBytes, SerializeBytes};
use bytes::{Buf, BufMut};
use rand::Rng;

/// Largest primes below 2^31; plenty for a non-cryptographic plaintext field.
const PRIMES: [u64; 16] = [
    2_147_483_647,
    2_147_483_629,
    2_147_483_587,
    2_147_483_579,
    2_147_483_563,
    2_147_483_549,
    2_147_483_543,
    2_147_483_497,
    2_147_483_489,
    2_147_483_477,
    2_147_483_423,
    2_147_483_399,
    2_147_483_353,
    2_147_483_323,
    2_147_483_269,
    2_147_483_249,
];

/// Marker type; all state lives in the keys and encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DummyBackend;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DummySecretKey {
    moduli: Vec<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DummyPublicKey {
    moduli: Vec<u64>,
}

/// A plaintext vector plus the metadata a real map would track implicitly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DummyEncoding {
    values: Vec<u64>,
    ix: IndexSet,
    degree: u64,
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(m)) as u64
}

fn check_levels(a: &DummyEncoding, b: &DummyEncoding) -> Result<(), MifeError> {
    if a.ix != b.ix {
        return Err(MifeError::InconsistentLevel {
            left: a.ix.clone(),
            right: b.ix.clone(),
        });
    }
    Ok(())
}

impl GradedBackend for DummyBackend {
    type SecretKey = DummySecretKey;
    type PublicKey = DummyPublicKey;
    type Encoding = DummyEncoding;

    fn keygen<R: Rng>(params: &KeygenParams<'_>, _rng: &mut R) -> Result<DummySecretKey, MifeError> {
        if params.nslots == 0 || params.pows.is_empty() {
            return Err(MifeError::BackendKeygenFailed);
        }
        let mut moduli = Vec::with_capacity(params.nslots);
        moduli.push(params.modulus.unwrap_or(PRIMES[0]));
        for i in 1..params.nslots {
            moduli.push(PRIMES[(i - 1) % PRIMES.len()]);
        }
        Ok(DummySecretKey { moduli })
    }

    fn public_key(sk: &DummySecretKey) -> DummyPublicKey {
        DummyPublicKey { moduli: sk.moduli.clone() }
    }

    fn moduli(sk: &DummySecretKey) -> &[u64] {
        &sk.moduli
    }

    fn encode(
        sk: &DummySecretKey,
        ix: &IndexSet,
        values: &[u64],
    ) -> Result<DummyEncoding, MifeError> {
        if values.len() != sk.moduli.len() {
            return Err(MifeError::EncodingFailed(format!(
                "plaintext has {} slots, key has {}",
                values.len(),
                sk.moduli.len()
            )));
        }
        let values = values
            .iter()
            .zip(&sk.moduli)
            .map(|(&v, &m)| v % m)
            .collect();
        Ok(DummyEncoding { values, ix: ix.clone(), degree: 1 })
    }

    fn add(
        pp: &DummyPublicKey,
        a: &DummyEncoding,
        b: &DummyEncoding,
    ) -> Result<DummyEncoding, MifeError> {
        check_levels(a, b)?;
        let values = a
            .values
            .iter()
            .zip(&b.values)
            .zip(&pp.moduli)
            .map(|((&x, &y), &m)| (x + y) % m)
            .collect();
        Ok(DummyEncoding {
            values,
            ix: a.ix.clone(),
            degree: a.degree.max(b.degree),
        })
    }

    fn sub(
        pp: &DummyPublicKey,
        a: &DummyEncoding,
        b: &DummyEncoding,
    ) -> Result<DummyEncoding, MifeError> {
        check_levels(a, b)?;
        let values = a
            .values
            .iter()
            .zip(&b.values)
            .zip(&pp.moduli)
            .map(|((&x, &y), &m)| (x + m - y) % m)
            .collect();
        Ok(DummyEncoding {
            values,
            ix: a.ix.clone(),
            degree: a.degree.max(b.degree),
        })
    }

    fn mul(
        pp: &DummyPublicKey,
        a: &DummyEncoding,
        b: &DummyEncoding,
    ) -> Result<DummyEncoding, MifeError> {
        let values = a
            .values
            .iter()
            .zip(&b.values)
            .zip(&pp.moduli)
            .map(|((&x, &y), &m)| mul_mod(x, y, m))
            .collect();
        Ok(DummyEncoding {
            values,
            ix: a.ix.plus(&b.ix),
            degree: a.degree + b.degree,
        })
    }

    fn is_zero(_pp: &DummyPublicKey, enc: &DummyEncoding) -> bool {
        enc.values.iter().all(|&v| v == 0)
    }

    fn index_set(enc: &DummyEncoding) -> &IndexSet {
        &enc.ix
    }

    fn degree(enc: &DummyEncoding) -> u64 {
        enc.degree
    }

    fn write_secret_key(sk: &DummySecretKey, buf: &mut impl BufMut) -> Result<(), MifeError> {
        write_u64(buf, sk.moduli.len() as u64)?;
        for &m in &sk.moduli {
            write_u64(buf, m)?;
        }
        Ok(())
    }

    fn read_secret_key(buf: &mut impl Buf) -> Result<DummySecretKey, MifeError> {
        let len = read_len(buf, 8)?;
        let moduli = (0..len).map(|_| read_u64(buf)).collect::<Result<_, _>>()?;
        Ok(DummySecretKey { moduli })
    }

    fn write_public_key(pk: &DummyPublicKey, buf: &mut impl BufMut) -> Result<(), MifeError> {
        write_u64(buf, pk.moduli.len() as u64)?;
        for &m in &pk.moduli {
            write_u64(buf, m)?;
        }
        Ok(())
    }

    fn read_public_key(buf: &mut impl Buf) -> Result<DummyPublicKey, MifeError> {
        let len = read_len(buf, 8)?;
        let moduli = (0..len).map(|_| read_u64(buf)).collect::<Result<_, _>>()?;
        Ok(DummyPublicKey { moduli })
    }

    fn write_encoding(enc: &DummyEncoding, buf: &mut impl BufMut) -> Result<(), MifeError> {
        write_u64(buf, enc.values.len() as u64)?;
        for &v in &enc.values {
            write_u64(buf, v)?;
        }
        enc.ix.serialize(buf)?;
        write_u64(buf, enc.degree)?;
        Ok(())
    }

    fn read_encoding(buf: &mut impl Buf) -> Result<DummyEncoding, MifeError> {
        let len = read_len(buf, 8)?;
        let values = (0..len).map(|_| read_u64(buf)).collect::<Result<_, _>>()?;
        let ix = IndexSet::deserialize(buf)?;
        let degree = read_u64(buf)?;
        Ok(DummyEncoding { values, ix, degree })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn keypair(nslots: usize) -> (DummySecretKey, DummyPublicKey) {
        let mut rng = StdRng::seed_from_u64(0);
        let params = KeygenParams {
            secparam: 8,
            kappa: 4,
            pows: &[1, 1, 1],
            nslots,
            modulus: Some(2),
            nthreads: 1,
        };
        let sk = DummyBackend::keygen(&params, &mut rng).unwrap();
        let pk = DummyBackend::public_key(&sk);
        (sk, pk)
    }

    #[test]
    fn arithmetic_tracks_levels_and_degree() {
        let (sk, pk) = keypair(3);
        let mut ix_a = IndexSet::new(3);
        ix_a[1] = 1;
        let mut ix_b = IndexSet::new(3);
        ix_b[2] = 1;
        let a = DummyBackend::encode(&sk, &ix_a, &[1, 5, 7]).unwrap();
        let b = DummyBackend::encode(&sk, &ix_b, &[1, 3, 2]).unwrap();

        let p = DummyBackend::mul(&pk, &a, &b).unwrap();
        assert_eq!(DummyBackend::index_set(&p), &ix_a.plus(&ix_b));
        assert_eq!(DummyBackend::degree(&p), 2);

        // add across different levels is a protocol bug and must surface
        assert!(matches!(
            DummyBackend::add(&pk, &a, &b),
            Err(MifeError::InconsistentLevel { .. })
        ));

        let a2 = DummyBackend::encode(&sk, &ix_a, &[1, 5, 7]).unwrap();
        let s = DummyBackend::sub(&pk, &a, &a2).unwrap();
        assert!(DummyBackend::is_zero(&pk, &s));
    }

    #[test]
    fn encoding_roundtrip() {
        let (sk, _) = keypair(2);
        let mut ix = IndexSet::new(3);
        ix[0] = 2;
        let e = DummyBackend::encode(&sk, &ix, &[1, 9]).unwrap();
        let mut buf = Vec::new();
        DummyBackend::write_encoding(&e, &mut buf).unwrap();
        assert_eq!(DummyBackend::read_encoding(&mut buf.as_slice()).unwrap(), e);
    }
}
