//! Canonical Poseidon hash for veilpick.
//!
//! Single unified Poseidon instance used for every commitment and nullifier.
//! Native hashing and the in-circuit gadget share this configuration, so the
//! two always agree.
//!
//! ## Parameters (BN254 scalar field)
//! - Width: 3 (rate=2, capacity=1)
//! - Full rounds: 8
//! - Partial rounds: 57
//! - S-box: x^5
//! - Round constants: Grain LFSR (arkworks standard)
//!
//! ## Output convention
//! All hash functions output the first squeezed sponge element.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    poseidon::{find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge},
    CryptographicSponge,
};
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use std::sync::OnceLock;

use veilpick_types::{PickupError, PickupResult, FIELD_BYTES};

static CANONICAL_CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

/// Get the canonical Poseidon configuration.
/// Thread-safe singleton initialization.
pub fn canonical_config() -> &'static PoseidonConfig<Fr> {
    CANONICAL_CONFIG.get_or_init(|| {
        let rate = 2;
        let alpha = 5u64;
        let full_rounds = 8;
        let partial_rounds = 57;
        let field_bits = 254;

        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            field_bits,
            rate,
            full_rounds,
            partial_rounds,
            0, // skip_matrices
        );

        PoseidonConfig {
            full_rounds: full_rounds as usize,
            partial_rounds: partial_rounds as usize,
            alpha,
            ark,
            mds,
            rate,
            capacity: 1,
        }
    })
}

/// Hash any number of field elements. Returns the first squeezed element.
pub fn poseidon_hash_fields(inputs: &[Fr]) -> Fr {
    let config = canonical_config();
    let mut sponge = PoseidonSponge::new(config);
    for input in inputs {
        sponge.absorb(input);
    }
    let output: Vec<Fr> = sponge.squeeze_field_elements(1);
    output[0]
}

/// Convert a field element to its canonical 32-byte little-endian encoding.
pub fn fr_to_bytes(f: &Fr) -> [u8; FIELD_BYTES] {
    let mut bytes = [0u8; FIELD_BYTES];
    f.serialize_compressed(&mut bytes[..])
        .expect("Fr serialization failed");
    bytes
}

/// Strictly decode 32 bytes into a field element.
///
/// Rejects non-canonical encodings (values >= the field modulus) instead of
/// wrapping them; accepting an out-of-field public signal can forge
/// verification.
pub fn fr_from_bytes(bytes: &[u8; FIELD_BYTES]) -> PickupResult<Fr> {
    Fr::deserialize_compressed(&bytes[..])
        .map_err(|_| PickupError::InputValidation("Scalar exceeds field modulus".into()))
}

/// Reduce 32 bytes into the field (mod order). Only for enrollment-time
/// boundaries where reduction is the documented semantic, never for public
/// signals.
pub fn fr_from_bytes_reduced(bytes: &[u8; FIELD_BYTES]) -> Fr {
    Fr::from_le_bytes_mod_order(bytes)
}

/// Map arbitrary bytes into the field via blake3 then reduction.
pub fn hash_to_field(data: &[u8]) -> Fr {
    let digest = blake3::hash(data);
    Fr::from_le_bytes_mod_order(digest.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::{BigInteger, Zero};

    #[test]
    fn test_hash_deterministic() {
        let a = Fr::from(12345u64);
        let b = Fr::from(67890u64);

        let h1 = poseidon_hash_fields(&[a, b]);
        let h2 = poseidon_hash_fields(&[a, b]);
        assert_eq!(h1, h2);

        // Order matters
        let h3 = poseidon_hash_fields(&[b, a]);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_arity_matters() {
        let a = Fr::from(1u64);
        let b = Fr::from(2u64);
        let c = Fr::from(3u64);

        let h2 = poseidon_hash_fields(&[a, b]);
        let h3 = poseidon_hash_fields(&[a, b, c]);
        assert_ne!(h2, h3);
    }

    #[test]
    fn test_field_roundtrip() {
        let original = Fr::from(0xdeadbeefu64);
        let bytes = fr_to_bytes(&original);
        let restored = fr_from_bytes(&bytes).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_out_of_field_rejected() {
        // The modulus itself is not a canonical encoding.
        let modulus = Fr::MODULUS;
        let mut bytes = [0u8; FIELD_BYTES];
        bytes.copy_from_slice(&modulus.to_bytes_le());
        assert!(fr_from_bytes(&bytes).is_err());

        // All-ones is far above the ~254-bit modulus.
        assert!(fr_from_bytes(&[0xff; FIELD_BYTES]).is_err());
    }

    #[test]
    fn test_hash_to_field_stable() {
        let h1 = hash_to_field(b"PKG-1");
        let h2 = hash_to_field(b"PKG-1");
        assert_eq!(h1, h2);
        assert_ne!(h1, hash_to_field(b"PKG-2"));
        assert!(!h1.is_zero());
    }
}
