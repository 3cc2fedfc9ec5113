//! Pickup authorization circuit.
//!
//! Proves, without revealing the witness:
//! 1. knowledge of the preimage of the challenged commitment,
//!    `expectedCommitment == H(secret, nameHash, phoneSuffix)`;
//! 2. the witness scalars are in the legitimate enrollment domain
//!    (`phoneSuffix < 1000`, `age < 151`);
//! 3. the age gate, as arithmetic (circuits have no branching):
//!    `ageOk = isZero(minAgeRequired) OR (age >= minAgeRequired)`,
//!    `ageOk == 1`, and the public `ageSatisfied` signal equals `ageOk`;
//! 4. `nullifier == H(secret, packageId, nonce, storeAddress)`.
//!
//! Public inputs are allocated in the fixed order expectedCommitment,
//! packageId, minAgeRequired, storeAddress, nullifier, ageSatisfied; the
//! verifier reproduces this order when assembling the input vector.
//!
//! Each run binds exactly one expected commitment: the buyer's claim
//! commitment. The seller and store links have preimages the range-checked
//! witness slots cannot carry; widening the statement to a disjunction over
//! the other chain links is a future hardening.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
use ark_crypto_primitives::sponge::poseidon::constraints::PoseidonSpongeVar;
use ark_ff::Zero;
use ark_r1cs_std::{
    alloc::AllocVar,
    boolean::Boolean,
    eq::EqGadget,
    fields::{fp::FpVar, FieldVar},
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use std::cmp::Ordering;

use crate::poseidon::canonical_config;

/// One past the highest legitimate phone suffix.
pub const PHONE_SUFFIX_BOUND: u64 = 1000;

/// One past the highest legitimate age.
pub const AGE_BOUND: u64 = 151;

#[derive(Clone)]
pub struct PickupCircuit {
    // Private witness
    secret: Option<Fr>,
    name_hash: Option<Fr>,
    phone_suffix: Option<Fr>,
    age: Option<Fr>,
    nonce: Option<Fr>,
    // Public inputs
    expected_commitment: Option<Fr>,
    package_id: Option<Fr>,
    min_age_required: Option<Fr>,
    store_address: Option<Fr>,
    nullifier: Option<Fr>,
    age_satisfied: Option<Fr>,
}

impl PickupCircuit {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        secret: Fr,
        name_hash: Fr,
        phone_suffix: Fr,
        age: Fr,
        nonce: Fr,
        expected_commitment: Fr,
        package_id: Fr,
        min_age_required: Fr,
        store_address: Fr,
        nullifier: Fr,
    ) -> Self {
        // The flag is a deterministic function of the witness; a valid
        // assignment always carries 1, so the constraint ageOk == 1 makes
        // an under-age witness unsatisfiable rather than flagged.
        let age_satisfied = if min_age_required.is_zero() || age >= min_age_required {
            Fr::from(1u64)
        } else {
            Fr::zero()
        };

        Self {
            secret: Some(secret),
            name_hash: Some(name_hash),
            phone_suffix: Some(phone_suffix),
            age: Some(age),
            nonce: Some(nonce),
            expected_commitment: Some(expected_commitment),
            package_id: Some(package_id),
            min_age_required: Some(min_age_required),
            store_address: Some(store_address),
            nullifier: Some(nullifier),
            age_satisfied: Some(age_satisfied),
        }
    }

    /// Unassigned circuit, used for key generation.
    pub fn empty() -> Self {
        Self {
            secret: None,
            name_hash: None,
            phone_suffix: None,
            age: None,
            nonce: None,
            expected_commitment: None,
            package_id: None,
            min_age_required: None,
            store_address: None,
            nullifier: None,
            age_satisfied: None,
        }
    }
}

impl ConstraintSynthesizer<Fr> for PickupCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let secret = FpVar::new_witness(cs.clone(), || {
            self.secret.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let name_hash = FpVar::new_witness(cs.clone(), || {
            self.name_hash.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let phone_suffix = FpVar::new_witness(cs.clone(), || {
            self.phone_suffix.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let age = FpVar::new_witness(cs.clone(), || {
            self.age.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let nonce = FpVar::new_witness(cs.clone(), || {
            self.nonce.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let expected_commitment = FpVar::new_input(cs.clone(), || {
            self.expected_commitment
                .ok_or(SynthesisError::AssignmentMissing)
        })?;

        let package_id = FpVar::new_input(cs.clone(), || {
            self.package_id.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let min_age_required = FpVar::new_input(cs.clone(), || {
            self.min_age_required
                .ok_or(SynthesisError::AssignmentMissing)
        })?;

        let store_address = FpVar::new_input(cs.clone(), || {
            self.store_address.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let nullifier = FpVar::new_input(cs.clone(), || {
            self.nullifier.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let age_satisfied = FpVar::new_input(cs.clone(), || {
            self.age_satisfied.ok_or(SynthesisError::AssignmentMissing)
        })?;

        // Range checks. Without these a malicious witness could satisfy the
        // hash constraints with out-of-domain scalars that never occur in
        // legitimate enrollment.
        phone_suffix.enforce_cmp(
            &FpVar::constant(Fr::from(PHONE_SUFFIX_BOUND)),
            Ordering::Less,
            false,
        )?;
        age.enforce_cmp(&FpVar::constant(Fr::from(AGE_BOUND)), Ordering::Less, false)?;

        // Constraint 1: knowledge of the challenged commitment's preimage.
        let commitment = poseidon_hash_circuit(
            cs.clone(),
            &[secret.clone(), name_hash.clone(), phone_suffix.clone()],
        )?;
        commitment.enforce_equal(&expected_commitment)?;

        // Constraint 2: age gate, arithmetic OR.
        let min_age_is_zero = min_age_required.is_eq(&FpVar::constant(Fr::zero()))?;
        let age_ge_min = age.is_cmp(&min_age_required, Ordering::Greater, true)?;
        let age_ok = min_age_is_zero.or(&age_ge_min)?;
        age_ok.enforce_equal(&Boolean::constant(true))?;
        FpVar::from(age_ok).enforce_equal(&age_satisfied)?;

        // Constraint 3: nullifier binds this specific pickup attempt.
        let computed_nullifier = poseidon_hash_circuit(
            cs.clone(),
            &[secret, package_id.clone(), nonce, store_address.clone()],
        )?;
        computed_nullifier.enforce_equal(&nullifier)?;

        Ok(())
    }
}

/// In-circuit Poseidon, same sponge as the native hash.
pub fn poseidon_hash_circuit(
    cs: ConstraintSystemRef<Fr>,
    inputs: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    let config = canonical_config();

    let mut sponge = PoseidonSpongeVar::new(cs, config);
    sponge.absorb(&inputs)?;

    let output = sponge.squeeze_field_elements(1)?;
    Ok(output[0].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poseidon::poseidon_hash_fields;
    use ark_relations::r1cs::ConstraintSystem;
    use ark_r1cs_std::R1CSVar;

    #[test]
    fn test_gadget_matches_native_hash() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let inputs = [Fr::from(3u64), Fr::from(5u64), Fr::from(7u64)];
        let vars: Vec<FpVar<Fr>> = inputs
            .iter()
            .map(|v| FpVar::new_witness(cs.clone(), || Ok(*v)).unwrap())
            .collect();

        let out = poseidon_hash_circuit(cs.clone(), &vars).unwrap();
        assert_eq!(out.value().unwrap(), poseidon_hash_fields(&inputs));
        assert!(cs.is_satisfied().unwrap());
    }

    fn assigned_circuit(age: u64, min_age: u64) -> PickupCircuit {
        let secret = Fr::from(11u64);
        let name_hash = Fr::from(22u64);
        let phone_suffix = Fr::from(123u64);
        let nonce = Fr::from(44u64);
        let package_id = Fr::from(55u64);
        let store_address = Fr::from(66u64);

        let expected = poseidon_hash_fields(&[secret, name_hash, phone_suffix]);
        let nullifier = poseidon_hash_fields(&[secret, package_id, nonce, store_address]);

        PickupCircuit::new(
            secret,
            name_hash,
            phone_suffix,
            Fr::from(age),
            nonce,
            expected,
            package_id,
            Fr::from(min_age),
            store_address,
            nullifier,
        )
    }

    #[test]
    fn test_satisfied_with_valid_witness() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        assigned_circuit(25, 18).generate_constraints(cs.clone()).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_unsatisfied_when_under_age() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        assigned_circuit(16, 18).generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_satisfied_when_no_age_restriction() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        assigned_circuit(0, 0).generate_constraints(cs.clone()).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_unsatisfied_with_wrong_commitment() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let mut circuit = assigned_circuit(30, 0);
        circuit.expected_commitment = Some(Fr::from(999u64));
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_unsatisfied_with_wrong_nullifier() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let mut circuit = assigned_circuit(30, 0);
        circuit.nullifier = Some(Fr::from(999u64));
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_unsatisfied_with_out_of_range_phone_suffix() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let secret = Fr::from(11u64);
        let name_hash = Fr::from(22u64);
        let phone_suffix = Fr::from(5000u64);
        let nonce = Fr::from(44u64);
        let package_id = Fr::from(55u64);
        let store_address = Fr::from(66u64);

        let expected = poseidon_hash_fields(&[secret, name_hash, phone_suffix]);
        let nullifier = poseidon_hash_fields(&[secret, package_id, nonce, store_address]);

        let circuit = PickupCircuit::new(
            secret,
            name_hash,
            phone_suffix,
            Fr::from(30u64),
            nonce,
            expected,
            package_id,
            Fr::zero(),
            store_address,
            nullifier,
        );
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }
}
