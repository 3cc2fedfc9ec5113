//! Groth16 prover and verifier for the pickup circuit.
//!
//! Proof generation is long-running and runs on hardware the buyer
//! controls; it holds no locks and its output is the only thing that ever
//! leaves the device. Verification is a pure function of proof, public
//! signals, and the prepared verification key.

use ark_bn254::{Bn254, Fr};
use ark_ff::Zero;
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use serde::{Deserialize, Serialize};

use crate::circuit::PickupCircuit;
use crate::commitment::{
    check_age, check_phone_suffix, derive, derive_nullifier, package_id_field,
    store_address_field, BuyerEnrollment, CommitmentInputs,
};
use crate::keys::CircuitArtifacts;
use crate::poseidon::{fr_from_bytes, fr_to_bytes};
use veilpick_types::{
    CommitmentBytes, Nullifier, PackageId, PickupError, PickupResult, StoreAddress,
};

/// Full private input assignment for one pickup proof.
pub struct BuyerWitness {
    pub secret: Fr,
    pub name_hash: Fr,
    pub phone_suffix: u16,
    pub age: u8,
    pub nonce: Fr,
}

impl BuyerWitness {
    pub fn from_enrollment(enrollment: &BuyerEnrollment, age: u8) -> Self {
        Self {
            secret: enrollment.secret(),
            name_hash: enrollment.name_hash(),
            phone_suffix: enrollment.phone_suffix(),
            age,
            nonce: enrollment.nonce(),
        }
    }
}

impl std::fmt::Debug for BuyerWitness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuyerWitness([REDACTED])")
    }
}

/// Public parameters of one pickup attempt, fixed by the authority's
/// package record before proving starts.
#[derive(Clone, Debug)]
pub struct PickupStatement {
    /// The chain-link commitment challenged in this run.
    pub expected_commitment: CommitmentBytes,
    pub package_id: PackageId,
    pub min_age_required: u8,
    pub store_address: StoreAddress,
}

/// Fixed-length public signal vector accompanying a proof.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicSignals {
    pub nullifier: Nullifier,
    /// Commitment-binding value (the challenged commitment).
    pub claim_commitment: CommitmentBytes,
    pub age_satisfied: bool,
    pub package_id: PackageId,
    pub min_age_required: u8,
    pub store_address: StoreAddress,
}

impl PublicSignals {
    /// Assemble the field-element vector in circuit allocation order.
    /// Every 32-byte signal is strictly range-checked against the field
    /// modulus; out-of-field encodings are rejected.
    pub fn to_field_vec(&self) -> PickupResult<Vec<Fr>> {
        Ok(vec![
            fr_from_bytes(self.claim_commitment.as_bytes())?,
            package_id_field(&self.package_id),
            Fr::from(self.min_age_required as u64),
            store_address_field(&self.store_address),
            fr_from_bytes(self.nullifier.as_bytes())?,
            if self.age_satisfied {
                Fr::from(1u64)
            } else {
                Fr::zero()
            },
        ])
    }
}

/// Opaque succinct proof artifact.
#[derive(Clone, Debug)]
pub struct PickupProof {
    pub proof: Proof<Bn254>,
}

impl PickupProof {
    pub fn to_bytes(&self) -> PickupResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| PickupError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize from transport bytes. Failure is the transport layer's
    /// `MalformedInput`, never a panic.
    pub fn from_bytes(bytes: &[u8]) -> PickupResult<Self> {
        let proof = Proof::deserialize_compressed(bytes)
            .map_err(|e| PickupError::MalformedInput(e.to_string()))?;
        Ok(Self { proof })
    }
}

impl Serialize for PickupProof {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut bytes = Vec::new();
        self.proof
            .serialize_compressed(&mut bytes)
            .map_err(serde::ser::Error::custom)?;
        bytes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PickupProof {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        let proof =
            Proof::deserialize_compressed(&bytes[..]).map_err(serde::de::Error::custom)?;
        Ok(Self { proof })
    }
}

/// Buyer-side proof generation.
pub struct Prover {
    proving_key: ark_groth16::ProvingKey<Bn254>,
}

impl Prover {
    pub fn from_artifacts(artifacts: &CircuitArtifacts) -> Self {
        Self {
            proving_key: artifacts.proving_key.clone(),
        }
    }

    /// Generate a proof for one pickup attempt.
    ///
    /// Input validation happens before any cryptographic work; a witness
    /// that cannot satisfy the constraints (wrong secret, age too low) is
    /// rejected with `WitnessUnsatisfiable` before the expensive proving
    /// call, and an unsatisfiable assignment that slips through maps to the
    /// same error.
    pub fn generate<R: rand::Rng + rand::CryptoRng>(
        &self,
        witness: &BuyerWitness,
        statement: &PickupStatement,
        rng: &mut R,
    ) -> PickupResult<(PickupProof, PublicSignals)> {
        check_phone_suffix(witness.phone_suffix)?;
        check_age(witness.age)?;

        let claim = derive(CommitmentInputs::Claim {
            secret: witness.secret,
            name_hash: witness.name_hash,
            phone_suffix: witness.phone_suffix,
        })?;
        if claim != statement.expected_commitment {
            return Err(PickupError::WitnessUnsatisfiable(
                "Witness does not open the challenged commitment".into(),
            ));
        }

        let age_satisfied =
            statement.min_age_required == 0 || witness.age >= statement.min_age_required;
        if !age_satisfied {
            return Err(PickupError::WitnessUnsatisfiable(
                "Age below package requirement".into(),
            ));
        }

        let nullifier = derive_nullifier(
            witness.secret,
            &statement.package_id,
            witness.nonce,
            &statement.store_address,
        );

        let circuit = PickupCircuit::new(
            witness.secret,
            witness.name_hash,
            Fr::from(witness.phone_suffix as u64),
            Fr::from(witness.age as u64),
            witness.nonce,
            fr_from_bytes(claim.as_bytes())?,
            package_id_field(&statement.package_id),
            Fr::from(statement.min_age_required as u64),
            store_address_field(&statement.store_address),
            nullifier,
        );

        let proof = Groth16::<Bn254>::prove(&self.proving_key, circuit, rng).map_err(|e| {
            use ark_relations::r1cs::SynthesisError;
            match e {
                SynthesisError::Unsatisfiable | SynthesisError::AssignmentMissing => {
                    PickupError::WitnessUnsatisfiable("Constraint system unsatisfied".into())
                }
                other => PickupError::Crypto(format!("Proof generation failed: {}", other)),
            }
        })?;

        let signals = PublicSignals {
            nullifier: Nullifier::from_bytes(fr_to_bytes(&nullifier)),
            claim_commitment: claim,
            age_satisfied: true,
            package_id: statement.package_id.clone(),
            min_age_required: statement.min_age_required,
            store_address: statement.store_address,
        };

        Ok((PickupProof { proof }, signals))
    }
}

/// Authority-side proof verification. Pure function of its inputs, no
/// hidden state; fails closed on any malformed input.
pub struct Verifier {
    prepared_vk: PreparedVerifyingKey<Bn254>,
    vk_digest: String,
}

impl Verifier {
    /// Build a verifier from circuit artifacts, checking the key digest
    /// when one is pinned. A mismatch is a deployment fault, surfaced at
    /// startup.
    pub fn from_artifacts(
        artifacts: &CircuitArtifacts,
        expected_digest: Option<&str>,
    ) -> PickupResult<Self> {
        let actual = artifacts.vk_digest()?;
        if let Some(expected) = expected_digest {
            if expected != actual {
                return Err(PickupError::VerificationKeyMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let prepared_vk = Groth16::<Bn254>::process_vk(&artifacts.verifying_key)
            .map_err(|e| PickupError::Crypto(format!("Failed to prepare VK: {}", e)))?;

        Ok(Self {
            prepared_vk,
            vk_digest: actual,
        })
    }

    pub fn vk_digest(&self) -> &str {
        &self.vk_digest
    }

    /// Decide accept/reject. Malformed proofs or signal vectors outside the
    /// field return `false`, never an error.
    pub fn verify(&self, proof: &PickupProof, signals: &PublicSignals) -> bool {
        let public_inputs = match signals.to_field_vec() {
            Ok(v) => v,
            Err(_) => return false,
        };

        Groth16::<Bn254>::verify_with_processed_vk(&self.prepared_vk, &public_inputs, &proof.proof)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::CircuitArtifacts;
    use rand::thread_rng;
    use std::sync::OnceLock;

    static ARTIFACTS: OnceLock<CircuitArtifacts> = OnceLock::new();

    fn artifacts() -> &'static CircuitArtifacts {
        ARTIFACTS.get_or_init(|| CircuitArtifacts::generate(&mut thread_rng()).unwrap())
    }

    fn statement_for(
        enrollment: &BuyerEnrollment,
        package_id: &str,
        min_age: u8,
    ) -> PickupStatement {
        PickupStatement {
            expected_commitment: enrollment.claim_commitment(),
            package_id: PackageId::new(package_id),
            min_age_required: min_age,
            store_address: StoreAddress::from_bytes([0x55; 20]),
        }
    }

    #[test]
    fn test_prove_and_verify_roundtrip() {
        let mut rng = thread_rng();
        let enrollment = BuyerEnrollment::new(&mut rng, "Alice", 321).unwrap();
        let witness = BuyerWitness::from_enrollment(&enrollment, 25);
        let statement = statement_for(&enrollment, "PKG-1", 18);

        let prover = Prover::from_artifacts(artifacts());
        let (proof, signals) = prover.generate(&witness, &statement, &mut rng).unwrap();
        assert!(signals.age_satisfied);

        let verifier = Verifier::from_artifacts(artifacts(), None).unwrap();
        assert!(verifier.verify(&proof, &signals));
    }

    #[test]
    fn test_tampered_signals_rejected() {
        let mut rng = thread_rng();
        let enrollment = BuyerEnrollment::new(&mut rng, "Alice", 321).unwrap();
        let witness = BuyerWitness::from_enrollment(&enrollment, 25);
        let statement = statement_for(&enrollment, "PKG-2", 0);

        let prover = Prover::from_artifacts(artifacts());
        let (proof, signals) = prover.generate(&witness, &statement, &mut rng).unwrap();
        let verifier = Verifier::from_artifacts(artifacts(), None).unwrap();

        // Single-bit nullifier mutation
        let mut tampered = signals.clone();
        let mut bytes = *tampered.nullifier.as_bytes();
        bytes[0] ^= 0x01;
        tampered.nullifier = Nullifier::from_bytes(bytes);
        assert!(!verifier.verify(&proof, &tampered));

        // Different package id
        let mut tampered = signals.clone();
        tampered.package_id = PackageId::new("PKG-999");
        assert!(!verifier.verify(&proof, &tampered));

        // Mutated proof bytes
        let mut proof_bytes = proof.to_bytes().unwrap();
        proof_bytes[1] ^= 0x01;
        if let Ok(mangled) = PickupProof::from_bytes(&proof_bytes) {
            assert!(!verifier.verify(&mangled, &signals));
        }
    }

    #[test]
    fn test_out_of_field_signal_fails_closed() {
        let mut rng = thread_rng();
        let enrollment = BuyerEnrollment::new(&mut rng, "Alice", 321).unwrap();
        let witness = BuyerWitness::from_enrollment(&enrollment, 25);
        let statement = statement_for(&enrollment, "PKG-3", 0);

        let prover = Prover::from_artifacts(artifacts());
        let (proof, signals) = prover.generate(&witness, &statement, &mut rng).unwrap();
        let verifier = Verifier::from_artifacts(artifacts(), None).unwrap();

        let mut tampered = signals;
        tampered.nullifier = Nullifier::from_bytes([0xff; 32]);
        assert!(!verifier.verify(&proof, &tampered));
    }

    #[test]
    fn test_under_age_witness_unsatisfiable() {
        let mut rng = thread_rng();
        let enrollment = BuyerEnrollment::new(&mut rng, "Bob", 7).unwrap();
        let witness = BuyerWitness::from_enrollment(&enrollment, 16);
        let statement = statement_for(&enrollment, "PKG-4", 18);

        let prover = Prover::from_artifacts(artifacts());
        let result = prover.generate(&witness, &statement, &mut rng);
        assert!(matches!(
            result,
            Err(PickupError::WitnessUnsatisfiable(_))
        ));
    }

    #[test]
    fn test_no_age_restriction_accepts_any_age() {
        let mut rng = thread_rng();
        let enrollment = BuyerEnrollment::new(&mut rng, "Young", 1).unwrap();
        let witness = BuyerWitness::from_enrollment(&enrollment, 12);
        let statement = statement_for(&enrollment, "PKG-5", 0);

        let prover = Prover::from_artifacts(artifacts());
        let (proof, signals) = prover.generate(&witness, &statement, &mut rng).unwrap();
        let verifier = Verifier::from_artifacts(artifacts(), None).unwrap();
        assert!(verifier.verify(&proof, &signals));
    }

    #[test]
    fn test_wrong_secret_unsatisfiable() {
        let mut rng = thread_rng();
        let enrollment = BuyerEnrollment::new(&mut rng, "Alice", 321).unwrap();
        let impostor = BuyerEnrollment::new(&mut rng, "Mallory", 321).unwrap();
        let witness = BuyerWitness::from_enrollment(&impostor, 40);
        // Challenge is Alice's commitment.
        let statement = statement_for(&enrollment, "PKG-6", 0);

        let prover = Prover::from_artifacts(artifacts());
        let result = prover.generate(&witness, &statement, &mut rng);
        assert!(matches!(
            result,
            Err(PickupError::WitnessUnsatisfiable(_))
        ));
    }

    #[test]
    fn test_distinct_packages_distinct_nullifiers() {
        let mut rng = thread_rng();
        let enrollment = BuyerEnrollment::new(&mut rng, "Alice", 321).unwrap();
        let witness = BuyerWitness::from_enrollment(&enrollment, 30);
        let prover = Prover::from_artifacts(artifacts());

        let (_, s1) = prover
            .generate(&witness, &statement_for(&enrollment, "PKG-A", 0), &mut rng)
            .unwrap();
        let (_, s2) = prover
            .generate(&witness, &statement_for(&enrollment, "PKG-B", 0), &mut rng)
            .unwrap();
        assert_ne!(s1.nullifier, s2.nullifier);
    }

    #[test]
    fn test_proof_serde_roundtrip() {
        let mut rng = thread_rng();
        let enrollment = BuyerEnrollment::new(&mut rng, "Alice", 321).unwrap();
        let witness = BuyerWitness::from_enrollment(&enrollment, 25);
        let statement = statement_for(&enrollment, "PKG-7", 0);

        let prover = Prover::from_artifacts(artifacts());
        let (proof, signals) = prover.generate(&witness, &statement, &mut rng).unwrap();

        let bytes = proof.to_bytes().unwrap();
        let restored = PickupProof::from_bytes(&bytes).unwrap();

        let verifier = Verifier::from_artifacts(artifacts(), None).unwrap();
        assert!(verifier.verify(&restored, &signals));

        assert!(PickupProof::from_bytes(&[0u8; 3]).is_err());
    }
}
