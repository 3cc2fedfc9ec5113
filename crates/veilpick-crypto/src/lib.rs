//! Cryptographic core of veilpick: Poseidon commitments, the pickup
//! authorization circuit, and the Groth16 prover/verifier around it.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod circuit;
pub mod commitment;
pub mod keys;
pub mod poseidon;
pub mod proof;

pub use circuit::{PickupCircuit, AGE_BOUND, PHONE_SUFFIX_BOUND};
pub use commitment::{
    derive, derive_nullifier, name_hash_field, package_id_field, store_address_field,
    BuyerEnrollment, CommitmentInputs,
};
pub use keys::{ArtifactMetadata, CircuitArtifacts, CIRCUIT_VERSION};
pub use poseidon::{
    canonical_config, fr_from_bytes, fr_from_bytes_reduced, fr_to_bytes, hash_to_field,
    poseidon_hash_fields,
};
pub use proof::{
    BuyerWitness, PickupProof, PickupStatement, Prover, PublicSignals, Verifier,
};
