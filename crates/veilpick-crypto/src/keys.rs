//! Circuit key generation and artifact storage.
//!
//! Groth16 needs a one-time trusted setup per circuit shape. The resulting
//! proving and verifying keys are written to disk alongside a metadata file
//! carrying the circuit version and a digest of the verifying key, so a
//! deployment can pin the exact key it expects.

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::circuit::PickupCircuit;
use veilpick_types::{PickupError, PickupResult};

/// Bumped whenever the constraint system changes shape. Keys generated for
/// one version never verify proofs from another.
pub const CIRCUIT_VERSION: &str = "1.0.0";

pub const PROVING_KEY_FILE: &str = "pickup.pk.bin";
pub const VERIFYING_KEY_FILE: &str = "pickup.vk.bin";
pub const METADATA_FILE: &str = "pickup.meta.json";

/// Sidecar metadata written next to the key files.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub circuit_version: String,
    pub vk_digest: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Generated proving and verifying keys for the pickup circuit.
pub struct CircuitArtifacts {
    pub proving_key: ProvingKey<Bn254>,
    pub verifying_key: VerifyingKey<Bn254>,
}

impl CircuitArtifacts {
    /// Run the circuit-specific trusted setup.
    pub fn generate<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> PickupResult<Self> {
        let (proving_key, verifying_key) =
            Groth16::<Bn254>::circuit_specific_setup(PickupCircuit::empty(), rng)
                .map_err(|e| PickupError::Crypto(format!("Key generation failed: {}", e)))?;

        Ok(Self {
            proving_key,
            verifying_key,
        })
    }

    /// Hex blake3 digest of the compressed verifying key.
    pub fn vk_digest(&self) -> PickupResult<String> {
        let mut bytes = Vec::new();
        self.verifying_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| PickupError::Serialization(e.to_string()))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    /// Write the key pair and metadata into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> PickupResult<()> {
        fs::create_dir_all(dir)
            .map_err(|e| PickupError::Storage(format!("Cannot create {}: {}", dir.display(), e)))?;

        let mut pk_bytes = Vec::new();
        self.proving_key
            .serialize_compressed(&mut pk_bytes)
            .map_err(|e| PickupError::Serialization(e.to_string()))?;
        fs::write(dir.join(PROVING_KEY_FILE), &pk_bytes)
            .map_err(|e| PickupError::Storage(e.to_string()))?;

        let mut vk_bytes = Vec::new();
        self.verifying_key
            .serialize_compressed(&mut vk_bytes)
            .map_err(|e| PickupError::Serialization(e.to_string()))?;
        fs::write(dir.join(VERIFYING_KEY_FILE), &vk_bytes)
            .map_err(|e| PickupError::Storage(e.to_string()))?;

        let metadata = ArtifactMetadata {
            circuit_version: CIRCUIT_VERSION.to_string(),
            vk_digest: self.vk_digest()?,
            generated_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| PickupError::Serialization(e.to_string()))?;
        fs::write(dir.join(METADATA_FILE), json)
            .map_err(|e| PickupError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Load a key pair from `dir`, checking the metadata digest against the
    /// verifying key actually on disk. A mismatch means the files were
    /// swapped or corrupted after generation.
    pub fn load(dir: &Path) -> PickupResult<Self> {
        let pk_bytes = fs::read(dir.join(PROVING_KEY_FILE))
            .map_err(|e| PickupError::Storage(format!("{}: {}", PROVING_KEY_FILE, e)))?;
        let proving_key = ProvingKey::deserialize_compressed(&pk_bytes[..])
            .map_err(|e| PickupError::MalformedInput(format!("{}: {}", PROVING_KEY_FILE, e)))?;

        let vk_bytes = fs::read(dir.join(VERIFYING_KEY_FILE))
            .map_err(|e| PickupError::Storage(format!("{}: {}", VERIFYING_KEY_FILE, e)))?;
        let verifying_key = VerifyingKey::deserialize_compressed(&vk_bytes[..])
            .map_err(|e| PickupError::MalformedInput(format!("{}: {}", VERIFYING_KEY_FILE, e)))?;

        let artifacts = Self {
            proving_key,
            verifying_key,
        };

        let metadata = Self::load_metadata(dir)?;
        let actual = artifacts.vk_digest()?;
        if metadata.vk_digest != actual {
            return Err(PickupError::VerificationKeyMismatch {
                expected: metadata.vk_digest,
                actual,
            });
        }
        if metadata.circuit_version != CIRCUIT_VERSION {
            return Err(PickupError::VerificationKeyMismatch {
                expected: format!("circuit version {}", CIRCUIT_VERSION),
                actual: format!("circuit version {}", metadata.circuit_version),
            });
        }

        Ok(artifacts)
    }

    pub fn load_metadata(dir: &Path) -> PickupResult<ArtifactMetadata> {
        let json = fs::read_to_string(dir.join(METADATA_FILE))
            .map_err(|e| PickupError::Storage(format!("{}: {}", METADATA_FILE, e)))?;
        serde_json::from_str(&json).map_err(|e| PickupError::Serialization(e.to_string()))
    }
}
