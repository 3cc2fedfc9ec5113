use crate::PackageStatus;
use thiserror::Error;

/// Protocol error taxonomy.
///
/// Variants never carry witness data; the authority surfaces these as
/// coarse-grained reason codes.
#[derive(Error, Debug)]
pub enum PickupError {
    /// Out-of-range scalar or otherwise invalid input, rejected before any
    /// cryptographic work.
    #[error("Input validation error: {0}")]
    InputValidation(String),

    /// Opaque bytes from the transport layer failed to deserialize.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// No witness assignment satisfies the circuit (wrong secret, age too
    /// low). Retrying with the same inputs cannot succeed.
    #[error("Witness unsatisfiable: {0}")]
    WitnessUnsatisfiable(String),

    /// The proof did not verify against the public signals.
    #[error("Invalid proof")]
    InvalidProof,

    /// The proof's nullifier has already been consumed.
    #[error("Nullifier already used")]
    NullifierReused,

    /// Package requires a minimum age the proof does not attest to.
    #[error("Age requirement not met")]
    AgeRequirementNotMet,

    /// Pickup window elapsed before collection.
    #[error("Package expired")]
    PackageExpired,

    /// Operation not permitted in the package's current state.
    #[error("Invalid state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        expected: PackageStatus,
        actual: PackageStatus,
    },

    /// Caller is not the store assigned to this package.
    #[error("Unauthorized caller")]
    Unauthorized,

    /// The verification key does not match the expected circuit artifact.
    /// Fatal to the authority process, not a per-request error.
    #[error("Verification key mismatch: expected {expected}, found {actual}")]
    VerificationKeyMismatch { expected: String, actual: String },

    /// Failure inside the proving or key-generation machinery.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Filesystem or database failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Encoding or decoding failure outside the transport boundary.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the workspace.
pub type PickupResult<T> = Result<T, PickupError>;
