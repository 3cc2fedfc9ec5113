#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

//! Shared types for the veilpick anonymous pickup protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

mod error;

pub use error::{PickupError, PickupResult};

/// Width of every commitment, nullifier, and field-element encoding.
pub const FIELD_BYTES: usize = 32;

/// Highest accepted phone suffix (last three digits).
pub const PHONE_SUFFIX_MAX: u16 = 999;

/// Highest accepted age.
pub const AGE_MAX: u8 = 150;

/// Width of a store address.
pub const STORE_ADDRESS_SIZE: usize = 20;

/// Canonical 32-byte encoding of a commitment or nullifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitmentBytes(pub [u8; FIELD_BYTES]);

impl CommitmentBytes {
    /// Wrap raw commitment bytes.
    pub fn from_bytes(bytes: [u8; FIELD_BYTES]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; FIELD_BYTES] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex; rejects anything but exactly 64 hex characters.
    pub fn from_hex(s: &str) -> PickupResult<Self> {
        let bytes = hex::decode(s).map_err(|e| PickupError::MalformedInput(e.to_string()))?;
        if bytes.len() != FIELD_BYTES {
            return Err(PickupError::MalformedInput(
                "Invalid commitment length".into(),
            ));
        }
        let mut arr = [0u8; FIELD_BYTES];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// All-zero commitment, the `Default`.
    pub fn zero() -> Self {
        Self([0u8; FIELD_BYTES])
    }
}

impl fmt::Debug for CommitmentBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for CommitmentBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for CommitmentBytes {
    fn default() -> Self {
        Self::zero()
    }
}

/// Single-use nullifier. Same layout as a commitment, separate type so the
/// two cannot be confused at an interface boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nullifier(pub [u8; FIELD_BYTES]);

impl Nullifier {
    /// Wrap raw nullifier bytes.
    pub fn from_bytes(bytes: [u8; FIELD_BYTES]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; FIELD_BYTES] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nullifier({}...)", &self.to_hex()[..8])
    }
}

/// Seller-assigned package identifier, e.g. "PKG-1".
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageId(pub String);

impl PackageId {
    /// Wrap a seller-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Domain-separated digest of the identifier; the canonical preimage of
    /// the field element the circuit sees.
    pub fn digest(&self) -> [u8; FIELD_BYTES] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"veilpick-package-id-v1");
        hasher.update(self.0.as_bytes());
        *hasher.finalize().as_bytes()
    }
}

impl fmt::Debug for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageId({})", self.0)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated identity of a pickup point. How the identity was
/// established (wallet signature, session) is the signing layer's concern.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreAddress(pub [u8; STORE_ADDRESS_SIZE]);

impl StoreAddress {
    /// Wrap raw address bytes.
    pub fn from_bytes(bytes: [u8; STORE_ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; STORE_ADDRESS_SIZE] {
        &self.0
    }

    /// `0x`-prefixed hex encoding.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> PickupResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| PickupError::MalformedInput(e.to_string()))?;
        if bytes.len() != STORE_ADDRESS_SIZE {
            return Err(PickupError::MalformedInput("Invalid address length".into()));
        }
        let mut arr = [0u8; STORE_ADDRESS_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// All-zero address.
    pub fn zero() -> Self {
        Self([0u8; STORE_ADDRESS_SIZE])
    }
}

impl fmt::Debug for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreAddress({})", self.to_hex())
    }
}

impl fmt::Display for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Lifecycle of a registered package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageStatus {
    /// Seller registered the package; store has not confirmed receipt.
    Registered,
    /// Store confirmed physical receipt; pickup may be authorized.
    StoreCommitted,
    /// Collected. Terminal.
    PickedUp,
    /// Pickup window elapsed. Terminal.
    Expired,
}

impl PackageStatus {
    /// PickedUp and Expired admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PackageStatus::PickedUp | PackageStatus::Expired)
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PackageStatus::Registered => "registered",
            PackageStatus::StoreCommitted => "store-committed",
            PackageStatus::PickedUp => "picked-up",
            PackageStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

/// Authoritative package state, owned by the verifying authority.
/// Append-only: records are never deleted, terminal states are immutable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Seller-assigned identifier.
    pub package_id: PackageId,
    /// Chained buyer commitment H(secret, nameHash, phoneSuffix, nonce).
    pub buyer_commitment: CommitmentBytes,
    /// Commitment-binding value H(secret, nameHash, phoneSuffix) the
    /// circuit is challenged against at pickup.
    pub claim_commitment: CommitmentBytes,
    /// Seller link of the commitment chain.
    pub seller_commitment: CommitmentBytes,
    /// Store link, derived once the store confirms receipt.
    pub store_commitment: Option<CommitmentBytes>,
    /// Pickup point assigned to this package.
    pub store_address: StoreAddress,
    /// Item price in minor currency units.
    pub item_price: u64,
    /// Shipping fee in minor currency units.
    pub shipping_fee: u64,
    /// Minimum buyer age; 0 means no restriction.
    pub min_age_required: u8,
    /// Registration time.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// End of the pickup window.
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Current lifecycle state.
    pub status: PackageStatus,
}

impl PackageRecord {
    /// Whether the pickup window has closed as of `now`.
    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now >= self.expires_at
    }
}
