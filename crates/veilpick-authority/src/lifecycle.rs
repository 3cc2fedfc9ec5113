//! Package lifecycle state machine.
//!
//! `Registered -> StoreCommitted -> PickedUp`, with either non-terminal
//! state falling to `Expired` once the pickup window closes. Terminal
//! states admit no further transitions. Every pickup authorization runs
//! the full ordered check sequence under the write lock, so a failure at
//! any step leaves no partial state behind, and two concurrent attempts
//! with the same nullifier resolve to exactly one success.

use ark_bn254::Fr;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::AuthorityConfig;
use crate::nullifier::{MemoryNullifierStore, NullifierStore, SledNullifierStore};
use veilpick_crypto::{
    derive, CircuitArtifacts, CommitmentInputs, PickupProof, PublicSignals, Verifier,
};
use veilpick_types::{
    CommitmentBytes, Nullifier, PackageId, PackageRecord, PackageStatus, PickupError,
    PickupResult, StoreAddress, AGE_MAX,
};

/// Everything the seller hands the authority to register one package.
#[derive(Clone, Debug)]
pub struct PackageRegistration {
    pub package_id: PackageId,
    pub buyer_commitment: CommitmentBytes,
    pub claim_commitment: CommitmentBytes,
    pub seller_commitment: CommitmentBytes,
    pub store_address: StoreAddress,
    pub item_price: u64,
    pub shipping_fee: u64,
    pub min_age_required: u8,
    pub pickup_window: chrono::Duration,
}

/// The verifying authority: owns package records, the nullifier store,
/// and the proof verifier.
pub struct PackageAuthority {
    packages: RwLock<HashMap<PackageId, PackageRecord>>,
    nullifiers: Arc<dyn NullifierStore>,
    verifier: Verifier,
}

impl PackageAuthority {
    pub fn new(verifier: Verifier, nullifiers: Arc<dyn NullifierStore>) -> Self {
        Self {
            packages: RwLock::new(HashMap::new()),
            nullifiers,
            verifier,
        }
    }

    /// Build an authority from configuration: loads circuit artifacts,
    /// pins the verifying-key digest, and opens the nullifier store.
    pub fn from_config(config: &AuthorityConfig) -> PickupResult<Self> {
        config.validate()?;

        let artifacts = CircuitArtifacts::load(&config.keys_dir)?;
        let verifier = Verifier::from_artifacts(&artifacts, config.expected_vk_digest.as_deref())?;

        let nullifiers: Arc<dyn NullifierStore> = match &config.nullifier_db_path {
            Some(path) => Arc::new(SledNullifierStore::open(path)?),
            None => Arc::new(MemoryNullifierStore::new()),
        };

        info!(vk_digest = %verifier.vk_digest(), "Authority initialized");
        Ok(Self::new(verifier, nullifiers))
    }

    /// Register a new package in `Registered` state.
    pub async fn register(&self, registration: PackageRegistration) -> PickupResult<()> {
        if registration.pickup_window <= chrono::Duration::zero() {
            return Err(PickupError::InputValidation(
                "Pickup window must be positive".into(),
            ));
        }
        if registration.min_age_required > AGE_MAX {
            return Err(PickupError::InputValidation(format!(
                "Minimum age {} out of range 0..={}",
                registration.min_age_required, AGE_MAX
            )));
        }

        let mut packages = self.packages.write().await;
        if let Some(existing) = packages.get(&registration.package_id) {
            return Err(PickupError::InvalidState {
                expected: PackageStatus::Registered,
                actual: existing.status,
            });
        }

        let now = chrono::Utc::now();
        let record = PackageRecord {
            package_id: registration.package_id.clone(),
            buyer_commitment: registration.buyer_commitment,
            claim_commitment: registration.claim_commitment,
            seller_commitment: registration.seller_commitment,
            store_commitment: None,
            store_address: registration.store_address,
            item_price: registration.item_price,
            shipping_fee: registration.shipping_fee,
            min_age_required: registration.min_age_required,
            created_at: now,
            expires_at: now + registration.pickup_window,
            status: PackageStatus::Registered,
        };

        info!(
            package_id = %record.package_id,
            store = %record.store_address.to_hex(),
            min_age = record.min_age_required,
            "Package registered"
        );
        packages.insert(registration.package_id, record);
        Ok(())
    }

    /// Store acknowledges physical receipt of the package. Derives the
    /// store commitment and moves the record to `StoreCommitted`.
    pub async fn generate_store_commitment(
        &self,
        package_id: &PackageId,
        caller: &StoreAddress,
        store_secret: Fr,
    ) -> PickupResult<CommitmentBytes> {
        let mut packages = self.packages.write().await;
        let record = packages
            .get_mut(package_id)
            .ok_or_else(|| PickupError::InputValidation("Unknown package id".into()))?;

        if caller != &record.store_address {
            warn!(package_id = %package_id, "Store commitment attempt by wrong store");
            return Err(PickupError::Unauthorized);
        }

        Self::apply_expiry(record)?;

        if record.status != PackageStatus::Registered {
            return Err(PickupError::InvalidState {
                expected: PackageStatus::Registered,
                actual: record.status,
            });
        }

        let commitment = derive(CommitmentInputs::Store {
            seller_commitment: &record.seller_commitment,
            store_secret,
            package_id,
        })?;

        record.store_commitment = Some(commitment);
        record.status = PackageStatus::StoreCommitted;
        info!(package_id = %package_id, "Package store-committed");
        Ok(commitment)
    }

    /// Authorize a pickup attempt. On success the nullifier is consumed
    /// permanently and the package is `PickedUp`.
    pub async fn authorize_pickup(
        &self,
        package_id: &PackageId,
        caller: &StoreAddress,
        proof: &PickupProof,
        signals: &PublicSignals,
    ) -> PickupResult<Nullifier> {
        let mut packages = self.packages.write().await;
        let record = packages
            .get_mut(package_id)
            .ok_or_else(|| PickupError::InputValidation("Unknown package id".into()))?;

        if caller != &record.store_address {
            warn!(package_id = %package_id, "Pickup attempt by wrong store");
            return Err(PickupError::Unauthorized);
        }

        Self::apply_expiry(record)?;

        if record.status != PackageStatus::StoreCommitted {
            return Err(PickupError::InvalidState {
                expected: PackageStatus::StoreCommitted,
                actual: record.status,
            });
        }

        if self.nullifiers.contains(&signals.nullifier)? {
            warn!(package_id = %package_id, "Nullifier already consumed");
            return Err(PickupError::NullifierReused);
        }

        // The signals must bind this package, this store, and the buyer's
        // claim commitment; a proof for any other statement is meaningless
        // here regardless of whether it verifies.
        if signals.package_id != record.package_id
            || signals.store_address != record.store_address
            || signals.min_age_required != record.min_age_required
            || signals.claim_commitment != record.claim_commitment
        {
            warn!(package_id = %package_id, "Public signals do not bind this package");
            return Err(PickupError::InvalidProof);
        }

        if !self.verifier.verify(proof, signals) {
            warn!(package_id = %package_id, "Proof verification failed");
            return Err(PickupError::InvalidProof);
        }
        debug!(package_id = %package_id, nullifier = %signals.nullifier.to_hex(), "Proof verified");

        if record.min_age_required > 0 && !signals.age_satisfied {
            warn!(package_id = %package_id, "Age requirement not satisfied");
            return Err(PickupError::AgeRequirementNotMet);
        }

        // Last line of defense against a concurrent duplicate: exactly one
        // insert wins.
        if !self.nullifiers.insert_unique(&signals.nullifier)? {
            warn!(package_id = %package_id, "Nullifier consumed concurrently");
            return Err(PickupError::NullifierReused);
        }

        record.status = PackageStatus::PickedUp;
        info!(package_id = %package_id, "Package picked up");
        Ok(signals.nullifier)
    }

    pub async fn get_package(&self, package_id: &PackageId) -> Option<PackageRecord> {
        self.packages.read().await.get(package_id).cloned()
    }

    /// Whether a pickup attempt could currently succeed (modulo proof).
    pub async fn can_pickup(&self, package_id: &PackageId) -> bool {
        match self.packages.read().await.get(package_id) {
            Some(record) => {
                record.status == PackageStatus::StoreCommitted
                    && !record.is_expired_at(chrono::Utc::now())
            }
            None => false,
        }
    }

    /// Transition an overdue non-terminal record to `Expired` and report
    /// the expiry as an error. No-op for records inside their window.
    fn apply_expiry(record: &mut PackageRecord) -> PickupResult<()> {
        if !record.status.is_terminal() && record.is_expired_at(chrono::Utc::now()) {
            record.status = PackageStatus::Expired;
            info!(package_id = %record.package_id, "Package expired");
            return Err(PickupError::PackageExpired);
        }
        Ok(())
    }
}
