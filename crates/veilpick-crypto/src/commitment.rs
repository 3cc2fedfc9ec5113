//! Commitment engine.
//!
//! Derives the three-link commitment chain binding buyer, seller, and
//! pickup point to a package:
//!
//! ```text
//! BuyerCommitment  = H(secret, nameHash, phoneSuffix, nonce)
//! SellerCommitment = H(BuyerCommitment, packageId, price, shippingFee,
//!                      pickupAddress, minAge)
//! StoreCommitment  = H(SellerCommitment, storeSecret, packageId)
//! ```
//!
//! The claim commitment H(secret, nameHash, phoneSuffix) is the binding
//! value the circuit is challenged against at pickup; the buyer publishes
//! it at enrollment alongside the chained commitment.
//!
//! All derivations are pure and deterministic. Out-of-range inputs are
//! rejected before they ever reach the hash function: the circuit enforces
//! the same ranges, and a mismatch between the two is a protocol bug, not a
//! proof failure.

use ark_bn254::Fr;
use ark_ff::UniformRand;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::poseidon::{fr_from_bytes, fr_to_bytes, hash_to_field, poseidon_hash_fields};
use veilpick_types::{
    CommitmentBytes, PackageId, PickupError, PickupResult, StoreAddress, AGE_MAX, FIELD_BYTES,
    PHONE_SUFFIX_MAX,
};

/// Private inputs for one commitment derivation.
pub enum CommitmentInputs<'a> {
    Buyer {
        secret: Fr,
        name_hash: Fr,
        phone_suffix: u16,
        nonce: Fr,
    },
    Claim {
        secret: Fr,
        name_hash: Fr,
        phone_suffix: u16,
    },
    Seller {
        buyer_commitment: &'a CommitmentBytes,
        package_id: &'a PackageId,
        item_price: u64,
        shipping_fee: u64,
        pickup_address: &'a StoreAddress,
        min_age: u8,
    },
    Store {
        seller_commitment: &'a CommitmentBytes,
        store_secret: Fr,
        package_id: &'a PackageId,
    },
}

/// Derive a commitment from its private inputs and prior chain link.
/// Pure function; identical inputs always yield identical output.
pub fn derive(inputs: CommitmentInputs<'_>) -> PickupResult<CommitmentBytes> {
    let value = match inputs {
        CommitmentInputs::Buyer {
            secret,
            name_hash,
            phone_suffix,
            nonce,
        } => {
            check_phone_suffix(phone_suffix)?;
            poseidon_hash_fields(&[secret, name_hash, Fr::from(phone_suffix as u64), nonce])
        }
        CommitmentInputs::Claim {
            secret,
            name_hash,
            phone_suffix,
        } => {
            check_phone_suffix(phone_suffix)?;
            poseidon_hash_fields(&[secret, name_hash, Fr::from(phone_suffix as u64)])
        }
        CommitmentInputs::Seller {
            buyer_commitment,
            package_id,
            item_price,
            shipping_fee,
            pickup_address,
            min_age,
        } => {
            check_age(min_age)?;
            poseidon_hash_fields(&[
                fr_from_bytes(buyer_commitment.as_bytes())?,
                package_id_field(package_id),
                Fr::from(item_price),
                Fr::from(shipping_fee),
                store_address_field(pickup_address),
                Fr::from(min_age as u64),
            ])
        }
        CommitmentInputs::Store {
            seller_commitment,
            store_secret,
            package_id,
        } => poseidon_hash_fields(&[
            fr_from_bytes(seller_commitment.as_bytes())?,
            store_secret,
            package_id_field(package_id),
        ]),
    };

    Ok(CommitmentBytes::from_bytes(fr_to_bytes(&value)))
}

/// Nullifier N = H(secret, packageId, nonce, storeAddress). Deterministic
/// for a given (secret, package) pair, unlinkable to the buyer commitment
/// without the secret.
pub fn derive_nullifier(
    secret: Fr,
    package_id: &PackageId,
    nonce: Fr,
    store_address: &StoreAddress,
) -> Fr {
    poseidon_hash_fields(&[
        secret,
        package_id_field(package_id),
        nonce,
        store_address_field(store_address),
    ])
}

/// Field encoding of a package identifier.
pub fn package_id_field(package_id: &PackageId) -> Fr {
    crate::poseidon::fr_from_bytes_reduced(&package_id.digest())
}

/// Field encoding of a store address (20 bytes, zero-extended LE).
pub fn store_address_field(addr: &StoreAddress) -> Fr {
    let mut bytes = [0u8; FIELD_BYTES];
    bytes[..addr.as_bytes().len()].copy_from_slice(addr.as_bytes());
    crate::poseidon::fr_from_bytes_reduced(&bytes)
}

/// Field encoding of a buyer's name.
pub fn name_hash_field(name: &str) -> Fr {
    hash_to_field(name.as_bytes())
}

pub(crate) fn check_phone_suffix(phone_suffix: u16) -> PickupResult<()> {
    if phone_suffix > PHONE_SUFFIX_MAX {
        return Err(PickupError::InputValidation(format!(
            "Phone suffix {} out of range 0..={}",
            phone_suffix, PHONE_SUFFIX_MAX
        )));
    }
    Ok(())
}

pub(crate) fn check_age(age: u8) -> PickupResult<()> {
    if age > AGE_MAX {
        return Err(PickupError::InputValidation(format!(
            "Age {} out of range 0..={}",
            age, AGE_MAX
        )));
    }
    Ok(())
}

/// Buyer-side enrollment material. Created once on the buyer's device;
/// the secret never leaves it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BuyerEnrollment {
    secret: [u8; FIELD_BYTES],
    nonce: [u8; FIELD_BYTES],
    name_hash: [u8; FIELD_BYTES],
    phone_suffix: u16,
}

impl BuyerEnrollment {
    /// Enroll a buyer: draws a fresh secret and nonce, hashes the name.
    pub fn new<R: rand::Rng + ?Sized>(
        rng: &mut R,
        name: &str,
        phone_suffix: u16,
    ) -> PickupResult<Self> {
        check_phone_suffix(phone_suffix)?;
        let secret = Fr::rand(rng);
        let nonce = Fr::rand(rng);
        Ok(Self {
            secret: fr_to_bytes(&secret),
            nonce: fr_to_bytes(&nonce),
            name_hash: fr_to_bytes(&name_hash_field(name)),
            phone_suffix,
        })
    }

    pub fn secret(&self) -> Fr {
        fr_from_bytes(&self.secret).expect("stored secret is canonical")
    }

    pub fn nonce(&self) -> Fr {
        fr_from_bytes(&self.nonce).expect("stored nonce is canonical")
    }

    pub fn name_hash(&self) -> Fr {
        fr_from_bytes(&self.name_hash).expect("stored name hash is canonical")
    }

    pub fn phone_suffix(&self) -> u16 {
        self.phone_suffix
    }

    /// Chained buyer commitment, stable across packages.
    pub fn buyer_commitment(&self) -> CommitmentBytes {
        derive(CommitmentInputs::Buyer {
            secret: self.secret(),
            name_hash: self.name_hash(),
            phone_suffix: self.phone_suffix,
            nonce: self.nonce(),
        })
        .expect("enrollment inputs were validated")
    }

    /// Commitment-binding value challenged by the circuit.
    pub fn claim_commitment(&self) -> CommitmentBytes {
        derive(CommitmentInputs::Claim {
            secret: self.secret(),
            name_hash: self.name_hash(),
            phone_suffix: self.phone_suffix,
        })
        .expect("enrollment inputs were validated")
    }
}

impl std::fmt::Debug for BuyerEnrollment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuyerEnrollment([REDACTED], suffix={})", self.phone_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::thread_rng;
    use std::collections::HashSet;

    fn enrollment() -> BuyerEnrollment {
        BuyerEnrollment::new(&mut thread_rng(), "Alice Example", 123).unwrap()
    }

    #[test]
    fn test_buyer_commitment_deterministic() {
        let e = enrollment();
        assert_eq!(e.buyer_commitment(), e.buyer_commitment());
        assert_eq!(e.claim_commitment(), e.claim_commitment());
        // Chained and claim commitments differ (nonce is absorbed only in
        // the chained one).
        assert_ne!(e.buyer_commitment(), e.claim_commitment());
    }

    #[test]
    fn test_distinct_buyers_distinct_commitments() {
        let mut seen = HashSet::new();
        for i in 0..64u16 {
            let e = BuyerEnrollment::new(&mut thread_rng(), "Bob", i % 1000).unwrap();
            assert!(seen.insert(*e.buyer_commitment().as_bytes()));
        }
    }

    #[test]
    fn test_phone_suffix_range_enforced() {
        let err = BuyerEnrollment::new(&mut thread_rng(), "Carol", 1000);
        assert!(matches!(err, Err(PickupError::InputValidation(_))));
    }

    #[test]
    fn test_seller_commitment_rejects_bad_age() {
        let e = enrollment();
        let result = derive(CommitmentInputs::Seller {
            buyer_commitment: &e.buyer_commitment(),
            package_id: &PackageId::new("PKG-1"),
            item_price: 2500,
            shipping_fee: 300,
            pickup_address: &StoreAddress::from_bytes([0x11; 20]),
            min_age: 151,
        });
        assert!(matches!(result, Err(PickupError::InputValidation(_))));
    }

    #[test]
    fn test_chain_links_depend_on_predecessor() {
        let e1 = enrollment();
        let e2 = enrollment();
        let pkg = PackageId::new("PKG-7");
        let addr = StoreAddress::from_bytes([0x22; 20]);

        let seller = |buyer: &CommitmentBytes| {
            derive(CommitmentInputs::Seller {
                buyer_commitment: buyer,
                package_id: &pkg,
                item_price: 100,
                shipping_fee: 5,
                pickup_address: &addr,
                min_age: 18,
            })
            .unwrap()
        };

        let s1 = seller(&e1.buyer_commitment());
        let s2 = seller(&e2.buyer_commitment());
        assert_ne!(s1, s2);

        let store1 = derive(CommitmentInputs::Store {
            seller_commitment: &s1,
            store_secret: Fr::from(7u64),
            package_id: &pkg,
        })
        .unwrap();
        let store2 = derive(CommitmentInputs::Store {
            seller_commitment: &s2,
            store_secret: Fr::from(7u64),
            package_id: &pkg,
        })
        .unwrap();
        assert_ne!(store1, store2);
    }

    #[test]
    fn test_nullifier_per_package() {
        let e = enrollment();
        let addr = StoreAddress::from_bytes([0x33; 20]);
        let n1 = derive_nullifier(e.secret(), &PackageId::new("PKG-1"), e.nonce(), &addr);
        let n2 = derive_nullifier(e.secret(), &PackageId::new("PKG-2"), e.nonce(), &addr);
        assert_ne!(n1, n2);

        let n1_again = derive_nullifier(e.secret(), &PackageId::new("PKG-1"), e.nonce(), &addr);
        assert_eq!(n1, n1_again);
    }

    proptest! {
        #[test]
        fn prop_valid_phone_suffix_accepted(suffix in 0u16..=999) {
            prop_assert!(check_phone_suffix(suffix).is_ok());
        }

        #[test]
        fn prop_invalid_phone_suffix_rejected(suffix in 1000u16..) {
            prop_assert!(check_phone_suffix(suffix).is_err());
        }

        #[test]
        fn prop_valid_age_accepted(age in 0u8..=150) {
            prop_assert!(check_age(age).is_ok());
        }

        #[test]
        fn prop_no_collisions_in_corpus(
            a in 0u16..1000, b in 0u16..1000,
        ) {
            prop_assume!(a != b);
            let secret = Fr::from(42u64);
            let name = Fr::from(77u64);
            let nonce = Fr::from(99u64);
            let ca = derive(CommitmentInputs::Buyer {
                secret, name_hash: name, phone_suffix: a, nonce,
            }).unwrap();
            let cb = derive(CommitmentInputs::Buyer {
                secret, name_hash: name, phone_suffix: b, nonce,
            }).unwrap();
            prop_assert_ne!(ca, cb);
        }
    }
}
