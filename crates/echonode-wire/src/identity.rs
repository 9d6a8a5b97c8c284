//! Node identity: an Ed25519 keypair and the peer ID derived from it.
//!
//! The peer ID is the SHA-256 digest of the 32-byte public key, rendered as
//! lowercase hex. It is a one-way function of the key, so a remote side can
//! check that a presented public key belongs to the ID it dialed, but cannot
//! recover the key from the ID alone.
//!
//! Keys come from the OS CSPRNG unless a nonzero seed is supplied, in which
//! case a ChaCha20 stream seeded from it makes the identity reproducible
//! across runs. Seeded identities are for tests and demos only.

use crate::error::WireError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Unique, collision-resistant identifier of a peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; 32]);

impl PeerId {
    /// Derive the peer ID for a public key.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let mut id = [0u8; 32];
        id.copy_from_slice(&Sha256::digest(key.as_bytes()));
        Self(id)
    }

    /// Whether `key` is the public key this ID was derived from.
    pub fn matches(&self, key: &VerifyingKey) -> bool {
        *self == Self::from_public_key(key)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

impl FromStr for PeerId {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| WireError::InvalidPeerId(s.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| WireError::InvalidPeerId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

/// The local node's keypair and peer ID.
///
/// Held for the lifetime of the process and never persisted; the signing
/// key is zeroized on drop.
pub struct Identity {
    signing_key: SigningKey,
    peer_id: PeerId,
}

impl Identity {
    /// Generate a new identity.
    ///
    /// `None` and `Some(0)` draw from the OS CSPRNG. Any other seed yields
    /// the same keypair every time it is used.
    pub fn generate(seed: Option<i64>) -> Result<Self, WireError> {
        let mut secret = Zeroizing::new([0u8; 32]);
        let filled = match seed {
            None | Some(0) => OsRng.try_fill_bytes(&mut secret[..]),
            Some(seed) => ChaCha20Rng::seed_from_u64(seed as u64).try_fill_bytes(&mut secret[..]),
        };
        filled.map_err(|e| WireError::KeyGeneration(e.to_string()))?;

        Ok(Self::from_signing_key(SigningKey::from_bytes(&secret)))
    }

    /// Wrap an existing signing key.
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let peer_id = PeerId::from_public_key(&signing_key.verifying_key());
        Self {
            signing_key,
            peer_id,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Hex-encoded public key, as carried in handshake frames.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key().as_bytes())
    }

    pub fn sign(&self, msg: &[u8]) -> Signature {
        self.signing_key.sign(msg)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}

/// Parse a hex-encoded Ed25519 public key.
pub fn decode_public_key(hex_key: &str) -> Result<VerifyingKey, WireError> {
    let bytes: [u8; 32] = hex::decode(hex_key)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| WireError::HandshakeFailed("invalid public key encoding".into()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| WireError::HandshakeFailed(format!("invalid public key: {e}")))
}

/// Verify a hex-encoded signature over `msg`.
pub fn verify_signature(key: &VerifyingKey, msg: &[u8], hex_sig: &str) -> bool {
    let Some(bytes) = hex::decode(hex_sig)
        .ok()
        .and_then(|b| <[u8; 64]>::try_from(b).ok())
    else {
        return false;
    };
    key.verify(msg, &Signature::from_bytes(&bytes)).is_ok()
}
