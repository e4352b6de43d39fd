//! Signed requests: the unit a caller submits to the ledger.
//!
//! The ledger authenticates the caller by the signature alone; a request
//! carries no other proof of who sent it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::{canonical_request_bytes, decode_request, signing_message, split_signed};
use crate::controller::Request;
use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::CoreError;

/// Content address of a signed request: Blake3 of its canonical bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub [u8; 32]);

impl RequestId {
    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// A request together with its caller and the caller's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    pub caller: Ed25519PublicKey,
    pub request: Request,
    pub signature: Ed25519Signature,
}

impl SignedRequest {
    /// Sign `request` as the holder of `keypair`.
    pub fn sign(keypair: &Keypair, request: Request) -> Self {
        let caller = keypair.public_key();
        let signature = keypair.sign(&signing_message(&caller, &request));
        Self {
            caller,
            request,
            signature,
        }
    }

    /// Check the signature against the caller's key.
    pub fn verify(&self) -> Result<(), CoreError> {
        self.caller
            .verify(&signing_message(&self.caller, &self.request), &self.signature)
    }

    /// Canonical bytes: `canonical_request || signature`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = canonical_request_bytes(&self.caller, &self.request);
        buf.extend_from_slice(&self.signature.0);
        buf
    }

    /// Parse canonical bytes. Does not verify the signature.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let (body, signature) = split_signed(bytes)?;
        let (caller, request) = decode_request(body)?;
        Ok(Self {
            caller,
            request,
            signature,
        })
    }

    /// The content address of this request.
    pub fn id(&self) -> RequestId {
        RequestId(Blake3Hash::hash(&self.to_bytes()).0)
    }
}
