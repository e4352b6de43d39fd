//! Canonical CBOR encoding for signed requests.
//!
//! Follows RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! Messages are encoded as 16 big-endian bytes rather than as integers so
//! that every message has one fixed-width representation.

use ciborium::value::Value;

use crate::controller::Request;
use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature};
use crate::error::CoreError;
use crate::merkle::{PathEntry, Witness, TREE_DEPTH};
use crate::types::Message;

/// The current request encoding version.
pub const REQUEST_VERSION: u8 = 0;

/// Request field keys (integer keys for compact encoding).
mod keys {
    pub const VERSION: u64 = 0;
    pub const CALLER: u64 = 1;
    pub const KIND: u64 = 2;
    pub const CANDIDATE: u64 = 3;
    pub const WITNESS: u64 = 4;
    pub const IDENTITY_WITNESS: u64 = 5;
    pub const MESSAGE: u64 = 6;
    pub const MESSAGE_WITNESS: u64 = 7;
}

/// Request kind discriminators.
mod kinds {
    pub const REGISTER_IDENTITY: u64 = 0;
    pub const DEPOSIT_MESSAGE: u64 = 1;
}

/// Encode a caller's request to canonical CBOR bytes.
pub fn canonical_request_bytes(caller: &Ed25519PublicKey, request: &Request) -> Vec<u8> {
    let value = request_to_cbor_value(caller, request);
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value);
    buf
}

/// The bytes a caller signs: domain prefix followed by the canonical request.
pub fn signing_message(caller: &Ed25519PublicKey, request: &Request) -> Vec<u8> {
    let mut buf = crate::crypto::domain::REQUEST.to_vec();
    buf.extend_from_slice(&canonical_request_bytes(caller, request));
    buf
}

/// Decode canonical request bytes.
///
/// Rejects input that is valid CBOR but not in canonical form.
pub fn decode_request(bytes: &[u8]) -> Result<(Ed25519PublicKey, Request), CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    let (caller, request) = cbor_value_to_request(&value)?;

    if canonical_request_bytes(&caller, &request) != bytes {
        return Err(CoreError::MalformedRequest("non-canonical encoding".into()));
    }
    Ok((caller, request))
}

/// Split `canonical_request || signature` as produced by
/// [`crate::envelope::SignedRequest::to_bytes`].
pub(crate) fn split_signed(bytes: &[u8]) -> Result<(&[u8], Ed25519Signature), CoreError> {
    if bytes.len() < 64 {
        return Err(CoreError::MalformedRequest("too short".into()));
    }
    let (body, sig) = bytes.split_at(bytes.len() - 64);
    let sig: [u8; 64] = sig
        .try_into()
        .map_err(|_| CoreError::MalformedRequest("invalid signature length".into()))?;
    Ok((body, Ed25519Signature(sig)))
}

fn uint(n: u64) -> Value {
    Value::Integer(n.into())
}

fn witness_to_cbor_value(witness: &Witness) -> Value {
    Value::Array(
        witness
            .path
            .iter()
            .map(|entry| {
                Value::Array(vec![
                    Value::Bytes(entry.sibling.0.to_vec()),
                    Value::Bool(entry.goes_left),
                ])
            })
            .collect(),
    )
}

fn request_to_cbor_value(caller: &Ed25519PublicKey, request: &Request) -> Value {
    let mut entries = vec![
        (uint(keys::VERSION), uint(REQUEST_VERSION.into())),
        (uint(keys::CALLER), Value::Bytes(caller.0.to_vec())),
    ];

    match request {
        Request::RegisterIdentity { candidate, witness } => {
            entries.push((uint(keys::KIND), uint(kinds::REGISTER_IDENTITY)));
            entries.push((uint(keys::CANDIDATE), Value::Bytes(candidate.0.to_vec())));
            entries.push((uint(keys::WITNESS), witness_to_cbor_value(witness)));
        }
        Request::DepositMessage {
            identity_witness,
            message,
            message_witness,
        } => {
            entries.push((uint(keys::KIND), uint(kinds::DEPOSIT_MESSAGE)));
            entries.push((
                uint(keys::IDENTITY_WITNESS),
                witness_to_cbor_value(identity_witness),
            ));
            entries.push((
                uint(keys::MESSAGE),
                Value::Bytes(message.value().to_be_bytes().to_vec()),
            ));
            entries.push((
                uint(keys::MESSAGE_WITNESS),
                witness_to_cbor_value(message_witness),
            ));
        }
    }

    Value::Map(entries)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        // Requests are built only from the variants above.
        _ => unreachable!("unsupported CBOR value in request encoding"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map canonically (major type 5), keys sorted by encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

fn malformed(what: &str) -> CoreError {
    CoreError::MalformedRequest(what.into())
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) => u64::try_from(i128::from(*i)).ok(),
        _ => None,
    }
}

fn as_array32(value: &Value) -> Option<[u8; 32]> {
    match value {
        Value::Bytes(b) => b.as_slice().try_into().ok(),
        _ => None,
    }
}

fn cbor_value_to_witness(value: &Value) -> Result<Witness, CoreError> {
    let levels = match value {
        Value::Array(levels) if levels.len() == TREE_DEPTH => levels,
        _ => return Err(malformed("witness must have one entry per level")),
    };

    let mut path = [PathEntry {
        sibling: Blake3Hash::ZERO,
        goes_left: true,
    }; TREE_DEPTH];
    for (entry, level) in path.iter_mut().zip(levels) {
        match level {
            Value::Array(pair) if pair.len() == 2 => {
                let sibling = as_array32(&pair[0]).ok_or_else(|| malformed("invalid sibling"))?;
                let goes_left = match pair[1] {
                    Value::Bool(b) => b,
                    _ => return Err(malformed("invalid direction")),
                };
                *entry = PathEntry {
                    sibling: Blake3Hash(sibling),
                    goes_left,
                };
            }
            _ => return Err(malformed("invalid witness entry")),
        }
    }
    Ok(Witness::new(path))
}

fn cbor_value_to_request(value: &Value) -> Result<(Ed25519PublicKey, Request), CoreError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(malformed("expected map")),
    };

    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| as_u64(k) == Some(key))
            .map(|(_, v)| v)
    };

    let version = get(keys::VERSION)
        .and_then(as_u64)
        .ok_or_else(|| malformed("missing version"))?;
    if version != u64::from(REQUEST_VERSION) {
        return Err(CoreError::MalformedRequest(format!(
            "unsupported version: {}",
            version
        )));
    }

    let caller = get(keys::CALLER)
        .and_then(as_array32)
        .map(Ed25519PublicKey)
        .ok_or_else(|| malformed("invalid caller"))?;

    let kind = get(keys::KIND)
        .and_then(as_u64)
        .ok_or_else(|| malformed("missing kind"))?;

    let request = match kind {
        kinds::REGISTER_IDENTITY => {
            let candidate = get(keys::CANDIDATE)
                .and_then(as_array32)
                .map(Ed25519PublicKey)
                .ok_or_else(|| malformed("invalid candidate"))?;
            let witness = get(keys::WITNESS)
                .ok_or_else(|| malformed("missing witness"))
                .and_then(cbor_value_to_witness)?;
            Request::RegisterIdentity { candidate, witness }
        }
        kinds::DEPOSIT_MESSAGE => {
            let identity_witness = get(keys::IDENTITY_WITNESS)
                .ok_or_else(|| malformed("missing identity witness"))
                .and_then(cbor_value_to_witness)?;
            let message = match get(keys::MESSAGE) {
                Some(Value::Bytes(b)) => {
                    let arr: [u8; 16] = b
                        .as_slice()
                        .try_into()
                        .map_err(|_| malformed("invalid message"))?;
                    Message::new(u128::from_be_bytes(arr))
                }
                _ => return Err(malformed("missing message")),
            };
            let message_witness = get(keys::MESSAGE_WITNESS)
                .ok_or_else(|| malformed("missing message witness"))
                .and_then(cbor_value_to_witness)?;
            Request::DepositMessage {
                identity_witness,
                message,
                message_witness,
            }
        }
        other => {
            return Err(CoreError::MalformedRequest(format!(
                "unknown request kind: {}",
                other
            )))
        }
    };

    Ok((caller, request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn register() -> (Ed25519PublicKey, Request) {
        let admin = Keypair::from_seed(&[0x42; 32]).public_key();
        let request = Request::RegisterIdentity {
            candidate: Keypair::from_seed(&[0x43; 32]).public_key(),
            witness: Witness::for_empty_tree(7),
        };
        (admin, request)
    }

    fn deposit() -> (Ed25519PublicKey, Request) {
        let caller = Keypair::from_seed(&[0x43; 32]).public_key();
        let request = Request::DepositMessage {
            identity_witness: Witness::for_empty_tree(7),
            message: Message::new(123_423_432_423_423_434_100_000),
            message_witness: Witness::for_empty_tree(7),
        };
        (caller, request)
    }

    #[test]
    fn test_encoding_deterministic() {
        let (caller, request) = deposit();
        assert_eq!(
            canonical_request_bytes(&caller, &request),
            canonical_request_bytes(&caller, &request)
        );
    }

    #[test]
    fn test_request_roundtrip() {
        for (caller, request) in [register(), deposit()] {
            let bytes = canonical_request_bytes(&caller, &request);
            let (decoded_caller, decoded) = decode_request(&bytes).unwrap();
            assert_eq!(decoded_caller, caller);
            assert_eq!(decoded, request);
        }
    }

    #[test]
    fn test_kinds_encode_differently() {
        let (caller, request) = register();
        let (_, other) = deposit();
        assert_ne!(
            canonical_request_bytes(&caller, &request),
            canonical_request_bytes(&caller, &other)
        );
    }

    #[test]
    fn test_signing_message_is_domain_prefixed() {
        let (caller, request) = register();
        let msg = signing_message(&caller, &request);
        assert!(msg.starts_with(crate::crypto::domain::REQUEST));
        assert!(msg.ends_with(&canonical_request_bytes(&caller, &request)));
    }

    #[test]
    fn test_map_header_and_key_order() {
        let (caller, request) = register();
        let bytes = canonical_request_bytes(&caller, &request);
        // Five entries, keys 0..=4 in order.
        assert_eq!(bytes[0], 0xa5);
        assert_eq!(bytes[1], 0x00); // key 0
        assert_eq!(bytes[2], 0x00); // version 0
        assert_eq!(bytes[3], 0x01); // key 1
        assert_eq!(bytes[4], 0x58); // bytes, 1-byte length
        assert_eq!(bytes[5], 32);
    }

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);
    }

    #[test]
    fn test_non_canonical_rejected() {
        // Map with keys out of order: {1: h'', 0: 0}
        let bytes = [0xa2, 0x01, 0x40, 0x00, 0x00];
        assert!(decode_request(&bytes).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            decode_request(&[0xff, 0x00]),
            Err(CoreError::DecodingError(_))
        ));
        assert!(split_signed(&[0u8; 10]).is_err());
    }
}
