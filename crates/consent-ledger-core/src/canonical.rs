//! Canonical CBOR encoding for ledger entries.
//!
//! RFC 8949 Core Deterministic Encoding: map keys sorted by encoded byte
//! comparison, smallest valid integer encodings, definite lengths only, no
//! floats. The same entry must produce identical bytes (and thus identical
//! hashes and signatures) on every platform, so the encoder is hand-rolled
//! rather than trusting a serde backend's defaults.
//!
//! The encoding covers the entry *minus hash and signature*; storage reads
//! entries back from typed columns, so no decoder is needed here.

use ciborium::value::Value;

use crate::action::ConsentAction;
use crate::entry::{UnsignedEntry, ENTRY_VERSION};

/// Entry field keys. Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const SEQ: u64 = 1;
    pub const CONSENT_ID: u64 = 2;
    pub const KIND: u64 = 3;
    pub const ACTION: u64 = 4;
    pub const USER_ID: u64 = 5;
    pub const TIMESTAMP: u64 = 6;
    pub const PREV_HASH: u64 = 7;
}

/// Action sub-map keys.
mod action_keys {
    pub const TYPE: u64 = 0;
    pub const RISK: u64 = 1;
    pub const DESCRIPTION: u64 = 2;
    pub const TARGET: u64 = 3;
}

/// Encode an unsigned entry to canonical CBOR bytes.
pub fn canonical_entry_bytes(entry: &UnsignedEntry) -> Vec<u8> {
    let value = entry_to_cbor_value(entry);
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value);
    buf
}

fn entry_to_cbor_value(entry: &UnsignedEntry) -> Value {
    let action_value = match &entry.action {
        Some(action) => action_to_cbor_value(action),
        None => Value::Null,
    };

    Value::Map(vec![
        (
            Value::Integer(keys::VERSION.into()),
            Value::Integer(ENTRY_VERSION.into()),
        ),
        (
            Value::Integer(keys::SEQ.into()),
            Value::Integer(entry.seq.into()),
        ),
        (
            Value::Integer(keys::CONSENT_ID.into()),
            Value::Bytes(entry.consent_id.as_bytes().to_vec()),
        ),
        (
            Value::Integer(keys::KIND.into()),
            Value::Integer(entry.kind.wire_code().into()),
        ),
        (Value::Integer(keys::ACTION.into()), action_value),
        (
            Value::Integer(keys::USER_ID.into()),
            Value::Text(entry.user_id.clone()),
        ),
        (
            Value::Integer(keys::TIMESTAMP.into()),
            Value::Integer(entry.timestamp.into()),
        ),
        (
            Value::Integer(keys::PREV_HASH.into()),
            Value::Bytes(entry.prev_hash.as_bytes().to_vec()),
        ),
    ])
}

fn action_to_cbor_value(action: &ConsentAction) -> Value {
    let target_value = match &action.target {
        Some(target) => Value::Text(target.clone()),
        None => Value::Null,
    };

    Value::Map(vec![
        (
            Value::Integer(action_keys::TYPE.into()),
            Value::Integer(action.action_type.wire_code().into()),
        ),
        (
            Value::Integer(action_keys::RISK.into()),
            Value::Integer(action.risk.wire_code().into()),
        ),
        (
            Value::Integer(action_keys::DESCRIPTION.into()),
            Value::Text(action.description.clone()),
        ),
        (Value::Integer(action_keys::TARGET.into()), target_value),
    ])
}

/// Recursively encode a CBOR value with deterministic rules.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Null => buf.push(0xf6),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        _ => unreachable!("value type not used in entry encoding"),
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

/// Encode an unsigned integer with the given major type, smallest form.
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

/// Encode a map (major type 5), keys sorted by encoded byte comparison.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ConsentActionType, RiskLevel};
    use crate::crypto::GENESIS_ANCHOR;
    use crate::entry::{EntryDraft, LedgerEntryKind};
    use crate::types::ConsentId;

    fn sample_unsigned(target: Option<&str>) -> UnsignedEntry {
        let mut action = ConsentAction::new(
            ConsentActionType::FormSubmit,
            RiskLevel::High,
            "Submit login form",
        );
        if let Some(t) = target {
            action = action.with_target(t);
        }
        EntryDraft::created(
            ConsentId::from_bytes([0x11; 16]),
            action,
            "user-1",
            1_736_870_400_000,
        )
        .at(0, GENESIS_ANCHOR)
    }

    #[test]
    fn test_encoding_deterministic() {
        let entry = sample_unsigned(Some("https://example.com/login"));
        assert_eq!(canonical_entry_bytes(&entry), canonical_entry_bytes(&entry));
    }

    #[test]
    fn test_encoding_sensitive_to_every_field() {
        let base = sample_unsigned(None);
        let base_bytes = canonical_entry_bytes(&base);

        let mut changed = base.clone();
        changed.seq = 1;
        assert_ne!(canonical_entry_bytes(&changed), base_bytes);

        let mut changed = base.clone();
        changed.user_id = "user-2".into();
        assert_ne!(canonical_entry_bytes(&changed), base_bytes);

        let mut changed = base.clone();
        changed.kind = LedgerEntryKind::Approved;
        assert_ne!(canonical_entry_bytes(&changed), base_bytes);

        let mut changed = base.clone();
        changed.timestamp += 1;
        assert_ne!(canonical_entry_bytes(&changed), base_bytes);
    }

    #[test]
    fn test_absent_target_differs_from_empty_target() {
        let without = canonical_entry_bytes(&sample_unsigned(None));
        let with_empty = canonical_entry_bytes(&sample_unsigned(Some("")));
        assert_ne!(without, with_empty);
    }

    #[test]
    fn test_map_header_and_key_order() {
        let entry = sample_unsigned(None);
        let bytes = canonical_entry_bytes(&entry);

        // Top-level map with 8 entries; first key is 0 (version), value 0.
        assert_eq!(bytes[0], 0xa8);
        assert_eq!(bytes[1], 0x00);
        assert_eq!(bytes[2], 0x00);
        // Second key is 1 (seq).
        assert_eq!(bytes[3], 0x01);
    }

    proptest::proptest! {
        #[test]
        fn prop_encoding_deterministic_for_any_entry(
            id in proptest::prelude::any::<[u8; 16]>(),
            seq in proptest::prelude::any::<u64>(),
            timestamp in 0i64..=4_102_444_800_000,
            user_id in "[a-z0-9-]{1,24}",
            description in ".{0,60}",
        ) {
            let action = ConsentAction::new(
                ConsentActionType::Download,
                RiskLevel::Low,
                description,
            );
            let entry = EntryDraft::created(
                ConsentId::from_bytes(id),
                action,
                user_id,
                timestamp,
            )
            .at(seq, GENESIS_ANCHOR);

            let bytes = canonical_entry_bytes(&entry);
            proptest::prop_assert_eq!(canonical_entry_bytes(&entry), bytes.clone());

            // The hand-rolled encoding must be valid CBOR that reads back
            // as exactly the value it was built from.
            let decoded: Value = ciborium::de::from_reader(&bytes[..]).unwrap();
            proptest::prop_assert_eq!(decoded, entry_to_cbor_value(&entry));
        }
    }

    #[test]
    fn test_smallest_integer_encoding() {
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
}
