//! Canonical CBOR encoding.
//!
//! Index documents and rows are built from `BTreeMap`s, so serializing them
//! through ciborium yields identical bytes for identical content. That is what
//! reindex idempotence checks compare.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes any serializable value to CBOR bytes.
///
/// # Errors
///
/// Returns `CodecError::EncodingFailed` if the serializer rejects the value.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(out)
}

/// Decodes CBOR bytes produced by [`to_canonical_bytes`].
///
/// # Errors
///
/// Returns `CodecError::DecodingFailed` on malformed or mistyped input.
pub fn from_canonical_bytes<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn map_insertion_order_does_not_change_bytes() {
        let mut a = BTreeMap::new();
        a.insert("zeta".to_string(), Value::Integer(1));
        a.insert("alpha".to_string(), Value::Text("x".into()));

        let mut b = BTreeMap::new();
        b.insert("alpha".to_string(), Value::Text("x".into()));
        b.insert("zeta".to_string(), Value::Integer(1));

        assert_eq!(
            to_canonical_bytes(&a).unwrap(),
            to_canonical_bytes(&b).unwrap()
        );
    }

    #[test]
    fn decode_restores_values() {
        let mut row = HashMap::new();
        row.insert("weight".to_string(), Value::Float(2.5));
        row.insert("tags".to_string(), Value::List(vec!["a".into(), "b".into()]));

        let bytes = to_canonical_bytes(&row).unwrap();
        let back: HashMap<String, Value> = from_canonical_bytes(&bytes).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn garbage_is_rejected() {
        let result: CodecResult<Value> = from_canonical_bytes(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }
}
