//! Binary encoding of values written to the [`CounterStore`](crate::traits::CounterStore).

use crate::error::StoreError;

/// Encode a value with the standard bincode configuration.
pub fn encode<T: bincode::Encode>(key: &str, value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::encode_to_vec(value, bincode::config::standard()).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Decode a value previously written by [`encode`].
pub fn decode<T: bincode::Decode<()>>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    let (value, _) = bincode::decode_from_slice(bytes, bincode::config::standard()).map_err(
        |e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        },
    )?;
    Ok(value)
}
