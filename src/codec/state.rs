//! Calldata for `appendStateBatch(bytes32[],uint256)`

use crate::error::{SubmitterError, SubmitterResult};

use ethers::abi::{self, Token};
use ethers::types::{Bytes, U256};

pub const APPEND_STATE_BATCH_SIGNATURE: &str = "appendStateBatch(bytes32[],uint256)";

/// Check every root is exactly 32 bytes. Nothing is padded or truncated.
pub fn validate_batch_roots(roots: &[Vec<u8>]) -> SubmitterResult<Vec<[u8; 32]>> {
    roots
        .iter()
        .enumerate()
        .map(|(index, root)| {
            <[u8; 32]>::try_from(root.as_slice()).map_err(|_| SubmitterError::InvalidBatchElement {
                index,
                length: root.len(),
            })
        })
        .collect()
}

pub fn append_state_batch_calldata(roots: &[[u8; 32]], should_start_at_element: u64) -> Bytes {
    let batch = roots
        .iter()
        .map(|root| Token::FixedBytes(root.to_vec()))
        .collect();

    let mut data = ethers::utils::id(APPEND_STATE_BATCH_SIGNATURE).to_vec();
    data.extend(abi::encode(&[
        Token::Array(batch),
        Token::Uint(U256::from(should_start_at_element)),
    ]));
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_must_be_32_bytes() {
        let ok = validate_batch_roots(&[vec![0x11; 32], vec![0x22; 32]]).unwrap();
        assert_eq!(ok, vec![[0x11; 32], [0x22; 32]]);

        for len in [0usize, 1, 31, 33, 64] {
            let err = validate_batch_roots(&[vec![0u8; 32], vec![0u8; len]]).unwrap_err();
            assert!(
                matches!(err, SubmitterError::InvalidBatchElement { index: 1, length } if length == len)
            );
        }
    }

    #[test]
    fn test_calldata_layout() {
        let root = [0xab; 32];
        let data = append_state_batch_calldata(&[root], 5);

        // selector, array offset, start index, array length, one root
        assert_eq!(data.len(), 4 + 32 * 4);
        assert_eq!(&data[..4], &ethers::utils::id(APPEND_STATE_BATCH_SIGNATURE));
        assert_eq!(U256::from_big_endian(&data[4..36]), U256::from(0x40));
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(5));
        assert_eq!(U256::from_big_endian(&data[68..100]), U256::from(1));
        assert_eq!(&data[100..132], &root);
    }
}
