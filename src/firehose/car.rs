//! CARv1 block sets.
//!
//! A commit's `blocks` field is a CAR file holding the record blocks its
//! operations reference.

use iroh_car::CarReader;

use crate::domain::BlockMap;
use crate::error::IngestError;

/// Reads every block of a CARv1 byte string into a [`BlockMap`].
///
/// # Errors
///
/// Returns [`IngestError::Decode`] if the header is invalid or a block
/// section is truncated.
pub async fn read_car(bytes: &[u8]) -> Result<BlockMap, IngestError> {
    let mut reader = CarReader::new(bytes)
        .await
        .map_err(|e| IngestError::Decode(format!("CAR header: {e}")))?;
    let mut blocks = BlockMap::new();
    while let Some((cid, data)) = reader
        .next_block()
        .await
        .map_err(|e| IngestError::Decode(format!("CAR block: {e}")))?
    {
        blocks.insert(cid, data);
    }
    Ok(blocks)
}
