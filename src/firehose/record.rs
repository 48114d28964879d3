//! Record block decoding.

use atrium_api::record::KnownRecord;

use crate::error::IngestError;

/// Decodes one DAG-CBOR record block into the lexicon record named by its
/// `$type`.
///
/// # Errors
///
/// Returns [`IngestError::Decode`] if the block is not DAG-CBOR, its
/// `$type` is not a known record type, or its fields do not match that
/// type.
pub fn decode_record(bytes: &[u8]) -> Result<KnownRecord, IngestError> {
    serde_ipld_dagcbor::from_slice(bytes)
        .map_err(|e| IngestError::Decode(format!("record block: {e}")))
}
