//! Commit → typed operations.

use super::validator::SchemaValidator;
use crate::domain::records::{FOLLOW_NSID, LIKE_NSID, POST_NSID, REPOST_NSID};
use crate::domain::{
    Commit, CreateOp, DeleteOp, IngestedRecord, OpAction, Operations, OperationsByType, RepoOp,
};
use crate::error::IngestError;
use crate::firehose::decode_record;

/// Partitions a commit's operations by collection.
///
/// Updates are ignored. A create is accepted only if its block is present in
/// the commit, decodes, and passes `validator`; otherwise that single
/// operation is dropped. Deletes are always accepted. Source order is kept
/// within each partition.
pub fn extract_operations<V: SchemaValidator>(commit: &Commit, validator: &V) -> OperationsByType {
    let mut ops = OperationsByType::default();
    for op in &commit.ops {
        match op.collection() {
            POST_NSID => collect(commit, op, validator, &mut ops.posts),
            REPOST_NSID => collect(commit, op, validator, &mut ops.reposts),
            LIKE_NSID => collect(commit, op, validator, &mut ops.likes),
            FOLLOW_NSID => collect(commit, op, validator, &mut ops.follows),
            _ => {}
        }
    }
    ops
}

fn collect<T, V>(commit: &Commit, op: &RepoOp, validator: &V, into: &mut Operations<T>)
where
    T: IngestedRecord,
    V: SchemaValidator,
{
    let uri = commit.record_uri(&op.path);
    match op.action {
        OpAction::Update => {}
        OpAction::Delete => into.deletes.push(DeleteOp { uri }),
        OpAction::Create => match decode_create(commit, op, validator) {
            Ok((cid, record)) => into.creates.push(CreateOp {
                uri,
                cid,
                author: commit.repo.clone(),
                record,
            }),
            Err(err) => {
                tracing::debug!(seq = commit.seq, %uri, error = %err, "dropping create");
            }
        },
    }
}

fn decode_create<T, V>(commit: &Commit, op: &RepoOp, validator: &V) -> Result<(String, T), IngestError>
where
    T: IngestedRecord,
    V: SchemaValidator,
{
    let cid = op
        .cid
        .ok_or_else(|| IngestError::Decode("create without cid".to_string()))?;
    let block = commit
        .blocks
        .get(&cid)
        .ok_or_else(|| IngestError::Decode(format!("block {cid} not in commit")))?;
    let record = decode_record(block)?;
    validator.validate(T::NSID, &record)?;
    let record = T::from_known(record)
        .ok_or_else(|| IngestError::Validation(format!("record is not a {}", T::NSID)))?;
    Ok((cid.to_string(), record))
}
