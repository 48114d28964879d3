//! `subscribeRepos` frame decoding.
//!
//! Each websocket binary message holds two concatenated DAG-CBOR items: a
//! header `{op, t}` and a body. `op = 1` is a message whose type is named
//! by `t`; `op = -1` is an error frame, after which the server closes.

use std::io::Cursor;

use atrium_api::com::atproto::sync::subscribe_repos;
use ipld_core::ipld::Ipld;
use serde::Deserialize;
use serde_ipld_dagcbor::DecodeError;

use super::car::read_car;
use crate::domain::{BlockMap, Commit, OpAction, RepoEvent, RepoOp};
use crate::error::IngestError;

const OP_MESSAGE: i64 = 1;
const OP_ERROR: i64 = -1;
const COMMIT_TYPE: &str = "#commit";

/// A decoded websocket frame.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A stream event.
    Event(RepoEvent),
    /// Server-side error; the connection is about to close.
    Error {
        /// Error name (e.g. `FutureCursor`, `ConsumerTooSlow`).
        error: String,
        /// Optional description.
        message: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct FrameHeader {
    op: i64,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OtherBody {
    #[serde(default)]
    seq: Option<i64>,
}

/// Decodes one binary websocket message.
///
/// # Errors
///
/// Returns [`IngestError::Decode`] if the message is not a header/body
/// pair, the header has an unknown `op`, or a commit body does not match
/// the `#commit` schema.
pub async fn decode_frame(bytes: &[u8]) -> Result<Frame, IngestError> {
    let (header, body) = split_frame(bytes)?;
    let header: FrameHeader = serde_ipld_dagcbor::from_slice(header)
        .map_err(|e| IngestError::Decode(format!("frame header: {e}")))?;

    match header.op {
        OP_ERROR => {
            let body: ErrorBody = decode_body(body)?;
            Ok(Frame::Error {
                error: body.error.unwrap_or_else(|| "Unknown".to_string()),
                message: body.message,
            })
        }
        OP_MESSAGE => {
            let kind = header.t.unwrap_or_default();
            if kind == COMMIT_TYPE {
                let commit = decode_body(body)?;
                Ok(Frame::Event(RepoEvent::Commit(into_commit(commit).await)))
            } else {
                let body: OtherBody = decode_body(body)?;
                Ok(Frame::Event(RepoEvent::Other {
                    kind: kind.trim_start_matches('#').to_string(),
                    seq: body.seq,
                }))
            }
        }
        op => Err(IngestError::Decode(format!("unknown frame op {op}"))),
    }
}

/// Splits a frame at the end of its header item.
fn split_frame(bytes: &[u8]) -> Result<(&[u8], &[u8]), IngestError> {
    let mut cursor = Cursor::new(bytes);
    match serde_ipld_dagcbor::from_reader::<Ipld, _>(&mut cursor) {
        Err(DecodeError::TrailingData) => usize::try_from(cursor.position())
            .ok()
            .and_then(|at| bytes.split_at_checked(at))
            .ok_or_else(|| IngestError::Decode("frame header overruns message".to_string())),
        Ok(_) => Err(IngestError::Decode("frame without body".to_string())),
        Err(err) => Err(IngestError::Decode(format!("frame header: {err}"))),
    }
}

fn decode_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, IngestError> {
    serde_ipld_dagcbor::from_slice(body).map_err(|e| IngestError::Decode(format!("frame body: {e}")))
}

/// Maps a `#commit` body to a [`Commit`]. Operations with an unknown action
/// are skipped. An unreadable block set leaves the commit without blocks,
/// so its deletes still apply while its creates are dropped.
async fn into_commit(commit: subscribe_repos::Commit) -> Commit {
    let subscribe_repos::CommitData {
        seq,
        repo,
        ops,
        blocks,
        ..
    } = commit.data;

    let blocks = if blocks.is_empty() {
        BlockMap::new()
    } else {
        match read_car(&blocks).await {
            Ok(blocks) => blocks,
            Err(err) => {
                tracing::warn!(seq, error = %err, "unreadable block set, keeping deletes only");
                BlockMap::new()
            }
        }
    };

    let ops = ops
        .into_iter()
        .filter_map(|op| {
            let Some(action) = OpAction::parse(&op.action) else {
                tracing::debug!(seq, action = %op.action, "skipping op with unknown action");
                return None;
            };
            Some(RepoOp {
                action,
                path: op.data.path,
                cid: op.data.cid.map(|link| link.0),
            })
        })
        .collect();

    Commit {
        seq,
        repo: repo.as_str().to_string(),
        ops,
        blocks,
    }
}
