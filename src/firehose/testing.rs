//! Builders for DAG-CBOR frames, CAR files and record blocks used by tests.

use std::collections::BTreeMap;

use ipld_core::cid::Cid;
use ipld_core::cid::multihash::Multihash;
use ipld_core::ipld::Ipld;
use iroh_car::{CarHeader, CarWriter};
use serde::de::DeserializeOwned;

use crate::domain::records::{POST_NSID, PostRecord};

const DAG_CBOR: u64 = 0x71;
const RAW: u64 = 0x55;
const SHA2_256: u64 = 0x12;
const CREATED_AT: &str = "2024-05-01T12:00:00.000Z";

pub(crate) fn text(s: &str) -> Ipld {
    Ipld::String(s.to_string())
}

pub(crate) fn ipld_map<const N: usize>(entries: [(&str, Ipld); N]) -> Ipld {
    Ipld::Map(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn cid_with(codec: u64, seed: u8) -> Cid {
    match Multihash::<64>::wrap(SHA2_256, &[seed; 32]) {
        Ok(hash) => Cid::new_v1(codec, hash),
        Err(err) => unreachable!("32-byte digests always fit: {err}"),
    }
}

/// A dag-cbor/sha2-256 CIDv1 whose digest is `seed` repeated.
pub(crate) fn cid_for(seed: u8) -> Cid {
    cid_with(DAG_CBOR, seed)
}

pub(crate) fn record_block(record: &Ipld) -> Vec<u8> {
    match serde_ipld_dagcbor::to_vec(record) {
        Ok(bytes) => bytes,
        Err(err) => unreachable!("ipld values always encode: {err}"),
    }
}

fn decode<T: DeserializeOwned>(record: &Ipld) -> T {
    match serde_ipld_dagcbor::from_slice(&record_block(record)) {
        Ok(value) => value,
        Err(err) => unreachable!("fixture should decode: {err}"),
    }
}

pub(crate) fn strong_ref(uri: &str) -> Ipld {
    ipld_map([("uri", text(uri)), ("cid", text(&cid_for(200).to_string()))])
}

fn blob(seed: u8) -> Ipld {
    ipld_map([
        ("$type", text("blob")),
        ("ref", Ipld::Link(cid_with(RAW, seed))),
        ("mimeType", text("image/jpeg")),
        ("size", Ipld::Integer(1024)),
    ])
}

/// An `app.bsky.embed.external` card, optionally with a thumbnail blob.
pub(crate) fn external_embed(thumb: bool) -> Ipld {
    let mut card = BTreeMap::from([
        ("uri".to_string(), text("https://example.com/story")),
        ("title".to_string(), text("Story")),
        ("description".to_string(), text("")),
    ]);
    if thumb {
        card.insert("thumb".to_string(), blob(1));
    }
    ipld_map([
        ("$type", text("app.bsky.embed.external")),
        ("external", Ipld::Map(card)),
    ])
}

/// An `app.bsky.embed.images` set of `count` images.
pub(crate) fn image_embed(count: u8) -> Ipld {
    let images = (0..count)
        .map(|i| ipld_map([("alt", text("")), ("image", blob(i))]))
        .collect();
    ipld_map([
        ("$type", text("app.bsky.embed.images")),
        ("images", Ipld::List(images)),
    ])
}

/// A post record value with optional embed.
pub(crate) fn post_ipld(body: &str, embed: Option<Ipld>) -> Ipld {
    let mut post = BTreeMap::from([
        ("$type".to_string(), text(POST_NSID)),
        ("text".to_string(), text(body)),
        ("createdAt".to_string(), text(CREATED_AT)),
    ]);
    if let Some(embed) = embed {
        post.insert("embed".to_string(), embed);
    }
    Ipld::Map(post)
}

pub(crate) fn post_record(body: &str, embed: Option<Ipld>) -> PostRecord {
    decode(&post_ipld(body, embed))
}

pub(crate) fn reply_post(body: &str, parent: &str, root: &str) -> PostRecord {
    let Ipld::Map(mut post) = post_ipld(body, None) else {
        unreachable!("post_ipld builds a map");
    };
    post.insert(
        "reply".to_string(),
        ipld_map([("parent", strong_ref(parent)), ("root", strong_ref(root))]),
    );
    decode(&Ipld::Map(post))
}

/// A CARv1 file holding `blocks`, rooted at the first block.
pub(crate) async fn car_bytes(blocks: &[(Cid, Vec<u8>)]) -> Vec<u8> {
    let roots = blocks.first().map(|(cid, _)| *cid).into_iter().collect();
    let mut out = Vec::new();
    let mut writer = CarWriter::new(CarHeader::new_v1(roots), &mut out);
    for (cid, data) in blocks {
        if let Err(err) = writer.write(*cid, data).await {
            unreachable!("in-memory CAR writes succeed: {err}");
        }
    }
    if let Err(err) = writer.finish().await {
        unreachable!("in-memory CAR flush succeeds: {err}");
    }
    out
}

pub(crate) fn frame_bytes(header: &Ipld, body: &Ipld) -> Vec<u8> {
    let mut out = record_block(header);
    out.extend(record_block(body));
    out
}

pub(crate) fn commit_frame(
    seq: i64,
    repo: &str,
    ops: &[(&str, &str, Option<Cid>)],
    car: Vec<u8>,
) -> Vec<u8> {
    let ops = ops
        .iter()
        .map(|(action, path, cid)| {
            ipld_map([
                ("action", text(action)),
                ("path", text(path)),
                ("cid", cid.map_or(Ipld::Null, Ipld::Link)),
            ])
        })
        .collect();
    frame_bytes(
        &ipld_map([("op", Ipld::Integer(1)), ("t", text("#commit"))]),
        &ipld_map([
            ("seq", Ipld::Integer(seq.into())),
            ("repo", text(repo)),
            ("rev", text("3l3qo2vutsw2b")),
            ("since", Ipld::Null),
            ("commit", Ipld::Link(cid_for(0))),
            ("rebase", Ipld::Bool(false)),
            ("tooBig", Ipld::Bool(false)),
            ("ops", Ipld::List(ops)),
            ("blocks", Ipld::Bytes(car)),
            ("blobs", Ipld::List(Vec::new())),
            ("time", text(CREATED_AT)),
        ]),
    )
}
