// Copyright 2022 - 2024 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh
// -----
// Created Date: 2024/03/12 03:40:17

use lazy_static::lazy_static;
use xxhash_rust::xxh32::xxh32;

/// Hash seed of every name hash; value hashes are seeded with the name
/// hash instead.
pub(crate) const HASH_SEED: u32 = 0;

/// The entries of the static table (HPACK, Appendix A), 1-indexed on the
/// wire.
pub static STATIC_TABLE: &[(&str, &str)] = &[
    (":authority", ""),
    (":method", "GET"),
    (":method", "POST"),
    (":path", "/"),
    (":path", "/index.html"),
    (":scheme", "http"),
    (":scheme", "https"),
    (":status", "200"),
    (":status", "204"),
    (":status", "206"),
    (":status", "304"),
    (":status", "400"),
    (":status", "404"),
    (":status", "500"),
    ("accept-charset", ""),
    ("accept-encoding", "gzip, deflate"),
    ("accept-language", ""),
    ("accept-ranges", ""),
    ("accept", ""),
    ("access-control-allow-origin", ""),
    ("age", ""),
    ("allow", ""),
    ("authorization", ""),
    ("cache-control", ""),
    ("content-disposition", ""),
    ("content-encoding", ""),
    ("content-language", ""),
    ("content-length", ""),
    ("content-location", ""),
    ("content-range", ""),
    ("content-type", ""),
    ("cookie", ""),
    ("date", ""),
    ("etag", ""),
    ("expect", ""),
    ("expires", ""),
    ("from", ""),
    ("host", ""),
    ("if-match", ""),
    ("if-modified-since", ""),
    ("if-none-match", ""),
    ("if-range", ""),
    ("if-unmodified-since", ""),
    ("last-modified", ""),
    ("link", ""),
    ("location", ""),
    ("max-forwards", ""),
    ("proxy-authenticate", ""),
    ("proxy-authorization", ""),
    ("range", ""),
    ("referer", ""),
    ("refresh", ""),
    ("retry-after", ""),
    ("server", ""),
    ("set-cookie", ""),
    ("strict-transport-security", ""),
    ("transfer-encoding", ""),
    ("user-agent", ""),
    ("vary", ""),
    ("via", ""),
    ("www-authenticate", ""),
];

pub const STATIC_TABLE_SIZE: usize = 61;

/// Static indices whose value discriminates (the method/path/scheme/
/// status/accept-encoding cluster); a caller hint in this range is
/// verified against the value before the indexed form is used.
pub(crate) const LAST_DISCRIMINATING_INDEX: u32 = 16;

// The two lookup tables are keyed on disjoint 9-bit windows so a single
// (name_hash, nameval_hash) pair probes both.
const NAMEVAL_WIDTH: u32 = 9;
const NAMEVAL_SHIFT: u32 = 0;
const NAME_WIDTH: u32 = 9;
const NAME_SHIFT: u32 = 9;

lazy_static! {
    /// `NAME_HASH[i]` is `xxh32(name, HASH_SEED)` of the entry at wire
    /// index `i + 1`.
    pub(crate) static ref NAME_HASH: [u32; STATIC_TABLE_SIZE] = {
        let mut h = [0u32; STATIC_TABLE_SIZE];
        for (i, (name, _)) in STATIC_TABLE.iter().enumerate() {
            h[i] = xxh32(name.as_bytes(), HASH_SEED);
        }
        h
    };

    /// Perfect-hash table from a 9-bit slice of the name+value hash to a
    /// wire index, covering the entries with a non-empty value. 0 is
    /// "none".
    static ref NAMEVAL2ID: [u8; 1 << NAMEVAL_WIDTH] = {
        let mut m = [0u8; 1 << NAMEVAL_WIDTH];
        for (i, (_, val)) in STATIC_TABLE.iter().enumerate() {
            if val.is_empty() {
                continue;
            }
            let hash = xxh32(val.as_bytes(), NAME_HASH[i]);
            let slot = ((hash >> NAMEVAL_SHIFT) & ((1 << NAMEVAL_WIDTH) - 1)) as usize;
            if m[slot] == 0 {
                m[slot] = (i + 1) as u8;
            }
        }
        m
    };

    /// Perfect-hash table from a 9-bit slice of the name hash to the
    /// first wire index carrying that name. 0 is "none".
    static ref NAME2ID: [u8; 1 << NAME_WIDTH] = {
        let mut m = [0u8; 1 << NAME_WIDTH];
        for i in 0..STATIC_TABLE_SIZE {
            let slot = ((NAME_HASH[i] >> NAME_SHIFT) & ((1 << NAME_WIDTH) - 1)) as usize;
            if m[slot] == 0 {
                m[slot] = (i + 1) as u8;
            }
        }
        m
    };
}

/// Looks up a full (name, value) match, returning the wire index or 0.
pub(crate) fn lookup_static_nameval(nameval_hash: u32, name: &[u8], value: &[u8]) -> u32 {
    let slot = ((nameval_hash >> NAMEVAL_SHIFT) & ((1 << NAMEVAL_WIDTH) - 1)) as usize;
    let id = NAMEVAL2ID[slot];
    if id != 0 {
        let (n, v) = STATIC_TABLE[id as usize - 1];
        if n.as_bytes() == name && v.as_bytes() == value {
            return id as u32;
        }
    }
    0
}

/// Looks up a name-only match, returning the wire index or 0.
pub(crate) fn lookup_static_name(name_hash: u32, name: &[u8]) -> u32 {
    let slot = ((name_hash >> NAME_SHIFT) & ((1 << NAME_WIDTH) - 1)) as usize;
    let id = NAME2ID[slot];
    if id != 0 && STATIC_TABLE[id as usize - 1].0.as_bytes() == name {
        return id as u32;
    }
    0
}

/// Whether `name` equals the static name at wire index `id`.
pub(crate) fn name_matches(id: u32, name: &[u8]) -> bool {
    STATIC_TABLE[id as usize - 1].0.as_bytes() == name
}

/// Whether `value` equals the static value at wire index `id`.
pub(crate) fn value_matches(id: u32, value: &[u8]) -> bool {
    STATIC_TABLE[id as usize - 1].1.as_bytes() == value
}

/// Returns the static-table index of the header, preferring a full
/// (name, value) match over a name-only one; 0 when neither exists.
/// Useful for callers that want to hand the encoder a precomputed hint.
pub fn static_index_of(name: &[u8], value: &[u8]) -> u32 {
    let name_hash = xxh32(name, HASH_SEED);
    let nameval_hash = xxh32(value, name_hash);

    let id = lookup_static_nameval(nameval_hash, name, value);
    if id != 0 {
        return id;
    }
    lookup_static_name(name_hash, name)
}
