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
// Created Date: 2024/03/13 02:19:08

use algorithm::buf::BtMut;
use xxhash_rust::xxh32::xxh32;

use crate::header_index::HeaderIndex;
use crate::huffman;
use crate::integer::encode_int;
use crate::static_table::{
    lookup_static_name, lookup_static_nameval, name_matches, value_matches, HASH_SEED,
    LAST_DISCRIMINATING_INDEX, NAME_HASH, STATIC_TABLE_SIZE,
};
use crate::{HpackError, HpackResult, MAX_HEADER_FIELD_LEN};

/// How a header may enter the dynamic table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPolicy {
    /// Literal with incremental indexing: the header enters both
    /// dynamic tables.
    Add,
    /// Literal without indexing.
    NoIndex,
    /// Literal never indexed; intermediaries must preserve this.
    Never,
}

/// What the lookup pass learned about one header.
struct Lookup {
    table_id: u32,
    val_matched: bool,
    name_hash: u32,
    nameval_hash: u32,
    static_name_id: u32,
}

/// Encodes header fields into the HPACK wire format, maintaining the
/// compression state of one direction of a connection.
///
/// Every `encode_header` call is all-or-nothing: on any error the bytes
/// written so far are not accounted to the caller and the dynamic table
/// and emission history are left untouched.
pub struct Encoder {
    index: HeaderIndex,
    use_huffman: bool,
}

impl Encoder {
    pub fn new() -> Encoder {
        Encoder {
            index: HeaderIndex::new(),
            use_huffman: true,
        }
    }

    /// Current byte size of the dynamic table.
    pub fn get_table_size(&self) -> usize {
        self.index.get_size()
    }

    /// Maximum byte size of the dynamic table.
    pub fn get_max_capacity(&self) -> usize {
        self.index.get_max_size()
    }

    /// Number of live dynamic-table entries.
    pub fn table_len(&self) -> usize {
        self.index.len()
    }

    /// Live dynamic-table entries oldest-first, with the HPACK index
    /// each would encode at right now.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8], u32)> {
        self.index.iter()
    }

    /// Changes the maximum dynamic-table size, evicting oldest entries
    /// as needed. No size-update directive is emitted; HTTP/2 peers
    /// learn the size through SETTINGS instead.
    pub fn set_max_capacity(&mut self, max_capacity: usize) {
        log::trace!("HPACK: 更新动态表大小; max={}", max_capacity);
        self.index.set_max_size(max_capacity);
    }

    /// Turns the recent-emission history on or off. With the history
    /// on, a header is not added to the dynamic table until it has been
    /// seen to recur; this trades the first occurrence's size for not
    /// churning the table with one-shot headers.
    pub fn set_use_history(&mut self, on: bool) {
        self.index.set_use_hist(on);
    }

    pub fn is_history_used(&self) -> bool {
        self.index.hist_used()
    }

    /// Disables the Huffman coding of string literals; raw octets are
    /// emitted instead. The stream stays valid either way.
    pub fn set_use_huffman(&mut self, on: bool) {
        self.use_huffman = on;
    }

    /// Encodes one header field into the front of `dst`, returning the
    /// number of octets written.
    ///
    /// `hint` may carry the static-table index the caller already knows
    /// for this header (0 for none); it saves the table probes but never
    /// changes the wire outcome. A stale or wrong hint is ignored.
    pub fn encode_header(
        &mut self,
        name: &[u8],
        value: &[u8],
        hint: u32,
        policy: IndexPolicy,
        dst: &mut [u8],
    ) -> HpackResult<usize> {
        if name.len() > MAX_HEADER_FIELD_LEN || value.len() > MAX_HEADER_FIELD_LEN {
            return Err(HpackError::HeaderTooLarge);
        }
        if dst.is_empty() {
            return Err(HpackError::NotEnoughSpace);
        }

        let lookup = self.find_table_id(name, value, hint);

        let mut policy = policy;
        if self.index.hist_used()
            && policy == IndexPolicy::Add
            && !self.index.hist_seen(lookup.nameval_hash)
            && self.index.hist_wrapped()
        {
            // No evidence yet that this header recurs.
            policy = IndexPolicy::NoIndex;
        }

        let mut pos;
        if lookup.table_id > 0 {
            if lookup.val_matched {
                let n = encode_int(lookup.table_id, 7, 0x80, dst)?;
                self.index.hist_push(lookup.nameval_hash);
                return Ok(n);
            }
            let (first, prefix_bits) = match policy {
                IndexPolicy::Add => (0x40, 6),
                IndexPolicy::NoIndex => (0x00, 4),
                IndexPolicy::Never => (0x10, 4),
            };
            pos = encode_int(lookup.table_id, prefix_bits, first, dst)?;
        } else {
            dst[0] = match policy {
                IndexPolicy::Add => 0x40,
                IndexPolicy::NoIndex => 0x00,
                IndexPolicy::Never => 0x10,
            };
            pos = 1;
            pos += self.encode_str(name, &mut dst[pos..])?;
        }

        pos += self.encode_str(value, &mut dst[pos..])?;

        if policy == IndexPolicy::Add {
            self.index.push(
                name,
                value,
                lookup.name_hash,
                lookup.nameval_hash,
                lookup.static_name_id != 0,
            );
        }
        self.index.hist_push(lookup.nameval_hash);
        Ok(pos)
    }

    /// Encodes a sequence of headers with the `Add` policy, appending
    /// the block to `dst`.
    pub fn encode_into<'b, B, I>(&mut self, headers: I, dst: &mut B) -> HpackResult<usize>
    where
        B: BtMut,
        I: IntoIterator<Item = &'b (Vec<u8>, Vec<u8>)>,
    {
        let mut size = 0;
        for (name, value) in headers {
            let mut scratch = vec![0u8; name.len() + value.len() + 16];
            let n = self.encode_header(name, value, 0, IndexPolicy::Add, &mut scratch)?;
            dst.put_slice(&scratch[..n]);
            size += n;
        }
        log::trace!("HPACK: 编码头块完成; len={}", size);
        Ok(size)
    }

    /// The selection pass: static full match, dynamic full match, static
    /// name, dynamic name, in that order, first hit winning.
    fn find_table_id(&self, name: &[u8], value: &[u8], hint: u32) -> Lookup {
        let mut lookup = Lookup {
            table_id: 0,
            val_matched: false,
            name_hash: 0,
            nameval_hash: 0,
            static_name_id: 0,
        };

        // The hint is advisory: it is used only after the name proves to
        // be the hinted entry's, and then only spares the name hashing,
        // so a stale or wrong hint cannot change the wire outcome.
        if hint > 0 && hint <= STATIC_TABLE_SIZE as u32 && name_matches(hint, name) {
            if hint <= LAST_DISCRIMINATING_INDEX && value_matches(hint, value) {
                lookup.table_id = hint;
                lookup.val_matched = true;
                lookup.static_name_id = hint;
                return lookup;
            }
            lookup.name_hash = NAME_HASH[hint as usize - 1];
            lookup.static_name_id = hint;
        } else {
            lookup.name_hash = xxh32(name, HASH_SEED);
        }
        lookup.nameval_hash = xxh32(value, lookup.name_hash);
        let id = lookup_static_nameval(lookup.nameval_hash, name, value);
        if id != 0 {
            lookup.table_id = id;
            lookup.val_matched = true;
            lookup.static_name_id = id;
            return lookup;
        }

        if let Some(index) = self.index.find_nameval(lookup.nameval_hash, name, value) {
            lookup.table_id = index;
            lookup.val_matched = true;
            return lookup;
        }

        lookup.static_name_id = lookup_static_name(lookup.name_hash, name);
        if lookup.static_name_id != 0 {
            lookup.table_id = lookup.static_name_id;
            return lookup;
        }

        if let Some(index) = self.index.find_name(lookup.name_hash, name) {
            lookup.table_id = index;
            return lookup;
        }

        lookup
    }

    /// Emits a string literal, Huffman-coded when that is enabled and no
    /// longer than the raw octets.
    ///
    /// The length octet is written on the guess that the payload stays
    /// under 127 octets; when a Huffman payload outgrows that, the
    /// payload is shifted to make room for the multi-octet length.
    fn encode_str(&self, src: &[u8], dst: &mut [u8]) -> HpackResult<usize> {
        if dst.is_empty() {
            return Err(HpackError::NotEnoughSpace);
        }
        let mut size_buf = [0u8; 4];

        let huff_len = if !self.use_huffman {
            None
        } else if dst.len() > 1 {
            huffman::encode_to(src, &mut dst[1..])
        } else {
            Some(0)
        };

        match huff_len {
            Some(n) if n > 0 && n <= src.len() => {
                if n < 127 {
                    dst[0] = 0x80 | n as u8;
                    return Ok(1 + n);
                }
                let size_len = encode_int(n as u32, 7, 0x80, &mut size_buf)?;
                if size_len + n > dst.len() {
                    return Err(HpackError::NotEnoughSpace);
                }
                dst.copy_within(1..1 + n, size_len);
                dst[..size_len].copy_from_slice(&size_buf[..size_len]);
                Ok(size_len + n)
            }
            _ => {
                if src.len() < 127 {
                    if 1 + src.len() > dst.len() {
                        return Err(HpackError::NotEnoughSpace);
                    }
                    dst[0] = src.len() as u8;
                    dst[1..1 + src.len()].copy_from_slice(src);
                    return Ok(1 + src.len());
                }
                let size_len = encode_int(src.len() as u32, 7, 0x00, &mut size_buf)?;
                if size_len + src.len() > dst.len() {
                    return Err(HpackError::NotEnoughSpace);
                }
                dst[size_len..size_len + src.len()].copy_from_slice(src);
                dst[..size_len].copy_from_slice(&size_buf[..size_len]);
                Ok(size_len + src.len())
            }
        }
    }
}

impl Default for Encoder {
    fn default() -> Encoder {
        Encoder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(enc: &mut Encoder, name: &[u8], value: &[u8], policy: IndexPolicy) -> Vec<u8> {
        let mut buf = [0u8; 4096];
        let n = enc.encode_header(name, value, 0, policy, &mut buf).unwrap();
        buf[..n].to_vec()
    }

    #[test]
    fn test_encode_static_full_match() {
        let mut enc = Encoder::new();
        let out = encode(&mut enc, b":method", b"GET", IndexPolicy::Add);
        assert_eq!(out, vec![0x82]);
        assert_eq!(enc.table_len(), 0);
        assert_eq!(enc.get_table_size(), 0);
    }

    #[test]
    fn test_encode_static_name_match() {
        let mut enc = Encoder::new();
        enc.set_use_huffman(false);
        let out = encode(&mut enc, b":path", b"/sample/path", IndexPolicy::Add);
        let mut expect = vec![0x44, 0x0c];
        expect.extend_from_slice(b"/sample/path");
        assert_eq!(out, expect);
        assert_eq!(enc.table_len(), 1);
        assert_eq!(enc.get_table_size(), 44);
    }

    #[test]
    fn test_encode_literal_name() {
        let mut enc = Encoder::new();
        enc.set_use_huffman(false);
        let out = encode(&mut enc, b"custom-key", b"custom-header", IndexPolicy::Add);
        let mut expect = vec![0x40, 0x0a];
        expect.extend_from_slice(b"custom-key");
        expect.push(0x0d);
        expect.extend_from_slice(b"custom-header");
        assert_eq!(out, expect);

        // Index 62 now refers to the new entry.
        let out = encode(&mut enc, b"custom-key", b"custom-header", IndexPolicy::Add);
        assert_eq!(out, vec![0xbe]);
        assert_eq!(enc.iter().next().map(|(_, _, index)| index), Some(62));
    }

    #[test]
    fn test_encode_no_index_forms() {
        let mut enc = Encoder::new();
        enc.set_use_huffman(false);
        let out = encode(&mut enc, b":path", b"/x", IndexPolicy::NoIndex);
        assert_eq!(out, vec![0x04, 0x02, b'/', b'x']);
        let out = encode(&mut enc, b":path", b"/x", IndexPolicy::Never);
        assert_eq!(out, vec![0x14, 0x02, b'/', b'x']);
        assert_eq!(enc.table_len(), 0);
    }

    #[test]
    fn test_encode_hint_paths() {
        let mut enc = Encoder::new();
        enc.set_use_huffman(false);
        // Value matches inside the discriminating cluster: indexed form.
        let mut buf = [0u8; 64];
        let n = enc.encode_header(b":method", b"GET", 2, IndexPolicy::Add, &mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x82]);
        // Value differs: falls back to the canonical name index.
        let n = enc.encode_header(b":method", b"PATCH", 2, IndexPolicy::NoIndex, &mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x02, 0x05, b'P', b'A', b'T', b'C', b'H']);
    }

    #[test]
    fn test_encode_wrong_hint_ignored() {
        // A hint naming a different header must not leak its index onto
        // the wire; the encoder recomputes as if no hint were given.
        let mut with_hint = Encoder::new();
        let mut without = Encoder::new();
        let mut buf = [0u8; 64];
        let n = with_hint
            .encode_header(b"x-custom", b"GET", 2, IndexPolicy::NoIndex, &mut buf)
            .unwrap();
        let hinted = buf[..n].to_vec();
        let n = without
            .encode_header(b"x-custom", b"GET", 0, IndexPolicy::NoIndex, &mut buf)
            .unwrap();
        assert_eq!(hinted, &buf[..n]);
        assert_ne!(hinted, vec![0x82]);

        // A stale hint (right name family, wrong entry) still encodes the
        // actual header.
        let n = with_hint
            .encode_header(b":status", b"204", 14, IndexPolicy::Add, &mut buf)
            .unwrap();
        assert_eq!(&buf[..n], &[0x89]);
    }

    #[test]
    fn test_encode_failure_is_transactional() {
        let mut enc = Encoder::new();
        let mut small = [0u8; 4];
        let err = enc.encode_header(b"custom-key", b"custom-header", 0, IndexPolicy::Add, &mut small);
        assert_eq!(err, Err(HpackError::NotEnoughSpace));
        assert_eq!(enc.table_len(), 0);
        assert_eq!(enc.get_table_size(), 0);
    }

    #[test]
    fn test_encode_eviction_on_shrink() {
        let mut enc = Encoder::new();
        enc.set_use_huffman(false);
        for i in 0..6u32 {
            encode(&mut enc, format!("x-h{}", i).as_bytes(), b"v", IndexPolicy::Add);
        }
        assert_eq!(enc.table_len(), 6);
        enc.set_max_capacity(3 * 37);
        assert_eq!(enc.table_len(), 3);
        // Survivors are the newest three, still a contiguous suffix.
        let names: Vec<Vec<u8>> = enc.iter().map(|(n, _, _)| n.to_vec()).collect();
        assert_eq!(names, vec![b"x-h3".to_vec(), b"x-h4".to_vec(), b"x-h5".to_vec()]);
    }

    #[test]
    fn test_encode_wraparound_equivalence() {
        // The default id counter starts just below the wrap; a counter
        // starting at zero must produce identical bytes.
        let mut near_wrap = Encoder::new();
        let mut from_zero = Encoder::new();
        from_zero.index.next_id = 0;
        let mut headers = Vec::new();
        for i in 0..12u32 {
            headers.push((format!("x-h{}", i % 6).into_bytes(), format!("v{}", i % 3).into_bytes()));
        }
        for (name, value) in &headers {
            let a = encode(&mut near_wrap, name, value, IndexPolicy::Add);
            let b = encode(&mut from_zero, name, value, IndexPolicy::Add);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_encode_history_downgrade() {
        let mut enc = Encoder::new();
        enc.set_use_history(true);
        // Until the ring wraps, Add inserts as usual.
        encode(&mut enc, b"x-once", b"1", IndexPolicy::Add);
        assert_eq!(enc.table_len(), 1);

        // Wrap the ring with unique headers, then a fresh header must
        // not be inserted on first sight.
        for i in 0..64u32 {
            encode(&mut enc, format!("x-fill-{}", i).as_bytes(), b"v", IndexPolicy::Add);
        }
        let before = enc.table_len();
        encode(&mut enc, b"x-fresh", b"1", IndexPolicy::Add);
        assert_eq!(enc.table_len(), before);
        // The second occurrence is in the ring and inserts.
        encode(&mut enc, b"x-fresh", b"1", IndexPolicy::Add);
        assert_eq!(enc.table_len(), before + 1);
    }

    #[test]
    fn test_encode_long_string_length_shift() {
        let mut enc = Encoder::new();
        enc.set_use_huffman(false);
        let value = vec![b'z'; 300];
        let out = encode(&mut enc, b"x-long", &value, IndexPolicy::NoIndex);
        // 0x00, name literal, then a multi-octet length for the value.
        assert_eq!(out[0], 0x00);
        assert_eq!(out[1], 6);
        assert_eq!(&out[2..8], b"x-long");
        assert_eq!(&out[8..11], &[0x7f, 0xad, 0x01]);
        assert_eq!(&out[11..], &value[..]);
    }
}
