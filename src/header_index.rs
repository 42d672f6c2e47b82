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
// Created Date: 2024/03/12 07:02:51

use std::collections::VecDeque;

use crate::{static_table::STATIC_TABLE_SIZE, DEFAULT_SETTINGS_HEADER_TABLE_SIZE};

/// Each table entry costs its name and value lengths plus 32 octets
/// (RFC 7541, Section 4.1).
pub(crate) const DYNAMIC_ENTRY_OVERHEAD: usize = 32;

/// An entry of the encoder's dynamic table. It lives in the insertion
/// FIFO and in the by-nameval chain, and in the by-name chain unless the
/// name is already a static-table name.
#[derive(Debug)]
pub(crate) struct Entry {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
    pub name_hash: u32,
    pub nameval_hash: u32,
    pub id: u32,
    static_name: bool,
}

#[derive(Debug, Default)]
struct Bucket {
    by_name: Vec<u32>,
    by_nameval: Vec<u32>,
}

#[derive(Debug)]
struct History {
    buf: Vec<u32>,
    idx: usize,
    wrapped: bool,
}

/// The encoder side of the dynamic table: an insertion-ordered FIFO of
/// entries addressed by content through two bucket-chained hash indexes,
/// plus the optional recent-emission history ring.
///
/// Entry ids grow monotonically modulo 2^32; the HPACK index of a live
/// entry is `61 + (next_id - id)`. The initial id sits just below the
/// wraparound so that ordinary use exercises the modular arithmetic.
#[derive(Debug)]
pub(crate) struct HeaderIndex {
    entries: VecDeque<Entry>,
    pub(crate) next_id: u32,
    buckets: Vec<Bucket>,
    nbits: u32,
    size: usize,
    max_size: usize,
    hist: Option<History>,
}

fn hist_size(max_capacity: usize) -> usize {
    // Estimate the average entry count as a third of the theoretical
    // maximum: large enough to cover recent entries, small enough not to
    // remember headers that recur with a period larger than the table.
    max_capacity / DYNAMIC_ENTRY_OVERHEAD / 3
}

impl HeaderIndex {
    pub fn new() -> HeaderIndex {
        let nbits = 2;
        let mut buckets = Vec::new();
        for _ in 0..(1usize << nbits) {
            buckets.push(Bucket::default());
        }
        HeaderIndex {
            entries: VecDeque::new(),
            // Any initial value works while fewer than 2^32 entries are
            // alive; starting just short of the wrap keeps the modular
            // math honest in everyday tests.
            next_id: u32::MAX - 3,
            buckets,
            nbits,
            size: 0,
            max_size: DEFAULT_SETTINGS_HEADER_TABLE_SIZE,
            hist: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get_size(&self) -> usize {
        self.size
    }

    pub fn get_max_size(&self) -> usize {
        self.max_size
    }

    fn buckno(&self, hash: u32) -> usize {
        (hash & ((1u32 << self.nbits) - 1)) as usize
    }

    fn get(&self, id: u32) -> &Entry {
        let back = self.next_id.wrapping_sub(id) as usize;
        &self.entries[self.entries.len() - back]
    }

    /// The HPACK index the entry with this id currently decodes at.
    pub fn table_index(&self, id: u32) -> u32 {
        STATIC_TABLE_SIZE as u32 + self.next_id.wrapping_sub(id)
    }

    /// Finds a full (name, value) match, returning its HPACK index.
    pub fn find_nameval(&self, nameval_hash: u32, name: &[u8], value: &[u8]) -> Option<u32> {
        let buckno = self.buckno(nameval_hash);
        for &id in &self.buckets[buckno].by_nameval {
            let entry = self.get(id);
            if entry.nameval_hash == nameval_hash && entry.name == name && entry.value == value {
                return Some(self.table_index(id));
            }
        }
        None
    }

    /// Finds a name-only match, returning its HPACK index.
    pub fn find_name(&self, name_hash: u32, name: &[u8]) -> Option<u32> {
        let buckno = self.buckno(name_hash);
        for &id in &self.buckets[buckno].by_name {
            let entry = self.get(id);
            if entry.name_hash == name_hash && entry.name == name {
                return Some(self.table_index(id));
            }
        }
        None
    }

    /// Appends a new entry, growing the bucket arrays first when the
    /// entry count reaches half the bucket count, then evicts down to
    /// the maximum size.
    pub fn push(
        &mut self,
        name: &[u8],
        value: &[u8],
        name_hash: u32,
        nameval_hash: u32,
        static_name: bool,
    ) {
        if self.entries.len() >= (1usize << self.nbits) / 2 {
            self.grow_buckets();
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let buckno = self.buckno(nameval_hash);
        self.buckets[buckno].by_nameval.push(id);
        if !static_name {
            let buckno = self.buckno(name_hash);
            self.buckets[buckno].by_name.push(id);
        }
        self.size += DYNAMIC_ENTRY_OVERHEAD + name.len() + value.len();
        self.entries.push_back(Entry {
            name: name.to_vec(),
            value: value.to_vec(),
            name_hash,
            nameval_hash,
            id,
            static_name,
        });
        self.remove_overflow();
    }

    fn grow_buckets(&mut self) {
        self.nbits += 1;
        let mut buckets = Vec::new();
        for _ in 0..(1usize << self.nbits) {
            buckets.push(Bucket::default());
        }
        self.buckets = buckets;
        // Chain order equals insertion order, so refilling from the FIFO
        // reproduces it.
        for i in 0..self.entries.len() {
            let (id, name_hash, nameval_hash, static_name) = {
                let e = &self.entries[i];
                (e.id, e.name_hash, e.nameval_hash, e.static_name)
            };
            let buckno = self.buckno(nameval_hash);
            self.buckets[buckno].by_nameval.push(id);
            if !static_name {
                let buckno = self.buckno(name_hash);
                self.buckets[buckno].by_name.push(id);
            }
        }
    }

    fn drop_oldest(&mut self) {
        let entry = match self.entries.pop_front() {
            Some(entry) => entry,
            None => return,
        };
        // The oldest entry overall heads any chain it is on.
        let buckno = self.buckno(entry.nameval_hash);
        if self.buckets[buckno].by_nameval.first() == Some(&entry.id) {
            self.buckets[buckno].by_nameval.remove(0);
        }
        let buckno = self.buckno(entry.name_hash);
        if self.buckets[buckno].by_name.first() == Some(&entry.id) {
            self.buckets[buckno].by_name.remove(0);
        }
        self.size -= DYNAMIC_ENTRY_OVERHEAD + entry.name.len() + entry.value.len();
    }

    fn remove_overflow(&mut self) {
        while self.size > self.max_size {
            self.drop_oldest();
        }
    }

    pub fn set_max_size(&mut self, new_max_size: usize) {
        self.max_size = new_max_size;
        self.remove_overflow();
        if self.hist.is_some() {
            self.resize_history();
        }
    }

    /// Iterates the live entries oldest-first together with their
    /// current HPACK index.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8], u32)> {
        self.entries
            .iter()
            .map(|e| (&e.name[..], &e.value[..], self.table_index(e.id)))
    }

    // ===== emission history =====

    pub fn set_use_hist(&mut self, on: bool) {
        if on {
            if self.hist.is_none() {
                let size = hist_size(DEFAULT_SETTINGS_HEADER_TABLE_SIZE);
                if size > 0 {
                    self.hist = Some(History {
                        buf: vec![0; size],
                        idx: 0,
                        wrapped: false,
                    });
                }
            }
        } else {
            self.hist = None;
        }
    }

    pub fn hist_used(&self) -> bool {
        self.hist.is_some()
    }

    pub fn hist_wrapped(&self) -> bool {
        self.hist.as_ref().map(|h| h.wrapped).unwrap_or(false)
    }

    /// Whether the hash is in the history window. Read-only; pushing is
    /// separate so a failed encode leaves the ring untouched.
    pub fn hist_seen(&self, nameval_hash: u32) -> bool {
        match &self.hist {
            Some(h) => {
                let filled = if h.wrapped { h.buf.len() } else { h.idx };
                h.buf[..filled].contains(&nameval_hash)
            }
            None => false,
        }
    }

    pub fn hist_push(&mut self, nameval_hash: u32) {
        if let Some(h) = &mut self.hist {
            h.buf[h.idx] = nameval_hash;
            h.idx = (h.idx + 1) % h.buf.len();
            h.wrapped |= h.idx == 0;
        }
    }

    fn resize_history(&mut self) {
        let new_size = hist_size(self.max_size);
        if new_size == 0 {
            self.hist = None;
            return;
        }
        if let Some(hist) = &mut self.hist {
            if new_size == hist.buf.len() {
                return;
            }
            // Oldest-first drain of the old ring, truncated to the new size.
            let mut ordered = Vec::with_capacity(hist.buf.len());
            if hist.wrapped {
                ordered.extend_from_slice(&hist.buf[hist.idx..]);
                ordered.extend_from_slice(&hist.buf[..hist.idx]);
            } else {
                ordered.extend_from_slice(&hist.buf[..hist.idx]);
            }
            ordered.truncate(new_size);

            let count = ordered.len();
            let mut buf = vec![0; new_size];
            buf[..count].copy_from_slice(&ordered);
            hist.buf = buf;
            hist.idx = count % new_size;
            hist.wrapped = count == new_size;
        }
    }
}
