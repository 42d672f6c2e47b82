//! Canonical Huffman code of RFC 7541, Appendix B, and the lookup tables
//! derived from it at startup.
//!
//! Three structures are derived from the `(code, bits)` array: the code
//! trie, a 65536-entry table keyed by the next 16 bits of input for the
//! fast decode path, and a per-nibble automaton for the full decoder.

use lazy_static::lazy_static;

/// `ENCODE_TABLE[sym]` is the `(code, bits)` pair for the octet `sym`.
/// See README.md for actual characters of the following hex codes.
pub(crate) static ENCODE_TABLE: [(u32, u8); 256] = [
    (0x1ff8, 13),
    (0x7fffd8, 23),
    (0xfffffe2, 28),
    (0xfffffe3, 28),
    (0xfffffe4, 28),
    (0xfffffe5, 28),
    (0xfffffe6, 28),
    (0xfffffe7, 28),
    (0xfffffe8, 28),
    (0xffffea, 24),
    (0x3ffffffc, 30),
    (0xfffffe9, 28),
    (0xfffffea, 28),
    (0x3ffffffd, 30),
    (0xfffffeb, 28),
    (0xfffffec, 28),
    (0xfffffed, 28),
    (0xfffffee, 28),
    (0xfffffef, 28),
    (0xffffff0, 28),
    (0xffffff1, 28),
    (0xffffff2, 28),
    (0x3ffffffe, 30),
    (0xffffff3, 28),
    (0xffffff4, 28),
    (0xffffff5, 28),
    (0xffffff6, 28),
    (0xffffff7, 28),
    (0xffffff8, 28),
    (0xffffff9, 28),
    (0xffffffa, 28),
    (0xffffffb, 28),
    (0x14, 6),
    (0x3f8, 10),
    (0x3f9, 10),
    (0xffa, 12),
    (0x1ff9, 13),
    (0x15, 6),
    (0xf8, 8),
    (0x7fa, 11),
    (0x3fa, 10),
    (0x3fb, 10),
    (0xf9, 8),
    (0x7fb, 11),
    (0xfa, 8),
    (0x16, 6),
    (0x17, 6),
    (0x18, 6),
    (0x0, 5), //b'0'
    (0x1, 5),
    (0x2, 5),
    (0x19, 6),
    (0x1a, 6),
    (0x1b, 6),
    (0x1c, 6),
    (0x1d, 6),
    (0x1e, 6),
    (0x1f, 6),
    (0x5c, 7),
    (0xfb, 8),
    (0x7ffc, 15),
    (0x20, 6),
    (0xffb, 12),
    (0x3fc, 10),
    (0x1ffa, 13),
    (0x21, 6), //b'A'
    (0x5d, 7),
    (0x5e, 7),
    (0x5f, 7),
    (0x60, 7),
    (0x61, 7),
    (0x62, 7),
    (0x63, 7),
    (0x64, 7),
    (0x65, 7),
    (0x66, 7),
    (0x67, 7),
    (0x68, 7), //b'M'
    (0x69, 7),
    (0x6a, 7),
    (0x6b, 7),
    (0x6c, 7),
    (0x6d, 7),
    (0x6e, 7),
    (0x6f, 7),
    (0x70, 7),
    (0x71, 7),
    (0x72, 7),
    (0xfc, 8),
    (0x73, 7),
    (0xfd, 8), //b'Z'
    (0x1ffb, 13),
    (0x7fff0, 19),
    (0x1ffc, 13),
    (0x3ffc, 14),
    (0x22, 6),
    (0x7ffd, 15),
    (0x3, 5), //b'a'
    (0x23, 6),
    (0x4, 5),
    (0x24, 6),
    (0x5, 5),
    (0x25, 6),
    (0x26, 6),
    (0x27, 6),
    (0x6, 5),
    (0x74, 7), //b'j'
    (0x75, 7),
    (0x28, 6),
    (0x29, 6),
    (0x2a, 6),
    (0x7, 5),
    (0x2b, 6),
    (0x76, 7),
    (0x2c, 6),
    (0x8, 5),
    (0x9, 5),
    (0x2d, 6),
    (0x77, 7),
    (0x78, 7),
    (0x79, 7),
    (0x7a, 7),
    (0x7b, 7), //b'z'
    (0x7ffe, 15),
    (0x7fc, 11),
    (0x3ffd, 14),
    (0x1ffd, 13),
    (0xffffffc, 28),
    (0xfffe6, 20),
    (0x3fffd2, 22),
    (0xfffe7, 20),
    (0xfffe8, 20),
    (0x3fffd3, 22),
    (0x3fffd4, 22),
    (0x3fffd5, 22),
    (0x7fffd9, 23),
    (0x3fffd6, 22),
    (0x7fffda, 23),
    (0x7fffdb, 23),
    (0x7fffdc, 23),
    (0x7fffdd, 23),
    (0x7fffde, 23),
    (0xffffeb, 24),
    (0x7fffdf, 23),
    (0xffffec, 24),
    (0xffffed, 24),
    (0x3fffd7, 22),
    (0x7fffe0, 23),
    (0xffffee, 24),
    (0x7fffe1, 23),
    (0x7fffe2, 23),
    (0x7fffe3, 23),
    (0x7fffe4, 23),
    (0x1fffdc, 21),
    (0x3fffd8, 22),
    (0x7fffe5, 23),
    (0x3fffd9, 22),
    (0x7fffe6, 23),
    (0x7fffe7, 23),
    (0xffffef, 24),
    (0x3fffda, 22),
    (0x1fffdd, 21),
    (0xfffe9, 20),
    (0x3fffdb, 22),
    (0x3fffdc, 22),
    (0x7fffe8, 23),
    (0x7fffe9, 23),
    (0x1fffde, 21),
    (0x7fffea, 23),
    (0x3fffdd, 22),
    (0x3fffde, 22),
    (0xfffff0, 24),
    (0x1fffdf, 21),
    (0x3fffdf, 22),
    (0x7fffeb, 23),
    (0x7fffec, 23),
    (0x1fffe0, 21),
    (0x1fffe1, 21),
    (0x3fffe0, 22),
    (0x1fffe2, 21),
    (0x7fffed, 23),
    (0x3fffe1, 22),
    (0x7fffee, 23),
    (0x7fffef, 23),
    (0xfffea, 20),
    (0x3fffe2, 22),
    (0x3fffe3, 22),
    (0x3fffe4, 22),
    (0x7ffff0, 23),
    (0x3fffe5, 22),
    (0x3fffe6, 22),
    (0x7ffff1, 23),
    (0x3ffffe0, 26),
    (0x3ffffe1, 26),
    (0xfffeb, 20),
    (0x7fff1, 19),
    (0x3fffe7, 22),
    (0x7ffff2, 23),
    (0x3fffe8, 22),
    (0x1ffffec, 25),
    (0x3ffffe2, 26),
    (0x3ffffe3, 26),
    (0x3ffffe4, 26),
    (0x7ffffde, 27),
    (0x7ffffdf, 27),
    (0x3ffffe5, 26),
    (0xfffff1, 24),
    (0x1ffffed, 25),
    (0x7fff2, 19),
    (0x1fffe3, 21),
    (0x3ffffe6, 26),
    (0x7ffffe0, 27),
    (0x7ffffe1, 27),
    (0x3ffffe7, 26),
    (0x7ffffe2, 27),
    (0xfffff2, 24),
    (0x1fffe4, 21),
    (0x1fffe5, 21),
    (0x3ffffe8, 26),
    (0x3ffffe9, 26),
    (0xffffffd, 28),
    (0x7ffffe3, 27),
    (0x7ffffe4, 27),
    (0x7ffffe5, 27),
    (0xfffec, 20),
    (0xfffff3, 24),
    (0xfffed, 20),
    (0x1fffe6, 21),
    (0x3fffe9, 22),
    (0x1fffe7, 21),
    (0x1fffe8, 21),
    (0x7ffff3, 23),
    (0x3fffea, 22),
    (0x3fffeb, 22),
    (0x1ffffee, 25),
    (0x1ffffef, 25),
    (0xfffff4, 24),
    (0xfffff5, 24),
    (0x3ffffea, 26),
    (0x7ffff4, 23),
    (0x3ffffeb, 26),
    (0x7ffffe6, 27),
    (0x3ffffec, 26),
    (0x3ffffed, 26),
    (0x7ffffe7, 27),
    (0x7ffffe8, 27),
    (0x7ffffe9, 27),
    (0x7ffffea, 27),
    (0x7ffffeb, 27),
    (0xffffffe, 28),
    (0x7ffffec, 27),
    (0x7ffffed, 27),
    (0x7ffffee, 27),
    (0x7ffffef, 27),
    (0x7fffff0, 27),
    (0x3ffffee, 26),
];

pub(crate) const FLAG_ACCEPTED: u8 = 0x01;
pub(crate) const FLAG_SYM: u8 = 0x02;
pub(crate) const FLAG_FAIL: u8 = 0x04;

/// One transition of the per-nibble automaton.
#[derive(Clone, Copy, Default)]
pub(crate) struct NibbleDecode {
    pub state: u16,
    pub flags: u8,
    pub sym: u8,
}

/// One entry of the 16-bit lookahead table: up to 3 output octets.
/// `lens & 3` is how many, `lens >> 2` is the input bits they consumed;
/// zero means the code runs past 16 bits and the caller must fall back.
#[derive(Clone, Copy)]
pub(crate) struct FastDecode {
    pub lens: u8,
    pub out: [u8; 3],
}

const NO_SYM: u16 = 256;

#[derive(Clone)]
struct TrieNode {
    // 0 is the root and never a child, so 0 doubles as "no child".
    next: [u16; 2],
    sym: u16,
}

fn build_trie() -> Vec<TrieNode> {
    let empty = TrieNode { next: [0, 0], sym: NO_SYM };
    let mut nodes = vec![empty.clone()];
    for (sym, &(code, bits)) in ENCODE_TABLE.iter().enumerate() {
        let mut cur = 0usize;
        for i in (0..bits).rev() {
            let bit = ((code >> i) & 1) as usize;
            if nodes[cur].next[bit] == 0 {
                nodes.push(empty.clone());
                let id = (nodes.len() - 1) as u16;
                nodes[cur].next[bit] = id;
            }
            cur = nodes[cur].next[bit] as usize;
        }
        nodes[cur].sym = sym as u16;
    }
    nodes
}

fn build_fast_table(trie: &[TrieNode]) -> Vec<FastDecode> {
    let mut table = Vec::with_capacity(1 << 16);
    for idx in 0u32..(1 << 16) {
        let mut out = [0u8; 3];
        let mut count = 0usize;
        let mut used = 0u8;
        let mut cur = 0usize;
        let mut walked = 0u8;
        for i in (0..16).rev() {
            let bit = ((idx >> i) & 1) as usize;
            let next = trie[cur].next[bit] as usize;
            if next == 0 {
                // The only dead branch leads into EOS; leave the rest to
                // the full decoder.
                break;
            }
            walked += 1;
            if trie[next].sym != NO_SYM {
                out[count] = trie[next].sym as u8;
                count += 1;
                used = walked;
                cur = 0;
                if count == 3 {
                    break;
                }
            } else {
                cur = next;
            }
        }
        let lens = if count == 0 { 0 } else { (used << 2) | count as u8 };
        table.push(FastDecode { lens, out });
    }
    table
}

fn build_nibble_table(trie: &[TrieNode]) -> Vec<[NibbleDecode; 16]> {
    // States where ending the stream is legal: the all-ones paths of
    // length 0..=7, the prefixes of EOS a padding may hold.
    let mut accepted = vec![false; trie.len()];
    let mut cur = 0usize;
    for _ in 0..=7 {
        accepted[cur] = true;
        cur = trie[cur].next[1] as usize;
        if cur == 0 {
            break;
        }
    }

    let mut table = Vec::with_capacity(trie.len());
    for state in 0..trie.len() {
        let mut row = [NibbleDecode::default(); 16];
        for (nibble, el) in row.iter_mut().enumerate() {
            let mut cur = state;
            let mut flags = 0u8;
            let mut sym = 0u8;
            for i in (0..4).rev() {
                let bit = (nibble >> i) & 1;
                let next = trie[cur].next[bit] as usize;
                if next == 0 {
                    flags = FLAG_FAIL;
                    break;
                }
                if trie[next].sym != NO_SYM {
                    sym = trie[next].sym as u8;
                    flags |= FLAG_SYM;
                    cur = 0;
                } else {
                    cur = next;
                }
            }
            if flags & FLAG_FAIL == 0 {
                if accepted[cur] {
                    flags |= FLAG_ACCEPTED;
                }
                el.state = cur as u16;
            }
            el.flags = flags;
            el.sym = sym;
        }
        table.push(row);
    }
    table
}

lazy_static! {
    static ref CODE_TRIE: Vec<TrieNode> = build_trie();
    pub(crate) static ref FAST_TABLE: Vec<FastDecode> = build_fast_table(&*CODE_TRIE);
    pub(crate) static ref NIBBLE_TABLE: Vec<[NibbleDecode; 16]> = build_nibble_table(&*CODE_TRIE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_table_single_codes() {
        // b'0' is 00000 (5 bits): sixteen zero bits decode three of them.
        let el = FAST_TABLE[0x0000];
        assert_eq!(el.lens & 3, 3);
        assert_eq!(el.lens >> 2, 15);
        assert_eq!(el.out, [b'0', b'0', b'0']);

        // All ones runs into EOS territory, the slow path must take over.
        assert_eq!(FAST_TABLE[0xffff].lens, 0);
    }

    #[test]
    fn test_nibble_automaton_roots() {
        // 0011 0... : b'a' (00011) completes on the first bit of the
        // second nibble.
        let el = NIBBLE_TABLE[0][0b0001];
        assert_eq!(el.flags & FLAG_SYM, 0);
        let el2 = NIBBLE_TABLE[el.state as usize][0b1000];
        assert_eq!(el2.flags & FLAG_SYM, FLAG_SYM);
        assert_eq!(el2.sym, b'a');
    }

    #[test]
    fn test_nibble_automaton_accepts_padding() {
        // Up to seven 1-bits are a legal tail, eight are not.
        let mut el = NIBBLE_TABLE[0][0b1111];
        assert_eq!(el.flags & FLAG_ACCEPTED, FLAG_ACCEPTED);
        el = NIBBLE_TABLE[el.state as usize][0b1111];
        assert_eq!(el.flags & FLAG_ACCEPTED, 0);
    }
}
