//! Huffman coder for HPACK string literals (RFC 7541, Section 5.2 and
//! Appendix B).
//!
//! Encoding packs codes most-significant-bit first into a 64-bit
//! accumulator and flushes whole words where possible; the final partial
//! octet is padded with 1-bits, the prefix of EOS.
//!
//! Decoding is optimized for the common case. Most of the time the
//! encoding of every octet is 16 bits or shorter, which lets a 64 KB
//! table indexed by two bytes of input emit up to 3 octets at a time.
//! When a longer code is encountered the decoder rewinds to the nearest
//! octet boundary and hands the rest to the per-nibble automaton, which
//! supports all code lengths.

mod table;

use crate::{HpackResult, HuffmanError};

use self::table::{ENCODE_TABLE, FAST_TABLE, NIBBLE_TABLE};
use self::table::{FLAG_ACCEPTED, FLAG_FAIL, FLAG_SYM};

/// No code is shorter than this many bits.
const SHORTEST_CODE: u32 = 5;

/// Huffman-encodes `src` into `dst`, returning the octets written, or
/// `None` when `dst` cannot hold the encoding so the caller can fall
/// back to the raw form.
pub fn encode_to(src: &[u8], dst: &mut [u8]) -> Option<usize> {
    let mut bits: u64 = 0;
    let mut bits_used: u32 = 0;
    let mut pos = 0;

    for &b in src {
        let (code, len) = ENCODE_TABLE[b as usize];
        let len = len as u32;
        if bits_used + len < 64 {
            bits = (bits << len) | code as u64;
            bits_used += len;
        } else if pos + 8 <= dst.len() {
            bits <<= 64 - bits_used;
            bits_used = len - (64 - bits_used);
            bits |= (code >> bits_used) as u64;
            dst[pos..pos + 8].copy_from_slice(&bits.to_be_bytes());
            pos += 8;
            // High bits beyond bits_used are stale, which is fine.
            bits = code as u64;
        } else {
            return None;
        }
    }

    if bits_used > 0 {
        let pad = (8 - (bits_used & 7)) & 7;
        let nbytes = ((bits_used + pad) >> 3) as usize;
        if pos + nbytes > dst.len() {
            return None;
        }
        bits <<= pad;
        bits |= (1u64 << pad) - 1;
        for i in 0..nbytes {
            dst[pos + i] = (bits >> (8 * (nbytes - 1 - i))) as u8;
        }
        pos += nbytes;
    }
    Some(pos)
}

/// Decodes the Huffman string `src` into `dst`, returning the number of
/// octets written.
pub fn decode(src: &[u8], dst: &mut [u8]) -> HpackResult<usize> {
    let mut buf: u64 = 0;
    let mut avail: u32 = 0;
    let mut spos = 0;
    let mut dpos = 0;

    loop {
        while spos < src.len() && avail <= 56 {
            buf = (buf << 8) | src[spos] as u64;
            spos += 1;
            avail += 8;
        }
        if avail < 16 {
            // Out of input with fewer bits than the table is keyed on.
            break;
        }
        loop {
            let idx = ((buf >> (avail - 16)) & 0xffff) as usize;
            let el = FAST_TABLE[idx];
            if el.lens == 0 {
                return slow_path(src, spos, dst, dpos, avail);
            }
            let count = (el.lens & 3) as usize;
            if dpos + count > dst.len() {
                return Err(HuffmanError::NotEnoughSpace.into());
            }
            dst[dpos..dpos + count].copy_from_slice(&el.out[..count]);
            dpos += count;
            avail -= (el.lens >> 2) as u32;
            if avail < 16 {
                break;
            }
        }
    }

    // Between 0 and 15 bits remain: at most three more codes, then the
    // EOS-prefix padding.
    if avail >= SHORTEST_CODE {
        let ones = (1u32 << (16 - avail)) - 1;
        let idx = ((((buf << (16 - avail)) as u32) & 0xffff) | ones) as usize;
        if idx == 0xffff && avail < 8 {
            return Ok(dpos);
        }
        let el = FAST_TABLE[idx];
        let count = (el.lens & 3) as usize;
        let used = (el.lens >> 2) as u32;
        if count == 0 {
            return Err(if idx == 0xffff {
                HuffmanError::PaddingTooLarge.into()
            } else {
                HuffmanError::InvalidPadding.into()
            });
        }
        if used > avail {
            return Err(HuffmanError::InvalidPadding.into());
        }
        if dpos + count > dst.len() {
            return Err(HuffmanError::NotEnoughSpace.into());
        }
        dst[dpos..dpos + count].copy_from_slice(&el.out[..count]);
        dpos += count;
        avail -= used;
    }

    if avail > 0 {
        let mask = (1u64 << avail) - 1;
        if buf & mask != mask {
            return Err(HuffmanError::InvalidPadding.into());
        }
    }
    Ok(dpos)
}

/// Resumes with the full decoder when a code longer than 16 bits shows
/// up. Finds the previous octet boundary by un-emitting decoded octets,
/// then feeds the remaining input through the automaton.
fn slow_path(src: &[u8], spos: usize, dst: &mut [u8], mut dpos: usize, mut avail: u32) -> HpackResult<usize> {
    while avail & 7 != 0 && dpos > 0 {
        dpos -= 1;
        avail += ENCODE_TABLE[dst[dpos] as usize].1 as u32;
    }
    let back = (avail >> 3) as usize;
    let n = decode_full(&src[spos - back..], &mut dst[dpos..])?;
    Ok(dpos + n)
}

/// The nibble-at-a-time decoder; handles every code length and enforces
/// the padding rules on its own.
pub(crate) fn decode_full(src: &[u8], dst: &mut [u8]) -> HpackResult<usize> {
    let mut state: u16 = 0;
    let mut eos = true;
    let mut dpos = 0;

    for &b in src {
        for nibble in [b >> 4, b & 0xf] {
            let el = NIBBLE_TABLE[state as usize][nibble as usize];
            if el.flags & FLAG_FAIL != 0 {
                return Err(HuffmanError::EosInString.into());
            }
            if el.flags & FLAG_SYM != 0 {
                if dpos == dst.len() {
                    return Err(HuffmanError::NotEnoughSpace.into());
                }
                dst[dpos] = el.sym;
                dpos += 1;
            }
            state = el.state;
            eos = el.flags & FLAG_ACCEPTED != 0;
        }
    }

    if !eos {
        return Err(HuffmanError::InvalidPadding.into());
    }
    Ok(dpos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HpackError;

    fn encoded(src: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; src.len() * 4 + 8];
        let n = encode_to(src, &mut buf).unwrap();
        buf.truncate(n);
        buf
    }

    fn decoded(src: &[u8]) -> HpackResult<Vec<u8>> {
        let mut buf = vec![0u8; src.len() * 8 + 8];
        let n = decode(src, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    #[test]
    fn test_huffman_rfc_vectors() {
        assert_eq!(
            encoded(b"www.example.com"),
            vec![0xf1, 0xe3, 0xc2, 0xe5, 0xf2, 0x3a, 0x6b, 0xa0, 0xab, 0x90, 0xf4, 0xff]
        );
        assert_eq!(encoded(b"no-cache"), vec![0xa8, 0xeb, 0x10, 0x64, 0x9c, 0xbf]);
        assert_eq!(
            encoded(b"custom-key"),
            vec![0x25, 0xa8, 0x49, 0xe9, 0x5b, 0xa9, 0x7d, 0x7f]
        );
        assert_eq!(encoded(b"302"), vec![0x64, 0x02]);
        assert_eq!(encoded(b"private"), vec![0xae, 0xc3, 0x77, 0x1a, 0x4b]);
    }

    #[test]
    fn test_huffman_roundtrip() {
        let samples: &[&[u8]] = &[
            b"",
            b"a",
            b"0",
            b"www.example.com",
            b"Mon, 21 Oct 2013 20:13:21 GMT",
            b"https://www.example.com",
            b"!\"#$%&'()*+,-./",
            b"\x00\x01\x02\xfd\xfe\xff",
            b"\r\n\x16",
            &[0xff; 40],
        ];
        for s in samples {
            assert_eq!(decoded(&encoded(s)).unwrap(), s.to_vec(), "sample {:?}", s);
        }
    }

    #[test]
    fn test_huffman_long_input_roundtrip() {
        let mut all = Vec::new();
        for b in 0..=255u8 {
            all.push(b);
            all.push(b ^ 0x55);
        }
        assert_eq!(decoded(&encoded(&all)).unwrap(), all);
    }

    #[test]
    fn test_huffman_padding_flip_rejected() {
        let mut enc = encoded(b"www.example.com");
        let last = enc.len() - 1;
        enc[last] ^= 0x01;
        assert!(decoded(&enc).is_err());
    }

    #[test]
    fn test_huffman_all_ones_byte_rejected() {
        // A full octet of padding is not a legal tail.
        let mut enc = encoded(b"a");
        enc.push(0xff);
        assert_eq!(
            decoded(&enc),
            Err(HpackError::Huffman(HuffmanError::PaddingTooLarge))
        );
    }

    #[test]
    fn test_huffman_eos_rejected() {
        // EOS (30 ones) spread over four octets, zero-padded to confuse
        // the padding check: must fail as a symbol, not as padding.
        let enc = [0xff, 0xff, 0xff, 0xfc];
        assert!(decoded(&enc).is_err());
    }

    #[test]
    fn test_huffman_slow_path_rewind() {
        // A short code first, then 25+ bit codes force the 16-bit table
        // to give up mid-stream.
        let src: &[u8] = &[b'a', 0x01, 0x02, b'b', 0x03, b'c'];
        assert_eq!(decoded(&encoded(src)).unwrap(), src.to_vec());
    }

    #[test]
    fn test_huffman_output_overflow() {
        let enc = encoded(b"www.example.com");
        let mut small = [0u8; 4];
        assert_eq!(
            decode(&enc, &mut small),
            Err(HpackError::Huffman(HuffmanError::NotEnoughSpace))
        );
    }

    #[test]
    fn test_huffman_encode_overflow() {
        let mut small = [0u8; 4];
        assert_eq!(encode_to(b"www.example.com", &mut small), None);
        assert_eq!(encode_to(b"", &mut small), Some(0));
    }
}
