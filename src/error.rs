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
// Created Date: 2024/03/11 09:21:44

use std::{fmt, result};

/// Represents all errors that can be encountered while decoding an
/// integer.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum IntegerError {
    /// 5.1. specifies that "excessively large integer decodings" MUST be
    /// considered an error. The decoder is bounded to 28-bit values, so
    /// more than four continuation octets are never valid.
    TooManyOctets,
    /// The value of the integer being decoded exceeds the 32-bit
    /// accumulator.
    ValueTooLarge,
    /// The buffer ended before the integer terminated.
    NotEnoughOctets,
    /// Only valid prefixes are [1, 8]
    InvalidPrefix,
}

/// Represents the error variants of the Huffman coder.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum HuffmanError {
    /// Any padding strictly larger than 7 bits MUST be interpreted as an error
    PaddingTooLarge,
    /// Any padding that does not correspond to the most significant bits of
    /// EOS MUST be interpreted as an error.
    InvalidPadding,
    /// If EOS is ever found in the string, it causes an error.
    EosInString,
    /// The output buffer cannot hold the decoded octets.
    NotEnoughSpace,
}

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum HpackError {
    Integer(IntegerError),
    Huffman(HuffmanError),
    /// An indexed representation referred outside the static and dynamic
    /// tables, or used the reserved index 0.
    IndexOutOfBounds,
    /// A dynamic-table-size update asked for more than the configured
    /// hard maximum.
    SizeUpdateOverLimit,
    /// The input ended in the middle of a header representation.
    NotEnoughData,
    /// The output buffer is too small for the encoded or decoded header.
    NotEnoughSpace,
    /// A name or value is longer than the 65535 octets a header field
    /// may carry.
    HeaderTooLarge,
}

impl HpackError {
    #[inline]
    pub fn description_str(&self) -> &'static str {
        match self {
            HpackError::Integer(IntegerError::TooManyOctets) => "integer encoded over too many octets",
            HpackError::Integer(IntegerError::ValueTooLarge) => "integer value too large",
            HpackError::Integer(IntegerError::NotEnoughOctets) => "not enough octets for integer",
            HpackError::Integer(IntegerError::InvalidPrefix) => "invalid integer prefix",
            HpackError::Huffman(HuffmanError::PaddingTooLarge) => "huffman padding over 7 bits",
            HpackError::Huffman(HuffmanError::InvalidPadding) => "huffman padding not eos prefix",
            HpackError::Huffman(HuffmanError::EosInString) => "eos decoded inside huffman string",
            HpackError::Huffman(HuffmanError::NotEnoughSpace) => "huffman output too small",
            HpackError::IndexOutOfBounds => "header index out of bounds",
            HpackError::SizeUpdateOverLimit => "size update over hard maximum",
            HpackError::NotEnoughData => "not enough input data",
            HpackError::NotEnoughSpace => "output buffer too small",
            HpackError::HeaderTooLarge => "header field too large",
        }
    }
}

impl fmt::Display for HpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description_str())
    }
}

impl From<IntegerError> for HpackError {
    fn from(e: IntegerError) -> Self {
        HpackError::Integer(e)
    }
}

impl From<HuffmanError> for HpackError {
    fn from(e: HuffmanError) -> Self {
        HpackError::Huffman(e)
    }
}

pub type HpackResult<T> = result::Result<T, HpackError>;
