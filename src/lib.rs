#[macro_use]
extern crate bitflags;

mod decoder;
mod encoder;
mod error;
mod header_index;
pub mod huffman;
pub mod integer;
mod static_table;

pub use decoder::{DecodedHeader, Decoder, HeaderFlag};
pub use encoder::{Encoder, IndexPolicy};
pub use error::{HpackError, HpackResult, HuffmanError, IntegerError};
pub use static_table::{static_index_of, STATIC_TABLE, STATIC_TABLE_SIZE};

/// 默认的header最大长度值
pub const DEFAULT_SETTINGS_HEADER_TABLE_SIZE: usize = 4_096;

/// 头字段的名字或值的最大长度
pub const MAX_HEADER_FIELD_LEN: usize = 65_535;
