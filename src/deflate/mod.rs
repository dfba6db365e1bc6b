//! Module for the DEFLATE wire format: symbol quantization tables, bit-level
//! output, Huffman code construction, and block serialization.

pub(crate) mod bit_writer;

pub mod deflate_constants;

pub mod deflate_token;
pub mod deflate_writer;
pub mod huffman_calc;
pub mod huffman_encoding;
