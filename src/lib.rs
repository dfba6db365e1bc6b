/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Exhaustive DEFLATE (RFC 1951) compressor. Finds a near-minimal encoding
//! by iterating an optimal LZ77 parse against entropy statistics of its own
//! output, splitting the input into blocks where separate Huffman codes pay
//! off. Very slow, very small output; the produced stream is decodable by
//! any compliant inflater.
//!
//! This crate only produces the raw deflate bitstream. Container framing
//! (gzip, zlib, zip) and their checksums are the caller's business.

#![forbid(unsafe_code)]

mod block_splitter;
mod compressor;
mod deflate;
mod hash_chain;
mod lz77;
mod match_cache;
mod optimal_parse;
mod optiflate_error;

pub use compressor::{compress, compress_part, BlockType, CompressConfig};

pub use deflate::deflate_writer::DeflateWriter;

pub use optiflate_error::ExitCode;
pub use optiflate_error::{err_exit_code, OptiflateError, Result};
