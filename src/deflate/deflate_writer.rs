/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Serializes parsed blocks into the output bitstream, and sizes the three
//! candidate encodings (stored, fixed, dynamic) so callers can pick the
//! smallest before committing any bits.

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use crate::compressor::CompressConfig;
use crate::deflate::bit_writer::BitWriter;
use crate::deflate::deflate_constants::{
    dist_extra_bits_value, length_extra_bits_value, quantize_distance, quantize_length,
    DIST_CODE_COUNT, DIST_EXTRA_TABLE, LITLEN_CODE_COUNT, LENGTH_EXTRA_TABLE, NONLEN_CODE_COUNT,
};
use crate::deflate::deflate_token::DeflateToken;
use crate::deflate::huffman_calc::calc_bit_lengths;
use crate::deflate::huffman_encoding::{
    add_dynamic_tree, calculate_tree_size, fixed_code_lengths, HuffmanWriter,
};
use crate::lz77::{BlockState, Lz77Store};
use crate::optimal_parse::lz77_optimal_fixed;
use crate::optiflate_error::Result;

/// concrete encoding of one block
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlockKind {
    Stored,
    Fixed,
    Dynamic,
}

/// derives the dynamic-table code lengths for a token range, trying both the
/// raw histogram and an RLE-flattened variant and keeping the cheaper one.
/// Returns the estimated size in bits of tree plus data.
fn get_dynamic_lengths(
    store: &Lz77Store,
    lstart: usize,
    lend: usize,
) -> (f64, [u8; LITLEN_CODE_COUNT], [u8; DIST_CODE_COUNT]) {
    let (mut ll_counts, d_counts) = store.histogram(lstart, lend);
    ll_counts[256] = 1; // end symbol

    let mut ll_lengths = [0u8; LITLEN_CODE_COUNT];
    ll_lengths.copy_from_slice(&calc_bit_lengths(&ll_counts, 15));
    let mut d_lengths = [0u8; DIST_CODE_COUNT];
    d_lengths.copy_from_slice(&calc_bit_lengths(&d_counts, 15));
    patch_distance_codes_for_buggy_decoders(&mut d_lengths);

    let cost = try_optimize_huffman_for_rle(
        store,
        lstart,
        lend,
        &ll_counts,
        &d_counts,
        &mut ll_lengths,
        &mut d_lengths,
    );

    (cost, ll_lengths, d_lengths)
}

/// Some decoders reject a block whose distance table has fewer than two
/// codes, even when no distance is ever used. Pad with one-bit codes.
fn patch_distance_codes_for_buggy_decoders(d_lengths: &mut [u8; DIST_CODE_COUNT]) {
    let mut num_dist_codes = 0;
    for &l in d_lengths.iter() {
        if l > 0 {
            num_dist_codes += 1;
        }
        if num_dist_codes >= 2 {
            return;
        }
    }

    if num_dist_codes == 0 {
        d_lengths[0] = 1;
        d_lengths[1] = 1;
    } else if d_lengths[0] > 0 {
        d_lengths[1] = 1;
    } else {
        d_lengths[0] = 1;
    }
}

/// Flattens the histogram so that its code lengths form longer runs, making
/// the run-length-encoded tree description smaller. Frequencies are distorted
/// only where the data cost impact is small.
fn optimize_huffman_for_rle(counts: &mut [usize]) {
    // trailing zeros stay as they are
    let mut length = counts.len();
    while length > 0 && counts[length - 1] == 0 {
        length -= 1;
    }
    if length == 0 {
        return;
    }
    let counts = &mut counts[..length];

    // mark spans that already repeat well; those must not be distorted
    let mut good_for_rle = vec![false; length];
    let mut symbol = counts[0];
    let mut stride = 0usize;
    for i in 0..=length {
        if i == length || counts[i] != symbol {
            if (symbol == 0 && stride >= 5) || (symbol != 0 && stride >= 7) {
                for k in 0..stride {
                    good_for_rle[i - k - 1] = true;
                }
            }
            stride = 1;
            if i < length {
                symbol = counts[i];
            }
        } else {
            stride += 1;
        }
    }

    // replace each remaining span with its average
    let mut stride = 0usize;
    let mut limit = counts[0];
    let mut sum = 0usize;
    for i in 0..=length {
        if i == length || good_for_rle[i] || counts[i].abs_diff(limit) >= 4 {
            if stride >= 4 || (stride >= 3 && sum == 0) {
                let mut count = (sum + stride / 2) / stride;
                if count < 1 {
                    count = 1;
                }
                if sum == 0 {
                    count = 0;
                }
                for k in 0..stride {
                    counts[i - k - 1] = count;
                }
            }
            stride = 0;
            sum = 0;
            if i + 3 < length {
                limit = (counts[i] + counts[i + 1] + counts[i + 2] + counts[i + 3] + 2) / 4;
            } else if i < length {
                limit = counts[i];
            } else {
                limit = 0;
            }
        }
        stride += 1;
        if i < length {
            sum += counts[i];
        }
    }
}

/// tries the RLE-optimized histogram; keeps whichever set of code lengths
/// gives the smaller tree-plus-data estimate, returning that size in bits
fn try_optimize_huffman_for_rle(
    store: &Lz77Store,
    lstart: usize,
    lend: usize,
    ll_counts: &[usize; LITLEN_CODE_COUNT],
    d_counts: &[usize; DIST_CODE_COUNT],
    ll_lengths: &mut [u8; LITLEN_CODE_COUNT],
    d_lengths: &mut [u8; DIST_CODE_COUNT],
) -> f64 {
    let treesize = calculate_tree_size(ll_lengths, d_lengths) as f64;
    let datasize = calculate_block_symbol_size_given_counts(
        ll_counts, d_counts, ll_lengths, d_lengths, store, lstart, lend,
    ) as f64;

    let mut ll_counts2 = *ll_counts;
    let mut d_counts2 = *d_counts;
    optimize_huffman_for_rle(&mut ll_counts2);
    optimize_huffman_for_rle(&mut d_counts2);

    let mut ll_lengths2 = [0u8; LITLEN_CODE_COUNT];
    ll_lengths2.copy_from_slice(&calc_bit_lengths(&ll_counts2, 15));
    let mut d_lengths2 = [0u8; DIST_CODE_COUNT];
    d_lengths2.copy_from_slice(&calc_bit_lengths(&d_counts2, 15));
    patch_distance_codes_for_buggy_decoders(&mut d_lengths2);

    let treesize2 = calculate_tree_size(&ll_lengths2, &d_lengths2) as f64;
    // note: data is still priced with the real histogram
    let datasize2 = calculate_block_symbol_size_given_counts(
        ll_counts,
        d_counts,
        &ll_lengths2,
        &d_lengths2,
        store,
        lstart,
        lend,
    ) as f64;

    if treesize2 + datasize2 < treesize + datasize {
        *ll_lengths = ll_lengths2;
        *d_lengths = d_lengths2;
        return treesize2 + datasize2;
    }
    treesize + datasize
}

/// size in bits of the symbol data of a small range, counted token by token
fn calculate_block_symbol_size_small(
    ll_lengths: &[u8; LITLEN_CODE_COUNT],
    d_lengths: &[u8; DIST_CODE_COUNT],
    store: &Lz77Store,
    lstart: usize,
    lend: usize,
) -> usize {
    let mut result = 0;
    for token in &store.tokens()[lstart..lend] {
        match token {
            DeflateToken::Literal(lit) => {
                result += usize::from(ll_lengths[usize::from(*lit)]);
            }
            DeflateToken::Reference(r) => {
                let ll_symbol = NONLEN_CODE_COUNT + quantize_length(r.len());
                let d_symbol = quantize_distance(r.dist());
                debug_assert!(ll_lengths[ll_symbol] > 0);
                debug_assert!(d_lengths[d_symbol] > 0);
                result += usize::from(ll_lengths[ll_symbol]);
                result += usize::from(d_lengths[d_symbol]);
                result += usize::from(LENGTH_EXTRA_TABLE[ll_symbol - NONLEN_CODE_COUNT]);
                result += usize::from(DIST_EXTRA_TABLE[d_symbol]);
            }
        }
    }
    result += usize::from(ll_lengths[256]); // end symbol
    result
}

/// same, but from a precomputed histogram
fn calculate_block_symbol_size_given_counts(
    ll_counts: &[usize; LITLEN_CODE_COUNT],
    d_counts: &[usize; DIST_CODE_COUNT],
    ll_lengths: &[u8; LITLEN_CODE_COUNT],
    d_lengths: &[u8; DIST_CODE_COUNT],
    store: &Lz77Store,
    lstart: usize,
    lend: usize,
) -> usize {
    if lstart + LITLEN_CODE_COUNT * 3 > lend {
        return calculate_block_symbol_size_small(ll_lengths, d_lengths, store, lstart, lend);
    }

    let mut result = 0;
    for i in 0..256 {
        result += usize::from(ll_lengths[i]) * ll_counts[i];
    }
    for i in NONLEN_CODE_COUNT..286 {
        result += usize::from(ll_lengths[i]) * ll_counts[i];
        result += usize::from(LENGTH_EXTRA_TABLE[i - NONLEN_CODE_COUNT]) * ll_counts[i];
    }
    for i in 0..DIST_CODE_COUNT {
        result += usize::from(d_lengths[i]) * d_counts[i];
        result += usize::from(DIST_EXTRA_TABLE[i]) * d_counts[i];
    }
    result += usize::from(ll_lengths[256]); // end symbol
    result
}

fn calculate_block_symbol_size(
    ll_lengths: &[u8; LITLEN_CODE_COUNT],
    d_lengths: &[u8; DIST_CODE_COUNT],
    store: &Lz77Store,
    lstart: usize,
    lend: usize,
) -> usize {
    if lstart + LITLEN_CODE_COUNT * 3 > lend {
        calculate_block_symbol_size_small(ll_lengths, d_lengths, store, lstart, lend)
    } else {
        let (mut ll_counts, d_counts) = store.histogram(lstart, lend);
        ll_counts[256] = 1;
        calculate_block_symbol_size_given_counts(
            &ll_counts, &d_counts, ll_lengths, d_lengths, store, lstart, lend,
        )
    }
}

/// Estimated size in bits of the token range encoded as the given block kind,
/// including the 3 header bits (and for stored blocks, the chunk headers).
pub fn calculate_block_size(store: &Lz77Store, lstart: usize, lend: usize, kind: BlockKind) -> f64 {
    let result = 3.0; // bfinal and btype bits

    match kind {
        BlockKind::Stored => {
            // an uncompressed block longer than 65535 bytes has to be split
            // into chunks, each with its own 5-byte header
            let length = store.byte_range(lstart, lend);
            let blocks = length / 65535 + usize::from(length % 65535 > 0);
            (blocks * 5 * 8 + length * 8) as f64
        }
        BlockKind::Fixed => {
            let (ll_lengths, d_lengths) = fixed_code_lengths();
            result + calculate_block_symbol_size(&ll_lengths, &d_lengths, store, lstart, lend) as f64
        }
        BlockKind::Dynamic => {
            let (cost, _, _) = get_dynamic_lengths(store, lstart, lend);
            result + cost
        }
    }
}

/// smallest of the three encodings, skipping the costly fixed estimate for
/// large blocks that would never choose it
pub fn calculate_block_size_auto_type(store: &Lz77Store, lstart: usize, lend: usize) -> f64 {
    let uncompressedcost = calculate_block_size(store, lstart, lend, BlockKind::Stored);
    let fixedcost = if store.len() > 1000 {
        uncompressedcost
    } else {
        calculate_block_size(store, lstart, lend, BlockKind::Fixed)
    };
    let dyncost = calculate_block_size(store, lstart, lend, BlockKind::Dynamic);

    uncompressedcost.min(fixedcost).min(dyncost)
}

/// Writes blocks into a single contiguous DEFLATE bitstream. Owns the output
/// buffer and the bit cursor, which carries partially filled bytes across
/// blocks and across `compress_part` calls.
pub struct DeflateWriter {
    /// bit writer to write partial bits to output
    bitwriter: BitWriter,

    /// compressed output
    output: Vec<u8>,
}

impl Default for DeflateWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DeflateWriter {
    pub fn new() -> Self {
        Self {
            bitwriter: BitWriter::default(),
            output: Vec::new(),
        }
    }

    /// number of bits pending in the partially filled trailing byte (0-7)
    pub fn bit_position(&self) -> u32 {
        self.bitwriter.bit_position()
    }

    /// pads the trailing byte with zero bits; the stream is only byte-aligned
    /// and complete after this
    pub fn flush(&mut self) {
        self.bitwriter.pad(0, &mut self.output);
    }

    pub fn detach_output(&mut self) -> Vec<u8> {
        let mut o = Vec::new();
        o.append(&mut self.output);
        o
    }

    /// bytes written so far (not counting pending bits)
    pub fn output_len(&self) -> usize {
        self.output.len()
    }

    /// Emits the byte range as stored (uncompressed) blocks, splitting into
    /// 65535-byte chunks as the format requires. Only the last chunk can
    /// carry the final flag.
    pub(crate) fn add_non_compressed_block(
        &mut self,
        final_block: bool,
        input: &[u8],
        instart: usize,
        inend: usize,
    ) -> Result<()> {
        let mut pos = instart;
        loop {
            let mut blocksize = 65535;
            if pos + blocksize > inend {
                blocksize = inend - pos;
            }
            let currentfinal = pos + blocksize >= inend;

            self.bitwriter
                .write(u32::from(final_block && currentfinal), 1, &mut self.output);
            // BTYPE 00
            self.bitwriter.write(0, 2, &mut self.output);
            // LEN and NLEN are byte aligned; any bits up to the boundary are ignored
            self.bitwriter.pad(0, &mut self.output);

            self.output.write_u16::<LittleEndian>(blocksize as u16)?;
            self.output.write_u16::<LittleEndian>(!(blocksize as u16))?;
            self.output.extend_from_slice(&input[pos..pos + blocksize]);

            if currentfinal {
                break;
            }
            pos += blocksize;
        }

        Ok(())
    }

    /// Emits one block of the chosen kind from the token range. For stored
    /// blocks the bytes are taken from `input` at the tokens' positions.
    pub(crate) fn add_lz77_block(
        &mut self,
        options: &CompressConfig,
        kind: BlockKind,
        final_block: bool,
        input: &[u8],
        store: &Lz77Store,
        lstart: usize,
        lend: usize,
        expected_data_size: usize,
    ) -> Result<()> {
        if kind == BlockKind::Stored {
            let length = store.byte_range(lstart, lend);
            let pos = if lstart == lend {
                0
            } else {
                store.positions()[lstart]
            };
            return self.add_non_compressed_block(final_block, input, pos, pos + length);
        }

        self.bitwriter
            .write(u32::from(final_block), 1, &mut self.output);

        let huffman_writer = match kind {
            BlockKind::Fixed => {
                self.bitwriter.write(1, 2, &mut self.output);
                HuffmanWriter::fixed()
            }
            BlockKind::Dynamic => {
                self.bitwriter.write(2, 2, &mut self.output);

                let detect_tree_size = self.output.len();
                let (_, ll_lengths, d_lengths) = get_dynamic_lengths(store, lstart, lend);
                add_dynamic_tree(&ll_lengths, &d_lengths, &mut self.bitwriter, &mut self.output);
                if options.verbose {
                    debug!("treesize: {}", self.output.len() - detect_tree_size);
                }

                HuffmanWriter::from_lengths(&ll_lengths, &d_lengths)
            }
            BlockKind::Stored => unreachable!(),
        };

        let detect_block_size = self.output.len();
        self.encode_huffman_data(store, lstart, lend, expected_data_size, &huffman_writer);

        if options.verbose {
            let uncompressed_size: usize = store.tokens()[lstart..lend]
                .iter()
                .map(|t| t.byte_length())
                .sum();
            let compressed_size = self.output.len() - detect_block_size;
            debug!(
                "compressed block size: {} ({}k) (unc: {})",
                compressed_size,
                compressed_size / 1024,
                uncompressed_size
            );
        }

        Ok(())
    }

    /// Emits the token range with whichever encoding is estimated smallest.
    /// Ties go to the simpler encoding: stored, then fixed, then dynamic.
    /// For blocks where a fixed tree is plausible, a dedicated fixed-tree
    /// optimal parse of the raw bytes is sized as well.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add_lz77_block_auto_type(
        &mut self,
        options: &CompressConfig,
        final_block: bool,
        input: &[u8],
        store: &Lz77Store,
        lstart: usize,
        lend: usize,
        expected_data_size: usize,
    ) -> Result<()> {
        if lstart == lend {
            // the smallest empty block is a fixed block with only the end
            // symbol: 3 header bits plus the 7-bit code 0000000
            self.bitwriter
                .write(u32::from(final_block), 1, &mut self.output);
            self.bitwriter.write(1, 2, &mut self.output);
            self.bitwriter.write(0, 7, &mut self.output);
            return Ok(());
        }

        let uncompressedcost = calculate_block_size(store, lstart, lend, BlockKind::Stored);
        let mut fixedcost = calculate_block_size(store, lstart, lend, BlockKind::Fixed);
        let dyncost = calculate_block_size(store, lstart, lend, BlockKind::Dynamic);

        // whether to try the expensive fixed-tree reparse of the range; only
        // small blocks or blocks already close to fixed cost can win from it
        let expensivefixed = store.len() < 1000 || fixedcost <= dyncost * 1.1;

        let mut fixedstore = Lz77Store::new();
        if expensivefixed {
            let instart = store.positions()[lstart];
            let inend = instart + store.byte_range(lstart, lend);

            let mut s = BlockState::new(options, instart, inend, true);
            lz77_optimal_fixed(&mut s, input, instart, inend, &mut fixedstore);
            fixedcost = calculate_block_size(&fixedstore, 0, fixedstore.len(), BlockKind::Fixed);
        }

        if uncompressedcost <= fixedcost && uncompressedcost <= dyncost {
            self.add_lz77_block(
                options,
                BlockKind::Stored,
                final_block,
                input,
                store,
                lstart,
                lend,
                expected_data_size,
            )
        } else if fixedcost <= dyncost {
            if expensivefixed {
                self.add_lz77_block(
                    options,
                    BlockKind::Fixed,
                    final_block,
                    input,
                    &fixedstore,
                    0,
                    fixedstore.len(),
                    expected_data_size,
                )
            } else {
                self.add_lz77_block(
                    options,
                    BlockKind::Fixed,
                    final_block,
                    input,
                    store,
                    lstart,
                    lend,
                    expected_data_size,
                )
            }
        } else {
            self.add_lz77_block(
                options,
                BlockKind::Dynamic,
                final_block,
                input,
                store,
                lstart,
                lend,
                expected_data_size,
            )
        }
    }

    fn encode_huffman_data(
        &mut self,
        store: &Lz77Store,
        lstart: usize,
        lend: usize,
        expected_data_size: usize,
        huffman_writer: &HuffmanWriter,
    ) {
        let mut testlength = 0;
        for token in &store.tokens()[lstart..lend] {
            match token {
                DeflateToken::Literal(lit) => {
                    huffman_writer.write_literal(
                        &mut self.bitwriter,
                        &mut self.output,
                        u16::from(*lit),
                    );
                    testlength += 1;
                }
                DeflateToken::Reference(r) => {
                    let lencode = quantize_length(r.len());
                    huffman_writer.write_literal(
                        &mut self.bitwriter,
                        &mut self.output,
                        (NONLEN_CODE_COUNT + lencode) as u16,
                    );

                    let lenextra = LENGTH_EXTRA_TABLE[lencode];
                    if lenextra > 0 {
                        self.bitwriter.write(
                            length_extra_bits_value(r.len()),
                            lenextra.into(),
                            &mut self.output,
                        );
                    }

                    let distcode = quantize_distance(r.dist());
                    huffman_writer.write_distance(
                        &mut self.bitwriter,
                        &mut self.output,
                        distcode as u16,
                    );

                    let distextra = DIST_EXTRA_TABLE[distcode];
                    if distextra > 0 {
                        self.bitwriter.write(
                            dist_extra_bits_value(r.dist()),
                            distextra.into(),
                            &mut self.output,
                        );
                    }

                    testlength += r.len() as usize;
                }
            }
        }
        debug_assert!(expected_data_size == 0 || testlength == expected_data_size);

        // end of block
        huffman_writer.write_literal(&mut self.bitwriter, &mut self.output, 256);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_block_layout() {
        let mut w = DeflateWriter::new();
        w.add_non_compressed_block(true, b"abc", 0, 3).unwrap();
        let out = w.detach_output();

        // final flag + BTYPE 00 + padding, LEN, NLEN, payload
        assert_eq!(out, [0x01, 0x03, 0x00, 0xfc, 0xff, b'a', b'b', b'c']);
    }

    #[test]
    fn stored_block_of_empty_range() {
        let mut w = DeflateWriter::new();
        w.add_non_compressed_block(true, b"", 0, 0).unwrap();
        let out = w.detach_output();
        assert_eq!(out, [0x01, 0x00, 0x00, 0xff, 0xff]);
    }

    #[test]
    fn oversized_stored_range_is_chunked() {
        let data = vec![0x55u8; 70000];
        let mut w = DeflateWriter::new();
        w.add_non_compressed_block(true, &data, 0, data.len()).unwrap();
        let out = w.detach_output();

        // two chunks: 65535 bytes and 4465 bytes, each with a 5-byte header
        assert_eq!(out.len(), 70000 + 10);
        // the first chunk must not be final
        assert_eq!(out[0] & 1, 0);
        let second_header = 5 + 65535;
        assert_eq!(out[second_header] & 1, 1);

        let decoded = miniz_oxide::inflate::decompress_to_vec(&out).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn empty_block_is_minimal_and_decodable() {
        let options = CompressConfig::default();
        let store = Lz77Store::new();
        let mut w = DeflateWriter::new();
        w.add_lz77_block_auto_type(&options, true, b"", &store, 0, 0, 0)
            .unwrap();
        w.flush();
        let out = w.detach_output();

        // 10 bits of data pad out to exactly two bytes
        assert_eq!(out.len(), 2);
        let decoded = miniz_oxide::inflate::decompress_to_vec(&out).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn stored_size_formula() {
        let mut store = Lz77Store::new();
        for i in 0..100usize {
            store.push((i % 256) as u16, 0, i);
        }
        let bits = calculate_block_size(&store, 0, store.len(), BlockKind::Stored);
        assert_eq!(bits, (5 * 8 + 100 * 8) as f64);
    }

    #[test]
    fn fixed_block_size_counts_code_lengths() {
        let mut store = Lz77Store::new();
        // one literal 'a' (8 bits) plus the end symbol (7 bits), 3 header bits
        store.push(u16::from(b'a'), 0, 0);
        let bits = calculate_block_size(&store, 0, store.len(), BlockKind::Fixed);
        assert_eq!(bits, 3.0 + 8.0 + 7.0);
    }

    #[test]
    fn rle_optimization_never_loses() {
        // a histogram with noisy mid-range values where flattening pays off
        let mut store = Lz77Store::new();
        let mut pos = 0;
        for i in 0..600usize {
            store.push((i % 150) as u16, 0, pos);
            pos += 1;
        }
        let (cost, ll, d) = get_dynamic_lengths(&store, 0, store.len());
        assert!(cost > 0.0);
        assert!(crate::deflate::huffman_encoding::is_valid_huffman_code_lengths(&ll));
        // at least two distance codes even though none are used
        assert!(d.iter().filter(|&&x| x > 0).count() >= 2);
    }

    #[test]
    fn dynamic_block_roundtrips() {
        let data = b"the rain in spain falls mainly on the plain, the rain in spain";
        let options = CompressConfig::default();

        let mut store = Lz77Store::new();
        for (i, &b) in data.iter().enumerate() {
            store.push(u16::from(b), 0, i);
        }

        let mut w = DeflateWriter::new();
        w.add_lz77_block(
            &options,
            BlockKind::Dynamic,
            true,
            data,
            &store,
            0,
            store.len(),
            0,
        )
        .unwrap();
        w.flush();
        let out = w.detach_output();

        let decoded = miniz_oxide::inflate::decompress_to_vec(&out).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn fixed_block_with_references_roundtrips() {
        let data = b"blah blah blah blah blah";
        let options = CompressConfig::default();

        // literal prefix "blah " then back-references
        let mut store = Lz77Store::new();
        for (i, &b) in data[..5].iter().enumerate() {
            store.push(u16::from(b), 0, i);
        }
        store.push(19, 5, 5);

        let mut w = DeflateWriter::new();
        w.add_lz77_block(
            &options,
            BlockKind::Fixed,
            true,
            data,
            &store,
            0,
            store.len(),
            data.len(),
        )
        .unwrap();
        w.flush();
        let out = w.detach_output();

        let decoded = miniz_oxide::inflate::decompress_to_vec(&out).unwrap();
        assert_eq!(decoded, data);
    }
}
