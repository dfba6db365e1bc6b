/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::deflate::{
    bit_writer::BitWriter,
    deflate_constants::{
        CODETREE_CODE_COUNT, DIST_CODE_COUNT, LITLEN_CODE_COUNT, TREE_CODE_ORDER_TABLE,
    },
    huffman_calc::calc_bit_lengths,
};

/// Calculates Huffman code array given an array of Huffman Code Lengths using the RFC 1951 algorithm
pub fn calc_huffman_codes(code_lengths: &[u8]) -> Vec<u16> {
    let mut result: Vec<u16> = vec![0; code_lengths.len()];

    // The following algorithm generates the codes as integers, intended to be read
    // from least- to most-significant bit.

    // 1)  Count the number of codes for each code length.  Let
    // bl_count[N] be the number of codes of length N, N >= 1.

    let mut maxbits = 0;
    let mut bl_count: [u16; 32] = [0; 32];
    for cbit in code_lengths {
        bl_count[*cbit as usize] += 1;
        if *cbit > maxbits {
            maxbits = *cbit;
        }
    }

    //	2)  Find the numerical value of the smallest code for each code length:

    let mut code: u16 = 0;
    bl_count[0] = 0;
    let mut next_code: [u16; 32] = [0; 32];
    for bits in 1..=maxbits {
        code = (code + bl_count[bits as usize - 1]) << 1;
        next_code[bits as usize] = code;
    }

    // 3)  Assign numerical values to all codes, using consecutive
    // values for all codes of the same length with the base
    // values determined at step 2. Codes that are never used
    // (which have a bit length of zero) must not be assigned a
    // value.

    for n in 0..code_lengths.len() {
        let len = code_lengths[n];
        if len != 0 {
            let mut code = next_code[len as usize];

            // code should be stored in reverse bit order
            let mut rev_code = 0;
            for _ in 0..len {
                rev_code = (rev_code << 1) | (code & 1);
                code >>= 1;
            }

            result[n] = rev_code;
            next_code[len as usize] += 1;
        }
    }

    result
}

/// checks that the given code lengths describe a complete prefix code
/// (every internal tree node has exactly two children)
pub fn is_valid_huffman_code_lengths(code_lengths: &[u8]) -> bool {
    if code_lengths.is_empty() {
        return false;
    }

    const MAX_CODE_LENGTH: usize = 16;
    let mut length_count = [0; MAX_CODE_LENGTH];
    for &length in code_lengths.iter() {
        if length as usize >= MAX_CODE_LENGTH {
            return false;
        }
        length_count[length as usize] += 1;
    }

    // essential property of huffman codes is that all internal nodes
    // have exactly two children. This means that the number of internal
    // nodes doubles each time we go down one level in the tree.
    let mut internal_nodes: i32 = 2;
    for i in 1..length_count.len() {
        internal_nodes -= length_count[i];
        if internal_nodes < 0 {
            return false;
        }
        internal_nodes *= 2;
    }

    // there should be no more internal nodes left
    internal_nodes == 0
}

/// code lengths of the fixed literal/length and distance tables (RFC 1951 3.2.6)
///
/// Lit Value    Bits
/// ---------    ----
///   0 - 143     8
/// 144 - 255     9
/// 256 - 279     7
/// 280 - 287     8
///
/// all distance codes use 5 bits
pub fn fixed_code_lengths() -> ([u8; LITLEN_CODE_COUNT], [u8; DIST_CODE_COUNT]) {
    let mut lit_lengths = [8u8; LITLEN_CODE_COUNT];
    for i in 144..=255 {
        lit_lengths[i] = 9;
    }
    for i in 256..=279 {
        lit_lengths[i] = 7;
    }

    (lit_lengths, [5u8; DIST_CODE_COUNT])
}

/// Holds the resolved codes of both alphabets of a block, ready for emission.
pub struct HuffmanWriter {
    lit_code_lengths: Vec<u8>,
    lit_huffman_codes: Vec<u16>,
    dist_code_lengths: Vec<u8>,
    dist_huffman_codes: Vec<u16>,
}

impl HuffmanWriter {
    pub fn from_lengths(lit_lengths: &[u8], dist_lengths: &[u8]) -> Self {
        debug_assert!(is_valid_huffman_code_lengths(lit_lengths));

        HuffmanWriter {
            lit_code_lengths: lit_lengths.to_vec(),
            lit_huffman_codes: calc_huffman_codes(lit_lengths),
            dist_code_lengths: dist_lengths.to_vec(),
            dist_huffman_codes: calc_huffman_codes(dist_lengths),
        }
    }

    pub fn fixed() -> Self {
        let (lit_lengths, dist_lengths) = fixed_code_lengths();
        HuffmanWriter::from_lengths(&lit_lengths, &dist_lengths)
    }

    #[inline(always)]
    pub fn write_literal(&self, bitwriter: &mut BitWriter, output_buffer: &mut Vec<u8>, lit: u16) {
        let code = self.lit_huffman_codes[lit as usize];
        let c_bits = self.lit_code_lengths[lit as usize];
        debug_assert!(c_bits > 0);

        bitwriter.write(code.into(), c_bits.into(), output_buffer);
    }

    #[inline(always)]
    pub fn write_distance(
        &self,
        bitwriter: &mut BitWriter,
        output_buffer: &mut Vec<u8>,
        dist: u16,
    ) {
        let code = self.dist_huffman_codes[dist as usize];
        let c_bits = self.dist_code_lengths[dist as usize];
        debug_assert!(c_bits > 0);

        bitwriter.write(code.into(), c_bits.into(), output_buffer);
    }
}

/// Sizes (and optionally writes) the dynamic block header for the given code
/// lengths: HLIT/HDIST/HCLEN, the code-length alphabet, and the run-length
/// encoded lengths of both tables. The 16/17/18 repeat symbols can each be
/// disabled, since using them is not always a win. Returns the header size
/// in bits.
fn encode_tree(
    ll_lengths: &[u8; LITLEN_CODE_COUNT],
    d_lengths: &[u8; DIST_CODE_COUNT],
    use_16: bool,
    use_17: bool,
    use_18: bool,
    emit: Option<(&mut BitWriter, &mut Vec<u8>)>,
) -> usize {
    let mut clcounts = [0usize; CODETREE_CODE_COUNT];

    // trailing zero lengths are not transmitted
    let mut hlit = 29;
    while hlit > 0 && ll_lengths[257 + hlit - 1] == 0 {
        hlit -= 1;
    }
    let mut hdist = 29;
    while hdist > 0 && d_lengths[1 + hdist - 1] == 0 {
        hdist -= 1;
    }
    let hlit2 = hlit + 257;
    let lld_total = hlit2 + hdist + 1;

    // run-length encode the concatenated length sequence; each entry is a
    // code-length symbol plus the payload of its extra bits
    let mut rle: Vec<(u8, u8)> = Vec::new();

    let length_at = |i: usize| {
        if i < hlit2 {
            ll_lengths[i]
        } else {
            d_lengths[i - hlit2]
        }
    };

    let mut i = 0;
    while i < lld_total {
        let symbol = length_at(i);
        let mut count = 1usize;
        if use_16 || (symbol == 0 && (use_17 || use_18)) {
            let mut j = i + 1;
            while j < lld_total && symbol == length_at(j) {
                count += 1;
                j += 1;
            }
        }
        i += count;

        // runs of zero get the dedicated zero-run symbols
        if symbol == 0 && count >= 3 {
            if use_18 {
                while count >= 11 {
                    let count2 = count.min(138);
                    rle.push((18, (count2 - 11) as u8));
                    clcounts[18] += 1;
                    count -= count2;
                }
            }
            if use_17 {
                while count >= 3 {
                    let count2 = count.min(10);
                    rle.push((17, (count2 - 3) as u8));
                    clcounts[17] += 1;
                    count -= count2;
                }
            }
        }

        // runs of any symbol: emit it once, then repeat codes
        if use_16 && count >= 4 {
            count -= 1;
            clcounts[symbol as usize] += 1;
            rle.push((symbol, 0));
            while count >= 3 {
                let count2 = count.min(6);
                rle.push((16, (count2 - 3) as u8));
                clcounts[16] += 1;
                count -= count2;
            }
        }

        // whatever remains is emitted literally
        clcounts[symbol as usize] += count;
        while count > 0 {
            rle.push((symbol, 0));
            count -= 1;
        }
    }

    let clcl = calc_bit_lengths(&clcounts, 7);

    let mut hclen = 15;
    while hclen > 0 && clcounts[TREE_CODE_ORDER_TABLE[hclen + 4 - 1]] == 0 {
        hclen -= 1;
    }

    if let Some((bitwriter, output)) = emit {
        let clsymbols = calc_huffman_codes(&clcl);

        bitwriter.write(hlit as u32, 5, output);
        bitwriter.write(hdist as u32, 5, output);
        bitwriter.write(hclen as u32, 4, output);

        for &order in TREE_CODE_ORDER_TABLE.iter().take(hclen + 4) {
            bitwriter.write(clcl[order].into(), 3, output);
        }

        for &(symbol, extra) in rle.iter() {
            bitwriter.write(
                clsymbols[symbol as usize].into(),
                clcl[symbol as usize].into(),
                output,
            );
            match symbol {
                16 => bitwriter.write(extra.into(), 2, output),
                17 => bitwriter.write(extra.into(), 3, output),
                18 => bitwriter.write(extra.into(), 7, output),
                _ => {}
            }
        }
    }

    let mut result_size = 14;
    result_size += (hclen + 4) * 3;
    for i in 0..CODETREE_CODE_COUNT {
        result_size += clcl[i] as usize * clcounts[i];
    }
    result_size += clcounts[16] * 2;
    result_size += clcounts[17] * 3;
    result_size += clcounts[18] * 7;

    result_size
}

/// Writes the dynamic block header, picking whichever combination of the
/// 16/17/18 repeat symbols encodes it the smallest.
pub fn add_dynamic_tree(
    ll_lengths: &[u8; LITLEN_CODE_COUNT],
    d_lengths: &[u8; DIST_CODE_COUNT],
    bitwriter: &mut BitWriter,
    output: &mut Vec<u8>,
) {
    let mut best = 0;
    let mut bestsize = 0;

    for i in 0..8 {
        let size = encode_tree(
            ll_lengths,
            d_lengths,
            i & 1 != 0,
            i & 2 != 0,
            i & 4 != 0,
            None,
        );
        if bestsize == 0 || size < bestsize {
            bestsize = size;
            best = i;
        }
    }

    encode_tree(
        ll_lengths,
        d_lengths,
        best & 1 != 0,
        best & 2 != 0,
        best & 4 != 0,
        Some((bitwriter, output)),
    );
}

/// Size in bits of the smallest of the eight dynamic header encodings.
pub fn calculate_tree_size(
    ll_lengths: &[u8; LITLEN_CODE_COUNT],
    d_lengths: &[u8; DIST_CODE_COUNT],
) -> usize {
    let mut result = 0;

    for i in 0..8 {
        let size = encode_tree(
            ll_lengths,
            d_lengths,
            i & 1 != 0,
            i & 2 != 0,
            i & 4 != 0,
            None,
        );
        if result == 0 || size < result {
            result = size;
        }
    }

    result
}

/// canonical code assignment for the RFC 1951 worked example, stored in
/// reverse bit order for least-significant-bit-first emission
#[test]
fn canonical_codes_match_rfc_example() {
    let lengths = [3u8, 3, 3, 3, 3, 2, 4, 4];
    let codes = calc_huffman_codes(&lengths);

    // MSB-first the codes are 010 011 100 101 110 00 1110 1111
    let expected_reversed = [0b010, 0b110, 0b001, 0b101, 0b011, 0b00, 0b0111, 0b1111];
    assert_eq!(codes, expected_reversed);
}

#[test]
fn code_length_validity() {
    assert!(is_valid_huffman_code_lengths(&[3, 3, 3, 3, 3, 2, 4, 4]));
    assert!(is_valid_huffman_code_lengths(&[1, 1]));
    assert!(is_valid_huffman_code_lengths(&[1, 2, 2, 0]));

    // incomplete or oversubscribed trees must be rejected
    assert!(!is_valid_huffman_code_lengths(&[1, 2, 0, 0]));
    assert!(!is_valid_huffman_code_lengths(&[1, 1, 1]));
    assert!(!is_valid_huffman_code_lengths(&[0, 0, 0]));
}

#[test]
fn fixed_tables_are_complete() {
    let (lit, dist) = fixed_code_lengths();
    assert!(is_valid_huffman_code_lengths(&lit));
    assert!(is_valid_huffman_code_lengths(&dist));
    assert_eq!(lit[0], 8);
    assert_eq!(lit[144], 9);
    assert_eq!(lit[256], 7);
    assert_eq!(lit[280], 8);
}

/// codes of the same table must satisfy the prefix property; since the codes
/// are stored bit-reversed, two codes share a prefix iff their low bits match
#[test]
fn codes_satisfy_prefix_property() {
    let lengths = [4u8, 4, 3, 0, 2, 1];
    assert!(is_valid_huffman_code_lengths(&lengths));
    let codes = calc_huffman_codes(&lengths);

    for i in 0..lengths.len() {
        for j in 0..lengths.len() {
            if i == j || lengths[i] == 0 || lengths[j] == 0 {
                continue;
            }
            let minlen = lengths[i].min(lengths[j]);
            let mask = (1u16 << minlen) - 1;
            assert!(
                codes[i] & mask != codes[j] & mask,
                "code {} prefixes code {}",
                i,
                j
            );
        }
    }
}

#[test]
fn tree_encoding_sizes_are_consistent() {
    let (ll, d) = fixed_code_lengths();

    // the emitted header must be exactly as large as the size-only pass says
    let mut bitwriter = BitWriter::default();
    let mut output = Vec::new();
    add_dynamic_tree(&ll, &d, &mut bitwriter, &mut output);
    let written_bits = output.len() * 8 + bitwriter.bits_in as usize;

    let predicted = calculate_tree_size(&ll, &d);
    assert_eq!(written_bits, predicted);
}
