/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Top-level drivers: validate the configuration, split the range into
//! blocks, run the iterated optimal parse per block, and emit the chosen
//! encodings as one contiguous stream.

use log::debug;

use crate::block_splitter::{block_split, block_split_lz77};
use crate::deflate::deflate_writer::{calculate_block_size_auto_type, BlockKind, DeflateWriter};
use crate::lz77::{BlockState, Lz77Store};
use crate::optimal_parse::{lz77_optimal, lz77_optimal_fixed};
use crate::optiflate_error::{err_exit_code, ExitCode, Result};

/// Inputs larger than this are compressed as independent chunks of this many
/// bytes, so that huge buffers do not need parsing state proportional to
/// their size. This hurts compression a little, but not much relative to the
/// chunk size.
const MASTER_BLOCK_SIZE: usize = 1_000_000;

/// Requested block encoding for a compression call. `Auto` lets the emitter
/// choose the smallest of the three per sub-range, which is what you want
/// unless you are testing a decoder.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlockType {
    Auto,
    Stored,
    Fixed,
    Dynamic,
}

/// Parameters controlling how much effort the search spends. Validated
/// before any work begins; immutable during a call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CompressConfig {
    /// Number of optimal-parse refinement iterations per block. More gives
    /// smaller output at a linear cost in CPU time. Must be at least 1.
    pub iteration_count: u32,

    /// whether to split the input into blocks with separate Huffman codes
    pub block_splitting: bool,

    /// maximum number of blocks to split into; must be at least 1
    pub block_splitting_max: u32,

    /// report iteration costs and block sizes through the log facade; has no
    /// effect on the produced stream
    pub verbose: bool,
    pub verbose_more: bool,

    /// seed pair of the statistics-perturbation PRNG. Fixed by default so
    /// identical calls produce identical streams.
    pub random_seed: (u32, u32),
}

impl Default for CompressConfig {
    fn default() -> Self {
        CompressConfig {
            iteration_count: 15,
            block_splitting: true,
            block_splitting_max: 15,
            verbose: false,
            verbose_more: false,
            random_seed: (1, 2),
        }
    }
}

impl CompressConfig {
    /// rejects configurations under which no work could be done
    pub fn validate(&self) -> Result<()> {
        if self.iteration_count < 1 {
            return err_exit_code(ExitCode::InvalidConfig, "iteration count must be at least 1");
        }
        if self.block_splitting_max < 1 {
            return err_exit_code(
                ExitCode::InvalidConfig,
                "block splitting maximum must be at least 1",
            );
        }
        Ok(())
    }
}

/// Compresses `input[instart..inend]`, appending to the writer's stream and
/// continuing at its current bit position. When `final_block` is set the
/// last emitted block carries the terminal flag. An empty range is valid and
/// produces a minimal block. Consecutive calls sharing a writer form one
/// decodable DEFLATE stream.
pub fn compress_part(
    options: &CompressConfig,
    btype: BlockType,
    final_block: bool,
    input: &[u8],
    instart: usize,
    inend: usize,
    writer: &mut DeflateWriter,
) -> Result<()> {
    options.validate()?;
    if instart > inend || inend > input.len() {
        return err_exit_code(ExitCode::InvalidRange, "input range out of bounds");
    }

    match btype {
        BlockType::Stored => writer.add_non_compressed_block(final_block, input, instart, inend),
        BlockType::Fixed => {
            let mut s = BlockState::new(options, instart, inend, true);
            let mut store = Lz77Store::new();
            lz77_optimal_fixed(&mut s, input, instart, inend, &mut store);
            writer.add_lz77_block(
                options,
                BlockKind::Fixed,
                final_block,
                input,
                &store,
                0,
                store.len(),
                0,
            )
        }
        BlockType::Auto | BlockType::Dynamic => {
            compress_split_blocks(options, btype, final_block, input, instart, inend, writer)
        }
    }
}

/// the splitting + iterated-parse pipeline used for Auto and Dynamic
fn compress_split_blocks(
    options: &CompressConfig,
    btype: BlockType,
    final_block: bool,
    input: &[u8],
    instart: usize,
    inend: usize,
    writer: &mut DeflateWriter,
) -> Result<()> {
    let splitpoints_uncompressed = if options.block_splitting {
        block_split(
            options,
            input,
            instart,
            inend,
            options.block_splitting_max as usize,
        )
    } else {
        Vec::new()
    };
    let npoints = splitpoints_uncompressed.len();

    let mut lz77 = Lz77Store::new();
    let mut splitpoints: Vec<usize> = Vec::with_capacity(npoints);
    let mut totalcost = 0.0;

    for i in 0..=npoints {
        let start = if i == 0 {
            instart
        } else {
            splitpoints_uncompressed[i - 1]
        };
        let end = if i == npoints {
            inend
        } else {
            splitpoints_uncompressed[i]
        };

        let mut s = BlockState::new(options, start, end, true);
        let mut store = Lz77Store::new();
        lz77_optimal(&mut s, input, start, end, options.iteration_count, &mut store);
        totalcost += calculate_block_size_auto_type(&store, 0, store.len());

        lz77.append_store(&store);
        if i < npoints {
            splitpoints.push(lz77.len());
        }
    }

    // second pass: the optimal token stream may admit a better partition
    // than the greedy pre-pass suggested
    if options.block_splitting && npoints > 1 {
        let splitpoints2 =
            block_split_lz77(options, &lz77, options.block_splitting_max as usize);

        let mut totalcost2 = 0.0;
        for i in 0..=splitpoints2.len() {
            let start = if i == 0 { 0 } else { splitpoints2[i - 1] };
            let end = if i == splitpoints2.len() {
                lz77.len()
            } else {
                splitpoints2[i]
            };
            totalcost2 += calculate_block_size_auto_type(&lz77, start, end);
        }

        if totalcost2 < totalcost {
            splitpoints = splitpoints2;
        }
    }

    let npoints = splitpoints.len();
    for i in 0..=npoints {
        let start = if i == 0 { 0 } else { splitpoints[i - 1] };
        let end = if i == npoints { lz77.len() } else { splitpoints[i] };
        let last = i == npoints && final_block;

        if btype == BlockType::Dynamic {
            writer.add_lz77_block(
                options,
                BlockKind::Dynamic,
                last,
                input,
                &lz77,
                start,
                end,
                0,
            )?;
        } else {
            writer.add_lz77_block_auto_type(options, last, input, &lz77, start, end, 0)?;
        }
    }

    Ok(())
}

/// Compresses a whole buffer into a fresh, finalized DEFLATE stream. Large
/// inputs are windowed into master blocks, each compressed independently
/// with the final flag only on the last.
pub fn compress(options: &CompressConfig, btype: BlockType, input: &[u8]) -> Result<Vec<u8>> {
    options.validate()?;

    let mut writer = DeflateWriter::new();
    let mut i = 0;
    loop {
        let masterfinal = i + MASTER_BLOCK_SIZE >= input.len();
        let size = if masterfinal {
            input.len() - i
        } else {
            MASTER_BLOCK_SIZE
        };

        compress_part(options, btype, masterfinal, input, i, i + size, &mut writer)?;
        i += size;

        if i >= input.len() {
            break;
        }
    }

    writer.flush();
    let out = writer.detach_output();

    if options.verbose && !input.is_empty() {
        debug!(
            "original size: {}, deflate: {}, compression: {:.6}% removed",
            input.len(),
            out.len(),
            100.0 * (input.len() as f64 - out.len() as f64) / input.len() as f64
        );
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_config() {
        let options = CompressConfig {
            iteration_count: 0,
            ..CompressConfig::default()
        };
        let e = compress(&options, BlockType::Auto, b"x").unwrap_err();
        assert_eq!(e.exit_code(), crate::optiflate_error::ExitCode::InvalidConfig);

        let options = CompressConfig {
            block_splitting_max: 0,
            ..CompressConfig::default()
        };
        let e = compress(&options, BlockType::Auto, b"x").unwrap_err();
        assert_eq!(e.exit_code(), crate::optiflate_error::ExitCode::InvalidConfig);
    }

    #[test]
    fn rejects_malformed_range() {
        let options = CompressConfig::default();
        let mut writer = DeflateWriter::new();

        let e = compress_part(&options, BlockType::Auto, true, b"abc", 2, 1, &mut writer)
            .unwrap_err();
        assert_eq!(e.exit_code(), crate::optiflate_error::ExitCode::InvalidRange);

        let e = compress_part(&options, BlockType::Auto, true, b"abc", 0, 4, &mut writer)
            .unwrap_err();
        assert_eq!(e.exit_code(), crate::optiflate_error::ExitCode::InvalidRange);
    }

    #[test]
    fn compresses_with_every_block_type() {
        let data = b"compression test data, compression test data, compression test data";
        let options = CompressConfig {
            iteration_count: 5,
            ..CompressConfig::default()
        };

        for btype in [
            BlockType::Auto,
            BlockType::Stored,
            BlockType::Fixed,
            BlockType::Dynamic,
        ] {
            let out = compress(&options, btype, data).unwrap();
            let decoded = miniz_oxide::inflate::decompress_to_vec(&out).unwrap();
            assert_eq!(decoded, data, "block type {:?}", btype);
        }
    }

    #[test]
    fn empty_input_yields_minimal_stream() {
        let options = CompressConfig::default();
        let out = compress(&options, BlockType::Auto, b"").unwrap();
        assert_eq!(out.len(), 2);
        let decoded = miniz_oxide::inflate::decompress_to_vec(&out).unwrap();
        assert!(decoded.is_empty());
    }
}
