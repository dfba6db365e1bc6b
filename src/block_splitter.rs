/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Cost-driven block splitting: partitions a range into sub-blocks wherever
//! two independent Huffman codes are estimated cheaper than one combined
//! code, working on the token stream of a greedy parse and bounded by the
//! configured maximum block count.

use log::debug;

use crate::compressor::CompressConfig;
use crate::deflate::deflate_writer::calculate_block_size_auto_type;
use crate::hash_chain::HashChain;
use crate::lz77::{lz77_greedy, BlockState, Lz77Store};
use crate::optimal_parse::LARGE_FLOAT;

/// token regions smaller than this are never considered for splitting
const MINIMUM_SPLIT_DISTANCE: usize = 10;

/// Finds the position in [start, end) that minimizes `f`. Small ranges are
/// scanned exhaustively; larger ones use rounds of nine evenly spaced probes,
/// narrowing around the best one until no round improves.
fn find_minimum(mut f: impl FnMut(usize) -> f64, start: usize, end: usize) -> (usize, f64) {
    if end - start < 1024 {
        let mut best = LARGE_FLOAT;
        let mut result = start;
        for i in start..end {
            let v = f(i);
            if v < best {
                best = v;
                result = i;
            }
        }
        (result, best)
    } else {
        const NUM: usize = 9;

        let mut p = [0usize; NUM];
        let mut vp = [0.0f64; NUM];
        let mut lastbest = LARGE_FLOAT;
        let mut pos = start;

        let mut start = start;
        let mut end = end;

        loop {
            if end - start <= NUM {
                break;
            }

            for i in 0..NUM {
                p[i] = start + (i + 1) * ((end - start) / (NUM + 1));
                vp[i] = f(p[i]);
            }

            let mut besti = 0;
            let mut best = vp[0];
            for i in 1..NUM {
                if vp[i] < best {
                    best = vp[i];
                    besti = i;
                }
            }

            if best > lastbest {
                break;
            }

            start = if besti == 0 { start } else { p[besti - 1] };
            end = if besti == NUM - 1 { end } else { p[besti + 1] };

            pos = p[besti];
            lastbest = best;
        }

        (pos, lastbest)
    }
}

fn add_sorted(value: usize, out: &mut Vec<usize>) {
    let idx = out.partition_point(|&x| x <= value);
    out.insert(idx, value);
}

/// picks the largest region between consecutive split points that has not
/// been marked done yet
fn find_largest_splittable_block(
    lz77size: usize,
    done: &[bool],
    splitpoints: &[usize],
) -> Option<(usize, usize)> {
    let mut longest = 0;
    let mut found = None;

    let mut last = 0;
    for &split in splitpoints {
        if !done[last] && split - last > longest {
            found = Some((last, split));
            longest = split - last;
        }
        last = split;
    }

    if !done[last] && lz77size - 1 - last > longest {
        found = Some((last, lz77size - 1));
    }

    found
}

/// reports the split points as byte offsets of the original data
fn print_block_split_points(lz77: &Lz77Store, lz77splitpoints: &[usize]) {
    let mut splitpoints = Vec::with_capacity(lz77splitpoints.len());
    let mut pos = 0;
    let mut current = 0;
    for (i, token) in lz77.tokens().iter().enumerate() {
        if current < lz77splitpoints.len() && lz77splitpoints[current] == i {
            splitpoints.push(pos);
            current += 1;
        }
        pos += token.byte_length();
    }
    debug_assert_eq!(splitpoints.len(), lz77splitpoints.len());

    debug!("block split points: {:?}", splitpoints);
}

/// Splits the token stream into at most `maxblocks` blocks. Repeatedly takes
/// the largest unsplit region, finds its single best interior split point by
/// estimated cost, and accepts the split only if it beats the unsplit cost.
/// Returns the chosen split points as token indices, sorted.
pub fn block_split_lz77(
    options: &CompressConfig,
    lz77: &Lz77Store,
    maxblocks: usize,
) -> Vec<usize> {
    if lz77.len() < MINIMUM_SPLIT_DISTANCE {
        return Vec::new();
    }

    let mut done = vec![false; lz77.len()];
    let mut splitpoints: Vec<usize> = Vec::new();

    let mut lstart = 0;
    let mut lend = lz77.len();
    let mut numblocks = 1;

    loop {
        if maxblocks > 0 && numblocks >= maxblocks {
            break;
        }

        debug_assert!(lstart < lend);
        let (llpos, splitcost) = find_minimum(
            |i| {
                calculate_block_size_auto_type(lz77, lstart, i)
                    + calculate_block_size_auto_type(lz77, i, lend)
            },
            lstart + 1,
            lend,
        );

        debug_assert!(llpos > lstart);
        debug_assert!(llpos < lend);

        let origcost = calculate_block_size_auto_type(lz77, lstart, lend);

        if splitcost > origcost || llpos == lstart + 1 || llpos == lend {
            done[lstart] = true;
        } else {
            add_sorted(llpos, &mut splitpoints);
            numblocks += 1;
        }

        match find_largest_splittable_block(lz77.len(), &done, &splitpoints) {
            Some((s, e)) => {
                lstart = s;
                lend = e;
            }
            None => break,
        }

        if lend - lstart < MINIMUM_SPLIT_DISTANCE {
            break;
        }
    }

    if options.verbose && !splitpoints.is_empty() {
        print_block_split_points(lz77, &splitpoints);
    }

    splitpoints
}

/// Splits a raw byte range by first running a greedy parse over it and
/// splitting that token stream. Unintuitively, the simple parse gives better
/// split points than the optimal one would. Returns byte offsets.
pub fn block_split(
    options: &CompressConfig,
    input: &[u8],
    instart: usize,
    inend: usize,
    maxblocks: usize,
) -> Vec<usize> {
    let mut s = BlockState::new(options, instart, inend, false);
    let mut store = Lz77Store::new();
    let mut h = HashChain::new();

    lz77_greedy(&mut s, input, instart, inend, &mut store, &mut h);

    let lz77splitpoints = block_split_lz77(options, &store, maxblocks);

    // convert token indices back to byte positions
    let mut splitpoints = Vec::with_capacity(lz77splitpoints.len());
    let mut pos = instart;
    for (i, token) in store.tokens().iter().enumerate() {
        if splitpoints.len() < lz77splitpoints.len() && lz77splitpoints[splitpoints.len()] == i {
            splitpoints.push(pos);
            if splitpoints.len() == lz77splitpoints.len() {
                break;
            }
        }
        pos += token.byte_length();
    }
    debug_assert_eq!(splitpoints.len(), lz77splitpoints.len());

    splitpoints
}
