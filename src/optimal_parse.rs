/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! The optimal parse ("squeeze"): a shortest-path search over the input
//! positions where edges are literals and back-references priced by the
//! current cost model. Iterates against entropy statistics of its own output
//! until the estimate stops improving, with bounded random perturbation to
//! escape local minima.

use log::debug;

use crate::deflate::deflate_constants::{
    dist_extra_bits, length_extra_bits, quantize_distance, quantize_length, DIST_CODE_COUNT,
    LITLEN_CODE_COUNT, MAX_MATCH, MIN_MATCH, NONLEN_CODE_COUNT, WINDOW_MASK, WINDOW_SIZE,
};
use crate::deflate::deflate_writer::{calculate_block_size, BlockKind};
use crate::hash_chain::HashChain;
use crate::lz77::{find_longest_match, lz77_greedy, verify_len_dist, BlockState, Lz77Store};

/// stand-in for infinity when initializing path costs
pub const LARGE_FLOAT: f64 = 1e30;

/// Estimated cost in bits of emitting a symbol: a literal when `dist` is 0,
/// otherwise a (length, distance) pair including its extra bits.
pub trait CostModel {
    fn cost(&self, litlen: u32, dist: u32) -> f64;
}

/// cost under the fixed (static) Huffman tables
struct FixedCostModel;

impl CostModel for FixedCostModel {
    fn cost(&self, litlen: u32, dist: u32) -> f64 {
        if dist == 0 {
            if litlen <= 143 {
                8.0
            } else {
                9.0
            }
        } else {
            let lsym = NONLEN_CODE_COUNT + quantize_length(litlen);
            let base = if lsym <= 279 { 7 } else { 8 };
            f64::from(base + 5 + length_extra_bits(litlen) + dist_extra_bits(dist))
        }
    }
}

/// Symbol frequencies of one parse and the entropy-derived bit costs used to
/// price the next one.
#[derive(Clone)]
pub struct SymbolStats {
    litlens: [usize; LITLEN_CODE_COUNT],
    dists: [usize; DIST_CODE_COUNT],

    ll_symbols: [f64; LITLEN_CODE_COUNT],
    d_symbols: [f64; DIST_CODE_COUNT],
}

impl Default for SymbolStats {
    fn default() -> Self {
        SymbolStats {
            litlens: [0; LITLEN_CODE_COUNT],
            dists: [0; DIST_CODE_COUNT],
            ll_symbols: [0.0; LITLEN_CODE_COUNT],
            d_symbols: [0.0; DIST_CODE_COUNT],
        }
    }
}

impl SymbolStats {
    fn clear_freqs(&mut self) {
        self.litlens = [0; LITLEN_CODE_COUNT];
        self.dists = [0; DIST_CODE_COUNT];
    }

    /// tallies the symbols of a parse and recomputes the bit costs
    pub fn get_statistics(&mut self, store: &Lz77Store) {
        for token in store.tokens() {
            self.litlens[token.litlen_symbol()] += 1;
            if let Some(d) = token.dist_symbol() {
                self.dists[d] += 1;
            }
        }

        // the end-of-block symbol is always emitted exactly once
        self.litlens[256] = 1;

        self.calculate();
    }

    /// recomputes the per-symbol bit costs from the current frequencies
    pub fn calculate(&mut self) {
        calculate_entropy(&self.litlens, &mut self.ll_symbols);
        calculate_entropy(&self.dists, &mut self.d_symbols);
    }

    /// replaces a third of the frequencies with other randomly picked ones
    fn randomize(&mut self, state: &mut RanState) {
        randomize_freqs(state, &mut self.litlens);
        randomize_freqs(state, &mut self.dists);
        self.litlens[256] = 1;
    }
}

impl CostModel for SymbolStats {
    fn cost(&self, litlen: u32, dist: u32) -> f64 {
        if dist == 0 {
            self.ll_symbols[litlen as usize]
        } else {
            let lsym = NONLEN_CODE_COUNT + quantize_length(litlen);
            let dsym = quantize_distance(dist);
            f64::from(length_extra_bits(litlen) + dist_extra_bits(dist))
                + self.ll_symbols[lsym]
                + self.d_symbols[dsym]
        }
    }
}

fn add_weighed_stat_freqs(
    stats1: &SymbolStats,
    w1: f64,
    stats2: &SymbolStats,
    w2: f64,
) -> SymbolStats {
    let mut result = SymbolStats::default();
    for i in 0..LITLEN_CODE_COUNT {
        result.litlens[i] =
            (stats1.litlens[i] as f64 * w1 + stats2.litlens[i] as f64 * w2) as usize;
    }
    for i in 0..DIST_CODE_COUNT {
        result.dists[i] = (stats1.dists[i] as f64 * w1 + stats2.dists[i] as f64 * w2) as usize;
    }
    result.litlens[256] = 1;
    result
}

/// Shannon entropy (in bits) of each symbol under the given frequency
/// distribution; unseen symbols get the cost of a frequency-one symbol
fn calculate_entropy(count: &[usize], bitlengths: &mut [f64]) {
    const K_INV_LOG2: f64 = std::f64::consts::LOG2_E;

    let sum: usize = count.iter().sum();
    let log2sum = if sum == 0 {
        (count.len() as f64).ln()
    } else {
        (sum as f64).ln()
    } * K_INV_LOG2;

    for i in 0..count.len() {
        if count[i] == 0 {
            bitlengths[i] = log2sum;
        } else {
            let mut l = log2sum - (count[i] as f64).ln() * K_INV_LOG2;
            // rounding can push a dominant symbol epsilon below zero
            if l < 0.0 && l > -1e-5 {
                l = 0.0;
            }
            bitlengths[i] = l;
        }
        debug_assert!(bitlengths[i] >= 0.0);
    }
}

/// multiply-with-carry PRNG; explicitly seeded so runs stay reproducible
pub struct RanState {
    m_w: u32,
    m_z: u32,
}

impl RanState {
    pub fn new(seed: (u32, u32)) -> Self {
        RanState {
            m_w: seed.0,
            m_z: seed.1,
        }
    }

    fn ran(&mut self) -> u32 {
        self.m_z = 36969u32
            .wrapping_mul(self.m_z & 65535)
            .wrapping_add(self.m_z >> 16);
        self.m_w = 18000u32
            .wrapping_mul(self.m_w & 65535)
            .wrapping_add(self.m_w >> 16);
        (self.m_z << 16).wrapping_add(self.m_w)
    }
}

fn randomize_freqs(state: &mut RanState, freqs: &mut [usize]) {
    let n = freqs.len();
    for i in 0..n {
        if (state.ran() >> 4) % 3 == 0 {
            freqs[i] = freqs[state.ran() as usize % n];
        }
    }
}

/// cheapest possible symbol cost under the model; used as a pruning floor in
/// the path search
fn get_cost_model_min_cost(costmodel: &impl CostModel) -> f64 {
    // the smallest representative distance of each distance code
    const DSYMBOLS: [u32; DIST_CODE_COUNT] = [
        1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
        2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
    ];

    let mut bestlength = 0;
    let mut mincost = LARGE_FLOAT;
    for i in 3..259 {
        let c = costmodel.cost(i, 1);
        if c < mincost {
            bestlength = i;
            mincost = c;
        }
    }

    let mut bestdist = 0;
    let mut mincost = LARGE_FLOAT;
    for &d in DSYMBOLS.iter() {
        let c = costmodel.cost(3, d);
        if c < mincost {
            bestdist = d;
            mincost = c;
        }
    }

    costmodel.cost(bestlength, bestdist)
}

/// Forward dynamic-programming pass: computes for every position the minimal
/// cost of encoding the range up to it, considering the literal and every
/// achievable sublength of the longest match there. `length_array` receives
/// the edge length used to reach each position. Returns the cost of the full
/// range.
fn get_best_lengths(
    s: &mut BlockState,
    input: &[u8],
    instart: usize,
    inend: usize,
    costmodel: &impl CostModel,
    length_array: &mut [u16],
    h: &mut HashChain,
    costs: &mut [f32],
) -> f64 {
    let blocksize = inend - instart;
    if instart == inend {
        return 0.0;
    }

    let windowstart = instart.saturating_sub(WINDOW_SIZE);

    h.reset();
    h.warmup(input, windowstart, inend);
    for i in windowstart..instart {
        h.update(input, i, inend);
    }

    costs[0] = 0.0;
    costs[1..=blocksize].fill(LARGE_FLOAT as f32);
    length_array[0] = 0;

    let mincost = get_cost_model_min_cost(costmodel);

    let mut sublen = [0u16; 259];
    let mut i = instart;
    while i < inend {
        let mut j = i - instart;
        h.update(input, i, inend);

        // inside a long run of one byte every position can take a maximal
        // match at distance 1, so the chain walks can be skipped wholesale
        if h.same[i & WINDOW_MASK] > (MAX_MATCH as u16) * 2
            && i > instart + MAX_MATCH as usize + 1
            && i + MAX_MATCH as usize * 2 + 1 < inend
            && h.same[(i - MAX_MATCH as usize) & WINDOW_MASK] > MAX_MATCH as u16
        {
            let symbolcost = costmodel.cost(MAX_MATCH, 1);
            for _ in 0..MAX_MATCH as usize {
                costs[j + MAX_MATCH as usize] = (f64::from(costs[j]) + symbolcost) as f32;
                length_array[j + MAX_MATCH as usize] = MAX_MATCH as u16;
                i += 1;
                j += 1;
                h.update(input, i, inend);
            }
        }

        let (_, leng) = find_longest_match(
            s,
            h,
            input,
            i,
            inend,
            MAX_MATCH as usize,
            Some(&mut sublen),
        );

        // literal edge
        let new_cost = costmodel.cost(u32::from(input[i]), 0) + f64::from(costs[j]);
        debug_assert!(new_cost >= 0.0);
        if new_cost < f64::from(costs[j + 1]) {
            costs[j + 1] = new_cost as f32;
            length_array[j + 1] = 1;
        }

        // match edges: every sublength is an alternative, not just the longest
        let kend = usize::from(leng).min(inend - i);
        let mincostaddcostj = mincost + f64::from(costs[j]);
        for k in 3..=kend {
            // already cheaper than anything reachable from here
            if f64::from(costs[j + k]) <= mincostaddcostj {
                continue;
            }

            let new_cost = costmodel.cost(k as u32, u32::from(sublen[k])) + f64::from(costs[j]);
            if new_cost < f64::from(costs[j + k]) {
                debug_assert!(k <= MAX_MATCH as usize);
                costs[j + k] = new_cost as f32;
                length_array[j + k] = k as u16;
            }
        }

        i += 1;
    }

    debug_assert!(costs[blocksize] >= 0.0);
    f64::from(costs[blocksize])
}

/// walks the length array backwards from the end to recover the chosen path
fn trace_backwards(size: usize, length_array: &[u16]) -> Vec<u16> {
    let mut path = Vec::new();
    if size == 0 {
        return path;
    }

    let mut index = size;
    loop {
        let length = length_array[index];
        debug_assert!(usize::from(length) <= index);
        debug_assert!(length as u32 <= MAX_MATCH);
        debug_assert!(length != 0);
        path.push(length);
        index -= usize::from(length);
        if index == 0 {
            break;
        }
    }

    path.reverse();
    path
}

/// replays the chosen path forward, re-querying the match finder for the
/// distance belonging to each chosen length
fn follow_path(
    s: &mut BlockState,
    input: &[u8],
    instart: usize,
    inend: usize,
    path: &[u16],
    store: &mut Lz77Store,
    h: &mut HashChain,
) {
    if instart == inend {
        return;
    }

    let windowstart = instart.saturating_sub(WINDOW_SIZE);

    h.reset();
    h.warmup(input, windowstart, inend);
    for i in windowstart..instart {
        h.update(input, i, inend);
    }

    let mut pos = instart;
    for &length in path {
        debug_assert!(pos < inend);
        h.update(input, pos, inend);

        if length >= MIN_MATCH as u16 {
            let (dist, _) =
                find_longest_match(s, h, input, pos, inend, usize::from(length), None);
            verify_len_dist(input, pos, dist, length);
            store.push(length, dist, pos);
        } else {
            store.push(u16::from(input[pos]), 0, pos);
        }

        for j in 1..usize::from(length) {
            h.update(input, pos + j, inend);
        }
        pos += usize::from(length);
    }
}

/// one full squeeze pass under the given cost model
#[allow(clippy::too_many_arguments)]
fn lz77_optimal_run(
    s: &mut BlockState,
    input: &[u8],
    instart: usize,
    inend: usize,
    costmodel: &impl CostModel,
    length_array: &mut [u16],
    store: &mut Lz77Store,
    h: &mut HashChain,
    costs: &mut [f32],
) -> f64 {
    let cost = get_best_lengths(s, input, instart, inend, costmodel, length_array, h, costs);
    let path = trace_backwards(inend - instart, length_array);
    follow_path(s, input, instart, inend, &path, store, h);
    debug_assert!(cost < LARGE_FLOAT);
    cost
}

/// Iterated optimal parse: seed statistics with a greedy pass, then
/// alternately parse under the current cost model and rebuild the model from
/// the parse, keeping the best result seen. After the cost stagnates the
/// statistics are restarted from the best-known set with random perturbation.
pub fn lz77_optimal(
    s: &mut BlockState,
    input: &[u8],
    instart: usize,
    inend: usize,
    numiterations: u32,
    store: &mut Lz77Store,
) {
    if instart == inend {
        return;
    }

    let blocksize = inend - instart;
    let mut length_array = vec![0u16; blocksize + 1];
    let mut costs = vec![0f32; blocksize + 1];
    let mut h = HashChain::new();
    let mut currentstore = Lz77Store::new();

    let mut stats = SymbolStats::default();
    let mut beststats = SymbolStats::default();

    let mut bestcost = LARGE_FLOAT;
    let mut lastcost = 0.0;

    let mut ran_state = RanState::new(s.options.random_seed);
    let mut lastrandomstep: i64 = -1;

    lz77_greedy(s, input, instart, inend, &mut currentstore, &mut h);
    stats.get_statistics(&currentstore);

    for i in 0..i64::from(numiterations) {
        currentstore.clear();
        lz77_optimal_run(
            s,
            input,
            instart,
            inend,
            &stats,
            &mut length_array,
            &mut currentstore,
            &mut h,
            &mut costs,
        );
        let cost = calculate_block_size(&currentstore, 0, currentstore.len(), BlockKind::Dynamic);

        if s.options.verbose_more || (s.options.verbose && cost < bestcost) {
            debug!("iteration {}: {} bit", i, cost as u64);
        }

        if cost < bestcost {
            *store = currentstore.clone();
            beststats = stats.clone();
            bestcost = cost;
        }

        let laststats = stats.clone();
        stats.clear_freqs();
        stats.get_statistics(&currentstore);

        if lastrandomstep != -1 {
            // after a random step the statistics oscillate; damp them by
            // blending in the previous iteration's
            stats = add_weighed_stat_freqs(&stats, 1.0, &laststats, 0.5);
            stats.calculate();
        }
        if i > 5 && cost == lastcost {
            // converged to a local minimum; restart from the best statistics,
            // randomly perturbed
            stats = beststats.clone();
            stats.randomize(&mut ran_state);
            stats.calculate();
            lastrandomstep = i;
        }
        lastcost = cost;
    }
}

/// optimal parse priced against the fixed Huffman tables; used to size a
/// fixed block exactly
pub fn lz77_optimal_fixed(
    s: &mut BlockState,
    input: &[u8],
    instart: usize,
    inend: usize,
    store: &mut Lz77Store,
) {
    if instart == inend {
        return;
    }

    debug_assert_eq!(s.block_start, instart);
    debug_assert_eq!(s.block_end, inend);

    let blocksize = inend - instart;
    let mut length_array = vec![0u16; blocksize + 1];
    let mut costs = vec![0f32; blocksize + 1];
    let mut h = HashChain::new();

    lz77_optimal_run(
        s,
        input,
        instart,
        inend,
        &FixedCostModel,
        &mut length_array,
        store,
        &mut h,
        &mut costs,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::CompressConfig;
    use crate::lz77::expand_store;

    #[test]
    fn entropy_of_uniform_distribution() {
        let mut bitlengths = [0f64; 4];
        calculate_entropy(&[1, 1, 1, 1], &mut bitlengths);
        for &b in bitlengths.iter() {
            assert!((b - 2.0).abs() < 1e-9);
        }

        // zero-frequency symbols get the cost of the whole distribution
        let mut bitlengths = [0f64; 2];
        calculate_entropy(&[4, 0], &mut bitlengths);
        assert!(bitlengths[0].abs() < 1e-9);
        assert!((bitlengths[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ran_state_is_deterministic() {
        let mut a = RanState::new((1, 2));
        let mut b = RanState::new((1, 2));
        for _ in 0..100 {
            assert_eq!(a.ran(), b.ran());
        }

        let mut c = RanState::new((77, 1234));
        assert_ne!(a.ran(), c.ran());
    }

    #[test]
    fn fixed_cost_model_matches_static_tables() {
        let m = FixedCostModel;
        assert_eq!(m.cost(0, 0), 8.0);
        assert_eq!(m.cost(143, 0), 8.0);
        assert_eq!(m.cost(144, 0), 9.0);
        // length 3 distance 1: 7-bit length code + 5-bit distance code
        assert_eq!(m.cost(3, 1), 12.0);
        // length 258 has code 285 (8 bits), distance 24577 carries 13 extra bits
        assert_eq!(m.cost(258, 24577), 8.0 + 5.0 + 13.0);
    }

    fn optimal_store(data: &[u8], iterations: u32) -> Lz77Store {
        let options = CompressConfig::default();
        let mut s = BlockState::new(&options, 0, data.len(), true);
        let mut store = Lz77Store::new();
        lz77_optimal(&mut s, data, 0, data.len(), iterations, &mut store);
        store
    }

    #[test]
    fn optimal_parse_is_lossless() {
        let inputs: &[&[u8]] = &[
            b"hello hello hello hello",
            b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            b"abcdabcdabcdabcdzzzzabcd",
            b"to be or not to be, that is the question",
        ];
        for &input in inputs {
            let store = optimal_store(input, 3);
            assert_eq!(expand_store(&store), input, "input {:?}", input);
        }
    }

    #[test]
    fn optimal_fixed_parse_is_lossless() {
        let data = b"free as in freedom, free as in free beer";
        let options = CompressConfig::default();
        let mut s = BlockState::new(&options, 0, data.len(), true);
        let mut store = Lz77Store::new();
        lz77_optimal_fixed(&mut s, data, 0, data.len(), &mut store);
        assert_eq!(expand_store(&store), data);
    }

    #[test]
    fn more_iterations_never_hurt() {
        let data =
            b"It was the best of times, it was the worst of times, it was the age of wisdom, \
              it was the age of foolishness, it was the epoch of belief, it was the epoch of \
              incredulity, it was the season of Light, it was the season of Darkness.";

        let one = optimal_store(data, 1);
        let many = optimal_store(data, 15);

        let cost_one = calculate_block_size(&one, 0, one.len(), BlockKind::Dynamic);
        let cost_many = calculate_block_size(&many, 0, many.len(), BlockKind::Dynamic);
        assert!(cost_many <= cost_one);
    }
}
