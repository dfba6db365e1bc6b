/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! LZ77 token store and match finding: the hash-chain longest-match search
//! with its per-block result cache, and the greedy parse with lazy matching
//! that bootstraps statistics and block splitting.

use crate::compressor::CompressConfig;
use crate::deflate::deflate_constants::{
    DIST_CODE_COUNT, LITLEN_CODE_COUNT, MAX_MATCH, MIN_MATCH, WINDOW_MASK, WINDOW_SIZE,
};
use crate::deflate::deflate_token::DeflateToken;
use crate::hash_chain::HashChain;
use crate::match_cache::MatchCache;

/// limit on hash chain hits per lookup. Ideally this would be the window
/// size, but capping it keeps degenerate inputs (one hash value repeated
/// everywhere) from dominating the runtime.
pub const MAX_CHAIN_HITS: usize = 8192;

/// Ordered sequence of literal/back-reference tokens, each tagged with the
/// input position it came from. Cumulative histogram snapshots are kept every
/// LITLEN_CODE_COUNT (resp. DIST_CODE_COUNT) tokens so that the histogram of
/// any token range is available in constant time, which block splitting
/// leans on heavily.
#[derive(Clone, Default)]
pub struct Lz77Store {
    tokens: Vec<DeflateToken>,
    pos: Vec<usize>,

    ll_counts: Vec<[usize; LITLEN_CODE_COUNT]>,
    d_counts: Vec<[usize; DIST_CODE_COUNT]>,
}

impl Lz77Store {
    pub fn new() -> Self {
        Lz77Store::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> &[DeflateToken] {
        &self.tokens
    }

    pub fn positions(&self) -> &[usize] {
        &self.pos
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.pos.clear();
        self.ll_counts.clear();
        self.d_counts.clear();
    }

    /// appends a token; `length` is the literal byte value when `dist` is 0
    pub fn push(&mut self, length: u16, dist: u16, pos: usize) {
        debug_assert!(length < 259);
        let token = if dist == 0 {
            DeflateToken::new_lit(length as u8)
        } else {
            DeflateToken::new_ref(u32::from(length), u32::from(dist))
        };
        self.push_token(token, pos);
    }

    pub fn push_token(&mut self, token: DeflateToken, pos: usize) {
        let index = self.tokens.len();

        if self.ll_counts.is_empty() {
            self.ll_counts.push([0; LITLEN_CODE_COUNT]);
        } else if index % LITLEN_CODE_COUNT == 0 {
            // new chunk continues from the previous cumulative counts
            let last = *self.ll_counts.last().unwrap();
            self.ll_counts.push(last);
        }

        if self.d_counts.is_empty() {
            self.d_counts.push([0; DIST_CODE_COUNT]);
        } else if index % DIST_CODE_COUNT == 0 {
            let last = *self.d_counts.last().unwrap();
            self.d_counts.push(last);
        }

        self.ll_counts.last_mut().unwrap()[token.litlen_symbol()] += 1;
        if let Some(d) = token.dist_symbol() {
            self.d_counts.last_mut().unwrap()[d] += 1;
        }

        self.tokens.push(token);
        self.pos.push(pos);
    }

    pub fn append_store(&mut self, other: &Lz77Store) {
        self.tokens.reserve(other.tokens.len());
        for i in 0..other.tokens.len() {
            self.push_token(other.tokens[i], other.pos[i]);
        }
    }

    /// number of input bytes covered by the token range [lstart, lend)
    pub fn byte_range(&self, lstart: usize, lend: usize) -> usize {
        if lstart == lend {
            return 0;
        }
        let l = lend - 1;
        self.pos[l] + self.tokens[l].byte_length() - self.pos[lstart]
    }

    /// symbol histograms of the token range [lstart, lend)
    pub fn histogram(
        &self,
        lstart: usize,
        lend: usize,
    ) -> ([usize; LITLEN_CODE_COUNT], [usize; DIST_CODE_COUNT]) {
        if lstart + LITLEN_CODE_COUNT * 3 > lend {
            // small ranges are cheaper to count directly
            let mut ll_counts = [0; LITLEN_CODE_COUNT];
            let mut d_counts = [0; DIST_CODE_COUNT];
            for token in &self.tokens[lstart..lend] {
                ll_counts[token.litlen_symbol()] += 1;
                if let Some(d) = token.dist_symbol() {
                    d_counts[d] += 1;
                }
            }
            (ll_counts, d_counts)
        } else {
            let (mut ll_counts, mut d_counts) = self.histogram_at(lend - 1);
            if lstart > 0 {
                let (ll_counts2, d_counts2) = self.histogram_at(lstart - 1);
                for i in 0..LITLEN_CODE_COUNT {
                    ll_counts[i] -= ll_counts2[i];
                }
                for i in 0..DIST_CODE_COUNT {
                    d_counts[i] -= d_counts2[i];
                }
            }
            (ll_counts, d_counts)
        }
    }

    /// histogram of tokens [0, lpos], from the nearest cumulative snapshot
    /// minus the tokens after lpos inside that snapshot's chunk
    fn histogram_at(
        &self,
        lpos: usize,
    ) -> ([usize; LITLEN_CODE_COUNT], [usize; DIST_CODE_COUNT]) {
        let ll_idx = lpos / LITLEN_CODE_COUNT;
        let d_idx = lpos / DIST_CODE_COUNT;

        let mut ll_counts = self.ll_counts[ll_idx];
        let mut d_counts = self.d_counts[d_idx];

        let ll_end = ((ll_idx + 1) * LITLEN_CODE_COUNT).min(self.tokens.len());
        for token in &self.tokens[lpos + 1..ll_end] {
            ll_counts[token.litlen_symbol()] -= 1;
        }

        let d_end = ((d_idx + 1) * DIST_CODE_COUNT).min(self.tokens.len());
        for token in &self.tokens[lpos + 1..d_end] {
            if let Some(d) = token.dist_symbol() {
                d_counts[d] -= 1;
            }
        }

        (ll_counts, d_counts)
    }
}

/// Per-block compression state: the range being compressed and the
/// longest-match cache for it. Owned by a single call, never shared.
pub struct BlockState<'a> {
    pub options: &'a CompressConfig,
    pub block_start: usize,
    pub block_end: usize,

    /// cache of longest-match results, only worth its memory during the
    /// iterated optimal parse
    lmc: Option<MatchCache>,
}

impl<'a> BlockState<'a> {
    pub fn new(
        options: &'a CompressConfig,
        block_start: usize,
        block_end: usize,
        add_cache: bool,
    ) -> Self {
        BlockState {
            options,
            block_start,
            block_end,
            lmc: if add_cache {
                Some(MatchCache::new(block_end - block_start))
            } else {
                None
            },
        }
    }
}

/// asserts that a back-reference copies exactly the bytes it claims to
pub fn verify_len_dist(data: &[u8], pos: usize, dist: u16, length: u16) {
    debug_assert!(pos + usize::from(length) <= data.len());
    if cfg!(debug_assertions) {
        for i in 0..usize::from(length) {
            assert_eq!(data[pos - usize::from(dist) + i], data[pos + i]);
        }
    }
}

/// compares the bytes at `scan` and `matchpos`, returning the absolute
/// position where they stop matching (bounded by `end`)
fn get_match(array: &[u8], scan: usize, matchpos: usize, end: usize) -> usize {
    let len = end - scan;
    let mut i = 0;

    // eight bytes at a time, then the stragglers
    while i + 8 <= len && array[scan + i..scan + i + 8] == array[matchpos + i..matchpos + i + 8] {
        i += 8;
    }
    while i < len && array[scan + i] == array[matchpos + i] {
        i += 1;
    }

    scan + i
}

fn try_get_from_cache(
    s: &BlockState,
    pos: usize,
    limit: &mut usize,
    mut sublen: Option<&mut [u16; 259]>,
) -> Option<(u16, u16)> {
    let lmc = s.lmc.as_ref()?;
    let lmcpos = pos - s.block_start;

    // length 1 with distance 0 is the unset marker
    let cache_available = lmc.length[lmcpos] == 0 || lmc.dist[lmcpos] != 0;
    if !cache_available {
        return None;
    }

    let cached_length = usize::from(lmc.length[lmcpos]);
    let limit_ok_for_cache = *limit == MAX_MATCH as usize
        || cached_length <= *limit
        || (sublen.is_some() && lmc.max_cached_sublen(lmcpos) >= *limit);

    if limit_ok_for_cache {
        if sublen.is_none() || cached_length <= lmc.max_cached_sublen(lmcpos) {
            let mut length = lmc.length[lmcpos];
            if usize::from(length) > *limit {
                length = *limit as u16;
            }

            let distance;
            if let Some(sublen) = sublen.as_deref_mut() {
                lmc.cache_to_sublen(lmcpos, usize::from(length), sublen);
                distance = sublen[usize::from(length)];
                if *limit == MAX_MATCH as usize && usize::from(length) >= MIN_MATCH as usize {
                    debug_assert_eq!(distance, lmc.dist[lmcpos]);
                }
            } else {
                distance = lmc.dist[lmcpos];
            }
            return Some((distance, length));
        }

        // the cache cannot answer for this limit, but it still bounds the search
        *limit = cached_length;
    }

    None
}

fn store_in_cache(
    s: &mut BlockState,
    pos: usize,
    limit: usize,
    sublen: Option<&[u16; 259]>,
    distance: u16,
    length: u16,
) {
    let block_start = s.block_start;
    let lmc = match s.lmc.as_mut() {
        Some(lmc) => lmc,
        None => return,
    };
    let lmcpos = pos - block_start;

    let cache_available = lmc.length[lmcpos] == 0 || lmc.dist[lmcpos] != 0;

    if limit == MAX_MATCH as usize && !cache_available {
        if let Some(sublen) = sublen {
            debug_assert!(lmc.length[lmcpos] == 1 && lmc.dist[lmcpos] == 0);
            if usize::from(length) < MIN_MATCH as usize {
                lmc.dist[lmcpos] = 0;
                lmc.length[lmcpos] = 0;
            } else {
                lmc.dist[lmcpos] = distance;
                lmc.length[lmcpos] = length;
            }
            debug_assert!(!(lmc.length[lmcpos] == 1 && lmc.dist[lmcpos] == 0));
            lmc.sublen_to_cache(sublen, lmcpos, usize::from(length));
        }
    }
}

/// Finds the longest match at `pos` against the window before it, walking the
/// hash chains nearest-first. When `sublen` is given, it receives for every
/// achievable length the distance of the nearest match of at least that
/// length, which is what the optimal parse prices its alternatives with.
/// Returns (distance, length); length 0 means no match is possible.
pub fn find_longest_match(
    s: &mut BlockState,
    h: &HashChain,
    array: &[u8],
    pos: usize,
    size: usize,
    limit: usize,
    mut sublen: Option<&mut [u16; 259]>,
) -> (u16, u16) {
    let hpos = (pos & WINDOW_MASK) as u16;
    let mut bestdist: u16 = 0;
    let mut bestlength: u16 = 1;
    let mut limit = limit;
    let mut chain_counter = MAX_CHAIN_HITS;

    if let Some((distance, length)) =
        try_get_from_cache(s, pos, &mut limit, sublen.as_deref_mut())
    {
        debug_assert!(pos + usize::from(length) <= size);
        return (distance, length);
    }

    debug_assert!(limit <= MAX_MATCH as usize);
    debug_assert!(limit >= MIN_MATCH as usize);
    debug_assert!(pos < size);

    if size - pos < MIN_MATCH as usize {
        // not enough input left for any match
        return (0, 0);
    }

    if pos + limit > size {
        limit = size - pos;
    }

    let mut hprev = &h.prev;
    let mut hhashval = &h.hashval;
    let mut hval = h.val;
    let mut switched_to_second_chain = false;

    let pp = h.head[hval as usize] as u16;
    debug_assert_eq!(pp, hpos);
    let mut p = hprev[pp as usize];

    let mut dist: u32 = if p < pp {
        u32::from(pp - p)
    } else {
        (WINDOW_SIZE as u32 - u32::from(p)) + u32::from(pp)
    };

    while (dist as usize) < WINDOW_SIZE {
        debug_assert!((p as usize) < WINDOW_SIZE);
        debug_assert_eq!(hhashval[p as usize], hval);

        if dist > 0 {
            debug_assert!(pos < size);
            debug_assert!(dist as usize <= pos);

            let mut scan = pos;
            let mut matchpos = pos - dist as usize;
            let mut currentlength = 0u16;

            // a candidate can only improve if it also matches at bestlength
            if pos + usize::from(bestlength) >= size
                || array[scan + usize::from(bestlength)] == array[matchpos + usize::from(bestlength)]
            {
                let same0 = h.same[pos & WINDOW_MASK];
                if same0 > 2 && array[scan] == array[matchpos] {
                    // both sides start with a run of identical bytes; skip the
                    // shared part of the runs in one step
                    let same1 = h.same[(pos - dist as usize) & WINDOW_MASK];
                    let mut same = same0.min(same1);
                    if usize::from(same) > limit {
                        same = limit as u16;
                    }
                    scan += usize::from(same);
                    matchpos += usize::from(same);
                }
                let scan_end = get_match(array, scan, matchpos, pos + limit);
                currentlength = (scan_end - pos) as u16;
            }

            if currentlength > bestlength {
                if let Some(sublen) = sublen.as_deref_mut() {
                    for j in usize::from(bestlength) + 1..=usize::from(currentlength) {
                        sublen[j] = dist as u16;
                    }
                }
                bestdist = dist as u16;
                bestlength = currentlength;
                if usize::from(currentlength) >= limit {
                    break;
                }
            }
        }

        // once the best match is at least as long as the run here, only
        // positions with an equally long run can improve; the second chain
        // indexes exactly those
        if !switched_to_second_chain
            && bestlength >= h.same[usize::from(hpos)]
            && h.val2 == h.hashval2[usize::from(p)]
        {
            switched_to_second_chain = true;
            hprev = &h.prev2;
            hhashval = &h.hashval2;
            hval = h.val2;
        }

        let pp = p;
        p = hprev[usize::from(p)];
        if p == pp {
            // end of chain
            break;
        }

        dist += if p < pp {
            u32::from(pp - p)
        } else {
            (WINDOW_SIZE as u32 - u32::from(p)) + u32::from(pp)
        };

        chain_counter -= 1;
        if chain_counter == 0 {
            break;
        }
    }

    store_in_cache(s, pos, limit, sublen.as_deref(), bestdist, bestlength);

    debug_assert!(usize::from(bestlength) <= limit);
    debug_assert!(pos + usize::from(bestlength) <= size);
    (bestdist, bestlength)
}

fn get_length_score(length: i32, distance: i32) -> i32 {
    // At 1024, the distance uses 9+ extra bits; that is the empirical point
    // where a one-longer match stops paying for itself.
    if distance > 1024 {
        length - 1
    } else {
        length
    }
}

/// Greedy LZ77 parse with one-step lazy matching. Not optimal, but fast and
/// statistically close enough to seed the cost model and to pick block split
/// points.
pub fn lz77_greedy(
    s: &mut BlockState,
    input: &[u8],
    instart: usize,
    inend: usize,
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

    let mut dummysublen = [0u16; 259];

    let mut prev_length: u16 = 0;
    let mut prev_match: u16 = 0;
    let mut match_available = false;

    let mut i = instart;
    while i < inend {
        h.update(input, i, inend);

        let (mut dist, mut leng) = find_longest_match(
            s,
            h,
            input,
            i,
            inend,
            MAX_MATCH as usize,
            Some(&mut dummysublen),
        );
        let lengthscore = get_length_score(i32::from(leng), i32::from(dist));

        let prevlengthscore = get_length_score(i32::from(prev_length), i32::from(prev_match));
        if match_available {
            match_available = false;
            if lengthscore > prevlengthscore + 1 {
                // the new match is better; the previous byte becomes a literal
                store.push(u16::from(input[i - 1]), 0, i - 1);
                if lengthscore >= MIN_MATCH as i32 && usize::from(leng) < MAX_MATCH as usize {
                    match_available = true;
                    prev_length = leng;
                    prev_match = dist;
                    i += 1;
                    continue;
                }
            } else {
                // keep the deferred match
                leng = prev_length;
                dist = prev_match;
                verify_len_dist(input, i - 1, dist, leng);
                store.push(leng, dist, i - 1);
                for _ in 2..usize::from(leng) {
                    debug_assert!(i < inend);
                    i += 1;
                    h.update(input, i, inend);
                }
                i += 1;
                continue;
            }
        } else if lengthscore >= MIN_MATCH as i32 && usize::from(leng) < MAX_MATCH as usize {
            // defer the decision by one byte
            match_available = true;
            prev_length = leng;
            prev_match = dist;
            i += 1;
            continue;
        }

        if lengthscore >= MIN_MATCH as i32 {
            verify_len_dist(input, i, dist, leng);
            store.push(leng, dist, i);
        } else {
            leng = 1;
            store.push(u16::from(input[i]), 0, i);
        }

        for _ in 1..usize::from(leng) {
            debug_assert!(i < inend);
            i += 1;
            h.update(input, i, inend);
        }
        i += 1;
    }
}

/// expands a token store back into the bytes it encodes, for checking the
/// lossless invariant in tests
#[cfg(test)]
pub(crate) fn expand_store(store: &Lz77Store) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    for token in store.tokens() {
        match token {
            DeflateToken::Literal(lit) => out.push(*lit),
            DeflateToken::Reference(r) => {
                for _ in 0..r.len() {
                    let p = out.len() - r.dist() as usize;
                    out.push(out[p]);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greedy_store(data: &[u8]) -> Lz77Store {
        let options = CompressConfig::default();
        let mut s = BlockState::new(&options, 0, data.len(), false);
        let mut store = Lz77Store::new();
        let mut h = HashChain::new();
        lz77_greedy(&mut s, data, 0, data.len(), &mut store, &mut h);
        store
    }

    #[test]
    fn greedy_parse_is_lossless() {
        let inputs: &[&[u8]] = &[
            b"",
            b"a",
            b"hello hello hello hello hello",
            b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            b"abcdefghijklmnopqrstuvwxyz",
            b"the quick brown fox jumps over the lazy dog the quick brown fox",
        ];
        for &input in inputs {
            let store = greedy_store(input);
            assert_eq!(expand_store(&store), input);
        }
    }

    #[test]
    fn greedy_finds_back_references() {
        let store = greedy_store(b"abcdefabcdefabcdef");
        assert!(store
            .tokens()
            .iter()
            .any(|t| matches!(t, DeflateToken::Reference(_))));
    }

    #[test]
    fn longest_match_on_repeated_pattern() {
        let data = b"abcabcabcabc";
        let options = CompressConfig::default();
        let mut s = BlockState::new(&options, 0, data.len(), false);
        let mut h = HashChain::new();
        h.warmup(data, 0, data.len());
        for i in 0..=6 {
            h.update(data, i, data.len());
        }

        let mut sublen = [0u16; 259];
        let (dist, len) = find_longest_match(
            &mut s,
            &h,
            data,
            6,
            data.len(),
            MAX_MATCH as usize,
            Some(&mut sublen),
        );
        assert_eq!(dist, 3);
        assert_eq!(len, 6);
        // the sublen table must name a valid distance for every sublength
        for l in 3..=6usize {
            assert!(sublen[l] > 0);
        }
    }

    #[test]
    fn byte_range_spans_tokens() {
        let mut store = Lz77Store::new();
        store.push(b'x' as u16, 0, 0);
        store.push(b'y' as u16, 0, 1);
        store.push(5, 2, 2);
        assert_eq!(store.byte_range(0, 3), 7);
        assert_eq!(store.byte_range(0, 2), 2);
        assert_eq!(store.byte_range(2, 3), 5);
        assert_eq!(store.byte_range(1, 1), 0);
    }

    #[test]
    fn chunked_histogram_matches_direct_count() {
        // push enough tokens that the cumulative-snapshot path is taken
        let mut store = Lz77Store::new();
        let mut pos = 0;
        for i in 0..2000usize {
            if i % 5 == 3 {
                store.push(3 + (i % 20) as u16, 1 + (i % 300) as u16, pos);
                pos += 3 + i % 20;
            } else {
                store.push((i % 256) as u16, 0, pos);
                pos += 1;
            }
        }

        for &(lstart, lend) in &[(0usize, 2000usize), (0, 1000), (137, 1941), (900, 1900)] {
            let (ll, d) = store.histogram(lstart, lend);

            let mut ll_direct = [0usize; LITLEN_CODE_COUNT];
            let mut d_direct = [0usize; DIST_CODE_COUNT];
            for token in &store.tokens()[lstart..lend] {
                ll_direct[token.litlen_symbol()] += 1;
                if let Some(ds) = token.dist_symbol() {
                    d_direct[ds] += 1;
                }
            }

            assert_eq!(ll[..], ll_direct[..], "ll range {}..{}", lstart, lend);
            assert_eq!(d[..], d_direct[..], "d range {}..{}", lstart, lend);
        }
    }

    #[test]
    fn append_store_preserves_histograms() {
        let a = greedy_store(b"one two three one two three");
        let mut b = Lz77Store::new();
        b.push(b'z' as u16, 0, 0);
        b.append_store(&a);

        let (ll, _) = b.histogram(0, b.len());
        let total: usize = ll.iter().sum();
        assert_eq!(total, b.len());
    }
}
