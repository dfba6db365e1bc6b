/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use super::deflate_constants::{quantize_distance, quantize_length, NONLEN_CODE_COUNT};

/// In a DEFLATE stream, tokens are either literals (bytes) or references to previous bytes
/// with a distance and length.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeflateToken {
    Literal(u8),
    Reference(DeflateTokenReference),
}

impl DeflateToken {
    pub fn new_ref(len: u32, dist: u32) -> DeflateToken {
        DeflateToken::Reference(DeflateTokenReference::new(len, dist))
    }

    pub fn new_lit(lit: u8) -> DeflateToken {
        DeflateToken::Literal(lit)
    }

    /// number of input bytes the token covers
    pub fn byte_length(&self) -> usize {
        match self {
            DeflateToken::Literal(_) => 1,
            DeflateToken::Reference(r) => r.len() as usize,
        }
    }

    /// index of the token in the literal/length alphabet
    pub fn litlen_symbol(&self) -> usize {
        match self {
            DeflateToken::Literal(lit) => usize::from(*lit),
            DeflateToken::Reference(r) => NONLEN_CODE_COUNT + quantize_length(r.len()),
        }
    }

    /// index of the token in the distance alphabet, if it is a reference
    pub fn dist_symbol(&self) -> Option<usize> {
        match self {
            DeflateToken::Literal(_) => None,
            DeflateToken::Reference(r) => Some(quantize_distance(r.dist())),
        }
    }
}

/// In the case of a distance and length, the length is the number of bytes to copy from the
/// previous bytes, and the distance is the number of bytes back to start copying from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeflateTokenReference {
    len: u8,
    dist: u16,
}

impl DeflateTokenReference {
    pub fn new(len: u32, dist: u32) -> DeflateTokenReference {
        debug_assert!((3..=258).contains(&len) && (1..=32768).contains(&dist));
        DeflateTokenReference {
            len: (len - 3) as u8,
            dist: dist as u16,
        }
    }

    pub fn len(&self) -> u32 {
        u32::from(self.len) + 3
    }

    pub fn dist(&self) -> u32 {
        u32::from(self.dist)
    }
}

#[test]
fn token_symbols() {
    assert_eq!(DeflateToken::new_lit(0).litlen_symbol(), 0);
    assert_eq!(DeflateToken::new_lit(255).litlen_symbol(), 255);
    assert_eq!(DeflateToken::new_lit(65).dist_symbol(), None);

    // length 3 is the first length code, 258 the last
    assert_eq!(DeflateToken::new_ref(3, 1).litlen_symbol(), 257);
    assert_eq!(DeflateToken::new_ref(258, 1).litlen_symbol(), 285);
    assert_eq!(DeflateToken::new_ref(3, 1).dist_symbol(), Some(0));
    assert_eq!(DeflateToken::new_ref(3, 32768).dist_symbol(), Some(29));

    assert_eq!(DeflateToken::new_ref(258, 4).byte_length(), 258);
    assert_eq!(DeflateToken::new_lit(7).byte_length(), 1);
}

#[test]
fn reference_roundtrips_len_dist() {
    for &(len, dist) in &[(3u32, 1u32), (4, 2), (258, 32768), (100, 1024)] {
        let r = DeflateTokenReference::new(len, dist);
        assert_eq!(r.len(), len);
        assert_eq!(r.dist(), dist);
    }
}
