use super::{ESCAPE, ESCAPE_SHIFT, LINE_WIDTH, PREAMBLE, SHIFT, TRAILER};
use crate::error::Result;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

/// Encode plaintext header lines as a compact block
///
/// The inverse of [`decode`](super::decode): raw DEFLATE, then the byte
/// shift and escapes, wrapped at [`LINE_WIDTH`] columns between the
/// preamble and the `=yend` line. The result has no trailing CRLF, just
/// like a block read off the wire.
pub fn encode(plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plaintext)?;
    let compressed = encoder.finish()?;
    Ok(encode_compressed(&compressed))
}

/// Apply the transport encoding to an already compressed stream
pub(super) fn encode_compressed(compressed: &[u8]) -> Vec<u8> {
    let mut block = Vec::with_capacity(PREAMBLE.len() + compressed.len() * 105 / 100 + 16);
    block.extend_from_slice(PREAMBLE);

    let mut column = 0;
    for &byte in compressed {
        let shifted = byte.wrapping_add(SHIFT);
        let at_edge = column == 0 || column + 1 >= LINE_WIDTH;

        if needs_escape(shifted, at_edge) {
            block.push(ESCAPE);
            block.push(shifted.wrapping_add(ESCAPE_SHIFT));
            column += 2;
        } else {
            block.push(shifted);
            column += 1;
        }

        if column >= LINE_WIDTH {
            block.extend_from_slice(b"\r\n");
            column = 0;
        }
    }

    if column > 0 {
        block.extend_from_slice(b"\r\n");
    }
    block.extend_from_slice(TRAILER);
    block.extend_from_slice(format!(" size={}", compressed.len()).as_bytes());
    block
}

/// Bytes that break line framing always need an escape; whitespace and
/// dots only at the start or end of a line
fn needs_escape(shifted: u8, at_edge: bool) -> bool {
    match shifted {
        0 | b'\n' | b'\r' | ESCAPE => true,
        b'\t' | b' ' | b'.' => at_edge,
        _ => false,
    }
}
