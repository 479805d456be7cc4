use super::{CHUNK_SIZE, ESCAPE, ESCAPE_SHIFT, KNOWN_ESCAPES, PREAMBLE, SHIFT, TRAILER};
use crate::error::{HarvestError, Result};
use flate2::{Decompress, FlushDecompress, Status};
use tracing::warn;

/// Decode a compact header block into plaintext header lines
///
/// The block must start with [`PREAMBLE`]. Its lines are unescaped up to
/// the `=yend` line and the result is inflated as raw DEFLATE.
///
/// # Errors
///
/// - [`HarvestError::Format`] - missing or wrong preamble
/// - [`HarvestError::Decode`] - the inflater rejected the stream
/// - [`HarvestError::PrematureEnd`] - input ran out before the stream ended
pub fn decode(block: &[u8]) -> Result<Vec<u8>> {
    let body = block.strip_prefix(PREAMBLE).ok_or_else(|| {
        let head = &block[..block.len().min(PREAMBLE.len())];
        HarvestError::Format(format!(
            "Bad header format: {:?}",
            String::from_utf8_lossy(head)
        ))
    })?;

    let mut source = Unescaper::new(body);
    let mut inflater = Decompress::new(false);
    let mut input = Vec::with_capacity(CHUNK_SIZE);
    let mut output: Vec<u8> = Vec::with_capacity(CHUNK_SIZE);

    loop {
        input.clear();
        source.fill(&mut input, CHUNK_SIZE);
        if input.is_empty() {
            return Err(HarvestError::PrematureEnd);
        }

        if inflate_chunk(&mut inflater, &input, &mut output)? == Status::StreamEnd {
            return Ok(output);
        }
    }
}

/// Feed one chunk to the inflater, growing `output` as needed
///
/// Returns once the chunk is consumed and the inflater has no pending
/// output, or as soon as the stream ends.
fn inflate_chunk(inflater: &mut Decompress, input: &[u8], output: &mut Vec<u8>) -> Result<Status> {
    let mut offset = 0;

    loop {
        if output.capacity() - output.len() < CHUNK_SIZE {
            output.reserve_exact(CHUNK_SIZE);
        }

        let before_in = inflater.total_in();
        let before_out = inflater.total_out();

        let status = inflater
            .decompress_vec(&input[offset..], output, FlushDecompress::None)
            .map_err(|e| HarvestError::Decode(format!("Inflate failed: {}", e)))?;

        let consumed = (inflater.total_in() - before_in) as usize;
        let produced = (inflater.total_out() - before_out) as usize;
        offset += consumed;

        if status == Status::StreamEnd {
            return Ok(status);
        }

        let output_full = output.len() == output.capacity();
        if offset >= input.len() && !output_full {
            return Ok(status);
        }

        if consumed == 0 && produced == 0 && !output_full {
            return Err(HarvestError::Decode(
                "Inflater made no progress".to_string(),
            ));
        }
    }
}

/// Reverses the byte shift and escapes, line by line
struct Unescaper<'a> {
    rest: &'a [u8],
    line_start: bool,
    done: bool,
}

impl<'a> Unescaper<'a> {
    fn new(body: &'a [u8]) -> Self {
        Self {
            rest: body,
            line_start: true,
            done: false,
        }
    }

    /// Append up to `limit` decoded bytes to `out`
    fn fill(&mut self, out: &mut Vec<u8>, limit: usize) {
        while out.len() < limit && !self.done {
            let rest = self.rest;

            if self.line_start {
                self.line_start = false;
                if rest.starts_with(TRAILER) {
                    self.done = true;
                    break;
                }
                if rest.starts_with(b"..") {
                    self.rest = &rest[1..];
                    continue;
                }
            }

            match rest {
                [] => self.done = true,
                [b'\r', b'\n', tail @ ..] => {
                    self.rest = tail;
                    self.line_start = true;
                }
                [ESCAPE] => {
                    warn!("Escape character at end of block");
                    self.rest = &rest[1..];
                }
                [ESCAPE, code, tail @ ..] => {
                    if !KNOWN_ESCAPES.contains(code) {
                        warn!("Bad escape: \\{:o}", code);
                    }
                    out.push(code.wrapping_sub(ESCAPE_SHIFT).wrapping_sub(SHIFT));
                    self.rest = tail;
                }
                [byte, tail @ ..] => {
                    out.push(byte.wrapping_sub(SHIFT));
                    self.rest = tail;
                }
            }
        }
    }
}
