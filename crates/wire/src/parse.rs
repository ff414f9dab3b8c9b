//! Streaming RESP request parser
//!
//! Accepts RESP arrays of bulk strings plus space-separated inline
//! commands as the legacy path. `feed` appends bytes; `next_command`
//! extracts at most one complete command and leaves partial frames in
//! the buffer untouched — pipelining falls out of calling it in a loop
//! until it reports "incomplete".

use brine_core::{Error, Result};
use bytes::{Buf, BytesMut};

/// Upper bound on a single bulk argument; larger frames are a protocol
/// error rather than an allocation request.
const MAX_BULK_LEN: usize = 64 * 1024 * 1024;

/// Incremental parser over a connection's inbound bytes
#[derive(Debug, Default)]
pub struct RespParser {
    buf: BytesMut,
}

impl RespParser {
    /// Create an empty parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes currently buffered (tests/diagnostics)
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Try to extract one complete command.
    ///
    /// `Ok(None)` means the framing is incomplete — feed more bytes.
    /// Protocol violations surface as errors; the caller should close
    /// the connection after reporting them.
    pub fn next_command(&mut self) -> Result<Option<Vec<Vec<u8>>>> {
        loop {
            if self.buf.is_empty() {
                return Ok(None);
            }
            return match self.buf[0] {
                b'*' => self.parse_array(),
                b'\r' | b'\n' => {
                    // Stray line ending between commands; skip and retry
                    self.buf.advance(1);
                    continue;
                }
                _ => self.parse_inline(),
            };
        }
    }

    fn parse_array(&mut self) -> Result<Option<Vec<Vec<u8>>>> {
        let Some(header_end) = find_crlf(&self.buf, 0) else {
            return Ok(None);
        };
        let count = parse_int(&self.buf[1..header_end])?;
        if count < 0 {
            return Err(protocol_error("invalid multibulk length"));
        }
        let mut pos = header_end + 2;
        let mut argv = Vec::with_capacity(count as usize);

        for _ in 0..count {
            if pos >= self.buf.len() {
                return Ok(None);
            }
            if self.buf[pos] != b'$' {
                return Err(protocol_error("expected '$' bulk header"));
            }
            let Some(len_end) = find_crlf(&self.buf, pos) else {
                return Ok(None);
            };
            let len = parse_int(&self.buf[pos + 1..len_end])?;
            if len < 0 || len as usize > MAX_BULK_LEN {
                return Err(protocol_error("invalid bulk length"));
            }
            let start = len_end + 2;
            let end = start + len as usize;
            if self.buf.len() < end + 2 {
                return Ok(None);
            }
            if &self.buf[end..end + 2] != b"\r\n" {
                return Err(protocol_error("bulk string missing terminator"));
            }
            argv.push(self.buf[start..end].to_vec());
            pos = end + 2;
        }

        self.buf.advance(pos);
        Ok(Some(argv))
    }

    fn parse_inline(&mut self) -> Result<Option<Vec<Vec<u8>>>> {
        let Some(nl) = self.buf.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let line_end = if nl > 0 && self.buf[nl - 1] == b'\r' {
            nl - 1
        } else {
            nl
        };
        let argv: Vec<Vec<u8>> = self.buf[..line_end]
            .split(|&b| b == b' ' || b == b'\t')
            .filter(|part| !part.is_empty())
            .map(<[u8]>::to_vec)
            .collect();
        self.buf.advance(nl + 1);
        if argv.is_empty() {
            // Blank inline line; try whatever follows
            return self.next_command();
        }
        Ok(Some(argv))
    }
}

fn find_crlf(buf: &BytesMut, from: usize) -> Option<usize> {
    buf[from..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|i| from + i)
}

fn parse_int(digits: &[u8]) -> Result<i64> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| protocol_error("invalid integer"))
}

fn protocol_error(detail: &str) -> Error {
    Error::invalid_op(format!("Protocol error: {}", detail))
}
