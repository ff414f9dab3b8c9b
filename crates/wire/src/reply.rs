//! RESP response encoding

use brine_core::Error;
use bytes::{BufMut, BytesMut};

/// A response value, encoded to RESP on the way out
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `+text`
    Simple(String),
    /// `-message` (the message carries its own `ERR`/`WRONGTYPE`/… code)
    Error(String),
    /// `:n`
    Int(i64),
    /// `$len\r\n…\r\n`
    Bulk(Vec<u8>),
    /// `$-1`
    NullBulk,
    /// `*n` followed by the elements
    Array(Vec<Reply>),
    /// `*-1`
    NullArray,
    /// Several top-level replies in sequence (multi-channel SUBSCRIBE)
    Multi(Vec<Reply>),
}

impl Reply {
    /// The canonical `+OK`
    pub fn ok() -> Reply {
        Reply::Simple("OK".to_string())
    }

    /// Wrap an engine error with its RESP code prefix
    pub fn from_error(e: &Error) -> Reply {
        Reply::Error(format!("{} {}", e.resp_code(), e))
    }

    /// Encode a string: error-prefixed text becomes an error frame,
    /// anything else a binary-safe bulk string.
    pub fn from_text(text: &str) -> Reply {
        const ERROR_PREFIXES: [&str; 3] = ["ERR ", "WRONGTYPE ", "NOAUTH "];
        if ERROR_PREFIXES.iter().any(|p| text.starts_with(p)) {
            Reply::Error(text.to_string())
        } else {
            Reply::Bulk(text.as_bytes().to_vec())
        }
    }

    /// `Some` → bulk, `None` → null bulk
    pub fn bulk_or_null(value: Option<Vec<u8>>) -> Reply {
        match value {
            Some(v) => Reply::Bulk(v),
            None => Reply::NullBulk,
        }
    }

    /// Append this reply's RESP encoding to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Simple(s) => {
                buf.put_u8(b'+');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Error(s) => {
                buf.put_u8(b'-');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Int(n) => {
                buf.put_u8(b':');
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Reply::Bulk(data) => {
                buf.put_u8(b'$');
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
            Reply::NullBulk => buf.extend_from_slice(b"$-1\r\n"),
            Reply::Array(elements) => {
                buf.put_u8(b'*');
                buf.extend_from_slice(elements.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                for elem in elements {
                    elem.encode_into(buf);
                }
            }
            Reply::NullArray => buf.extend_from_slice(b"*-1\r\n"),
            Reply::Multi(replies) => {
                for reply in replies {
                    reply.encode_into(buf);
                }
            }
        }
    }

    /// Encode into a fresh buffer
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.to_vec()
    }
}
