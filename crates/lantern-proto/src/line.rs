//! Line framing for tokio.
//!
//! Decodes `\n`-terminated lines (an optional `\r` is stripped) and encodes
//! [`Message`]s with a CRLF terminator.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};
use crate::message::Message;

/// Maximum line length in bytes, terminator included.
pub const MAX_LINE_LEN: usize = 512;

/// Codec for the line protocol.
///
/// Complete lines longer than the limit are truncated at a character
/// boundary. A peer that sends more than the limit without any terminator
/// gets [`ProtocolError::MessageTooLong`].
#[derive(Debug, Clone)]
pub struct LineCodec {
    next_index: usize,
    max_len: usize,
}

impl LineCodec {
    /// Codec with the standard 512-byte limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    /// Codec with a custom limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }

    fn truncate(mut line: String, max: usize) -> String {
        if line.len() > max {
            let mut end = max;
            while !line.is_char_boundary(end) {
                end -= 1;
            }
            line.truncate(end);
        }
        line
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
            self.next_index = src.len();
            if src.len() > self.max_len {
                return Err(ProtocolError::MessageTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }
            return Ok(None);
        };

        let raw = src.split_to(self.next_index + offset + 1);
        self.next_index = 0;

        let text = String::from_utf8_lossy(&raw);
        let line = text.trim_end_matches(['\r', '\n']).to_string();
        // Two bytes are reserved for the terminator.
        Ok(Some(Self::truncate(line, self.max_len.saturating_sub(2))))
    }
}

impl Encoder<Message> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<()> {
        let text = msg.to_string();
        // Never let a parameter smuggle a second line onto the wire.
        let text = match text.find(['\r', '\n']) {
            Some(pos) => &text[..pos],
            None => text.as_str(),
        };
        let text = Self::truncate(text.to_string(), self.max_len.saturating_sub(2));
        dst.reserve(text.len() + 2);
        dst.put_slice(text.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_crlf_and_lf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("NICK a\r\nUSER b 0 0 :B\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("NICK a"));
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("USER b 0 0 :B")
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn waits_for_partial_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PI");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"NG x\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING x"));
    }

    #[test]
    fn unterminated_flood_is_an_error() {
        let mut codec = LineCodec::with_max_len(16);
        let mut buf = BytesMut::from(&[b'a'; 32][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::MessageTooLong { limit: 16, .. })
        ));
    }

    #[test]
    fn long_lines_are_truncated() {
        let mut codec = LineCodec::with_max_len(10);
        let mut buf = BytesMut::from("PRIVMSG x\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PRIVMSG "));
    }

    #[test]
    fn encodes_with_crlf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Message::new("PING", ["tok"]), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"PING tok\r\n");
    }

    #[test]
    fn encoder_strips_embedded_newlines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Message::new("PRIVMSG", ["#x", "a\r\nQUIT"]), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"PRIVMSG #x a\r\n");
    }
}
