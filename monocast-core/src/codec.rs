//! TCP envelope framing for viewer connections.
//!
//! The wire messages of [`stream::message`](crate::stream::message)
//! need a framing layer over TCP. Each envelope is:
//!
//! ```text
//! kind:  u8      (0 = binary frame message, 1 = UTF-8 text)
//! len:   u32 LE  (payload length)
//! data:  [u8]    (len bytes)
//! ```
//!
//! Binary envelopes carry exactly one tagged frame message; text
//! envelopes carry control strings (`ping`, `BTN_EVENT:...`, `pong`).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CastError;

/// Envelope header size: kind byte + length word.
const ENVELOPE_HEADER_LEN: usize = 5;

/// Hard ceiling on a single envelope payload.
///
/// Covers a 255-frame batch of a 64 KB display even when RLE inflates
/// it to the process-buffer limit; anything past this is a broken or
/// hostile peer.
pub const MAX_ENVELOPE_LEN: usize = 32 * 1024 * 1024;

const KIND_BINARY: u8 = 0;
const KIND_TEXT: u8 = 1;

// ── Envelope ─────────────────────────────────────────────────────

/// One framed unit on a viewer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// A tagged frame message, verbatim.
    Binary(Bytes),
    /// A control string.
    Text(String),
}

// ── ViewerCodec ──────────────────────────────────────────────────

/// `tokio_util` codec for [`Envelope`]s.
#[derive(Debug, Default)]
pub struct ViewerCodec;

impl Decoder for ViewerCodec {
    type Item = Envelope;
    type Error = CastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < ENVELOPE_HEADER_LEN {
            return Ok(None);
        }

        let kind = src[0];
        let len = u32::from_le_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if len > MAX_ENVELOPE_LEN {
            return Err(CastError::EnvelopeTooLarge {
                size: len,
                max: MAX_ENVELOPE_LEN,
            });
        }
        if src.len() < ENVELOPE_HEADER_LEN + len {
            // Reserve for the rest of the frame in one go.
            src.reserve(ENVELOPE_HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(ENVELOPE_HEADER_LEN);
        let payload = src.split_to(len).freeze();

        match kind {
            KIND_BINARY => Ok(Some(Envelope::Binary(payload))),
            KIND_TEXT => {
                let text = String::from_utf8(payload.to_vec())?;
                Ok(Some(Envelope::Text(text)))
            }
            other => Err(CastError::UnknownEnvelopeKind(other)),
        }
    }
}

impl Encoder<Envelope> for ViewerCodec {
    type Error = CastError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (kind, payload): (u8, &[u8]) = match &item {
            Envelope::Binary(b) => (KIND_BINARY, b),
            Envelope::Text(t) => (KIND_TEXT, t.as_bytes()),
        };

        if payload.len() > MAX_ENVELOPE_LEN {
            return Err(CastError::EnvelopeTooLarge {
                size: payload.len(),
                max: MAX_ENVELOPE_LEN,
            });
        }

        dst.reserve(ENVELOPE_HEADER_LEN + payload.len());
        dst.put_u8(kind);
        dst.put_u32_le(payload.len() as u32);
        dst.put_slice(payload);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(envelope: Envelope) -> Envelope {
        let mut codec = ViewerCodec;
        let mut buf = BytesMut::new();
        codec.encode(envelope, &mut buf).unwrap();
        codec.decode(&mut buf).unwrap().unwrap()
    }

    #[test]
    fn binary_roundtrip() {
        let payload = Bytes::from_static(&[b'U', 1, 2, 3]);
        assert_eq!(
            roundtrip(Envelope::Binary(payload.clone())),
            Envelope::Binary(payload)
        );
    }

    #[test]
    fn text_roundtrip() {
        assert_eq!(
            roundtrip(Envelope::Text("ping".into())),
            Envelope::Text("ping".into())
        );
    }

    #[test]
    fn partial_header_yields_none() {
        let mut codec = ViewerCodec;
        let mut buf = BytesMut::from(&[0u8, 4][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn partial_payload_yields_none_then_completes() {
        let mut codec = ViewerCodec;
        let mut full = BytesMut::new();
        codec
            .encode(Envelope::Text("pong".into()), &mut full)
            .unwrap();

        let mut buf = BytesMut::from(&full[..6]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&full[6..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap().unwrap(),
            Envelope::Text("pong".into())
        );
    }

    #[test]
    fn two_envelopes_in_one_buffer() {
        let mut codec = ViewerCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(Envelope::Binary(Bytes::from_static(b"UA")), &mut buf)
            .unwrap();
        codec.encode(Envelope::Text("ping".into()), &mut buf).unwrap();

        assert_eq!(
            codec.decode(&mut buf).unwrap().unwrap(),
            Envelope::Binary(Bytes::from_static(b"UA"))
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap().unwrap(),
            Envelope::Text("ping".into())
        );
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_length_rejected() {
        let mut codec = ViewerCodec;
        let mut buf = BytesMut::new();
        buf.put_u8(KIND_BINARY);
        buf.put_u32_le((MAX_ENVELOPE_LEN + 1) as u32);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CastError::EnvelopeTooLarge { .. })
        ));
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut codec = ViewerCodec;
        let mut buf = BytesMut::new();
        buf.put_u8(7);
        buf.put_u32_le(1);
        buf.put_u8(0);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CastError::UnknownEnvelopeKind(7))
        ));
    }

    #[test]
    fn invalid_utf8_text_rejected() {
        let mut codec = ViewerCodec;
        let mut buf = BytesMut::new();
        buf.put_u8(KIND_TEXT);
        buf.put_u32_le(2);
        buf.put_slice(&[0xFF, 0xFE]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CastError::InvalidUtf8(_))
        ));
    }
}
