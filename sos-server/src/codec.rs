//! The `len: u32 big-endian || payload[len]` framing from spec §4.1/§6, with
//! the payload permuted through [`crate::permutation`]. Implemented as a
//! `tokio_util` codec the way `rdaum-moor`'s `telnet-host` crate builds its
//! own `ConnectionCodec` over `Framed`.

use crate::permutation;
use bytes::{Buf, BufMut, BytesMut};
use sos_shared::Packet;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Frames larger than this are rejected outright rather than buffered —
/// nothing in this protocol legitimately needs a multi-megabyte packet.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const LEN_PREFIX_BYTES: usize = 4;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge { len: usize },

    #[error("frame payload is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("frame payload is not a valid packet: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes/encodes [`Packet`]s directly, so callers never see raw bytes.
#[derive(Debug, Default)]
pub struct FrameCodec {
    next_frame_len: Option<usize>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let frame_len = match self.next_frame_len {
            Some(len) => len,
            None => {
                if buf.len() < LEN_PREFIX_BYTES {
                    return Ok(None);
                }
                let len = u32::from_be_bytes(buf[..LEN_PREFIX_BYTES].try_into().unwrap()) as usize;
                if len > MAX_FRAME_LEN {
                    return Err(CodecError::FrameTooLarge { len });
                }
                buf.advance(LEN_PREFIX_BYTES);
                self.next_frame_len = Some(len);
                len
            }
        };

        if buf.len() < frame_len {
            buf.reserve(frame_len - buf.len());
            return Ok(None);
        }

        let payload = buf.split_to(frame_len);
        self.next_frame_len = None;

        let plain = permutation::decrypt(&payload);
        let text = String::from_utf8(plain)?;
        let packet = Packet::from_json_str(&text)?;
        Ok(Some(packet))
    }
}

impl Encoder<Packet> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, packet: Packet, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let text = packet.to_json_string()?;
        let cipher = permutation::encrypt(text.as_bytes());

        if cipher.len() > MAX_FRAME_LEN {
            return Err(CodecError::FrameTooLarge { len: cipher.len() });
        }

        buf.reserve(LEN_PREFIX_BYTES + cipher.len());
        buf.put_u32(cipher.len() as u32);
        buf.extend_from_slice(&cipher);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_packet_through_encode_then_decode() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let mut packet = Packet::new("login_request");
        packet.data.insert("username".into(), "alice".into());

        codec.encode(packet.clone(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(packet, decoded);
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_more_data_on_a_partial_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let packet = Packet::new("login_request");
        codec.encode(packet, &mut buf).unwrap();

        let mut partial = buf.split_to(buf.len() - 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn rejects_frames_larger_than_the_cap() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_FRAME_LEN + 1) as u32);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::FrameTooLarge { .. })));
    }

    #[test]
    fn handles_back_to_back_frames_in_one_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let first = Packet::new("game_runner_disconnect");
        let second = Packet::new("game_runner_hint");
        codec.encode(first.clone(), &mut buf).unwrap();
        codec.encode(second.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), first);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), second);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
