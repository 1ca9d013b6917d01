//! Wire primitives for the status protocol
//!
//! Packets on the wire are `VarInt(length) | VarInt(packet id) | payload`.
//! The free functions here are pure and operate on byte slices; [`PacketCodec`]
//! wraps them for use with `tokio_util::codec::Framed`.

use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// A varint never spans more than 5 bytes (32 bits / 7 bits per group)
pub const MAX_VARINT_LEN: usize = 5;

/// Largest frame we accept: the 3-byte varint ceiling used by the game
pub const MAX_PACKET_LEN: usize = (1 << 21) - 1;

const SEGMENT_BITS: u8 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

/// A decoded packet: id plus raw payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(id: i32, payload: impl Into<Bytes>) -> Self {
        Packet {
            id,
            payload: payload.into(),
        }
    }
}

/// Number of bytes `value` occupies as a varint
pub fn varint_len(value: i32) -> usize {
    let mut v = value as u32;
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

/// Append a non-negative varint to `buf`
pub fn put_varint<B: BufMut>(buf: &mut B, value: i32) -> Result<()> {
    if value < 0 {
        return Err(Error::encoding(format!(
            "negative varint {} is not representable",
            value
        )));
    }

    let mut v = value as u32;
    loop {
        if v & !(SEGMENT_BITS as u32) == 0 {
            buf.put_u8(v as u8);
            return Ok(());
        }
        buf.put_u8((v as u8 & SEGMENT_BITS) | CONTINUE_BIT);
        v >>= 7;
    }
}

/// Encode a non-negative varint
pub fn encode_varint(value: i32) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(MAX_VARINT_LEN);
    put_varint(&mut out, value)?;
    Ok(out)
}

/// Try to read a varint from the front of `buf`.
///
/// `Ok(None)` means the buffer ended before the terminating byte; an
/// unterminated run of [`MAX_VARINT_LEN`] bytes is malformed.
fn peek_varint(buf: &[u8]) -> Result<Option<(i32, usize)>> {
    let mut value: u32 = 0;
    for (i, byte) in buf.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= ((byte & SEGMENT_BITS) as u32) << (7 * i);
        if byte & CONTINUE_BIT == 0 {
            return Ok(Some((value as i32, i + 1)));
        }
    }

    if buf.len() >= MAX_VARINT_LEN {
        return Err(Error::malformed("varint exceeds 5 bytes"));
    }
    Ok(None)
}

/// Decode a varint, returning the value and the bytes consumed
pub fn decode_varint(buf: &[u8]) -> Result<(i32, usize)> {
    peek_varint(buf)?.ok_or_else(|| Error::malformed("truncated varint"))
}

/// Encode a string as `VarInt(byte length) | UTF-8 bytes`
pub fn encode_string(s: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len() + MAX_VARINT_LEN);
    put_string(&mut out, s)?;
    Ok(out)
}

/// Append a length-prefixed string to `buf`
pub fn put_string<B: BufMut>(buf: &mut B, s: &str) -> Result<()> {
    let len = i32::try_from(s.len())
        .map_err(|_| Error::encoding(format!("string of {} bytes is too long", s.len())))?;
    put_varint(buf, len)?;
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Decode a length-prefixed string, returning it with the bytes consumed
pub fn decode_string(buf: &[u8]) -> Result<(String, usize)> {
    let (len, n) = decode_varint(buf)?;
    if len < 0 {
        return Err(Error::malformed(format!("negative string length {}", len)));
    }
    let len = len as usize;

    let bytes = buf
        .get(n..n + len)
        .ok_or_else(|| Error::malformed(format!(
            "string declares {} bytes, {} available",
            len,
            buf.len() - n
        )))?;

    let s = std::str::from_utf8(bytes)
        .map_err(|e| Error::malformed(format!("invalid UTF-8 in string: {}", e)))?;
    Ok((s.to_string(), n + len))
}

/// Frame a packet: `VarInt(len(id) + len(payload)) | VarInt(id) | payload`
pub fn encode_packet(packet_id: i32, payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = BytesMut::new();
    PacketCodec.encode(Packet::new(packet_id, Bytes::copy_from_slice(payload)), &mut out)?;
    Ok(out.to_vec())
}

/// Decode one framed packet, returning it with the bytes consumed
pub fn decode_packet(buf: &[u8]) -> Result<(Packet, usize)> {
    let (len, n) = decode_varint(buf)?;
    let len = frame_len(len)?;

    let frame = buf.get(n..n + len).ok_or_else(|| {
        Error::malformed(format!(
            "packet declares {} bytes, {} available",
            len,
            buf.len() - n
        ))
    })?;

    let packet = split_frame(Bytes::copy_from_slice(frame))?;
    Ok((packet, n + len))
}

fn frame_len(len: i32) -> Result<usize> {
    if len <= 0 {
        return Err(Error::malformed(format!("invalid packet length {}", len)));
    }
    let len = len as usize;
    if len > MAX_PACKET_LEN {
        return Err(Error::malformed(format!(
            "packet length {} exceeds limit {}",
            len, MAX_PACKET_LEN
        )));
    }
    Ok(len)
}

/// Split a frame body into packet id and payload
fn split_frame(frame: Bytes) -> Result<Packet> {
    let (id, n) = decode_varint(&frame)?;
    Ok(Packet {
        id,
        payload: frame.slice(n..),
    })
}

/// Read a big-endian `u16` at the front of `buf`
pub fn decode_u16(buf: &[u8]) -> Result<(u16, usize)> {
    let mut bytes = buf
        .get(..2)
        .ok_or_else(|| Error::malformed("truncated unsigned short"))?;
    Ok((bytes.get_u16(), 2))
}

/// Read a big-endian `i64` at the front of `buf`
pub fn decode_i64(buf: &[u8]) -> Result<(i64, usize)> {
    let mut bytes = buf
        .get(..8)
        .ok_or_else(|| Error::malformed("truncated long"))?;
    Ok((bytes.get_i64(), 8))
}

/// Length-delimited packet framing for `Framed` streams
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        let Some((len, n)) = peek_varint(src)? else {
            return Ok(None);
        };
        let len = frame_len(len)?;

        if src.len() < n + len {
            src.reserve(n + len - src.len());
            return Ok(None);
        }

        src.advance(n);
        let frame = src.split_to(len).freeze();
        split_frame(frame).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => Err(Error::malformed(format!(
                "stream closed with {} bytes of an incomplete packet",
                src.len()
            ))),
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = Error;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        if packet.id < 0 {
            return Err(Error::encoding(format!("negative packet id {}", packet.id)));
        }
        let body_len = varint_len(packet.id) + packet.payload.len();
        if body_len > MAX_PACKET_LEN {
            return Err(Error::encoding(format!(
                "packet body of {} bytes exceeds limit {}",
                body_len, MAX_PACKET_LEN
            )));
        }

        dst.reserve(MAX_VARINT_LEN + body_len);
        put_varint(dst, body_len as i32)?;
        put_varint(dst, packet.id)?;
        dst.put_slice(&packet.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_known_vectors() {
        let cases: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (255, &[0xff, 0x01]),
            (25565, &[0xdd, 0xc7, 0x01]),
            (2097151, &[0xff, 0xff, 0x7f]),
            (i32::MAX, &[0xff, 0xff, 0xff, 0xff, 0x07]),
        ];
        for (value, bytes) in cases {
            assert_eq!(encode_varint(*value).unwrap(), *bytes, "encode {}", value);
            assert_eq!(decode_varint(bytes).unwrap(), (*value, bytes.len()), "decode {}", value);
            assert_eq!(varint_len(*value), bytes.len());
        }
    }

    #[test]
    fn test_varint_round_trip_sweep() {
        let mut v: i32 = 1;
        while v > 0 {
            for candidate in [v - 1, v, v.saturating_add(1)] {
                let encoded = encode_varint(candidate).unwrap();
                assert_eq!(decode_varint(&encoded).unwrap(), (candidate, encoded.len()));
            }
            v = v.checked_mul(3).unwrap_or(-1);
        }
    }

    #[test]
    fn test_negative_varint_rejected() {
        assert!(matches!(encode_varint(-1), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_varint_decode_ignores_trailing_bytes() {
        assert_eq!(decode_varint(&[0xac, 0x02, 0xff, 0xff]).unwrap(), (300, 2));
    }

    #[test]
    fn test_varint_too_long() {
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert!(matches!(decode_varint(&bytes), Err(Error::MalformedData(_))));
    }

    #[test]
    fn test_varint_truncated() {
        assert!(matches!(decode_varint(&[]), Err(Error::MalformedData(_))));
        assert!(matches!(decode_varint(&[0x80, 0x80]), Err(Error::MalformedData(_))));
    }

    #[test]
    fn test_string_round_trip() {
        for s in ["", "localhost", "§aHello §lWorld", "日本語のサーバー", "🎮"] {
            let encoded = encode_string(s).unwrap();
            let (decoded, used) = decode_string(&encoded).unwrap();
            assert_eq!(decoded, s);
            assert_eq!(used, encoded.len());
        }
    }

    #[test]
    fn test_string_truncated() {
        let encoded = encode_string("play.example.com").unwrap();
        for cut in 0..encoded.len() {
            assert!(
                matches!(decode_string(&encoded[..cut]), Err(Error::MalformedData(_))),
                "cut at {}",
                cut
            );
        }
    }

    #[test]
    fn test_string_invalid_utf8() {
        let bytes = [0x02, 0xc3, 0x28];
        assert!(matches!(decode_string(&bytes), Err(Error::MalformedData(_))));
    }

    #[test]
    fn test_packet_round_trip() {
        let encoded = encode_packet(0x01, &42i64.to_be_bytes()).unwrap();
        assert_eq!(encoded[0] as usize, encoded.len() - 1);
        let (packet, used) = decode_packet(&encoded).unwrap();
        assert_eq!(packet.id, 0x01);
        assert_eq!(&packet.payload[..], &42i64.to_be_bytes());
        assert_eq!(used, encoded.len());

        let empty = encode_packet(0x00, &[]).unwrap();
        assert_eq!(empty, vec![0x01, 0x00]);
        assert_eq!(decode_packet(&empty).unwrap().0, Packet::new(0, Bytes::new()));
    }

    #[test]
    fn test_packet_truncated() {
        let encoded = encode_packet(0x00, b"{\"x\":1}").unwrap();
        for cut in 0..encoded.len() {
            assert!(
                matches!(decode_packet(&encoded[..cut]), Err(Error::MalformedData(_))),
                "cut at {}",
                cut
            );
        }
    }

    #[test]
    fn test_packet_length_limits() {
        assert!(matches!(decode_packet(&[0x00]), Err(Error::MalformedData(_))));
        let oversized = encode_varint(MAX_PACKET_LEN as i32 + 1).unwrap();
        assert!(matches!(decode_packet(&oversized), Err(Error::MalformedData(_))));
    }

    #[test]
    fn test_fixed_width_fields() {
        assert_eq!(decode_u16(&[0x63, 0xdd]).unwrap(), (25565, 2));
        assert_eq!(decode_i64(&(-7i64).to_be_bytes()).unwrap(), (-7, 8));
        assert!(matches!(decode_u16(&[0x63]), Err(Error::MalformedData(_))));
        assert!(matches!(decode_i64(&[0; 7]), Err(Error::MalformedData(_))));
    }

    #[test]
    fn test_codec_waits_for_full_frame() {
        let encoded = encode_packet(0x00, b"hello").unwrap();
        let mut codec = PacketCodec;
        let mut buf = BytesMut::new();

        for byte in &encoded[..encoded.len() - 1] {
            buf.put_u8(*byte);
            assert!(codec.decode(&mut buf).unwrap().is_none());
        }
        buf.put_u8(encoded[encoded.len() - 1]);

        let packet = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&packet.payload[..], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_eof_mid_packet() {
        let encoded = encode_packet(0x00, b"hello").unwrap();
        let mut buf = BytesMut::from(&encoded[..3]);
        assert!(matches!(
            PacketCodec.decode_eof(&mut buf),
            Err(Error::MalformedData(_))
        ));
        assert!(PacketCodec.decode_eof(&mut BytesMut::new()).unwrap().is_none());
    }

    #[test]
    fn test_codec_two_frames_in_one_read() {
        let mut buf = BytesMut::new();
        PacketCodec.encode(Packet::new(0, Bytes::from_static(b"a")), &mut buf).unwrap();
        PacketCodec.encode(Packet::new(1, Bytes::from_static(b"bc")), &mut buf).unwrap();

        let first = PacketCodec.decode(&mut buf).unwrap().unwrap();
        let second = PacketCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!((first.id, &first.payload[..]), (0, &b"a"[..]));
        assert_eq!((second.id, &second.payload[..]), (1, &b"bc"[..]));
    }
}
