use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::address::TileAddress;
use crate::error::{FrameError, Result};

/// Most argument bytes one frame may carry.
pub const MAX_ARGS: usize = 6;

/// Address byte bits that carry the argument count.
const ARGC_MASK: u8 = 0x07;

/// Address byte + command byte.
const HEADER_SIZE: usize = 2;

/// One command addressed to a tile (or to every tile, via broadcast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Target tile.
    pub address: TileAddress,
    /// Command code, see [`crate::command`].
    pub command: u8,
    /// Argument bytes, checksum included for checksummed commands.
    pub args: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(address: TileAddress, command: u8, args: impl Into<Bytes>) -> Self {
        Self {
            address,
            command,
            args: args.into(),
        }
    }

    /// Total bytes on the wire.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.args.len()
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self.address, self.command, &self.args, &mut dst)?;
        Ok(dst.freeze())
    }
}

/// Encode a command into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────────┬──────────┬──────────────────┐
/// │ Address | argc (1B)  │ Command  │ Args (argc B)    │
/// │ aaaaa   | nnn        │ (1B)     │ argc <= 6        │
/// └──────────────────────┴──────────┴──────────────────┘
/// ```
pub fn encode_frame(
    address: TileAddress,
    command: u8,
    args: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if args.len() > MAX_ARGS {
        return Err(FrameError::TooManyArgs {
            count: args.len(),
            max: MAX_ARGS,
        });
    }
    dst.reserve(HEADER_SIZE + args.len());
    dst.put_u8(address.get() | args.len() as u8);
    dst.put_u8(command);
    dst.put_slice(args);
    Ok(())
}

/// Number of argument bytes announced by an address byte.
pub fn argc_of(address_byte: u8) -> usize {
    usize::from(address_byte & ARGC_MASK)
}

/// Decode one frame from a byte stream.
///
/// Returns `Ok(None)` if the buffer doesn't hold a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let argc = argc_of(src[0]);
    if argc > MAX_ARGS {
        return Err(FrameError::TooManyArgs {
            count: argc,
            max: MAX_ARGS,
        });
    }

    let total = HEADER_SIZE + argc;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let address = TileAddress::new(u16::from(src.get_u8() & !ARGC_MASK))?;
    let command = src.get_u8();
    let args = src.split_to(argc).freeze();

    Ok(Some(Frame {
        address,
        command,
        args,
    }))
}

/// Checksum byte for a checksummed command.
///
/// Equal to `(65536 - sum(bytes)) mod 256`, so the bytes plus the checksum
/// sum to zero modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0u8.wrapping_sub(sum)
}

/// Append the checksum to a command body.
pub fn encode_checksummed(body: &[u8]) -> Bytes {
    let mut dst = BytesMut::with_capacity(body.len() + 1);
    dst.put_slice(body);
    dst.put_u8(checksum(body));
    dst.freeze()
}

/// Reject a checksummed sequence whose byte sum is not zero modulo 256.
pub fn verify_checksum(bytes: &[u8]) -> Result<()> {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != 0 {
        return Err(FrameError::ChecksumMismatch { sum });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{
        EEPROM_WRITE, EEPROM_WRITE2, NOP_MODE, RANDOM_ADDRESS, RANDOM_ADDRESS2, SET_COLOR,
        TILE_VERSION,
    };

    fn addr(raw: u16) -> TileAddress {
        TileAddress::new(raw).unwrap()
    }

    #[test]
    fn encode_folds_argc_into_address() {
        let mut buf = BytesMut::new();
        encode_frame(addr(16), SET_COLOR, &[7], &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x11, 0x20, 0x07]);
    }

    #[test]
    fn argc_recovered_from_first_byte() {
        for n in 0..=MAX_ARGS {
            let args = vec![0xAA; n];
            let mut buf = BytesMut::new();
            encode_frame(addr(248), 0x60, &args, &mut buf).unwrap();
            assert_eq!(argc_of(buf[0]), n);
            assert_eq!(buf[0] & 0xF8, 248);
            assert_eq!(buf.len(), 2 + n);
        }
    }

    #[test]
    fn too_many_args_rejected() {
        let mut buf = BytesMut::new();
        let err = encode_frame(addr(8), 0x23, &[0; 7], &mut buf).unwrap_err();
        assert_eq!(err, FrameError::TooManyArgs { count: 7, max: 6 });
        assert!(buf.is_empty());
    }

    #[test]
    fn broadcast_query_has_no_args() {
        let frame = Frame::new(TileAddress::BROADCAST, TILE_VERSION, Bytes::new());
        assert_eq!(frame.to_bytes().unwrap().as_ref(), &[0x00, 0x49]);
    }

    #[test]
    fn decode_splits_a_stream() {
        let mut buf = BytesMut::new();
        encode_frame(TileAddress::BROADCAST, NOP_MODE, &[], &mut buf).unwrap();
        encode_frame(addr(40), SET_COLOR, &[3], &mut buf).unwrap();

        let f1 = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(f1.address, TileAddress::BROADCAST);
        assert_eq!(f1.command, NOP_MODE);
        assert!(f1.args.is_empty());

        let f2 = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(f2.address, addr(40));
        assert_eq!(f2.args.as_ref(), &[3]);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_waits_for_complete_frame() {
        let mut buf = BytesMut::from(&[0x0A, 0x61][..]);
        assert!(decode_frame(&mut buf).unwrap().is_none());
        buf.put_slice(&[0x00, 0x01]);
        let frame = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(frame.args.as_ref(), &[0x00, 0x01]);
    }

    #[test]
    fn decode_rejects_seven_args() {
        let mut buf = BytesMut::from(&[0x0F, 0x00][..]);
        assert!(matches!(
            decode_frame(&mut buf),
            Err(FrameError::TooManyArgs { count: 7, .. })
        ));
    }

    #[test]
    fn random_address_checksum() {
        let body = encode_checksummed(&[RANDOM_ADDRESS, RANDOM_ADDRESS2]);
        // (65536 - (0x1F + 0xD4)) % 256
        assert_eq!(body.as_ref(), &[0x1F, 0xD4, 0x0D]);
        verify_checksum(&body).unwrap();
    }

    #[test]
    fn checksummed_bytes_sum_to_zero() {
        for ee_addr in [0u8, 1, 5, 0x7F, 0xFF] {
            for datum in [0u8, 8, 0x80, 0xFE, 0xFF] {
                let body = encode_checksummed(&[EEPROM_WRITE, EEPROM_WRITE2, ee_addr, datum]);
                let sum: u32 = body.iter().map(|b| u32::from(*b)).sum();
                assert_eq!(sum % 256, 0);
            }
        }
    }

    #[test]
    fn corrupted_checksum_rejected() {
        let mut body = encode_checksummed(&[EEPROM_WRITE, EEPROM_WRITE2, 0, 16]).to_vec();
        body[3] = 24;
        assert_eq!(
            verify_checksum(&body),
            Err(FrameError::ChecksumMismatch { sum: 8 })
        );
    }
}
