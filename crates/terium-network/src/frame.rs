//! Wire framing: `tag(1 byte) ‖ payload`. Tag `0x00` is a transaction,
//! `0x01` is a block; any other tag is rejected so the reader can log and
//! drop it without touching the payload codec.

use terium_core::codec::{self, Cursor};
use terium_core::error::CodecError;
use terium_core::types::{Block, Tx};

pub const TAG_TX: u8 = 0x00;
pub const TAG_BLOCK: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Tx(Tx),
    Block(Block),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("trailing bytes after decoding a well-formed frame payload")]
    TrailingBytes,
}

impl Frame {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Tx(tx) => {
                let mut out = vec![TAG_TX];
                out.extend_from_slice(&codec::encode_tx(tx));
                out
            }
            Frame::Block(block) => {
                let mut out = vec![TAG_BLOCK];
                out.extend_from_slice(&codec::encode_block(block));
                out
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Frame, FrameError> {
        let (tag, payload) = bytes.split_first().ok_or(FrameError::Empty)?;
        let mut cursor = Cursor::new(payload);
        let frame = match *tag {
            TAG_TX => Frame::Tx(codec::decode_tx(&mut cursor)?),
            TAG_BLOCK => Frame::Block(codec::decode_block(&mut cursor)?),
            other => return Err(FrameError::UnknownTag(other)),
        };
        if !cursor.finished() {
            return Err(FrameError::TrailingBytes);
        }
        Ok(frame)
    }
}
