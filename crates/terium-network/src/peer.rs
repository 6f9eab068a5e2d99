//! The peer-transport reader/writer pair: converts framed bytes to/from
//! typed [`Frame`]s and enqueues them onto the node's inbound channels, or
//! drains the outbound channel onto the wire.
//!
//! No explicit length-prefix framing: each up-to-1-KiB read is treated as
//! one complete message, terminated by the TCP record boundary rather
//! than a declared length.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use terium_core::types::{Block, Tx};

use crate::frame::Frame;

const READ_CHUNK: usize = 1024;

/// Read `reader` in 1 KiB chunks, decode each chunk as one [`Frame`], and
/// route it onto `tx_tx` or `block_tx`. A chunk that doesn't decode
/// (unknown tag, malformed payload) is logged and dropped — the node loop
/// never sees it. Exits when the stream reaches EOF or the outbound
/// channels close.
pub fn spawn_reader<R>(
    mut reader: R,
    tx_tx: mpsc::Sender<Tx>,
    block_tx: mpsc::Sender<Block>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("peer stream closed");
                    return;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "peer read failed");
                    return;
                }
            };
            match Frame::decode(&buf[..n]) {
                Ok(Frame::Tx(tx)) => {
                    if tx_tx.send(tx).await.is_err() {
                        return;
                    }
                }
                Ok(Frame::Block(block)) => {
                    if block_tx.send(block).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "dropping unframeable peer message");
                }
            }
        }
    })
}

/// Drain `outbound` and write each encoded [`Frame`] to `writer` as it
/// arrives. Exits when the channel closes or a write fails.
pub fn spawn_writer<W>(mut writer: W, mut outbound: mpsc::Receiver<Frame>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let bytes = frame.encode();
            if let Err(e) = writer.write_all(&bytes).await {
                warn!(error = %e, "peer write failed");
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use terium_core::types::{Hash256, OutPoint, TxIn, TxOut};

    fn sample_tx() -> Tx {
        Tx {
            version: 1,
            inputs: vec![TxIn {
                prev_output: OutPoint {
                    txid: Hash256([1u8; 32]),
                    index: 0,
                },
                unlocking_script: vec![],
            }],
            outputs: vec![TxOut {
                value: 10,
                locking_script: vec![],
            }],
            lock_time: 0,
        }
    }

    #[tokio::test]
    async fn reader_routes_tx_frame_to_tx_channel() {
        let bytes = std::io::Cursor::new(Frame::Tx(sample_tx()).encode());
        let (tx_tx, mut tx_rx) = mpsc::channel(4);
        let (block_tx, _block_rx) = mpsc::channel(4);
        spawn_reader(bytes, tx_tx, block_tx);

        let received = tx_rx.recv().await.unwrap();
        assert_eq!(received, sample_tx());
    }

    #[tokio::test]
    async fn reader_drops_unframeable_chunk_without_stalling() {
        let garbage = vec![0xEEu8, 0x01, 0x02];
        let (mut client, server) = tokio::io::duplex(64);
        let (tx_tx, mut tx_rx) = mpsc::channel(4);
        let (block_tx, _block_rx) = mpsc::channel(4);
        spawn_reader(server, tx_tx, block_tx);

        client.write_all(&garbage).await.unwrap();
        client.write_all(&Frame::Tx(sample_tx()).encode()).await.unwrap();

        let received = tx_rx.recv().await.unwrap();
        assert_eq!(received, sample_tx());
    }

    #[tokio::test]
    async fn writer_encodes_and_writes_frames() {
        let (client, mut server) = tokio::io::duplex(256);
        let (outbound_tx, outbound_rx) = mpsc::channel(4);
        spawn_writer(client, outbound_rx);

        outbound_tx.send(Frame::Tx(sample_tx())).await.unwrap();
        drop(outbound_tx);

        let mut buf = vec![0u8; 256];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(Frame::decode(&buf[..n]).unwrap(), Frame::Tx(sample_tx()));
    }
}
