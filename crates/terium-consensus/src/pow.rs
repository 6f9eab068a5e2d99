//! Proof-of-work mining loop.
//!
//! There is no difficulty retarget: the target is fixed for the life of the
//! chain (see [`terium_core::constants::fixed_target`]). Mining walks the
//! full 32-bit nonce space; a cancellation channel is polled between
//! attempts so a caller can abandon a stale template the instant a better
//! one supersedes it, and progress is published to an observer channel for
//! anyone watching (a CLI progress bar, a metrics exporter, a test).

use tokio::sync::mpsc;
use tracing::{debug, info};

use terium_core::types::{BlockHeader, Hash256};

/// One unit of mining progress, published to the optional observer channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MiningProgress {
    Attempt { nonce: u32, hash: Hash256 },
    Solved { nonce: u32, hash: Hash256 },
}

/// The result of a mining attempt.
#[derive(Debug)]
pub enum MineOutcome {
    Solved(BlockHeader),
    Cancelled,
}

/// How often (in nonce attempts) the mining loop yields to the async
/// executor, so a CPU-bound miner doesn't starve other tasks on its runtime.
const YIELD_EVERY: u32 = 4096;

fn meets_target(hash: &Hash256, target: &[u8; 32]) -> bool {
    hash.as_bytes().as_slice() < target.as_slice()
}

/// Mine `header` until its hash meets `header.target`, cooperatively
/// cancellable via `cancel`. On exhausting the full nonce space without a
/// solution ("NoNonce"), the timestamp is refreshed via `now` and the search
/// restarts from nonce zero — a changed timestamp changes every subsequent
/// hash, so this is not merely retrying the same dead search.
pub async fn mine(
    mut header: BlockHeader,
    mut cancel: mpsc::Receiver<()>,
    progress: Option<mpsc::Sender<MiningProgress>>,
    now: impl Fn() -> u32,
) -> MineOutcome {
    loop {
        header.timestamp = now();
        debug!(timestamp = header.timestamp, "starting nonce search");

        let mut nonce: u32 = 0;
        loop {
            if cancel.try_recv().is_ok() {
                debug!(nonce, "mining cancelled");
                return MineOutcome::Cancelled;
            }

            header.nonce = nonce;
            let hash = header.hash();

            if let Some(tx) = &progress {
                let _ = tx.try_send(MiningProgress::Attempt { nonce, hash });
            }

            if meets_target(&hash, &header.target) {
                info!(nonce, hash = %hash, "block solved");
                if let Some(tx) = &progress {
                    let _ = tx.try_send(MiningProgress::Solved { nonce, hash });
                }
                return MineOutcome::Solved(header);
            }

            if nonce == u32::MAX {
                debug!("nonce space exhausted, refreshing timestamp");
                break;
            }
            nonce += 1;
            if nonce % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terium_core::types::Hash256;

    fn easy_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: Hash256::ZERO,
            timestamp: 0,
            target: [0xFFu8; 32],
            nonce: 0,
        }
    }

    fn impossible_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: Hash256::ZERO,
            timestamp: 0,
            target: [0x00u8; 32],
            nonce: 0,
        }
    }

    #[tokio::test]
    async fn solves_trivial_target_immediately() {
        let (_cancel_tx, cancel_rx) = mpsc::channel(1);
        let outcome = mine(easy_header(), cancel_rx, None, || 1).await;
        match outcome {
            MineOutcome::Solved(header) => assert!(meets_target(&header.hash(), &header.target)),
            MineOutcome::Cancelled => panic!("expected a solution"),
        }
    }

    #[tokio::test]
    async fn cancellation_is_observed() {
        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        cancel_tx.send(()).await.unwrap();
        let outcome = mine(impossible_header(), cancel_rx, None, || 1).await;
        assert!(matches!(outcome, MineOutcome::Cancelled));
    }

    #[tokio::test]
    async fn progress_is_published_for_each_attempt() {
        let (_cancel_tx, cancel_rx) = mpsc::channel(1);
        let (progress_tx, mut progress_rx) = mpsc::channel(16);
        let outcome = mine(easy_header(), cancel_rx, Some(progress_tx), || 7).await;
        assert!(matches!(outcome, MineOutcome::Solved(_)));
        let first = progress_rx.try_recv().unwrap();
        assert!(matches!(first, MiningProgress::Attempt { nonce: 0, .. }));
    }

    #[test]
    fn meets_target_is_lexicographic() {
        let low = Hash256([0x00; 32]);
        let high = Hash256([0xFF; 32]);
        assert!(meets_target(&low, &[0x01; 32]));
        assert!(!meets_target(&high, &[0x01; 32]));
    }
}
