//! End-to-end scenarios covering the node's genesis, mempool ordering,
//! UTXO bookkeeping, coinbase maturity, proof-of-work rejection and
//! sighash-tamper behavior.

use terium_consensus::{block_validator, tx_validator};
use terium_core::crypto::{h160, KeyPair};
use terium_core::script::{self, ExecResult};
use terium_core::types::{Height, OutPoint, Tx, TxIn, TxOut};
use terium_node::genesis::run_genesis;
use terium_node::node::unix_now;
use terium_node::NodeError;
use terium_tests::helpers::{build_node, coinbase_block, spend};

#[tokio::test]
async fn genesis_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let node = build_node(&tmp);
    let address_hash = [3u8; 20];

    let chain = node.chain();
    let block = run_genesis(&chain, address_hash, 2, unix_now).await.unwrap();
    assert_eq!(chain.tip_height().unwrap(), Some(Height::ZERO));
    assert_eq!(block.transactions[0].outputs[0].value, terium_core::constants::BLOCK_REWARD);
    assert!(block.header.hash().as_bytes().as_slice() < block.header.target.as_slice());

    let err = run_genesis(&chain, address_hash, 2, unix_now).await.unwrap_err();
    assert!(matches!(err, NodeError::ChainNotEmpty));
}

#[test]
fn mempool_ordering_returns_top_two_by_fee() {
    let tmp = tempfile::tempdir().unwrap();
    let node = build_node(&tmp);

    let mk = |seed: u8| Tx {
        version: 1,
        inputs: vec![TxIn {
            prev_output: OutPoint {
                txid: terium_core::types::Hash256([seed; 32]),
                index: 0,
            },
            unlocking_script: vec![],
        }],
        outputs: vec![TxOut { value: 1, locking_script: vec![] }],
        lock_time: 0,
    };
    let low = mk(1);
    let high = mk(2);
    let mid = mk(3);
    node.mempool.insert(low, 10);
    node.mempool.insert(high.clone(), 50);
    node.mempool.insert(mid.clone(), 20);

    assert_eq!(node.mempool.top_n_by_fee(2), vec![high, mid]);
}

#[test]
fn utxo_application_tracks_balance_through_a_spend() {
    let tmp = tempfile::tempdir().unwrap();
    let node = build_node(&tmp);
    let alice = KeyPair::generate();
    let alice_hash = h160(&alice.public_key().to_der());
    let bob_hash = [9u8; 20];

    let genesis = coinbase_block(alice_hash, 100_000, terium_core::types::Hash256::ZERO);
    node.handle_solved_block(genesis.clone(), None).unwrap();

    assert_eq!(node.utxo_store.balance_of(&alice_hash).unwrap(), 100_000);
    assert_eq!(node.utxo_store.balance_of(&bob_hash).unwrap(), 0);

    // Mature the coinbase before spending it.
    let mut prev = genesis.hash();
    for _ in 0..100 {
        let b = coinbase_block([0u8; 20], 1, prev);
        node.handle_solved_block(b.clone(), None).unwrap();
        prev = b.hash();
    }

    let utxo = node
        .utxo_store
        .get(&OutPoint { txid: genesis.transactions[0].txid(), index: 0 })
        .unwrap()
        .unwrap();
    let tx = spend(&utxo, &alice, bob_hash, 100_000 - terium_core::constants::TX_FEE);

    node.handle_inbound_tx(tx.clone());
    assert!(node.mempool.exists(&tx.txid()));

    let block = terium_core::types::Block {
        header: {
            let mut h = terium_core::types::BlockHeader {
                version: 1,
                prev_hash: prev,
                merkle_root: terium_core::merkle::merkle_root(
                    &[coinbase_tx_id(bob_hash), tx.txid()],
                ),
                timestamp: 1,
                target: [0xFFu8; 32],
                nonce: 0,
            };
            while h.hash().as_bytes().as_slice() >= h.target.as_slice() {
                h.nonce += 1;
            }
            h
        },
        transactions: vec![coinbase_tx(bob_hash), tx.clone()],
    };
    node.handle_solved_block(block, None).unwrap();

    assert_eq!(node.utxo_store.balance_of(&alice_hash).unwrap(), 0);
    // bob collects both the block's coinbase reward and alice's spend.
    let expected_bob = terium_core::constants::BLOCK_REWARD + (100_000 - terium_core::constants::TX_FEE);
    assert_eq!(node.utxo_store.balance_of(&bob_hash).unwrap(), expected_bob);
}

fn coinbase_tx(reward_hash: [u8; 20]) -> Tx {
    Tx {
        version: 1,
        inputs: vec![TxIn {
            prev_output: OutPoint::coinbase(),
            unlocking_script: vec![0x00],
        }],
        outputs: vec![TxOut {
            value: terium_core::constants::BLOCK_REWARD,
            locking_script: script::pay_to_pubkey_hash(&reward_hash),
        }],
        lock_time: 0,
    }
}

fn coinbase_tx_id(reward_hash: [u8; 20]) -> terium_core::types::Hash256 {
    coinbase_tx(reward_hash).txid()
}

#[test]
fn coinbase_spend_is_rejected_before_maturity_and_accepted_at_it() {
    let tmp = tempfile::tempdir().unwrap();
    let node = build_node(&tmp);
    let miner = KeyPair::generate();
    let miner_hash = h160(&miner.public_key().to_der());

    let genesis = coinbase_block(miner_hash, 100_000, terium_core::types::Hash256::ZERO);
    node.handle_solved_block(genesis.clone(), None).unwrap();
    let spent_outpoint = OutPoint { txid: genesis.transactions[0].txid(), index: 0 };
    let utxo = node.utxo_store.get(&spent_outpoint).unwrap().unwrap();
    let spend_tx = spend(&utxo, &miner, [1u8; 20], 99_000);

    // One block short of maturity: height is 99, requires >= 0 + 100.
    let mut prev = genesis.hash();
    for _ in 0..99 {
        let b = coinbase_block([0u8; 20], 1, prev);
        node.handle_solved_block(b.clone(), None).unwrap();
        prev = b.hash();
    }
    let height = node.current_height().unwrap();
    assert!(tx_validator::validate(&spend_tx, height, &node.utxo_store, node.mempool.as_ref()).is_err());

    let maturing = coinbase_block([0u8; 20], 1, prev);
    node.handle_solved_block(maturing, None).unwrap();
    let height = node.current_height().unwrap();
    assert!(tx_validator::validate(&spend_tx, height, &node.utxo_store, node.mempool.as_ref()).is_ok());
}

#[test]
fn block_with_hash_above_target_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let node = build_node(&tmp);
    let mut block = coinbase_block([1u8; 20], 100_000, terium_core::types::Hash256::ZERO);
    block.header.target = [0x00u8; 32];

    let height = node.next_height().unwrap();
    let result = block_validator::validate(&block, height, &node.utxo_store, node.mempool.as_ref());
    assert!(result.is_err());
}

#[test]
fn tampering_an_output_after_sighash_all_signing_fails_script_verification() {
    let keypair = KeyPair::generate();
    let owner_hash = h160(&keypair.public_key().to_der());
    let utxo = terium_core::types::Utxo {
        outpoint: OutPoint { txid: terium_core::types::Hash256([1u8; 32]), index: 0 },
        value: 1_000,
        locking_script: script::pay_to_pubkey_hash(&owner_hash),
        block_height: Height::ZERO,
        is_coinbase: false,
    };
    let mut tx = spend(&utxo, &keypair, [2u8; 20], 900);

    let locking = script::pay_to_pubkey_hash(&owner_hash);
    assert_eq!(
        script::execute(&tx.inputs[0].unlocking_script, &locking, &tx, 0, &utxo),
        ExecResult::Ok
    );

    tx.outputs[0].value += 1;
    assert_eq!(
        script::execute(&tx.inputs[0].unlocking_script, &locking, &tx, 0, &utxo),
        ExecResult::Fail
    );
}
