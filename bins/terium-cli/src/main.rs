//! terium-cli — run a node, mine the genesis block, and drive a wallet.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use terium_core::address::Address;
use terium_core::constants::NBITS;
use terium_network::{spawn_reader, spawn_writer, Frame};
use terium_node::block_index::BlockIndex;
use terium_node::block_store::BlockStore;
use terium_node::chain::Blockchain;
use terium_node::config::DirCtx;
use terium_node::genesis::run_genesis;
use terium_node::mempool::Mempool;
use terium_node::miner::{spawn_mining_loop, Miner};
use terium_node::node::{self, Node};
use terium_node::tx_index::TxIndex;
use terium_node::utxo_store::UtxoStore;
use terium_wallet::Wallet;

#[derive(Parser)]
#[command(name = "terium-cli", version, about = "A Bitcoin-style proof-of-work full node")]
struct Cli {
    /// Node root directory. Falls back to `TERIUM_ROOT`, then the OS data directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the node: mining loop, peer listener and event loop.
    Run(RunArgs),
    /// Mine the genesis block, paying the reward to `address`.
    Genesis(GenesisArgs),
    /// Inspect or drive a named wallet.
    Wallet(WalletArgs),
    /// Print chain tip, height and mempool size without starting the node.
    Node,
}

#[derive(Args)]
struct RunArgs {
    /// Address to accept inbound peer connections on.
    #[arg(long, default_value = "0.0.0.0:18555")]
    listen: SocketAddr,
}

#[derive(Args)]
struct GenesisArgs {
    /// Hex-encoded address to pay the genesis block reward to.
    address: String,
}

#[derive(Args)]
struct WalletArgs {
    /// Wallet name; the key is stored at `<root>/wallets/<name>.key`.
    #[arg(long)]
    name: String,

    /// Print the wallet's UTXO-set balance.
    #[arg(long)]
    balance: bool,

    /// Print the wallet's address.
    #[arg(long = "get-addr")]
    get_addr: bool,

    /// Build and sign a transaction without broadcasting it.
    #[arg(long = "gen-tx")]
    gen_tx: bool,

    /// Build, sign and broadcast a transaction to a running peer.
    #[arg(long = "send-tx")]
    send_tx: bool,

    /// Recipient address, required by `--gen-tx` and `--send-tx`.
    #[arg(long)]
    to: Option<String>,

    /// Amount to send, required by `--gen-tx` and `--send-tx`.
    #[arg(long)]
    amount: Option<i64>,

    /// Peer address to broadcast to, required by `--send-tx`.
    #[arg(long)]
    peer: Option<SocketAddr>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let rt = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    if let Err(e) = rt.block_on(dispatch(cli)) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let ctx = resolve_root(cli.root)?;
    match cli.command {
        Command::Run(args) => run_node(ctx, args).await,
        Command::Genesis(args) => run_genesis_cmd(ctx, args).await,
        Command::Wallet(args) => run_wallet(ctx, args).await,
        Command::Node => run_status(ctx).await,
    }
}

/// `--root`, then `TERIUM_ROOT`, then the OS data directory's `terium`
/// subdirectory — created if it doesn't already exist.
fn resolve_root(root: Option<PathBuf>) -> Result<DirCtx> {
    let root = match root {
        Some(root) => root,
        None => match std::env::var("TERIUM_ROOT") {
            Ok(root) => PathBuf::from(root),
            Err(_) => dirs::data_dir()
                .context("could not determine a default data directory")?
                .join("terium"),
        },
    };
    std::fs::create_dir_all(&root).with_context(|| format!("creating {}", root.display()))?;
    Ok(DirCtx::new(root)?)
}

fn open_stores(ctx: &DirCtx) -> Result<(BlockStore, BlockIndex, TxIndex, UtxoStore)> {
    let block_store = BlockStore::open(ctx.data_dir.clone())?;
    let block_index = BlockIndex::open(ctx.index_dir.join("blockIndex"))?;
    let tx_index = TxIndex::open(ctx.index_dir.join("txIndex"))?;
    let utxo_store = UtxoStore::open(ctx.data_dir.join("utxoSet"))?;
    Ok((block_store, block_index, tx_index, utxo_store))
}

async fn run_genesis_cmd(ctx: DirCtx, args: GenesisArgs) -> Result<()> {
    let address = Address::from_hex(&args.address).context("invalid address")?;
    let (block_store, block_index, _tx_index, _utxo_store) = open_stores(&ctx)?;
    let chain = Blockchain::new(&block_store, &block_index);
    let block = run_genesis(&chain, address.pubkey_hash, NBITS, node::unix_now)
        .await
        .context("genesis failed")?;
    println!("{}", block.hash());
    Ok(())
}

/// Resolve the node's reward address: the configured `clientAddress`, or a
/// freshly provisioned `default` wallet if none is set.
fn reward_pubkey_hash(ctx: &DirCtx, client_address: Option<&str>) -> Result<[u8; 20]> {
    match client_address {
        Some(hex) => Ok(Address::from_hex(hex)?.pubkey_hash),
        None => {
            let wallet = Wallet::load_or_create(&ctx.wallet_dir, "default")?;
            info!(address = %wallet.address(), "no clientAddress configured, provisioned a default wallet");
            Ok(wallet.pubkey_hash())
        }
    }
}

async fn run_node(ctx: DirCtx, args: RunArgs) -> Result<()> {
    let config = ctx.load_config()?;
    let reward_hash = reward_pubkey_hash(&ctx, config.client_address.as_deref())?;

    let (block_store, block_index, tx_index, utxo_store) = open_stores(&ctx)?;
    let mempool = Arc::new(Mempool::new());

    let tip_hash = Blockchain::new(&block_store, &block_index)
        .tip_hash()?
        .unwrap_or(terium_core::types::Hash256::ZERO);

    let miner = Arc::new(Miner::new(
        reward_hash,
        NBITS,
        config.num_tx_in_block() as usize,
        mempool.clone(),
        tip_hash,
        node::unix_now(),
    ));

    let node = Arc::new(Node {
        block_store,
        block_index,
        tx_index,
        utxo_store,
        mempool,
        miner: miner.clone(),
    });

    let tip_node = node.clone();
    let (miner_control, solved_rx, _miner_handle) = spawn_mining_loop(
        miner,
        move || tip_node.chain().tip_hash().ok().flatten().unwrap_or(terium_core::types::Hash256::ZERO),
        node::unix_now,
    );

    let (inbound_tx_tx, inbound_tx_rx) = mpsc::channel(256);
    let (inbound_block_tx, inbound_block_rx) = mpsc::channel(256);
    let (outbound_tx, outbound_rx) = mpsc::channel::<Frame>(256);

    tokio::spawn(peer_listener(args.listen, inbound_tx_tx, inbound_block_tx, outbound_rx));

    info!(root = %node_root(&ctx), listen = %args.listen, "node starting");
    node::run(node, solved_rx, inbound_tx_rx, inbound_block_rx, miner_control, Some(outbound_tx)).await;
    Ok(())
}

fn node_root(ctx: &DirCtx) -> String {
    ctx.root.display().to_string()
}

/// Accept a single peer connection and bridge it to the node's inbound and
/// outbound channels for the remainder of the node's lifetime. Multi-peer
/// fan-out and connection bookkeeping are an external collaborator's job,
/// not this binary's.
async fn peer_listener(
    listen: SocketAddr,
    inbound_tx_tx: mpsc::Sender<terium_core::types::Tx>,
    inbound_block_tx: mpsc::Sender<terium_core::types::Block>,
    mut outbound_rx: mpsc::Receiver<Frame>,
) {
    let listener = match TcpListener::bind(listen).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!(error = %e, "failed to bind peer listener, running without peers");
            while outbound_rx.recv().await.is_some() {}
            return;
        }
    };

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "failed to accept peer connection");
                continue;
            }
        };
        info!(peer = %peer_addr, "peer connected");
        let (read_half, write_half) = stream.into_split();
        spawn_reader(read_half, inbound_tx_tx.clone(), inbound_block_tx.clone());

        let (writer_tx, writer_rx) = mpsc::channel::<Frame>(256);
        spawn_writer(write_half, writer_rx);
        while let Some(frame) = outbound_rx.recv().await {
            if writer_tx.send(frame).await.is_err() {
                break;
            }
        }
    }
}

async fn run_wallet(ctx: DirCtx, args: WalletArgs) -> Result<()> {
    let selected = [args.balance, args.get_addr, args.gen_tx, args.send_tx]
        .iter()
        .filter(|b| **b)
        .count();
    if selected != 1 {
        bail!("exactly one of --balance, --get-addr, --gen-tx, --send-tx must be given");
    }

    let wallet = Wallet::load_or_create(&ctx.wallet_dir, &args.name)?;
    let (_block_store, _block_index, _tx_index, utxo_store) = open_stores(&ctx)?;

    if args.balance {
        println!("{}", wallet.balance(&utxo_store)?);
        return Ok(());
    }
    if args.get_addr {
        println!("{}", wallet.address());
        return Ok(());
    }

    let to = args.to.context("--to is required")?;
    let amount = args.amount.context("--amount is required")?;
    let to_address = Address::from_hex(&to).context("invalid recipient address")?;
    let tx = wallet.build_transaction(&utxo_store, to_address, amount)?;
    println!("{}", tx.txid());

    if args.send_tx {
        let peer = args.peer.context("--peer is required with --send-tx")?;
        let mut stream = tokio::net::TcpStream::connect(peer)
            .await
            .with_context(|| format!("connecting to peer {peer}"))?;
        use tokio::io::AsyncWriteExt;
        stream.write_all(&Frame::Tx(tx).encode()).await?;
        info!(peer = %peer, "transaction broadcast");
    }
    Ok(())
}

async fn run_status(ctx: DirCtx) -> Result<()> {
    let (block_store, block_index, _tx_index, _utxo_store) = open_stores(&ctx)?;
    let chain = Blockchain::new(&block_store, &block_index);
    match chain.tip_hash()? {
        Some(hash) => {
            let height = chain.tip_height()?.unwrap_or(terium_core::types::Height::ZERO);
            println!("tip: {hash}");
            println!("height: {}", height.as_u64());
        }
        None => println!("chain is empty"),
    }
    Ok(())
}
