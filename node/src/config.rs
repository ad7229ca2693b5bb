//! Startup configuration, read once via `clap`, with every flag
//! defaulting from the environment variable of the same name.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use ember_common::crypto::KeyPair;

#[derive(Parser, Debug)]
#[command(name = "ember-node", about = "An experimental proof-of-work blockchain node")]
pub struct NodeConfig {
    /// TCP port the gossip server listens on.
    #[arg(long, env = "PORT", default_value_t = 9000)]
    pub port: u16,

    /// Comma-separated initial peers to dial (`ws://host:port`).
    #[arg(long, env = "PEERS", value_delimiter = ',', default_value = "")]
    pub peers: Vec<String>,

    /// Advertised address used in our own HANDSHAKE frames.
    #[arg(long, env = "MY_ADDRESS")]
    pub my_address: Option<String>,

    /// Miner/signer private key, hex-encoded. Generated and persisted to
    /// `DATA_DIR/node.key` on first run if absent.
    #[arg(long, env = "PRIVATE_KEY")]
    pub private_key: Option<String>,

    /// Start the mining coordinator.
    #[arg(long, env = "ENABLE_MINING", default_value_t = false)]
    pub enable_mining: bool,

    /// Enter the initial chain-sync state on startup.
    #[arg(long, env = "ENABLE_CHAIN_REQUEST", default_value_t = false)]
    pub enable_chain_request: bool,

    /// Emit contract-interpreter log events.
    #[arg(long, env = "ENABLE_LOGGING", default_value_t = false)]
    pub enable_logging: bool,

    /// Directory for the sled databases and the persisted signing key.
    #[arg(long, env = "DATA_DIR", default_value = "./ember-data")]
    pub data_dir: PathBuf,
}

impl NodeConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn my_address(&self) -> String {
        self.my_address
            .clone()
            .unwrap_or_else(|| format!("ws://127.0.0.1:{}", self.port))
    }

    /// Load the signer key from `PRIVATE_KEY`, or from `DATA_DIR/node.key`,
    /// or generate and persist a fresh one.
    pub fn load_or_generate_key(&self) -> anyhow::Result<KeyPair> {
        if let Some(hex_key) = &self.private_key {
            return Ok(KeyPair::from_private_hex(hex_key)?);
        }

        std::fs::create_dir_all(&self.data_dir)?;
        let key_path = self.data_dir.join("node.key");
        if key_path.exists() {
            let hex_key = std::fs::read_to_string(&key_path)?;
            return Ok(KeyPair::from_private_hex(hex_key.trim())?);
        }

        let key_pair = KeyPair::generate();
        std::fs::write(&key_path, key_pair.private_key_hex())?;
        Ok(key_pair)
    }
}
