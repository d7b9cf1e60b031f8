//! multisig-flow: multisig spends passed between signers as opaque tokens
//!
//! This crate provides:
//! - Coin selection over the unspent outputs of a multisig address
//! - Unsigned transaction assembly with an optional change output
//! - A tamper-evident, keyed token codec carrying the in-flight state
//! - Create / sign / send / sign-and-send over tokens
//! - A JSON-RPC wallet node client and an in-memory simulated ledger
//! - A REST API and CLI over the same operations
//!
//! # Example
//!
//! ```rust
//! use multisig_flow::codec::TokenCodec;
//! use multisig_flow::crypto::KeyPair;
//! use multisig_flow::exchange::MultisigCoordinator;
//! use multisig_flow::node::{MemoryNode, MultisigScript, SimLedger};
//!
//! let ledger = SimLedger::new();
//! let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
//! let script = MultisigScript::new(2, keys.iter().map(|k| k.public_key_hex()).collect()).unwrap();
//! let vault = ledger.register_multisig(script, Some("vault"));
//! ledger.fund(&vault, "1.5".parse().unwrap(), 3);
//!
//! // A node holding two of the three keys
//! let node = MemoryNode::with_keys(ledger.clone(), &keys[..2]);
//! let coordinator = MultisigCoordinator::new(node, TokenCodec::new("shared secret"));
//!
//! let destination = KeyPair::generate().address();
//! let token = coordinator
//!     .create("vault", &destination, "1.0".parse().unwrap(), "0.0001".parse().unwrap(), None)
//!     .unwrap();
//! let signed = coordinator.sign(&token, None).unwrap();
//! assert!(signed.complete);
//!
//! let sent = coordinator.send(&signed.token).unwrap();
//! println!("Broadcast as {}", sent.network_tx_id);
//! ```

pub mod api;
pub mod cli;
pub mod codec;
pub mod config;
pub mod core;
pub mod crypto;
pub mod exchange;
pub mod node;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use codec::{CodecError, TokenCodec};
pub use config::Config;
pub use core::{Amount, ErrorKind, ExchangeError, Phase, TransactionState};
pub use crypto::KeyPair;
pub use exchange::{MultisigCoordinator, SendReport, SignReport, SignStatus};
pub use node::{MemoryNode, NodeBackend, NodeError, RpcNode, SimLedger};
