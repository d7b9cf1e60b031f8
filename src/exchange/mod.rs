//! Multisig spend workflow
//!
//! Create a partially signed transaction from a multisig address, pass it
//! between key holders as an opaque token, and broadcast it once enough
//! signatures are present.
//!
//! - [`selector`]: pick unspent outputs covering amount + fee
//! - [`builder`]: assemble the raw transaction and its state record
//! - [`coordinator`]: the create/sign/send operations over tokens

pub mod builder;
pub mod coordinator;
pub mod selector;

pub use builder::{average_confirmations, build_transaction};
pub use coordinator::{
    MultisigCoordinator, Preview, ResolvedMultisig, SendReport, SignReport, SignStatus,
};
pub use selector::{
    check_amounts, multisig_unspent, resolve_multisig_address, select_coins, Selection,
};

use crate::core::ExchangeError;
use crate::node::NodeError;

/// Map a node failure, sending `NotFound` and `Rejected` to `specific` and
/// everything else to [`ExchangeError::CollaboratorUnavailable`]
pub(crate) fn map_node_error<F>(err: NodeError, specific: F) -> ExchangeError
where
    F: FnOnce(String) -> ExchangeError,
{
    match err {
        NodeError::NotFound(msg) | NodeError::Rejected(msg) => specific(msg),
        other => other.into(),
    }
}

/// Reject a raw transaction from the node that is empty or not hex
pub(crate) fn check_raw_hex(raw_hex: &str, what: &str) -> Result<(), ExchangeError> {
    if raw_hex.is_empty() || hex::decode(raw_hex).is_err() {
        return Err(ExchangeError::CollaboratorUnavailable(format!(
            "node returned a malformed {} transaction",
            what
        )));
    }
    Ok(())
}
