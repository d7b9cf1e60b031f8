//! Failure kinds of the exchange operations

use crate::codec::CodecError;
use crate::core::Amount;
use crate::node::NodeError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors returned by create/sign/send and friends
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Invalid address or account: {0}")]
    InvalidAddressOrAccount(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: Amount, need: Amount },
    #[error("Failed to build transaction: {0}")]
    BuildFailed(String),
    #[error("Failed to decode token: {0}")]
    DecodeFailed(CodecError),
    #[error("Transaction is already completely signed")]
    AlreadyComplete,
    #[error("Transaction has already been sent")]
    AlreadySent,
    #[error("Transaction is not completely signed")]
    NotComplete,
    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),
    #[error("Node unavailable: {0}")]
    CollaboratorUnavailable(String),
}

/// Stable, text-free classification of an [`ExchangeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidAddressOrAccount,
    InvalidAmount,
    InsufficientFunds,
    BuildFailed,
    DecodeFailed,
    AlreadyComplete,
    AlreadySent,
    NotComplete,
    BroadcastRejected,
    CollaboratorUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl ExchangeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExchangeError::InvalidAddressOrAccount(_) => ErrorKind::InvalidAddressOrAccount,
            ExchangeError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            ExchangeError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            ExchangeError::BuildFailed(_) => ErrorKind::BuildFailed,
            ExchangeError::DecodeFailed(_) => ErrorKind::DecodeFailed,
            ExchangeError::AlreadyComplete => ErrorKind::AlreadyComplete,
            ExchangeError::AlreadySent => ErrorKind::AlreadySent,
            ExchangeError::NotComplete => ErrorKind::NotComplete,
            ExchangeError::BroadcastRejected(_) => ErrorKind::BroadcastRejected,
            ExchangeError::CollaboratorUnavailable(_) => ErrorKind::CollaboratorUnavailable,
        }
    }
}

/// Fallback for node failures that have no more specific meaning at the call
/// site. Call sites that expect `NotFound` or `Rejected` map those first.
impl From<NodeError> for ExchangeError {
    fn from(err: NodeError) -> Self {
        ExchangeError::CollaboratorUnavailable(err.to_string())
    }
}
