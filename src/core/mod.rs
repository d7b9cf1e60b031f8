//! Core domain types
//!
//! - Amounts in integral base units
//! - The transaction state record carried between signers
//! - The exchange error taxonomy

pub mod amount;
pub mod error;
pub mod state;

pub use amount::{Amount, AmountParseError, COIN};
pub use error::{ErrorKind, ExchangeError};
pub use state::{Phase, SigningInput, TransactionState};
