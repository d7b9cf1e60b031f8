//! Coin selection for multisig spends

use super::map_node_error;
use crate::core::{Amount, ExchangeError, SigningInput};
use crate::node::{NodeBackend, UnspentOutput};
use log::debug;

/// Outputs chosen to fund a spend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Resolved multisig address paying out
    pub from_address: String,
    /// Selected outputs in scan order
    pub inputs: Vec<SigningInput>,
    /// Previous txid of each selected output
    pub used_input_ids: Vec<String>,
    /// Sum of the selected outputs
    pub total: Amount,
    /// `total - (amount + fee)`, never negative
    pub surplus: Amount,
}

/// Reject amount/fee combinations before touching the node.
///
/// Returns `amount + fee`.
pub fn check_amounts(amount: Amount, fee: Amount) -> Result<Amount, ExchangeError> {
    if !amount.is_positive() {
        return Err(ExchangeError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    if fee.is_negative() {
        return Err(ExchangeError::InvalidAmount(format!(
            "fee must not be negative, got {}",
            fee
        )));
    }
    if amount <= fee {
        return Err(ExchangeError::InvalidAmount(format!(
            "amount {} must exceed fee {}",
            amount, fee
        )));
    }
    amount
        .checked_add(fee)
        .ok_or_else(|| ExchangeError::InvalidAmount("amount + fee overflows".to_string()))
}

/// Resolve an address or account to its multisig address
pub fn resolve_multisig_address<N: NodeBackend + ?Sized>(
    node: &N,
    identifier: &str,
) -> Result<String, ExchangeError> {
    if identifier.trim().is_empty() {
        return Err(ExchangeError::InvalidAddressOrAccount(
            "empty address or account".to_string(),
        ));
    }
    node.resolve_paying_address(identifier)
        .map_err(|e| map_node_error(e, ExchangeError::InvalidAddressOrAccount))
}

/// Every unspent output of a multisig address, confirmed or not, in node order
pub fn multisig_unspent<N: NodeBackend + ?Sized>(
    node: &N,
    address: &str,
) -> Result<Vec<UnspentOutput>, ExchangeError> {
    let all = node.list_unspent(0)?;
    Ok(all.into_iter().filter(|u| u.address == address).collect())
}

/// Pick outputs of `identifier`'s multisig address until they cover
/// `amount + fee`.
///
/// Outputs are scanned in the order the node lists them; only those with at
/// least `min_confirmations` count. Outputs without a redeem script cannot
/// be signed and are skipped.
pub fn select_coins<N: NodeBackend + ?Sized>(
    node: &N,
    identifier: &str,
    amount: Amount,
    fee: Amount,
    min_confirmations: u32,
) -> Result<Selection, ExchangeError> {
    let needed = check_amounts(amount, fee)?;
    let from_address = resolve_multisig_address(node, identifier)?;

    let mut inputs = Vec::new();
    let mut used_input_ids = Vec::new();
    let mut total = Amount::ZERO;

    for output in multisig_unspent(node, &from_address)? {
        if total >= needed {
            break;
        }
        if output.confirmations < min_confirmations {
            continue;
        }
        let Some(input) = output.signing_input() else {
            debug!("Skipping {}:{} without redeem script", output.txid, output.vout);
            continue;
        };
        total = total.checked_add(output.amount).ok_or_else(|| {
            ExchangeError::CollaboratorUnavailable(format!(
                "unspent amounts of {} overflow",
                from_address
            ))
        })?;
        used_input_ids.push(output.txid.clone());
        inputs.push(input);
    }

    if total < needed {
        return Err(ExchangeError::InsufficientFunds {
            have: total,
            need: needed,
        });
    }

    debug!(
        "Selected {} inputs totalling {} from {}",
        inputs.len(),
        total,
        from_address
    );
    Ok(Selection {
        from_address,
        inputs,
        used_input_ids,
        total,
        surplus: total - needed,
    })
}
