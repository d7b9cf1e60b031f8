//! Assembles the raw transaction and wraps it in a [`TransactionState`]

use super::{check_raw_hex, map_node_error};
use super::selector::Selection;
use crate::core::{Amount, ExchangeError, TransactionState};
use crate::node::{NodeBackend, TxOutput};
use log::{debug, warn};

/// Build the unsigned transaction for `selection`.
///
/// Pays `amount` to `destination` and, when `change_address` is given and
/// the selection has a surplus, the surplus to `change_address`.
pub fn build_transaction<N: NodeBackend + ?Sized>(
    node: &N,
    selection: &Selection,
    destination: &str,
    amount: Amount,
    change_address: Option<&str>,
    min_confirmations: u32,
) -> Result<TransactionState, ExchangeError> {
    let mut outputs = vec![TxOutput {
        address: destination.to_string(),
        amount,
    }];
    if let Some(change) = change_address.filter(|_| selection.surplus.is_positive()) {
        outputs.push(TxOutput {
            address: change.to_string(),
            amount: selection.surplus,
        });
    }

    let raw_hex = node
        .build_raw_transaction(&selection.inputs, &outputs)
        .map_err(|e| map_node_error(e, ExchangeError::BuildFailed))?;
    check_raw_hex(&raw_hex, "unsigned")?;
    let participants = node
        .multisig_participants(&selection.from_address)
        .map_err(|e| map_node_error(e, ExchangeError::BuildFailed))?;

    let average = average_confirmations(node, &selection.used_input_ids);
    debug!(
        "Built transaction from {} with {} outputs (avg conf {})",
        selection.from_address,
        outputs.len(),
        average
    );

    Ok(TransactionState::new(
        raw_hex,
        selection.inputs.clone(),
        selection.from_address.clone(),
        participants,
        selection.used_input_ids.clone(),
        average,
        min_confirmations,
    ))
}

/// Mean confirmation count of `txids`, rounded half up.
///
/// `-1` when the list is empty or any lookup fails.
pub fn average_confirmations<N: NodeBackend + ?Sized>(node: &N, txids: &[String]) -> i64 {
    if txids.is_empty() {
        return -1;
    }
    let mut sum: u64 = 0;
    for txid in txids {
        match node.confirmations(txid) {
            Ok(confirmations) => sum += confirmations as u64,
            Err(err) => {
                warn!("No confirmation count for {}: {}", txid, err);
                return -1;
            }
        }
    }
    let count = txids.len() as u64;
    ((sum * 2 + count) / (count * 2)) as i64
}
