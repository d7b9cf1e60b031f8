//! JSON body of a token
//!
//! Field order here is the canonical serialization order.

use super::CodecError;
use crate::core::{SigningInput, TransactionState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TokenBody {
    hex: String,
    txhash: String,
    signdata: Vec<SigningInput>,
    fromaddress: String,
    addresses: Vec<String>,
    complete: bool,
    issended: bool,
    usedunspenttxids: Vec<String>,
    usedunspenttxidsamount: usize,
    averageconfirmations: i64,
    minconfirmations: u32,
}

impl From<&TransactionState> for TokenBody {
    fn from(state: &TransactionState) -> Self {
        Self {
            hex: state.raw_hex.clone(),
            txhash: state.network_tx_id.clone().unwrap_or_default(),
            signdata: state.signing_inputs.clone(),
            fromaddress: state.from_address.clone(),
            addresses: state.participant_addresses.clone(),
            complete: state.complete,
            issended: state.sent,
            usedunspenttxids: state.used_input_ids.clone(),
            usedunspenttxidsamount: state.used_input_count(),
            averageconfirmations: state.average_confirmations,
            minconfirmations: state.min_confirmations,
        }
    }
}

impl TryFrom<TokenBody> for TransactionState {
    type Error = CodecError;

    fn try_from(body: TokenBody) -> Result<Self, Self::Error> {
        if body.usedunspenttxidsamount != body.usedunspenttxids.len() {
            return Err(CodecError::CountMismatch {
                declared: body.usedunspenttxidsamount,
                actual: body.usedunspenttxids.len(),
            });
        }

        let state = TransactionState {
            raw_hex: body.hex,
            signing_inputs: body.signdata,
            from_address: body.fromaddress,
            participant_addresses: body.addresses,
            used_input_ids: body.usedunspenttxids,
            average_confirmations: body.averageconfirmations,
            min_confirmations: body.minconfirmations,
            complete: body.complete,
            sent: body.issended,
            network_tx_id: (!body.txhash.is_empty()).then_some(body.txhash),
        };
        state.validate().map_err(CodecError::Invalid)?;
        Ok(state)
    }
}
