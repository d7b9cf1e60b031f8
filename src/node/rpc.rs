//! JSON-RPC client for a bitcoind-style wallet daemon
//!
//! Uses the blocking reqwest client; build and call it outside of an async
//! runtime's worker threads (the API goes through `spawn_blocking`).

use crate::config::RpcConfig;
use crate::core::{Amount, SigningInput};
use crate::node::{NodeBackend, NodeError, PrivateKey, SignedTransaction, TxOutput, UnspentOutput};
use log::debug;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// RPC_INVALID_ADDRESS_OR_KEY
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

/// Highest confirmation count passed to `listunspent`
const MAX_CONFIRMATIONS: u32 = 9_999_999;

#[derive(Debug, Deserialize)]
struct RpcReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcUnspent {
    txid: String,
    vout: u32,
    #[serde(default)]
    address: Option<String>,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: String,
    #[serde(rename = "redeemScript", default)]
    redeem_script: Option<String>,
    amount: f64,
    confirmations: i64,
}

#[derive(Debug, Deserialize)]
struct ValidatedAddress {
    isvalid: bool,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    isscript: bool,
    #[serde(default)]
    addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SignReply {
    hex: String,
    complete: bool,
}

#[derive(Debug, Deserialize)]
struct WalletTransaction {
    confirmations: i64,
}

/// Wallet node reached over HTTP JSON-RPC 1.0
#[derive(Debug)]
pub struct RpcNode {
    client: Client,
    url: String,
    user: String,
    password: String,
}

impl RpcNode {
    pub fn new(config: &RpcConfig) -> Result<Self, NodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NodeError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, NodeError> {
        debug!("RPC {}", method);
        let mut request = self.client.post(&self.url).json(&request_body(method, params));
        if !self.user.is_empty() {
            request = request.basic_auth(&self.user, Some(&self.password));
        }

        let response = request
            .send()
            .map_err(|e| NodeError::Unavailable(format!("{} request failed: {}", method, e)))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(NodeError::Unavailable(format!(
                "{} not authorized ({})",
                method, status
            )));
        }
        let body = response
            .text()
            .map_err(|e| NodeError::Unavailable(format!("{} reply unreadable: {}", method, e)))?;

        // bitcoind reports RPC errors with HTTP 500 and a JSON body
        parse_reply(&body).map_err(|err| match err {
            NodeError::Protocol(msg) if !status.is_success() => {
                NodeError::Unavailable(format!("{} failed with HTTP {}: {}", method, status, msg))
            }
            other => other,
        })
    }

    fn validate_address(&self, address: &str) -> Result<ValidatedAddress, NodeError> {
        self.call("validateaddress", json!([address]))
    }
}

fn request_body(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "1.0",
        "id": "msigflow",
        "method": method,
        "params": params,
    })
}

fn parse_reply<T: DeserializeOwned>(body: &str) -> Result<T, NodeError> {
    let reply: RpcReply =
        serde_json::from_str(body).map_err(|e| NodeError::Protocol(e.to_string()))?;
    if let Some(err) = reply.error {
        return Err(map_rpc_error(err.code, err.message));
    }
    serde_json::from_value(reply.result).map_err(|e| NodeError::Protocol(e.to_string()))
}

fn map_rpc_error(code: i64, message: String) -> NodeError {
    if code == RPC_INVALID_ADDRESS_OR_KEY {
        NodeError::NotFound(message)
    } else {
        NodeError::Rejected(format!("{} (code {})", message, code))
    }
}

fn convert_unspent(raw: RpcUnspent) -> Result<UnspentOutput, NodeError> {
    let amount = Amount::from_coins_f64(raw.amount)
        .ok_or_else(|| NodeError::Protocol(format!("bad amount {}", raw.amount)))?;
    Ok(UnspentOutput {
        txid: raw.txid,
        vout: raw.vout,
        address: raw.address.unwrap_or_default(),
        script_pub_key: raw.script_pub_key,
        redeem_script: raw.redeem_script,
        amount,
        confirmations: clamp_confirmations(raw.confirmations),
    })
}

/// Conflicted transactions report negative confirmations
fn clamp_confirmations(confirmations: i64) -> u32 {
    confirmations.clamp(0, u32::MAX as i64) as u32
}

fn single_multisig(identifier: &str, candidates: Vec<String>) -> Result<String, NodeError> {
    match candidates.as_slice() {
        [address] => Ok(address.clone()),
        [] => Err(NodeError::NotFound(format!(
            "account {} has no multisig address",
            identifier
        ))),
        _ => Err(NodeError::NotFound(format!(
            "account {} has {} multisig addresses",
            identifier,
            candidates.len()
        ))),
    }
}

fn outputs_object(outputs: &[TxOutput]) -> Value {
    let mut map = serde_json::Map::new();
    for output in outputs {
        map.insert(output.address.clone(), json!(output.amount.to_coins_f64()));
    }
    Value::Object(map)
}

impl NodeBackend for RpcNode {
    fn list_unspent(&self, min_conf: u32) -> Result<Vec<UnspentOutput>, NodeError> {
        let raw: Vec<RpcUnspent> = self.call("listunspent", json!([min_conf, MAX_CONFIRMATIONS]))?;
        raw.into_iter().map(convert_unspent).collect()
    }

    fn resolve_paying_address(&self, identifier: &str) -> Result<String, NodeError> {
        let validated = self.validate_address(identifier)?;
        if validated.isvalid {
            return if validated.isscript {
                Ok(validated.address.unwrap_or_else(|| identifier.to_string()))
            } else {
                Err(NodeError::NotFound(format!(
                    "{} is not a multisig address",
                    identifier
                )))
            };
        }

        let addresses: Vec<String> = self.call("getaddressesbyaccount", json!([identifier]))?;
        let mut multisig = Vec::new();
        for address in addresses {
            if self.validate_address(&address)?.isscript {
                multisig.push(address);
            }
        }
        single_multisig(identifier, multisig)
    }

    fn multisig_participants(&self, address: &str) -> Result<Vec<String>, NodeError> {
        let validated = self.validate_address(address)?;
        if !validated.isvalid || !validated.isscript || validated.addresses.is_empty() {
            return Err(NodeError::NotFound(format!(
                "{} is not a known multisig address",
                address
            )));
        }
        Ok(validated.addresses)
    }

    fn build_raw_transaction(
        &self,
        inputs: &[SigningInput],
        outputs: &[TxOutput],
    ) -> Result<String, NodeError> {
        let outpoints: Vec<Value> = inputs
            .iter()
            .map(|i| json!({ "txid": i.txid, "vout": i.vout }))
            .collect();
        self.call(
            "createrawtransaction",
            json!([outpoints, outputs_object(outputs)]),
        )
    }

    fn sign_raw_transaction(
        &self,
        hex: &str,
        inputs: &[SigningInput],
        keys: &[PrivateKey],
    ) -> Result<SignedTransaction, NodeError> {
        let keys: Vec<&str> = keys.iter().map(|k| k.expose()).collect();
        let reply: SignReply = self.call("signrawtransaction", json!([hex, inputs, keys]))?;
        Ok(SignedTransaction {
            hex: reply.hex,
            complete: reply.complete,
        })
    }

    fn broadcast_raw_transaction(&self, hex: &str) -> Result<String, NodeError> {
        self.call("sendrawtransaction", json!([hex]))
    }

    fn has_private_key_for(&self, address: &str) -> Result<bool, NodeError> {
        match self.private_key_for(address) {
            Ok(_) => Ok(true),
            Err(NodeError::NotFound(_)) | Err(NodeError::Rejected(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn private_key_for(&self, address: &str) -> Result<PrivateKey, NodeError> {
        let encoded: String = self.call("dumpprivkey", json!([address]))?;
        Ok(PrivateKey::new(encoded))
    }

    fn new_change_address(&self, label: &str) -> Result<String, NodeError> {
        self.call("getnewaddress", json!([label]))
    }

    fn confirmations(&self, txid: &str) -> Result<u32, NodeError> {
        let tx: WalletTransaction = self.call("gettransaction", json!([txid]))?;
        Ok(clamp_confirmations(tx.confirmations))
    }
}
