//! CLI commands for the multisig workflow
//!
//! Implements all command handlers for the CLI interface.

use crate::codec::TokenCodec;
use crate::core::{Amount, TransactionState};
use crate::crypto::KeyPair;
use crate::exchange::{MultisigCoordinator, SignStatus};
use crate::node::{MemoryNode, MultisigScript, NodeBackend, SimLedger};
use std::io::Read;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Use `token` if given, otherwise read it from standard input
pub fn read_token(token: Option<String>) -> CliResult<String> {
    match token {
        Some(token) => Ok(token.trim().to_string()),
        None => read_token_from(std::io::stdin().lock()),
    }
}

fn read_token_from<R: Read>(mut reader: R) -> CliResult<String> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    let token = buf.trim();
    if token.is_empty() {
        return Err("no token given (use --token or pipe it on stdin)".into());
    }
    Ok(token.to_string())
}

fn print_state(state: &TransactionState) {
    println!("   ├─ Phase: {}", state.phase());
    println!("   ├─ From: {}", state.from_address);
    println!("   ├─ Participants: {}", state.participant_addresses.len());
    for address in &state.participant_addresses {
        println!("   │  └─ {}", address);
    }
    println!("   ├─ Inputs: {}", state.used_input_count());
    for (input, txid) in state.signing_inputs.iter().zip(&state.used_input_ids) {
        println!("   │  └─ {}:{}", txid, input.vout);
    }
    if state.average_confirmations < 0 {
        println!("   ├─ Avg confirmations: unknown");
    } else {
        println!("   ├─ Avg confirmations: {}", state.average_confirmations);
    }
    println!("   ├─ Min confirmations: {}", state.min_confirmations);
    match &state.network_tx_id {
        Some(txid) => println!("   └─ Network txid: {}", txid),
        None => println!("   └─ Network txid: -"),
    }
}

/// Create an unsigned spend, or only show the coin selection with `dry_run`
pub fn cmd_create<N: NodeBackend>(
    coordinator: &MultisigCoordinator<N>,
    paying: &str,
    destination: &str,
    amount: Amount,
    fee: Amount,
    min_confirmations: Option<u32>,
    dry_run: bool,
) -> CliResult<()> {
    if dry_run {
        let preview = coordinator.preview(paying, amount, fee, min_confirmations)?;
        println!("🔍 Coin selection for {}", preview.from_address);
        for (input, txid) in preview.inputs.iter().zip(&preview.used_input_ids) {
            println!("   ├─ Input {}:{}", txid, input.vout);
        }
        println!("   ├─ Total input: {}", preview.total_input);
        println!("   ├─ Amount: {}", preview.amount);
        println!("   ├─ Fee: {}", preview.fee);
        println!("   └─ Change: {}", preview.change);
        return Ok(());
    }

    let token = coordinator.create(paying, destination, amount, fee, min_confirmations)?;
    eprintln!("📝 Created spend of {} to {}", amount, destination);
    eprintln!("   Pass this token to the key holders:");
    println!("{}", token);
    Ok(())
}

/// Add this node's signatures to a token
pub fn cmd_sign<N: NodeBackend>(
    coordinator: &MultisigCoordinator<N>,
    token: &str,
    max_signers: Option<usize>,
) -> CliResult<()> {
    let report = coordinator.sign(token, max_signers)?;
    match report.status {
        SignStatus::Signed => {
            eprintln!("✍️  Signed with {} key(s)", report.signers.len());
            for signer in &report.signers {
                eprintln!("   └─ {}", signer);
            }
        }
        SignStatus::NoUsableKeys => {
            eprintln!("⚠️  This node holds no participant keys; token unchanged");
        }
    }
    if report.complete {
        eprintln!("✅ Transaction is fully signed and ready to send");
    } else {
        eprintln!("⏳ More signatures needed");
    }
    println!("{}", report.token);
    Ok(())
}

/// Broadcast a fully signed token
pub fn cmd_send<N: NodeBackend>(
    coordinator: &MultisigCoordinator<N>,
    token: &str,
) -> CliResult<()> {
    let report = coordinator.send(token)?;
    eprintln!("📡 Broadcast as {}", report.network_tx_id);
    println!("{}", report.token);
    Ok(())
}

/// Sign and broadcast in one step
pub fn cmd_sign_and_send<N: NodeBackend>(
    coordinator: &MultisigCoordinator<N>,
    token: &str,
) -> CliResult<()> {
    let report = coordinator.try_sign_and_send(token)?;
    eprintln!("📡 Signed and broadcast as {}", report.network_tx_id);
    println!("{}", report.token);
    Ok(())
}

/// Show the content of a token
pub fn cmd_decode<N: NodeBackend>(
    coordinator: &MultisigCoordinator<N>,
    token: &str,
    json: bool,
) -> CliResult<()> {
    let state = coordinator.inspect(token)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&crate::api::handlers::TransactionView::from(&state))?
        );
        return Ok(());
    }
    println!("📦 Token content");
    print_state(&state);
    Ok(())
}

/// List unspent outputs of a multisig address
pub fn cmd_unspent<N: NodeBackend>(
    coordinator: &MultisigCoordinator<N>,
    identifier: &str,
) -> CliResult<()> {
    let outputs = coordinator.list_unspent(identifier)?;
    if outputs.is_empty() {
        println!("📭 No unspent outputs for {}", identifier);
        return Ok(());
    }

    let total: Amount = outputs.iter().map(|o| o.amount).sum();
    println!("💰 Unspent outputs for {}", identifier);
    println!("   Total: {} coins", total);
    for output in outputs.iter().take(20) {
        println!(
            "   └─ {}:{} = {} coins ({} conf)",
            &output.txid[..output.txid.len().min(16)],
            output.vout,
            output.amount,
            output.confirmations
        );
    }
    if outputs.len() > 20 {
        println!("   ... and {} more", outputs.len() - 20);
    }
    Ok(())
}

/// Resolve an address or account to its multisig address
pub fn cmd_resolve<N: NodeBackend>(
    coordinator: &MultisigCoordinator<N>,
    identifier: &str,
) -> CliResult<()> {
    let resolved = coordinator.resolve(identifier)?;
    println!("🔐 Multisig address: {}", resolved.address);
    println!("   Participants:");
    for address in &resolved.participants {
        println!("   └─ {}", address);
    }
    Ok(())
}

/// Walk a 2-of-3 spend through its lifecycle on a simulated ledger
pub fn cmd_demo(token_key: &str) -> CliResult<()> {
    println!("🎬 2-of-3 multisig walkthrough on a simulated ledger\n");

    let ledger = SimLedger::new();
    let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
    let script = MultisigScript::new(2, keys.iter().map(|k| k.public_key_hex()).collect())?;
    let address = ledger.register_multisig(script, Some("treasury"));
    let funding = ledger.fund(&address, "1.5".parse()?, 6);
    println!("🏦 Treasury {} funded with 1.5 coins", address);
    println!("   └─ Funding tx: {}", funding);

    // One node per key holder, each importing only its own key
    let holders: Vec<MultisigCoordinator<MemoryNode>> = keys
        .iter()
        .map(|key| {
            MultisigCoordinator::new(
                MemoryNode::with_keys(ledger.clone(), std::slice::from_ref(key)),
                TokenCodec::new(token_key),
            )
        })
        .collect();

    let destination = KeyPair::generate().address();
    let token = holders[0].create(
        "treasury",
        &destination,
        "1.0".parse()?,
        "0.0001".parse()?,
        Some(1),
    )?;
    println!("\n📝 Holder 1 created a spend of 1.0 coins to {}", destination);
    print_state(&holders[0].inspect(&token)?);

    let first = holders[0].sign(&token, None)?;
    println!("\n✍️  Holder 1 signed (complete: {})", first.complete);

    let second = holders[1].sign(&first.token, None)?;
    println!("✍️  Holder 2 signed (complete: {})", second.complete);

    let sent = holders[2].send(&second.token)?;
    println!("\n📡 Holder 3 broadcast the transaction: {}", sent.network_tx_id);

    ledger.mine(1);
    let state = holders[2].inspect(&sent.token)?;
    println!("\n📦 Final token state");
    print_state(&state);
    println!("\n💰 Treasury balance: {} coins", ledger.balance(&address));
    println!("💰 Destination balance: {} coins", ledger.balance(&destination));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_token_trims_input() {
        let token = read_token_from("  AbCd==\n".as_bytes()).unwrap();
        assert_eq!(token, "AbCd==");
        assert!(read_token_from(" \n".as_bytes()).is_err());
        assert_eq!(read_token(Some(" x \n".to_string())).unwrap(), "x");
    }

    #[test]
    fn test_demo_walkthrough() {
        cmd_demo("demo-key").unwrap();
    }
}
