use std::path::Path;

use anyhow::Context;
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    message::Message,
    signature::Keypair,
    signer::Signer,
    system_instruction,
    transaction::Transaction,
};

/// Zero lamport transfer to a random pubkey, prefixed with the compute budget instructions.
/// Every call yields a distinct signature even with the same blockhash.
pub fn create_transaction(
    funded_payer: &Keypair,
    cu_num: u32,
    cu_price: u64,
    blockhash: Hash,
) -> Transaction {
    let to_pubkey = Keypair::new().pubkey();

    let instructions = [
        ComputeBudgetInstruction::set_compute_unit_limit(cu_num),
        ComputeBudgetInstruction::set_compute_unit_price(cu_price),
        system_instruction::transfer(&funded_payer.pubkey(), &to_pubkey, 0),
    ];

    let message = Message::new(&instructions, Some(&funded_payer.pubkey()));

    Transaction::new(&[funded_payer], message, blockhash)
}

/// Decode a base58 encoded 64 byte secret key
pub fn keypair_from_base58(secret_key: &str) -> anyhow::Result<Keypair> {
    let bytes = bs58::decode(secret_key.trim())
        .into_vec()
        .context("Payer secret key is not valid base58")?;

    Keypair::from_bytes(&bytes).context("Payer secret key is not a valid keypair")
}

/// Read a keypair file in the solana cli format (json array of bytes)
pub fn keypair_from_file(path: &Path) -> anyhow::Result<Keypair> {
    let payer = std::fs::read_to_string(path)
        .with_context(|| format!("Error reading payer file {}", path.display()))?;
    let payer: Vec<u8> = serde_json::from_str(&payer)?;

    Keypair::from_bytes(&payer).context("Payer file is not a valid keypair")
}
