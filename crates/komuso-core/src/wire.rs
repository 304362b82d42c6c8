//! canonical wire serialization
//!
//! the transact payload must match the on-chain program byte-for-byte:
//! discriminator, proof, public signals, then the minified ext-data.

use base64::Engine as _;
use komuso_pool::{field, ExtData};
use serde::Serialize;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

use crate::error::{EngineError, Result};
use crate::prover::ProvedTransaction;
use crate::MAX_TRANSACT_PAYLOAD;

/// instruction discriminator for native transact
pub const TRANSACT_NATIVE_DISCRIMINATOR: [u8; 8] = [217, 149, 130, 143, 221, 52, 252, 119];

/// instruction discriminator for fungible-token transact
pub const TRANSACT_TOKEN_DISCRIMINATOR: [u8; 8] = [154, 66, 244, 204, 78, 225, 163, 151];

/// serialized transact payload:
/// discriminator ‖ proofA ‖ proofB ‖ proofC ‖ 7 public signals ‖
/// extAmount (le) ‖ fee (le) ‖ len‖ct1 ‖ len‖ct2
pub fn serialize_transact(
    discriminator: [u8; 8],
    proved: &ProvedTransaction,
    ext_data: &ExtData,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(estimate_transact_size(
        ext_data.encrypted_output1.len(),
        ext_data.encrypted_output2.len(),
    ));

    data.extend_from_slice(&discriminator);

    data.extend_from_slice(&proved.proof_a);
    data.extend_from_slice(&proved.proof_b);
    data.extend_from_slice(&proved.proof_c);

    for signal in &proved.public_signals {
        data.extend_from_slice(signal);
    }

    data.extend_from_slice(&field::ext_amount_bytes(ext_data.ext_amount));
    data.extend_from_slice(&ext_data.fee.to_le_bytes());

    data.extend_from_slice(&(ext_data.encrypted_output1.len() as u32).to_le_bytes());
    data.extend_from_slice(&ext_data.encrypted_output1);
    data.extend_from_slice(&(ext_data.encrypted_output2.len() as u32).to_le_bytes());
    data.extend_from_slice(&ext_data.encrypted_output2);

    data
}

/// payload size before building it: 8 + 256 proof + 224 signals + 16 + 2×(4+ct)
pub fn estimate_transact_size(ct1_len: usize, ct2_len: usize) -> usize {
    8 + 64 + 128 + 64 + 7 * 32 + 8 + 8 + 4 + ct1_len + 4 + ct2_len
}

/// reject payloads that cannot fit one chain packet before proving starts
pub fn check_transact_size(ct1_len: usize, ct2_len: usize) -> Result<()> {
    let size = estimate_transact_size(ct1_len, ct2_len);
    if size > MAX_TRANSACT_PAYLOAD {
        return Err(EngineError::TransactionTooLarge {
            size,
            limit: MAX_TRANSACT_PAYLOAD,
        });
    }
    Ok(())
}

pub fn to_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// accounts a transact instruction addresses, in program order
#[derive(Clone, Copy, Debug)]
pub struct TransactAccounts {
    pub signer: Pubkey,
    pub tree: Pubkey,
    pub tree_token: Pubkey,
    /// both seed prefixes for both inputs
    pub nullifier_pdas: [Pubkey; 4],
    pub global_config: Pubkey,
    pub recipient: Pubkey,
    pub fee_recipient: Pubkey,
}

/// assemble the transact instruction for a host that builds and signs the
/// outer transaction itself
pub fn transact_instruction(
    program_id: &Pubkey,
    accounts: &TransactAccounts,
    payload: Vec<u8>,
) -> Instruction {
    let mut metas = vec![
        AccountMeta::new(accounts.signer, true),
        AccountMeta::new(accounts.tree, false),
        AccountMeta::new(accounts.tree_token, false),
    ];
    metas.extend(
        accounts
            .nullifier_pdas
            .iter()
            .map(|pda| AccountMeta::new(*pda, false)),
    );
    metas.push(AccountMeta::new_readonly(accounts.global_config, false));
    metas.push(AccountMeta::new(accounts.recipient, false));
    metas.push(AccountMeta::new(accounts.fee_recipient, false));
    metas.push(AccountMeta::new_readonly(system_program::ID, false));

    Instruction {
        program_id: *program_id,
        accounts: metas,
        data: payload,
    }
}

/// withdraw request body for the relayer
///
/// the four nullifier pdas cover both seed prefixes for both inputs, so the
/// program can atomically prove non-collision
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawParams {
    pub serialized_proof: String,
    pub tree_account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_token_account: Option<String>,
    #[serde(rename = "nullifier0PDA")]
    pub nullifier0_pda: String,
    #[serde(rename = "nullifier1PDA")]
    pub nullifier1_pda: String,
    #[serde(rename = "nullifier2PDA")]
    pub nullifier2_pda: String,
    #[serde(rename = "nullifier3PDA")]
    pub nullifier3_pda: String,
    pub global_config_account: String,
    pub recipient: String,
    pub fee_recipient_account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_token_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_token_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_ata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_recipient_ata: Option<String>,
    pub ext_amount: i64,
    pub encrypted_output1: String,
    pub encrypted_output2: String,
    pub fee: u64,
    pub lookup_table_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use komuso_pool::AssetTag;

    fn proved() -> ProvedTransaction {
        ProvedTransaction {
            proof_a: [0x11; 64],
            proof_b: [0x22; 128],
            proof_c: [0x33; 64],
            public_signals: [[0x44; 32]; 7],
        }
    }

    fn ext_data() -> ExtData {
        ExtData {
            recipient: [5u8; 32],
            ext_amount: -5_000_000,
            encrypted_output1: vec![0xaa; 3],
            encrypted_output2: vec![0xbb; 2],
            fee: 15_000,
            fee_recipient: [6u8; 32],
            asset: AssetTag::NATIVE,
        }
    }

    #[test]
    fn test_layout() {
        let data = serialize_transact(TRANSACT_NATIVE_DISCRIMINATOR, &proved(), &ext_data());

        assert_eq!(&data[..8], &TRANSACT_NATIVE_DISCRIMINATOR);
        assert_eq!(&data[8..72], &[0x11; 64][..]);
        assert_eq!(&data[72..200], &[0x22; 128][..]);
        assert_eq!(&data[200..264], &[0x33; 64][..]);
        assert_eq!(&data[264..488], &[0x44; 224][..]);

        // ext amount: 2^64 - 5_000_000 little endian
        let ext = u64::from_le_bytes(data[488..496].try_into().unwrap());
        assert_eq!(ext, (-5_000_000i64) as u64);
        let fee = u64::from_le_bytes(data[496..504].try_into().unwrap());
        assert_eq!(fee, 15_000);

        // length-prefixed ciphertexts
        assert_eq!(u32::from_le_bytes(data[504..508].try_into().unwrap()), 3);
        assert_eq!(&data[508..511], &[0xaa; 3][..]);
        assert_eq!(u32::from_le_bytes(data[511..515].try_into().unwrap()), 2);
        assert_eq!(&data[515..517], &[0xbb; 2][..]);
        assert_eq!(data.len(), 517);
        assert_eq!(data.len(), estimate_transact_size(3, 2));
    }

    #[test]
    fn test_size_bound() {
        assert!(check_transact_size(120, 120).is_ok());
        assert!(matches!(
            check_transact_size(600, 600),
            Err(EngineError::TransactionTooLarge { .. })
        ));
    }

    #[test]
    fn test_transact_instruction_accounts() {
        let program = Pubkey::new_unique();
        let accounts = TransactAccounts {
            signer: Pubkey::new_unique(),
            tree: Pubkey::new_unique(),
            tree_token: Pubkey::new_unique(),
            nullifier_pdas: [
                Pubkey::new_unique(),
                Pubkey::new_unique(),
                Pubkey::new_unique(),
                Pubkey::new_unique(),
            ],
            global_config: Pubkey::new_unique(),
            recipient: Pubkey::new_unique(),
            fee_recipient: Pubkey::new_unique(),
        };

        let ix = transact_instruction(&program, &accounts, vec![1, 2, 3]);

        assert_eq!(ix.program_id, program);
        assert_eq!(ix.data, vec![1, 2, 3]);
        assert_eq!(ix.accounts.len(), 11);
        // only the payer signs
        assert!(ix.accounts[0].is_signer);
        assert!(ix.accounts.iter().skip(1).all(|m| !m.is_signer));
        // global config and the system program are read-only
        assert!(!ix.accounts[7].is_writable);
        assert_eq!(ix.accounts[10].pubkey, system_program::ID);
        assert!(!ix.accounts[10].is_writable);
    }

    #[test]
    fn test_withdraw_params_json_keys() {
        let params = WithdrawParams {
            serialized_proof: "cHJvb2Y=".into(),
            tree_account: "tree".into(),
            tree_token_account: Some("treeToken".into()),
            nullifier0_pda: "n0".into(),
            nullifier1_pda: "n1".into(),
            nullifier2_pda: "n2".into(),
            nullifier3_pda: "n3".into(),
            global_config_account: "cfg".into(),
            recipient: "rcpt".into(),
            fee_recipient_account: "feeRcpt".into(),
            mint_address: None,
            signer_token_account: None,
            recipient_token_account: None,
            tree_ata: None,
            fee_recipient_ata: None,
            ext_amount: -1,
            encrypted_output1: "YQ==".into(),
            encrypted_output2: "Yg==".into(),
            fee: 7,
            lookup_table_address: "alt".into(),
        };
        let json = serde_json::to_value(&params).unwrap();

        assert_eq!(json["serializedProof"], "cHJvb2Y=");
        assert_eq!(json["nullifier0PDA"], "n0");
        assert_eq!(json["nullifier3PDA"], "n3");
        assert_eq!(json["extAmount"], -1);
        assert_eq!(json["lookupTableAddress"], "alt");
        // native variant drops the token-account fields entirely
        assert!(json.get("mintAddress").is_none());
        assert!(json.get("signerTokenAccount").is_none());
    }
}
