//! Authority approvals for open vaults.
//!
//! A vault created without a counterparty can be completed by any claimant
//! that carries an approval: an Ed25519 signature by the vault authority over
//! `vault || claimant || created_slot`, verified by the native Ed25519 program
//! in an earlier instruction of the same transaction.
//!
//! The creation slot ties an approval to one lifecycle of the vault address.
//! A vault is never closed in its creation slot, so a later lifecycle at the
//! same address always has a different slot and old approvals do not verify.

use solana_program::{
    account_info::AccountInfo, ed25519_program, entrypoint::ProgramResult, msg, pubkey::Pubkey,
    sysvar::instructions,
};

use crate::error::VaultError;

/// Length of one signature offsets entry in Ed25519 instruction data
const OFFSETS_LEN: usize = 14;
/// Offsets entries start after `num_signatures` and one padding byte
const OFFSETS_START: usize = 2;
/// Instruction index meaning "data lives in this Ed25519 instruction"
const CURRENT_INSTRUCTION: u16 = u16::MAX;

/// Length of an approval message
pub const APPROVAL_MESSAGE_LEN: usize = 32 + 32 + 8;

/// Message the authority signs to approve `claimant` for the lifecycle of
/// `vault` created at `created_slot`.
pub fn approval_message(
    vault: &Pubkey,
    claimant: &Pubkey,
    created_slot: u64,
) -> [u8; APPROVAL_MESSAGE_LEN] {
    let mut message = [0u8; APPROVAL_MESSAGE_LEN];
    message[..32].copy_from_slice(vault.as_ref());
    message[32..64].copy_from_slice(claimant.as_ref());
    message[64..].copy_from_slice(&created_slot.to_le_bytes());
    message
}

/// Require an Ed25519 verification of `expected_message` signed by
/// `expected_signer` somewhere before the current instruction.
pub fn verify_approval(
    instruction_sysvar: &AccountInfo,
    expected_signer: &Pubkey,
    expected_message: &[u8],
) -> ProgramResult {
    if *instruction_sysvar.key != instructions::ID {
        return Err(VaultError::InvalidApproval.into());
    }

    let current_index = instructions::load_current_index_checked(instruction_sysvar)?;
    for index in 0..current_index {
        let ix = instructions::load_instruction_at_checked(index as usize, instruction_sysvar)?;
        if ix.program_id != ed25519_program::ID {
            continue;
        }
        if contains_signature(&ix.data, expected_signer, expected_message) {
            return Ok(());
        }
    }

    msg!("No approval from {} found", expected_signer);
    Err(VaultError::InvalidApproval.into())
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Public key and message of the `i`-th signature in Ed25519 instruction
/// `data`, if both live inside that same instruction.
fn signature_entry(data: &[u8], i: usize) -> Option<(&[u8], &[u8])> {
    let base = OFFSETS_START + i * OFFSETS_LEN;
    let signature_ix = read_u16(data, base + 2)?;
    let pubkey_offset = read_u16(data, base + 4)? as usize;
    let pubkey_ix = read_u16(data, base + 6)?;
    let msg_offset = read_u16(data, base + 8)? as usize;
    let msg_size = read_u16(data, base + 10)? as usize;
    let msg_ix = read_u16(data, base + 12)?;

    if signature_ix != CURRENT_INSTRUCTION
        || pubkey_ix != CURRENT_INSTRUCTION
        || msg_ix != CURRENT_INSTRUCTION
    {
        return None;
    }

    let pubkey = data.get(pubkey_offset..pubkey_offset + 32)?;
    let message = data.get(msg_offset..msg_offset + msg_size)?;
    Some((pubkey, message))
}

/// Whether the Ed25519 instruction `data` verified `message` for `signer`.
fn contains_signature(data: &[u8], signer: &Pubkey, message: &[u8]) -> bool {
    let Some(&num_signatures) = data.first() else {
        return false;
    };

    (0..num_signatures as usize).any(|i| {
        matches!(
            signature_entry(data, i),
            Some((pubkey, signed)) if pubkey == signer.as_ref() && signed == message
        )
    })
}
