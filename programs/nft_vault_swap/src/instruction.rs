//! Instruction definitions

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program, sysvar,
};

use crate::vault::{find_custody_address, find_vault_address};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum VaultInstruction {
    /// Create a vault record at the PDA derived from the authority and nonce
    ///
    /// Accounts expected:
    /// 0. `[writable]` Vault account (PDA)
    /// 1. `[writable, signer]` Authority
    /// 2. `[]` System program
    InitializeVault {
        nonce: u64,
        counterparty: Option<Pubkey>,
    },

    /// Move one unit of the asset from the caller into vault custody
    ///
    /// Accounts expected:
    /// 0. `[writable]` Vault account (PDA)
    /// 1. `[writable, signer]` Depositor
    /// 2. `[]` Asset mint
    /// 3. `[writable]` Depositor token account
    /// 4. `[writable]` Custody token account (PDA)
    /// 5. `[]` Token program
    /// 6. `[]` System program
    Deposit,

    /// Release the asset to the recipient
    ///
    /// Open vaults additionally need an Ed25519 instruction earlier in the
    /// transaction, signed by the authority over
    /// `vault || recipient || created_slot`.
    ///
    /// Accounts expected:
    /// 0. `[writable]` Vault account (PDA)
    /// 1. `[signer]` Recipient
    /// 2. `[writable]` Custody token account (PDA)
    /// 3. `[writable]` Recipient token account
    /// 4. `[]` Asset mint
    /// 5. `[]` Token program
    /// 6. `[]` Instructions sysvar (read only for open vaults)
    CompleteSwap,

    /// Return the asset to the depositor (authority only)
    ///
    /// Accounts expected:
    /// 0. `[writable]` Vault account (PDA)
    /// 1. `[signer]` Authority
    /// 2. `[writable]` Custody token account (PDA)
    /// 3. `[writable]` Depositor token account
    /// 4. `[]` Asset mint
    /// 5. `[]` Token program
    Cancel,

    /// Reclaim the storage of a terminal vault (authority only)
    ///
    /// Accounts expected:
    /// 0. `[writable]` Vault account (PDA)
    /// 1. `[writable, signer]` Authority
    /// 2. `[writable]` Custody token account (PDA)
    /// 3. `[]` Token program
    /// 4. `[writable]` Optional: authority token account receiving stray custody units
    /// 5. `[]` Optional: asset mint, required with 4
    CloseVault,
}

/// Build an `InitializeVault` instruction.
pub fn initialize_vault(
    program_id: &Pubkey,
    authority: &Pubkey,
    nonce: u64,
    counterparty: Option<Pubkey>,
) -> Result<Instruction, ProgramError> {
    let (vault, _) = find_vault_address(program_id, authority, nonce);
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(vault, false),
            AccountMeta::new(*authority, true),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: VaultInstruction::InitializeVault {
            nonce,
            counterparty,
        }
        .try_to_vec()?,
    })
}

/// Build a `Deposit` instruction.
pub fn deposit(
    program_id: &Pubkey,
    vault: &Pubkey,
    depositor: &Pubkey,
    asset_mint: &Pubkey,
    depositor_token: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (custody, _) = find_custody_address(program_id, vault);
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*vault, false),
            AccountMeta::new(*depositor, true),
            AccountMeta::new_readonly(*asset_mint, false),
            AccountMeta::new(*depositor_token, false),
            AccountMeta::new(custody, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: VaultInstruction::Deposit.try_to_vec()?,
    })
}

/// Build a `CompleteSwap` instruction.
pub fn complete_swap(
    program_id: &Pubkey,
    vault: &Pubkey,
    recipient: &Pubkey,
    recipient_token: &Pubkey,
    asset_mint: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (custody, _) = find_custody_address(program_id, vault);
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*vault, false),
            AccountMeta::new_readonly(*recipient, true),
            AccountMeta::new(custody, false),
            AccountMeta::new(*recipient_token, false),
            AccountMeta::new_readonly(*asset_mint, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(sysvar::instructions::id(), false),
        ],
        data: VaultInstruction::CompleteSwap.try_to_vec()?,
    })
}

/// Build a `Cancel` instruction.
pub fn cancel(
    program_id: &Pubkey,
    vault: &Pubkey,
    authority: &Pubkey,
    depositor_token: &Pubkey,
    asset_mint: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (custody, _) = find_custody_address(program_id, vault);
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*vault, false),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(custody, false),
            AccountMeta::new(*depositor_token, false),
            AccountMeta::new_readonly(*asset_mint, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: VaultInstruction::Cancel.try_to_vec()?,
    })
}

/// Build a `CloseVault` instruction.
pub fn close_vault(
    program_id: &Pubkey,
    vault: &Pubkey,
    authority: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (custody, _) = find_custody_address(program_id, vault);
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*vault, false),
            AccountMeta::new(*authority, true),
            AccountMeta::new(custody, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: VaultInstruction::CloseVault.try_to_vec()?,
    })
}

/// Build a `CloseVault` instruction that sweeps any units left in custody to
/// `authority_token` before closing.
pub fn close_vault_and_sweep(
    program_id: &Pubkey,
    vault: &Pubkey,
    authority: &Pubkey,
    authority_token: &Pubkey,
    asset_mint: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let mut instruction = close_vault(program_id, vault, authority)?;
    instruction
        .accounts
        .push(AccountMeta::new(*authority_token, false));
    instruction
        .accounts
        .push(AccountMeta::new_readonly(*asset_mint, false));
    Ok(instruction)
}
