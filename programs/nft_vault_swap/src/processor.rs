//! Instruction processing
//!
//! Every mutating instruction follows the same order: validate the
//! transition, move custody through the token program, reload and validate
//! again, then write the new state. A failed transfer aborts the whole
//! instruction, so no state is written without the matching custody move.

use borsh::BorshDeserialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::invoke,
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
};
use spl_token::state::{Account as TokenAccount, Mint};

use crate::{
    approval,
    error::VaultError,
    events,
    instruction::VaultInstruction,
    state::{seeds, Action, Vault, VaultState, ASSET_DECIMALS, ASSET_SUPPLY, ESCROW_UNIT},
    vault::{create_pda_account, find_custody_address, VaultManager},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = VaultInstruction::try_from_slice(instruction_data)
            .map_err(|_| VaultError::InvalidInstructionData)?;

        match instruction {
            VaultInstruction::InitializeVault {
                nonce,
                counterparty,
            } => {
                msg!("Instruction: InitializeVault");
                Self::process_initialize_vault(program_id, accounts, nonce, counterparty)
            }
            VaultInstruction::Deposit => {
                msg!("Instruction: Deposit");
                Self::process_deposit(program_id, accounts)
            }
            VaultInstruction::CompleteSwap => {
                msg!("Instruction: CompleteSwap");
                Self::process_complete_swap(program_id, accounts)
            }
            VaultInstruction::Cancel => {
                msg!("Instruction: Cancel");
                Self::process_cancel(program_id, accounts)
            }
            VaultInstruction::CloseVault => {
                msg!("Instruction: CloseVault");
                Self::process_close_vault(program_id, accounts)
            }
        }
    }

    fn process_initialize_vault(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        nonce: u64,
        counterparty: Option<Pubkey>,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let vault_account = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let system_program = next_account_info(account_info_iter)?;

        if !authority.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        if counterparty == Some(Pubkey::default()) {
            return Err(VaultError::InvalidCounterparty.into());
        }

        let vault = VaultManager::create(
            program_id,
            vault_account,
            authority,
            system_program,
            counterparty,
            nonce,
        )?;

        events::emit_vault_initialized(
            vault_account.key,
            &vault.authority,
            vault.nonce,
            vault.counterparty(),
        );
        Ok(())
    }

    fn process_deposit(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let vault_account = next_account_info(account_info_iter)?;
        let depositor = next_account_info(account_info_iter)?;
        let asset_mint = next_account_info(account_info_iter)?;
        let depositor_token_account = next_account_info(account_info_iter)?;
        let custody = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;
        let system_program = next_account_info(account_info_iter)?;

        if !depositor.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_token_program(token_program)?;

        let vault = VaultManager::load(program_id, vault_account)?;
        VaultManager::validate_transition(&vault, VaultState::Uninitialized, VaultState::Funded)?;
        if !VaultManager::can(depositor.key, Action::Deposit, &vault) {
            return Err(VaultError::Unauthorized.into());
        }

        let (custody_pda, custody_bump) = find_custody_address(program_id, vault_account.key);
        if custody_pda != *custody.key {
            return Err(VaultError::InvalidPda.into());
        }

        Self::check_asset_mint(asset_mint)?;

        // Create the custody token account, owned by the vault PDA
        create_pda_account(
            depositor,
            custody,
            system_program,
            TokenAccount::LEN,
            &spl_token::id(),
            &[seeds::CUSTODY_SEED, vault_account.key.as_ref(), &[custody_bump]],
        )?;

        invoke(
            &spl_token::instruction::initialize_account3(
                &spl_token::id(),
                custody.key,
                asset_mint.key,
                vault_account.key,
            )?,
            &[custody.clone(), asset_mint.clone(), token_program.clone()],
        )?;

        // Ownership and balance of the asset are enforced by the token
        // program; its errors pass through unchanged.
        invoke(
            &spl_token::instruction::transfer_checked(
                &spl_token::id(),
                depositor_token_account.key,
                asset_mint.key,
                custody.key,
                depositor.key,
                &[],
                ESCROW_UNIT,
                ASSET_DECIMALS,
            )?,
            &[
                depositor_token_account.clone(),
                asset_mint.clone(),
                custody.clone(),
                depositor.clone(),
                token_program.clone(),
            ],
        )?;

        let mut vault = VaultManager::load(program_id, vault_account)?;
        VaultManager::validate_transition(&vault, VaultState::Uninitialized, VaultState::Funded)?;

        let custody_state = TokenAccount::unpack(&custody.data.borrow())?;
        if custody_state.mint != *asset_mint.key || custody_state.amount != ESCROW_UNIT {
            return Err(VaultError::AssetMismatch.into());
        }

        vault.state = VaultState::Funded;
        vault.depositor = *depositor.key;
        vault.asset_reference = *custody.key;
        vault.asset_mint = *asset_mint.key;
        vault.custody_bump = custody_bump;
        VaultManager::store(&vault, vault_account)?;

        events::emit_asset_deposited(vault_account.key, depositor.key, asset_mint.key, custody.key);
        Ok(())
    }

    fn process_complete_swap(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let vault_account = next_account_info(account_info_iter)?;
        let recipient = next_account_info(account_info_iter)?;
        let custody = next_account_info(account_info_iter)?;
        let recipient_token_account = next_account_info(account_info_iter)?;
        let asset_mint = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;

        if !recipient.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_token_program(token_program)?;

        let vault = VaultManager::load(program_id, vault_account)?;
        VaultManager::validate_transition(&vault, VaultState::Funded, VaultState::Completed)?;

        if vault.counterparty().is_none() {
            // Only open vaults read the instructions sysvar
            let instruction_sysvar = next_account_info(account_info_iter)
                .map_err(|_| VaultError::InvalidApproval)?;
            let message =
                approval::approval_message(vault_account.key, recipient.key, vault.created_slot);
            approval::verify_approval(instruction_sysvar, &vault.authority, &message)?;
        }
        if !VaultManager::can(recipient.key, Action::Complete, &vault) {
            return Err(VaultError::Unauthorized.into());
        }

        let held = Self::check_custody(&vault, vault_account, custody, asset_mint)?;
        VaultManager::check_destination(&vault, recipient_token_account, recipient.key)?;

        VaultManager::release_custody(
            &vault,
            vault_account,
            custody,
            asset_mint,
            recipient_token_account,
            token_program,
            held,
        )?;

        let mut vault = VaultManager::load(program_id, vault_account)?;
        VaultManager::validate_transition(&vault, VaultState::Funded, VaultState::Completed)?;
        Self::check_custody_empty(custody)?;

        vault.state = VaultState::Completed;
        VaultManager::store(&vault, vault_account)?;

        events::emit_swap_completed(vault_account.key, recipient.key, &vault.asset_mint);
        Ok(())
    }

    fn process_cancel(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let vault_account = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let custody = next_account_info(account_info_iter)?;
        let depositor_token_account = next_account_info(account_info_iter)?;
        let asset_mint = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;

        if !authority.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_token_program(token_program)?;

        let vault = VaultManager::load(program_id, vault_account)?;
        VaultManager::validate_transition(&vault, VaultState::Funded, VaultState::Cancelled)?;
        if !VaultManager::can(authority.key, Action::Cancel, &vault) {
            return Err(VaultError::Unauthorized.into());
        }

        let held = Self::check_custody(&vault, vault_account, custody, asset_mint)?;
        VaultManager::check_destination(&vault, depositor_token_account, &vault.depositor)?;

        VaultManager::release_custody(
            &vault,
            vault_account,
            custody,
            asset_mint,
            depositor_token_account,
            token_program,
            held,
        )?;

        let mut vault = VaultManager::load(program_id, vault_account)?;
        VaultManager::validate_transition(&vault, VaultState::Funded, VaultState::Cancelled)?;
        Self::check_custody_empty(custody)?;

        vault.state = VaultState::Cancelled;
        VaultManager::store(&vault, vault_account)?;

        events::emit_vault_cancelled(vault_account.key, &vault.depositor, &vault.asset_mint);
        Ok(())
    }

    fn process_close_vault(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let vault_account = next_account_info(account_info_iter)?;
        let authority = next_account_info(account_info_iter)?;
        let custody = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;
        let sweep = match (account_info_iter.next(), account_info_iter.next()) {
            (Some(destination), Some(asset_mint)) => Some((destination, asset_mint)),
            _ => None,
        };

        if !authority.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_token_program(token_program)?;

        let vault = VaultManager::load(program_id, vault_account)?;
        if !VaultManager::can(authority.key, Action::Close, &vault) {
            return Err(VaultError::Unauthorized.into());
        }

        let reclaimed = vault_account
            .lamports()
            .checked_add(custody.lamports())
            .ok_or(ProgramError::ArithmeticOverflow)?;
        let swept = VaultManager::close(
            &vault,
            vault_account,
            authority,
            custody,
            token_program,
            sweep,
        )?;

        events::emit_vault_closed(vault_account.key, authority.key, reclaimed, swept);
        Ok(())
    }

    /// Reject CPI into anything but the SPL Token program.
    fn check_token_program(token_program: &AccountInfo) -> ProgramResult {
        if *token_program.key != spl_token::id() {
            return Err(ProgramError::IncorrectProgramId);
        }
        Ok(())
    }

    /// The asset must be a single-unit, zero-decimal mint, so no second unit
    /// can exist to be pushed into custody.
    fn check_asset_mint(asset_mint: &AccountInfo) -> ProgramResult {
        if *asset_mint.owner != spl_token::id() {
            return Err(VaultError::InvalidAsset.into());
        }
        let mint = Mint::unpack(&asset_mint.data.borrow()).map_err(|_| VaultError::InvalidAsset)?;
        if mint.supply != ASSET_SUPPLY || mint.decimals != ASSET_DECIMALS {
            msg!(
                "Mint has supply {} and {} decimals",
                mint.supply,
                mint.decimals
            );
            return Err(VaultError::InvalidAsset.into());
        }
        Ok(())
    }

    /// The custody account must be the one recorded at deposit and still hold
    /// the deposited asset. Returns the full custody balance; anything beyond
    /// the escrowed unit leaves together with it.
    fn check_custody(
        vault: &Vault,
        vault_account: &AccountInfo,
        custody: &AccountInfo,
        asset_mint: &AccountInfo,
    ) -> Result<u64, ProgramError> {
        if *custody.key != vault.asset_reference || *asset_mint.key != vault.asset_mint {
            return Err(VaultError::AssetMismatch.into());
        }
        if *custody.owner != spl_token::id() {
            return Err(VaultError::InvalidAccountOwner.into());
        }

        let custody_state = TokenAccount::unpack(&custody.data.borrow())?;
        if custody_state.mint != vault.asset_mint
            || custody_state.owner != *vault_account.key
            || custody_state.amount < ESCROW_UNIT
        {
            return Err(VaultError::AssetMismatch.into());
        }
        Ok(custody_state.amount)
    }

    fn check_custody_empty(custody: &AccountInfo) -> ProgramResult {
        let custody_state = TokenAccount::unpack(&custody.data.borrow())?;
        if custody_state.amount != 0 {
            return Err(VaultError::AssetStillHeld.into());
        }
        Ok(())
    }
}
