//! Vault account management: addressing, creation, loading, state validation
//! and closure of vault records.
//!
//! Every access to a vault record goes through [`VaultManager`]. The record
//! lives at a PDA, so the runtime's account store is the keyed store and the
//! PDA derivation is the key.

#![allow(deprecated)] // system_instruction deprecation - will migrate when solana_system_interface is stable

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    clock::Clock,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::Sysvar,
};
use spl_token::state::Account as TokenAccount;

use crate::{
    error::VaultError,
    state::{seeds, Action, Vault, VaultState, ASSET_DECIMALS},
};

/// Derive a PDA from a domain-separation tag, an authority and a nonce.
///
/// Pure and publicly recomputable: clients and auditors use it to check a
/// vault address before trusting its contents.
pub fn derive_address(
    program_id: &Pubkey,
    tag: &[u8],
    authority: &Pubkey,
    nonce: u64,
) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[tag, authority.as_ref(), &nonce.to_le_bytes()], program_id)
}

/// Address of the vault owned by `authority` at `nonce`.
pub fn find_vault_address(program_id: &Pubkey, authority: &Pubkey, nonce: u64) -> (Pubkey, u8) {
    derive_address(program_id, seeds::VAULT_SEED, authority, nonce)
}

/// Address of the custody token account for `vault`.
pub fn find_custody_address(program_id: &Pubkey, vault: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[seeds::CUSTODY_SEED, vault.as_ref()], program_id)
}

/// Create a program-owned account at a PDA, paid by `payer`.
///
/// Anyone can send lamports to a PDA before it is created, which makes
/// `create_account` fail. A pre-funded address is topped up to rent
/// exemption, then allocated and assigned under the PDA signature.
pub fn create_pda_account<'a>(
    payer: &AccountInfo<'a>,
    target: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    space: usize,
    owner: &Pubkey,
    signer_seeds: &[&[u8]],
) -> ProgramResult {
    let required = Rent::get()?.minimum_balance(space);
    let current = target.lamports();

    if current == 0 {
        return invoke_signed(
            &system_instruction::create_account(
                payer.key,
                target.key,
                required,
                space as u64,
                owner,
            ),
            &[payer.clone(), target.clone(), system_program.clone()],
            &[signer_seeds],
        );
    }

    if required > current {
        invoke(
            &system_instruction::transfer(payer.key, target.key, required - current),
            &[payer.clone(), target.clone(), system_program.clone()],
        )?;
    }
    invoke_signed(
        &system_instruction::allocate(target.key, space as u64),
        &[target.clone(), system_program.clone()],
        &[signer_seeds],
    )?;
    invoke_signed(
        &system_instruction::assign(target.key, owner),
        &[target.clone(), system_program.clone()],
        &[signer_seeds],
    )
}

pub struct VaultManager;

impl VaultManager {
    /// Allocate a new vault record at the derived address.
    pub fn create<'a>(
        program_id: &Pubkey,
        vault_account: &AccountInfo<'a>,
        authority: &AccountInfo<'a>,
        system_program: &AccountInfo<'a>,
        counterparty: Option<Pubkey>,
        nonce: u64,
    ) -> Result<Vault, ProgramError> {
        let (vault_pda, vault_bump) = find_vault_address(program_id, authority.key, nonce);
        if vault_pda != *vault_account.key {
            return Err(VaultError::InvalidPda.into());
        }

        if Self::is_initialized(program_id, vault_account) {
            return Err(VaultError::AlreadyInitialized.into());
        }

        let nonce_bytes = nonce.to_le_bytes();
        create_pda_account(
            authority,
            vault_account,
            system_program,
            Vault::LEN,
            program_id,
            &[seeds::VAULT_SEED, authority.key.as_ref(), &nonce_bytes, &[vault_bump]],
        )?;

        let created_slot = Clock::get()?.slot;
        let vault = Vault::new(*authority.key, counterparty, nonce, created_slot, vault_bump);
        Self::store(&vault, vault_account)?;
        Ok(vault)
    }

    /// Whether `account` already carries a vault record owned by this program.
    pub fn is_initialized(program_id: &Pubkey, account: &AccountInfo) -> bool {
        if account.owner != program_id {
            return false;
        }
        let data = account.data.borrow();
        data.len() >= Vault::DISCRIMINATOR.len()
            && data[..Vault::DISCRIMINATOR.len()] == Vault::DISCRIMINATOR
    }

    /// Read and authenticate the vault record held by `account`.
    ///
    /// The stored authority, nonce and bump must re-derive the account's own
    /// address, so a record copied to another address is rejected.
    pub fn load(program_id: &Pubkey, account: &AccountInfo) -> Result<Vault, ProgramError> {
        if account.owner != program_id {
            return Err(VaultError::InvalidAccountOwner.into());
        }
        if account.data_len() != Vault::LEN || !Self::is_initialized(program_id, account) {
            return Err(VaultError::AccountNotInitialized.into());
        }

        let vault = Vault::try_from_slice(&account.data.borrow())
            .map_err(|_| VaultError::AccountNotInitialized)?;

        let expected = Pubkey::create_program_address(
            &[
                seeds::VAULT_SEED,
                vault.authority.as_ref(),
                &vault.nonce.to_le_bytes(),
                &[vault.bump],
            ],
            program_id,
        )
        .map_err(|_| VaultError::InvalidPda)?;
        if expected != *account.key {
            return Err(VaultError::InvalidPda.into());
        }

        Ok(vault)
    }

    pub fn store(vault: &Vault, account: &AccountInfo) -> ProgramResult {
        vault.serialize(&mut &mut account.data.borrow_mut()[..])?;
        Ok(())
    }

    /// Check that `vault` sits in `from_expected` and that `to` is a legal
    /// next state.
    pub fn validate_transition(
        vault: &Vault,
        from_expected: VaultState,
        to: VaultState,
    ) -> ProgramResult {
        if vault.state != from_expected {
            msg!(
                "Invalid state: expected {:?}, found {:?}",
                from_expected,
                vault.state
            );
            return Err(VaultError::InvalidState.into());
        }
        if !from_expected.can_transition_to(to) {
            msg!("Invalid transition: {:?} -> {:?}", from_expected, to);
            return Err(VaultError::InvalidState.into());
        }
        Ok(())
    }

    /// Capability check, evaluated fresh on every instruction.
    ///
    /// Completion of an open vault (no counterparty) is gated by an approval
    /// from the authority instead, see [`crate::approval`].
    pub fn can(identity: &Pubkey, action: Action, vault: &Vault) -> bool {
        match action {
            Action::Deposit => true,
            Action::Complete => match vault.counterparty() {
                Some(counterparty) => *identity == counterparty,
                None => true,
            },
            Action::Cancel | Action::Close => *identity == vault.authority,
        }
    }

    /// The destination must be a token account for the vault's mint owned by
    /// `expected_owner`.
    pub fn check_destination(
        vault: &Vault,
        destination: &AccountInfo,
        expected_owner: &Pubkey,
    ) -> ProgramResult {
        if *destination.owner != spl_token::id() {
            return Err(VaultError::InvalidTokenAccount.into());
        }
        let destination_state = TokenAccount::unpack(&destination.data.borrow())
            .map_err(|_| VaultError::InvalidTokenAccount)?;
        if destination_state.owner != *expected_owner
            || destination_state.mint != vault.asset_mint
        {
            return Err(VaultError::InvalidTokenAccount.into());
        }
        Ok(())
    }

    /// Transfer `amount` out of the custody account, signed by the vault PDA.
    pub fn release_custody<'a>(
        vault: &Vault,
        vault_account: &AccountInfo<'a>,
        custody: &AccountInfo<'a>,
        asset_mint: &AccountInfo<'a>,
        destination: &AccountInfo<'a>,
        token_program: &AccountInfo<'a>,
        amount: u64,
    ) -> ProgramResult {
        let nonce_bytes = vault.nonce.to_le_bytes();
        invoke_signed(
            &spl_token::instruction::transfer_checked(
                &spl_token::id(),
                custody.key,
                asset_mint.key,
                destination.key,
                vault_account.key,
                &[],
                amount,
                ASSET_DECIMALS,
            )?,
            &[
                custody.clone(),
                asset_mint.clone(),
                destination.clone(),
                vault_account.clone(),
                token_program.clone(),
            ],
            &[&[
                seeds::VAULT_SEED,
                vault.authority.as_ref(),
                &nonce_bytes,
                &[vault.bump],
            ]],
        )
    }

    /// Reclaim the storage of a terminal vault.
    ///
    /// Closes the custody token account and the vault record, moving all
    /// rent to the authority. Tokens sent into custody after release are
    /// swept to `sweep` (an authority token account and the asset mint);
    /// without it a non-empty custody account fails with `AssetStillHeld`.
    /// Returns the number of swept units.
    pub fn close<'a>(
        vault: &Vault,
        vault_account: &AccountInfo<'a>,
        authority: &AccountInfo<'a>,
        custody: &AccountInfo<'a>,
        token_program: &AccountInfo<'a>,
        sweep: Option<(&AccountInfo<'a>, &AccountInfo<'a>)>,
    ) -> Result<u64, ProgramError> {
        if !vault.is_terminal() {
            return Err(VaultError::NotTerminal.into());
        }
        if Clock::get()?.slot <= vault.created_slot {
            return Err(VaultError::CloseInCreationSlot.into());
        }
        if *custody.key != vault.asset_reference {
            return Err(VaultError::AssetMismatch.into());
        }

        let stray = TokenAccount::unpack(&custody.data.borrow())?.amount;
        if stray != 0 {
            let Some((destination, asset_mint)) = sweep else {
                return Err(VaultError::AssetStillHeld.into());
            };
            if *asset_mint.key != vault.asset_mint {
                return Err(VaultError::AssetMismatch.into());
            }
            Self::check_destination(vault, destination, &vault.authority)?;
            Self::release_custody(
                vault,
                vault_account,
                custody,
                asset_mint,
                destination,
                token_program,
                stray,
            )?;
        }

        let nonce_bytes = vault.nonce.to_le_bytes();
        invoke_signed(
            &spl_token::instruction::close_account(
                &spl_token::id(),
                custody.key,
                authority.key,
                vault_account.key,
                &[],
            )?,
            &[
                custody.clone(),
                authority.clone(),
                vault_account.clone(),
                token_program.clone(),
            ],
            &[&[
                seeds::VAULT_SEED,
                vault.authority.as_ref(),
                &nonce_bytes,
                &[vault.bump],
            ]],
        )?;

        // Zero the record before draining so it cannot be revived within the
        // same transaction.
        vault_account.data.borrow_mut().fill(0);

        let vault_lamports = vault_account.lamports();
        let authority_lamports = authority
            .lamports()
            .checked_add(vault_lamports)
            .ok_or(ProgramError::ArithmeticOverflow)?;
        **authority.try_borrow_mut_lamports()? = authority_lamports;
        **vault_account.try_borrow_mut_lamports()? = 0;

        Ok(stray)
    }
}
