//! Error types

use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Failure reasons surfaced by the vault program.
///
/// The discriminant is the custom error code returned to the runtime, so new
/// variants go at the end.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Vault already initialized")]
    AlreadyInitialized,

    #[error("Vault is in the wrong state for this instruction")]
    InvalidState,

    #[error("Caller is not authorized for this action")]
    Unauthorized,

    #[error("Custody asset does not match the deposited asset")]
    AssetMismatch,

    #[error("Vault is not in a terminal state")]
    NotTerminal,

    #[error("Custody account still holds the asset")]
    AssetStillHeld,

    #[error("Invalid instruction data")]
    InvalidInstructionData,

    #[error("Account not initialized")]
    AccountNotInitialized,

    #[error("Invalid PDA")]
    InvalidPda,

    #[error("Invalid account owner")]
    InvalidAccountOwner,

    #[error("Invalid token account")]
    InvalidTokenAccount,

    #[error("Invalid counterparty")]
    InvalidCounterparty,

    #[error("Invalid approval")]
    InvalidApproval,

    #[error("Mint is not a single-unit non-fungible asset")]
    InvalidAsset,

    #[error("Vault cannot be closed in the slot it was created")]
    CloseInCreationSlot,
}

impl From<VaultError> for ProgramError {
    fn from(e: VaultError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
