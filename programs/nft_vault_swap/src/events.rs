//! Event definitions for the vault program.
//!
//! Events are emitted via solana_program::msg! and can be parsed from transaction logs.

use solana_program::{msg, pubkey::Pubkey};

/// Emitted when a vault record is created.
pub fn emit_vault_initialized(
    vault: &Pubkey,
    authority: &Pubkey,
    nonce: u64,
    counterparty: Option<Pubkey>,
) {
    match counterparty {
        Some(counterparty) => msg!(
            "VaultInitialized: vault={}, authority={}, nonce={}, counterparty={}",
            vault,
            authority,
            nonce,
            counterparty
        ),
        None => msg!(
            "VaultInitialized: vault={}, authority={}, nonce={}, counterparty=open",
            vault,
            authority,
            nonce
        ),
    }
}

/// Emitted when the asset enters custody.
pub fn emit_asset_deposited(vault: &Pubkey, depositor: &Pubkey, mint: &Pubkey, custody: &Pubkey) {
    msg!(
        "AssetDeposited: vault={}, depositor={}, mint={}, custody={}",
        vault,
        depositor,
        mint,
        custody
    );
}

/// Emitted when the asset is released to the recipient.
pub fn emit_swap_completed(vault: &Pubkey, recipient: &Pubkey, mint: &Pubkey) {
    msg!(
        "SwapCompleted: vault={}, recipient={}, mint={}",
        vault,
        recipient,
        mint
    );
}

/// Emitted when the asset is returned to the depositor.
pub fn emit_vault_cancelled(vault: &Pubkey, depositor: &Pubkey, mint: &Pubkey) {
    msg!(
        "VaultCancelled: vault={}, depositor={}, mint={}",
        vault,
        depositor,
        mint
    );
}

/// Emitted when a terminal vault's storage is reclaimed. `swept` counts
/// stray units moved out of custody before it was closed.
pub fn emit_vault_closed(vault: &Pubkey, authority: &Pubkey, lamports: u64, swept: u64) {
    msg!(
        "VaultClosed: vault={}, authority={}, lamports={}, swept={}",
        vault,
        authority,
        lamports,
        swept
    );
}
