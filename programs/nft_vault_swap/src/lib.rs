//! NFT Vault Swap Program (Native Solana)
//!
//! Escrows a single NFT in a custody account owned by a vault PDA. The asset
//! is released exactly once: to the recipient on a completed swap, or back to
//! the depositor when the authority cancels.

pub mod approval;
pub mod error;
pub mod events;
pub mod instruction;
pub mod processor;
pub mod state;
pub mod vault;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

pub use solana_program;

// Re-export for tests
pub use error::VaultError;
pub use instruction::VaultInstruction;
pub use state::{Action, Vault, VaultState};
pub use vault::{derive_address, find_custody_address, find_vault_address, VaultManager};
