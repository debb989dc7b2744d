//! Account state definitions

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

/// Lifecycle of a vault. The Borsh tag is the variant index, so the order
/// here is also the on-chain encoding.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// Record created, nothing deposited yet
    Uninitialized,
    /// Asset held in the custody account
    Funded,
    /// Asset released to the recipient
    Completed,
    /// Asset returned to the depositor
    Cancelled,
}

impl VaultState {
    pub fn is_terminal(self) -> bool {
        matches!(self, VaultState::Completed | VaultState::Cancelled)
    }

    /// Edges of the lifecycle graph. Nothing leaves a terminal state.
    pub fn can_transition_to(self, to: VaultState) -> bool {
        matches!(
            (self, to),
            (VaultState::Uninitialized, VaultState::Funded)
                | (VaultState::Funded, VaultState::Completed)
                | (VaultState::Funded, VaultState::Cancelled)
        )
    }
}

/// Actions gated by a capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Deposit,
    Complete,
    Cancel,
    Close,
}

/// Vault record stored at the vault PDA.
///
/// Fixed-size layout: every field is always present so the account length
/// never changes after creation.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    /// Discriminator for account type
    pub discriminator: [u8; 8],
    /// Current lifecycle stage
    pub state: VaultState,
    /// Creator of the vault, the only identity allowed to cancel or close it
    pub authority: Pubkey,
    /// Identity that funded the vault (default until deposit)
    pub depositor: Pubkey,
    /// Custody token account holding the escrowed asset (default until deposit)
    pub asset_reference: Pubkey,
    /// Mint of the escrowed asset (default until deposit)
    pub asset_mint: Pubkey,
    /// Whether `counterparty` designates a recipient
    pub has_counterparty: bool,
    /// Designated recipient, meaningful only when `has_counterparty` is set
    pub counterparty: Pubkey,
    /// Per-authority nonce used in the vault PDA seeds
    pub nonce: u64,
    /// Slot the record was created in; distinguishes lifecycles that reuse
    /// the same address
    pub created_slot: u64,
    /// Vault PDA bump seed
    pub bump: u8,
    /// Custody PDA bump seed (0 until deposit)
    pub custody_bump: u8,
}

impl Vault {
    pub const DISCRIMINATOR: [u8; 8] = [0x4e, 0x46, 0x54, 0x56, 0x41, 0x55, 0x4c, 0x54]; // "NFTVAULT"
    pub const LEN: usize = 8 + 1 + 32 + 32 + 32 + 32 + 1 + 32 + 8 + 8 + 1 + 1; // 188 bytes

    pub fn new(
        authority: Pubkey,
        counterparty: Option<Pubkey>,
        nonce: u64,
        created_slot: u64,
        bump: u8,
    ) -> Self {
        Self {
            discriminator: Self::DISCRIMINATOR,
            state: VaultState::Uninitialized,
            authority,
            depositor: Pubkey::default(),
            asset_reference: Pubkey::default(),
            asset_mint: Pubkey::default(),
            has_counterparty: counterparty.is_some(),
            counterparty: counterparty.unwrap_or_default(),
            nonce,
            created_slot,
            bump,
            custody_bump: 0,
        }
    }

    /// Designated recipient, or `None` for an open vault.
    pub fn counterparty(&self) -> Option<Pubkey> {
        self.has_counterparty.then_some(self.counterparty)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Seeds for PDA derivation
pub mod seeds {
    pub const VAULT_SEED: &[u8] = b"vault";
    pub const CUSTODY_SEED: &[u8] = b"custody";
}

/// Units of the asset moved per custody transfer
pub const ESCROW_UNIT: u64 = 1;

/// Decimals the escrowed mint must have
pub const ASSET_DECIMALS: u8 = 0;

/// Supply the escrowed mint must have at deposit
pub const ASSET_SUPPLY: u64 = 1;
