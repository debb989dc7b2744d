#![allow(dead_code)]
#![allow(deprecated)]

use borsh::BorshDeserialize;
use solana_program::program_pack::Pack;
use solana_program_test::{processor, BanksClientError, ProgramTest, ProgramTestContext};
use solana_sdk::system_instruction;
use solana_sdk::{
    clock::Clock,
    ed25519_instruction::new_ed25519_instruction_with_signature,
    instruction::{Instruction, InstructionError},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::{Transaction, TransactionError},
};

use nft_vault_swap::{
    approval::approval_message, find_custody_address, instruction, processor::Processor, Vault,
    VaultError,
};
use spl_token::state::{Account as TokenAccount, Mint};

// ============================================================================
// TEST PROGRAM ID
// ============================================================================

/// Fixed program ID for testing. Actual deployed program ID is determined by
/// the deployment keypair, not this value.
pub fn test_program_id() -> Pubkey {
    solana_sdk::pubkey!("NftVau1tSwap1111111111111111111111111111111")
}

// ============================================================================
// TEST HARNESS HELPERS
// ============================================================================

/// Helper: Program under test plus the SPL Token program it escrows through
pub fn program_test() -> ProgramTest {
    let mut harness = ProgramTest::new(
        "nft_vault_swap",
        test_program_id(),
        processor!(Processor::process),
    );
    harness.add_program(
        "spl_token",
        spl_token::id(),
        processor!(spl_token::processor::Processor::process),
    );
    harness
}

/// Helper: Move the bank to the next slot
pub async fn advance_slot(context: &mut ProgramTestContext) {
    let clock = context
        .banks_client
        .get_sysvar::<Clock>()
        .await
        .unwrap();
    context.warp_to_slot(clock.slot + 1).unwrap();
}

/// Helper: Send a transaction with a specific payer and signers, returning the result.
/// Uses a fresh blockhash so resubmitting an identical instruction is a new transaction.
pub async fn try_send_tx(
    context: &mut ProgramTestContext,
    payer: &Keypair,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), BanksClientError> {
    let blockhash = context.get_new_latest_blockhash().await.unwrap();
    let mut all_signers = Vec::with_capacity(signers.len() + 1);
    all_signers.push(payer);
    for signer in signers {
        if signer.pubkey() != payer.pubkey() {
            all_signers.push(*signer);
        }
    }

    let tx = Transaction::new_signed_with_payer(
        instructions,
        Some(&payer.pubkey()),
        &all_signers,
        blockhash,
    );
    context.banks_client.process_transaction(tx).await
}

/// Helper: Send a transaction that must succeed
pub async fn send_tx(
    context: &mut ProgramTestContext,
    payer: &Keypair,
    instructions: &[Instruction],
    signers: &[&Keypair],
) {
    try_send_tx(context, payer, instructions, signers)
        .await
        .unwrap();
}

// ============================================================================
// ERROR CHECKING HELPERS
// ============================================================================

/// Helper: Extract the instruction error of a failed transaction
pub fn instruction_error(result: Result<(), BanksClientError>) -> InstructionError {
    match result.expect_err("transaction should have failed").unwrap() {
        TransactionError::InstructionError(_, err) => err,
        other => panic!("expected an instruction error, got {:?}", other),
    }
}

/// Helper: Assert a transaction failed with the given vault error
pub fn assert_vault_error(result: Result<(), BanksClientError>, expected: VaultError) {
    assert_eq!(
        instruction_error(result),
        InstructionError::Custom(expected as u32),
        "expected {:?}",
        expected
    );
}

// ============================================================================
// SPL TOKEN HELPERS
// ============================================================================

/// Helper: Allocate a rent-exempt account owned by the token program and run
/// `init` on it in the same transaction
async fn create_token_program_account(
    context: &mut ProgramTestContext,
    payer: &Keypair,
    len: usize,
    init: impl FnOnce(&Pubkey) -> Instruction,
) -> Pubkey {
    let account = Keypair::new();
    let lamports = context
        .banks_client
        .get_rent()
        .await
        .unwrap()
        .minimum_balance(len);

    let instructions = [
        system_instruction::create_account(
            &payer.pubkey(),
            &account.pubkey(),
            lamports,
            len as u64,
            &spl_token::id(),
        ),
        init(&account.pubkey()),
    ];
    send_tx(context, payer, &instructions, &[&account]).await;
    account.pubkey()
}

/// Helper: Create a mint with `decimals`
pub async fn create_mint(
    context: &mut ProgramTestContext,
    payer: &Keypair,
    mint_authority: &Keypair,
    decimals: u8,
) -> Pubkey {
    let authority = mint_authority.pubkey();
    create_token_program_account(context, payer, Mint::LEN, |mint| {
        spl_token::instruction::initialize_mint2(&spl_token::id(), mint, &authority, None, decimals)
            .unwrap()
    })
    .await
}

/// Helper: Create a token account for `mint` owned by `owner`
pub async fn create_token_account(
    context: &mut ProgramTestContext,
    payer: &Keypair,
    mint: Pubkey,
    owner: Pubkey,
) -> Pubkey {
    create_token_program_account(context, payer, TokenAccount::LEN, |account| {
        spl_token::instruction::initialize_account3(&spl_token::id(), account, &mint, &owner)
            .unwrap()
    })
    .await
}

/// Helper: Mint `amount` units to `destination`
pub async fn mint_to(
    context: &mut ProgramTestContext,
    payer: &Keypair,
    mint: Pubkey,
    mint_authority: &Keypair,
    destination: Pubkey,
    amount: u64,
) {
    let ix = spl_token::instruction::mint_to(
        &spl_token::id(),
        &mint,
        &destination,
        &mint_authority.pubkey(),
        &[],
        amount,
    )
    .unwrap();
    send_tx(context, payer, &[ix], &[mint_authority]).await;
}

/// Helper: Create a single-unit NFT held by `owner`, returning (mint, token account)
pub async fn create_nft(
    context: &mut ProgramTestContext,
    payer: &Keypair,
    mint_authority: &Keypair,
    owner: Pubkey,
) -> (Pubkey, Pubkey) {
    let mint = create_mint(context, payer, mint_authority, 0).await;
    let token = create_token_account(context, payer, mint, owner).await;
    mint_to(context, payer, mint, mint_authority, token, 1).await;
    (mint, token)
}

/// Helper: Decode the token account at `address`
pub async fn token_account(context: &mut ProgramTestContext, address: Pubkey) -> TokenAccount {
    let account = context
        .banks_client
        .get_account(address)
        .await
        .unwrap()
        .expect("token account should exist");
    TokenAccount::unpack(&account.data).unwrap()
}

/// Helper: Token balance of `address`
pub async fn get_token_balance(context: &mut ProgramTestContext, address: Pubkey) -> u64 {
    token_account(context, address).await.amount
}

/// Helper: Move `amount` units between token accounts, signed by `owner`
pub async fn transfer_tokens(
    context: &mut ProgramTestContext,
    owner: &Keypair,
    source: Pubkey,
    destination: Pubkey,
    amount: u64,
) {
    let ix = spl_token::instruction::transfer(
        &spl_token::id(),
        &source,
        &destination,
        &owner.pubkey(),
        &[],
        amount,
    )
    .unwrap();
    send_tx(context, owner, &[ix], &[]).await;
}

/// Helper: Read lamport balance (0 for a missing account)
pub async fn get_lamports(context: &mut ProgramTestContext, address: Pubkey) -> u64 {
    context
        .banks_client
        .get_account(address)
        .await
        .unwrap()
        .map(|account| account.lamports)
        .unwrap_or(0)
}

/// Helper: Whether an account exists on the ledger
pub async fn account_exists(context: &mut ProgramTestContext, address: Pubkey) -> bool {
    context
        .banks_client
        .get_account(address)
        .await
        .unwrap()
        .is_some()
}

// ============================================================================
// PROGRAM HELPERS
// ============================================================================

/// Helper: Read the vault record at `vault`
pub async fn fetch_vault(context: &mut ProgramTestContext, vault: Pubkey) -> Vault {
    let account = context
        .banks_client
        .get_account(vault)
        .await
        .unwrap()
        .expect("vault account should exist");
    Vault::try_from_slice(&account.data).unwrap()
}

/// Helper: Custody token account address for `vault`
pub fn custody_address(vault: &Pubkey) -> Pubkey {
    find_custody_address(&test_program_id(), vault).0
}

/// Helper: Initialize a vault owned by `authority`, returning its address
pub async fn initialize_vault(
    context: &mut ProgramTestContext,
    authority: &Keypair,
    nonce: u64,
    counterparty: Option<Pubkey>,
) -> Pubkey {
    let program_id = test_program_id();
    let ix =
        instruction::initialize_vault(&program_id, &authority.pubkey(), nonce, counterparty)
            .unwrap();
    send_tx(context, authority, &[ix], &[]).await;
    nft_vault_swap::find_vault_address(&program_id, &authority.pubkey(), nonce).0
}

/// Helper: Build a Deposit instruction
pub fn deposit_ix(
    vault: Pubkey,
    depositor: Pubkey,
    mint: Pubkey,
    depositor_token: Pubkey,
) -> Instruction {
    instruction::deposit(&test_program_id(), &vault, &depositor, &mint, &depositor_token)
        .unwrap()
}

/// Helper: Build a CompleteSwap instruction
pub fn complete_ix(
    vault: Pubkey,
    recipient: Pubkey,
    recipient_token: Pubkey,
    mint: Pubkey,
) -> Instruction {
    instruction::complete_swap(&test_program_id(), &vault, &recipient, &recipient_token, &mint)
        .unwrap()
}

/// Helper: Build a Cancel instruction
pub fn cancel_ix(
    vault: Pubkey,
    authority: Pubkey,
    depositor_token: Pubkey,
    mint: Pubkey,
) -> Instruction {
    instruction::cancel(&test_program_id(), &vault, &authority, &depositor_token, &mint).unwrap()
}

/// Helper: Build a CloseVault instruction
pub fn close_ix(vault: Pubkey, authority: Pubkey) -> Instruction {
    instruction::close_vault(&test_program_id(), &vault, &authority).unwrap()
}

/// Helper: Build a CloseVault instruction that sweeps stray custody units to `authority_token`
pub fn close_and_sweep_ix(
    vault: Pubkey,
    authority: Pubkey,
    authority_token: Pubkey,
    mint: Pubkey,
) -> Instruction {
    instruction::close_vault_and_sweep(&test_program_id(), &vault, &authority, &authority_token, &mint)
        .unwrap()
}

/// Helper: Ed25519 instruction carrying `signer`'s approval of `claimant`
/// for the lifecycle of `vault` created at `created_slot`
pub fn approval_ix(
    signer: &Keypair,
    vault: &Pubkey,
    created_slot: u64,
    claimant: &Pubkey,
) -> Instruction {
    let message = approval_message(vault, claimant, created_slot);
    let signature = signer.sign_message(&message);
    let mut signature_bytes = [0u8; 64];
    signature_bytes.copy_from_slice(signature.as_ref());
    new_ed25519_instruction_with_signature(
        &message,
        &signature_bytes,
        &signer.pubkey().to_bytes(),
    )
}

/// Helper: Approval of `claimant` for the current lifecycle of `vault`
pub async fn approve(
    context: &mut ProgramTestContext,
    signer: &Keypair,
    vault: Pubkey,
    claimant: &Pubkey,
) -> Instruction {
    let created_slot = fetch_vault(context, vault).await.created_slot;
    approval_ix(signer, &vault, created_slot, claimant)
}

// ============================================================================
// TEST ENVIRONMENT
// ============================================================================

/// Test environment: an authority holding one NFT, a designated recipient
/// and an attacker, each with a token account for the NFT mint.
pub struct TestEnv {
    pub program_id: Pubkey,
    pub authority: Keypair,
    pub recipient: Keypair,
    pub attacker: Keypair,
    pub mint_authority: Keypair,
    pub mint: Pubkey,
    pub authority_token: Pubkey,
    pub recipient_token: Pubkey,
    pub attacker_token: Pubkey,
}

/// Helper: Create a baseline environment used by most tests
pub async fn setup_basic_env(context: &mut ProgramTestContext) -> TestEnv {
    let payer = context.payer.insecure_clone();
    let payer_pubkey = payer.pubkey();
    let authority = Keypair::new();
    let recipient = Keypair::new();
    let attacker = Keypair::new();
    let mint_authority = Keypair::new();

    // Fund the actors
    let fund_ixs = [
        system_instruction::transfer(&payer_pubkey, &authority.pubkey(), 2_000_000_000),
        system_instruction::transfer(&payer_pubkey, &recipient.pubkey(), 2_000_000_000),
        system_instruction::transfer(&payer_pubkey, &attacker.pubkey(), 2_000_000_000),
    ];
    send_tx(context, &payer, &fund_ixs, &[]).await;

    // NFT mint and token accounts
    let mint = create_mint(context, &payer, &mint_authority, 0).await;
    let authority_token = create_token_account(context, &payer, mint, authority.pubkey()).await;
    let recipient_token = create_token_account(context, &payer, mint, recipient.pubkey()).await;
    let attacker_token = create_token_account(context, &payer, mint, attacker.pubkey()).await;

    mint_to(context, &payer, mint, &mint_authority, authority_token, 1).await;

    TestEnv {
        program_id: test_program_id(),
        authority,
        recipient,
        attacker,
        mint_authority,
        mint,
        authority_token,
        recipient_token,
        attacker_token,
    }
}

/// Helper: Initialize a vault for the env authority and fund it with the env NFT
pub async fn setup_funded_vault(
    context: &mut ProgramTestContext,
    env: &TestEnv,
    nonce: u64,
    counterparty: Option<Pubkey>,
) -> Pubkey {
    let vault = initialize_vault(context, &env.authority, nonce, counterparty).await;
    let ix = deposit_ix(vault, env.authority.pubkey(), env.mint, env.authority_token);
    send_tx(context, &env.authority, &[ix], &[]).await;
    vault
}

/// Helper: Generate a random vault nonce
pub fn generate_nonce() -> u64 {
    rand::random()
}
