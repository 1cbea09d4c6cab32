//! Launch program instruction builders
//!
//! Instruction data is an 8-byte Anchor discriminator followed by the
//! borsh-encoded arguments.

use borsh::BorshSerialize;
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::hashv,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};

use crate::config::PlatformConfig;
use crate::core::{LaunchError, LaunchResult};
use crate::curve::CurveConfig;

/// Token metadata program
pub const METADATA_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Native system program
pub const SYSTEM_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("11111111111111111111111111111111");

/// Index of `Transfer` in the system program's instruction enum
const SYSTEM_TRANSFER_TAG: u32 = 2;

/// SPL memo program carrying the platform marker
pub const MEMO_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr");

/// Prefix of the platform marker memo
pub const LAUNCH_MARKER_PREFIX: &str = "launch:";

/// Anchor instruction discriminator: `sha256("global:<name>")[..8]`
pub fn discriminator(name: &str) -> [u8; 8] {
    let hash = hashv(&[b"global:", name.as_bytes()]);
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash.to_bytes()[..8]);
    out
}

/// Trait for argument structs that become instruction data
pub trait InstructionArgs: BorshSerialize {
    const NAME: &'static str;

    /// Build the instruction data (discriminator + serialized args)
    fn build_data(&self) -> LaunchResult<Vec<u8>> {
        let mut data = discriminator(Self::NAME).to_vec();
        self.serialize(&mut data)
            .map_err(|e| LaunchError::Serialization(e.to_string()))?;
        Ok(data)
    }
}

#[derive(Debug, Clone, BorshSerialize)]
pub struct InitializeLaunchArgs {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

impl InstructionArgs for InitializeLaunchArgs {
    const NAME: &'static str = "initialize_launch";
}

#[derive(Debug, Clone, BorshSerialize)]
pub struct SwapArgs {
    pub amount_in: u64,
    pub minimum_amount_out: u64,
}

impl InstructionArgs for SwapArgs {
    const NAME: &'static str = "swap";
}

#[derive(Debug, Clone, BorshSerialize)]
pub struct ClaimArgs {
    pub max_amount: u64,
}

impl InstructionArgs for ClaimArgs {
    const NAME: &'static str = "claim_creator_trading_fee";
}

#[derive(Debug, Clone, BorshSerialize)]
pub struct MigrationFeeArgs {
    pub max_amount: u64,
}

impl InstructionArgs for MigrationFeeArgs {
    const NAME: &'static str = "withdraw_migration_fee";
}

#[derive(Debug, Clone, BorshSerialize)]
pub struct PositionFeeArgs {}

impl InstructionArgs for PositionFeeArgs {
    const NAME: &'static str = "claim_position_fee";
}

/// Builder for account lists
#[derive(Default)]
pub struct AccountsBuilder {
    accounts: Vec<AccountMeta>,
}

impl AccountsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a writable signer account
    pub fn signer(mut self, pubkey: Pubkey) -> Self {
        self.accounts.push(AccountMeta::new(pubkey, true));
        self
    }

    pub fn writable(mut self, pubkey: Pubkey) -> Self {
        self.accounts.push(AccountMeta::new(pubkey, false));
        self
    }

    pub fn readonly(mut self, pubkey: Pubkey) -> Self {
        self.accounts.push(AccountMeta::new_readonly(pubkey, false));
        self
    }

    pub fn build(self, program_id: Pubkey, data: Vec<u8>) -> Instruction {
        Instruction {
            program_id,
            accounts: self.accounts,
            data,
        }
    }
}

/// Program and account addresses the launch instructions reference
#[derive(Debug, Clone, Copy)]
pub struct LaunchPrograms {
    pub launch_program: Pubkey,
    pub pool_program: Option<Pubkey>,
    pub default_curve_config: Option<Pubkey>,
    pub quote_mint: Pubkey,
}

impl LaunchPrograms {
    pub fn from_config(platform: &PlatformConfig) -> LaunchResult<Self> {
        Ok(Self {
            launch_program: platform.require_launch_program()?,
            pool_program: platform.pool_program_id,
            default_curve_config: platform.default_curve_config,
            quote_mint: platform.quote_mint.unwrap_or(spl_token::native_mint::id()),
        })
    }

    pub fn config_address(&self, mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"config", mint.as_ref()], &self.launch_program).0
    }

    pub fn pool_authority(&self) -> Pubkey {
        Pubkey::find_program_address(&[b"pool_authority"], &self.launch_program).0
    }

    pub fn pool_address(&self, config: &Pubkey, mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[b"pool", config.as_ref(), mint.as_ref(), self.quote_mint.as_ref()],
            &self.launch_program,
        )
        .0
    }

    pub fn vault_address(&self, token_mint: &Pubkey, pool: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"token_vault", token_mint.as_ref(), pool.as_ref()], &self.launch_program).0
    }

    pub fn migration_metadata(&self, pool: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"migration_metadata", pool.as_ref()], &self.launch_program).0
    }

    pub fn event_authority(&self) -> Pubkey {
        Pubkey::find_program_address(&[b"__event_authority"], &self.launch_program).0
    }
}

pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"metadata", METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
        &METADATA_PROGRAM_ID,
    )
    .0
}

pub fn compute_unit_limit(units: u32) -> Instruction {
    ComputeBudgetInstruction::set_compute_unit_limit(units)
}

/// Create a per-launch curve config account from calculator output
pub fn create_config(
    programs: &LaunchPrograms,
    payer: &Pubkey,
    mint: &Pubkey,
    curve: &CurveConfig,
) -> LaunchResult<Instruction> {
    let mut data = discriminator("create_config").to_vec();
    data.extend_from_slice(&curve.to_instruction_data()?);

    Ok(AccountsBuilder::new()
        .writable(programs.config_address(mint))
        .readonly(curve.authorities.fee_claimer)
        .readonly(curve.authorities.leftover_receiver)
        .readonly(programs.quote_mint)
        .signer(*payer)
        .readonly(SYSTEM_PROGRAM_ID)
        .build(programs.launch_program, data))
}

/// Create the mint, its metadata and the bonding-curve pool
pub fn initialize_launch(
    programs: &LaunchPrograms,
    config: &Pubkey,
    creator: &Pubkey,
    mint: &Pubkey,
    args: &InitializeLaunchArgs,
) -> LaunchResult<Instruction> {
    let pool = programs.pool_address(config, mint);

    Ok(AccountsBuilder::new()
        .readonly(*config)
        .readonly(programs.pool_authority())
        .readonly(*creator)
        .signer(*mint)
        .readonly(programs.quote_mint)
        .writable(pool)
        .writable(programs.vault_address(mint, &pool))
        .writable(programs.vault_address(&programs.quote_mint, &pool))
        .writable(metadata_address(mint))
        .signer(*creator)
        .readonly(spl_token::id())
        .readonly(METADATA_PROGRAM_ID)
        .readonly(SYSTEM_PROGRAM_ID)
        .readonly(programs.event_authority())
        .readonly(programs.launch_program)
        .build(programs.launch_program, args.build_data()?))
}

/// System program lamport transfer
pub fn transfer_lamports(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut data = SYSTEM_TRANSFER_TAG.to_le_bytes().to_vec();
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        data,
    }
}

/// First purchase by the creator: wrap SOL, ensure the base account, swap
pub fn initial_buy(
    programs: &LaunchPrograms,
    config: &Pubkey,
    buyer: &Pubkey,
    mint: &Pubkey,
    lamports: u64,
) -> LaunchResult<Vec<Instruction>> {
    let pool = programs.pool_address(config, mint);
    let quote_account = get_associated_token_address(buyer, &programs.quote_mint);
    let base_account = get_associated_token_address(buyer, mint);

    let mut instructions = vec![
        create_associated_token_account_idempotent(buyer, buyer, &programs.quote_mint, &spl_token::id()),
        create_associated_token_account_idempotent(buyer, buyer, mint, &spl_token::id()),
    ];
    if programs.quote_mint == spl_token::native_mint::id() {
        instructions.push(transfer_lamports(buyer, &quote_account, lamports));
        instructions.push(
            spl_token::instruction::sync_native(&spl_token::id(), &quote_account)
                .map_err(|e| LaunchError::Serialization(e.to_string()))?,
        );
    }

    let args = SwapArgs {
        amount_in: lamports,
        minimum_amount_out: 0,
    };
    instructions.push(
        AccountsBuilder::new()
            .readonly(programs.pool_authority())
            .readonly(*config)
            .writable(pool)
            .writable(quote_account)
            .writable(base_account)
            .writable(programs.vault_address(mint, &pool))
            .writable(programs.vault_address(&programs.quote_mint, &pool))
            .readonly(*mint)
            .readonly(programs.quote_mint)
            .signer(*buyer)
            .readonly(spl_token::id())
            .readonly(spl_token::id())
            .readonly(programs.event_authority())
            .readonly(programs.launch_program)
            .build(programs.launch_program, args.build_data()?),
    );
    Ok(instructions)
}

/// Marker recognized downstream as a platform-issued launch
pub fn platform_marker(platform: &Pubkey, mint: &Pubkey) -> Instruction {
    Instruction {
        program_id: MEMO_PROGRAM_ID,
        accounts: vec![AccountMeta::new_readonly(*platform, true)],
        data: format!("{}{}", LAUNCH_MARKER_PREFIX, mint).into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminator_is_stable() {
        assert_eq!(discriminator("swap"), discriminator("swap"));
        assert_ne!(discriminator("swap"), discriminator("initialize_launch"));
        let data = SwapArgs { amount_in: 5, minimum_amount_out: 0 }.build_data().unwrap();
        assert_eq!(data.len(), 8 + 16);
        assert_eq!(&data[..8], &discriminator("swap"));
    }

    #[test]
    fn test_transfer_uses_system_wire_format() {
        let from = Pubkey::new_unique();
        let to = Pubkey::new_unique();
        let ix = transfer_lamports(&from, &to, 500_000_000);

        assert_eq!(ix.program_id.to_string(), "11111111111111111111111111111111");
        assert_eq!(ix.data[..4], [2, 0, 0, 0]);
        assert_eq!(ix.data[4..], 500_000_000u64.to_le_bytes());
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(!ix.accounts[1].is_signer && ix.accounts[1].is_writable);
    }

    #[test]
    fn test_marker_is_signed_by_platform() {
        let platform = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ix = platform_marker(&platform, &mint);
        assert!(ix.accounts[0].is_signer);
        assert!(!ix.accounts[0].is_writable);
        assert_eq!(ix.data, format!("launch:{}", mint).into_bytes());
    }
}
