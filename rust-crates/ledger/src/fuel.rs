use crate::{
    Address,
    ClaimReceipt,
    LedgerAdmin,
    LedgerResult,
    RewardLedger,
    TokenAmount,
    TokenInfo,
    error::{
        LedgerError,
        REVERT_DEPOSIT_FAILED,
        REVERT_REWARD_OVERFLOW,
        REVERT_WITHDRAW_FAILED,
        classify_message,
    },
};
use fuels::{
    accounts::{
        ViewOnlyAccount,
        wallet::Wallet,
    },
    prelude::{
        AssetId,
        CallParameters,
        Execution,
        TxPolicies,
        VariableOutputPolicy,
    },
    types::Identity,
};
use generated_abi::TapToEarn;

/// Decimals of the reward asset on Fuel networks (native u64 amounts).
pub const FUEL_TOKEN_DECIMALS: u32 = 9;
const DEFAULT_SAFE_SCRIPT_GAS_LIMIT: u64 = 29_000_000;

pub struct FuelPendingClaim {
    pub tx_id: String,
    pub taps: u64,
    pub reward: TokenAmount,
}

pub struct FuelLedger {
    contract: TapToEarn<Wallet>,
    token_asset: AssetId,
    token: TokenInfo,
    signer: Address,
    gas_limit: u64,
}

impl FuelLedger {
    /// Binds to a deployed contract, reading the per-tap reward from it.
    pub async fn connect(
        contract: TapToEarn<Wallet>,
        token_asset: AssetId,
        symbol: impl Into<String>,
        decimals: u32,
    ) -> LedgerResult<Self> {
        let signer = Address::new(hex::encode(*contract.account().address()));
        let unit_reward = contract
            .methods()
            .unit_reward()
            .with_tx_policies(
                TxPolicies::default().with_script_gas_limit(DEFAULT_SAFE_SCRIPT_GAS_LIMIT),
            )
            .simulate(Execution::realistic())
            .await
            .map_err(to_ledger_error)?
            .value;
        let token = TokenInfo {
            symbol: symbol.into(),
            decimals,
            unit_reward: TokenAmount::new(u128::from(unit_reward)),
        };
        tracing::info!(
            "connected to reward contract, {} {} per tap",
            token.format(token.unit_reward, 3),
            token.symbol
        );
        Ok(Self {
            contract,
            token_asset,
            token,
            signer,
            gas_limit: DEFAULT_SAFE_SCRIPT_GAS_LIMIT,
        })
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn signer(&self) -> &Address {
        &self.signer
    }

    fn script_policies(&self) -> TxPolicies {
        TxPolicies::default().with_script_gas_limit(self.gas_limit)
    }

    fn ensure_signer(&self, caller: &Address) -> LedgerResult<()> {
        if caller != &self.signer {
            return Err(LedgerError::Unavailable(format!(
                "connected wallet {} cannot sign for {}",
                self.signer.short(),
                caller.short()
            )));
        }
        Ok(())
    }
}

impl RewardLedger for FuelLedger {
    type Pending = FuelPendingClaim;

    fn token(&self) -> &TokenInfo {
        &self.token
    }

    async fn pool_balance(&self) -> LedgerResult<TokenAmount> {
        let balance = self
            .contract
            .methods()
            .balance()
            .with_tx_policies(self.script_policies())
            .simulate(Execution::realistic())
            .await
            .map_err(to_ledger_error)?
            .value;
        Ok(TokenAmount::new(u128::from(balance)))
    }

    async fn submit_claim(
        &self,
        claimant: &Address,
        taps: u64,
    ) -> LedgerResult<FuelPendingClaim> {
        self.ensure_signer(claimant)?;
        let reward = self
            .token
            .reward_for(taps)
            .ok_or_else(|| LedgerError::Reverted(REVERT_REWARD_OVERFLOW.into()))?;
        let response = self
            .contract
            .methods()
            .claim(taps)
            .with_variable_output_policy(VariableOutputPolicy::Exactly(1))
            .with_tx_policies(self.script_policies())
            .call()
            .await
            .map_err(to_ledger_error)?;
        let tx_id = response
            .tx_id
            .map(|id| format!("0x{}", hex::encode(*id)))
            .unwrap_or_default();
        tracing::debug!("claim tx {tx_id} for {taps} taps");
        Ok(FuelPendingClaim {
            tx_id,
            taps,
            reward,
        })
    }

    // `call()` only resolves once the transaction is included, so there is
    // nothing left to wait for here.
    async fn confirm(&self, pending: FuelPendingClaim) -> LedgerResult<ClaimReceipt> {
        Ok(ClaimReceipt {
            tx_id: pending.tx_id,
            taps: pending.taps,
            reward: pending.reward,
        })
    }
}

impl LedgerAdmin for FuelLedger {
    async fn owner(&self) -> LedgerResult<Address> {
        let owner = self
            .contract
            .methods()
            .owner()
            .with_tx_policies(self.script_policies())
            .simulate(Execution::realistic())
            .await
            .map_err(to_ledger_error)?
            .value;
        Ok(match owner {
            Identity::Address(address) => Address::new(hex::encode(*address)),
            Identity::ContractId(id) => Address::new(hex::encode(*id)),
        })
    }

    async fn deposit(
        &self,
        caller: &Address,
        amount: TokenAmount,
    ) -> LedgerResult<TokenAmount> {
        self.ensure_signer(caller)?;
        let amount = native_amount(amount, REVERT_DEPOSIT_FAILED)?;
        let call = CallParameters::new(amount, self.token_asset, self.gas_limit);
        self.contract
            .methods()
            .deposit()
            .call_params(call)
            .map_err(to_ledger_error)?
            .with_tx_policies(self.script_policies())
            .call()
            .await
            .map_err(to_ledger_error)?;
        self.pool_balance().await
    }

    async fn withdraw(
        &self,
        caller: &Address,
        amount: TokenAmount,
    ) -> LedgerResult<TokenAmount> {
        self.ensure_signer(caller)?;
        let amount = native_amount(amount, REVERT_WITHDRAW_FAILED)?;
        self.contract
            .methods()
            .withdraw(amount)
            .with_variable_output_policy(VariableOutputPolicy::Exactly(1))
            .with_tx_policies(self.script_policies())
            .call()
            .await
            .map_err(to_ledger_error)?;
        self.pool_balance().await
    }
}

fn native_amount(amount: TokenAmount, reason: &str) -> LedgerResult<u64> {
    u64::try_from(amount.base_units())
        .map_err(|_| LedgerError::Reverted(reason.to_string()))
}

fn to_ledger_error(err: fuels::types::errors::Error) -> LedgerError {
    let message = err.to_string();
    tracing::warn!("ledger call failed: {message}");
    classify_message(&message)
}
