// Owner utilities against the file-backed local ledger.
use anyhow::{
    Context,
    Result,
    anyhow,
    bail,
};
use deployments::{
    DeploymentRecord,
    DeploymentStore,
    NewDeployment,
    record_deployment,
};
use ledger::{
    Address,
    LedgerAdmin,
    LedgerState,
    LocalLedger,
    RewardLedger,
    TokenAmount,
    TokenInfo,
};
use std::fs;

pub const LOCAL_TOKEN_DECIMALS: u32 = 18;

pub async fn deploy(
    store: &DeploymentStore,
    owner: &Address,
    symbol: &str,
    force: bool,
) -> Result<DeploymentRecord> {
    let path = store.local_ledger_path();
    if force && path.exists() {
        fs::remove_file(&path)
            .with_context(|| format!("removing existing ledger {}", path.display()))?;
    }
    let token = TokenInfo::whole_token_per_tap(symbol, LOCAL_TOKEN_DECIMALS);
    let ledger = LocalLedger::create(&path, owner.clone(), token.clone()).with_context(|| {
        format!(
            "creating local ledger at {} (pass --force to replace it)",
            path.display()
        )
    })?;
    let contract_id = ledger.contract_id()?;
    tracing::info!(contract_id = %contract_id, owner = %owner, "local ledger deployed");

    record_deployment(
        store,
        NewDeployment {
            contract_id,
            network_url: format!("file://{}", path.display()),
            bytecode_hash: None,
            token_asset_id: None,
            token_symbol: Some(token.symbol),
            token_decimals: token.decimals,
            interface: generated_abi::interface(),
            ledger_path: Some(path),
        },
    )
    .context("recording deployment")
}

pub fn open_ledger(store: &DeploymentStore) -> Result<LocalLedger> {
    let record = store
        .load_required()
        .context("loading deployment record; run --action deploy first")?;
    let path = record
        .ledger_path
        .clone()
        .unwrap_or_else(|| store.local_ledger_path());
    let ledger = LocalLedger::open(&path)
        .with_context(|| format!("opening local ledger {}", path.display()))?;
    if ledger.contract_id()? != record.contract_id {
        bail!(
            "deployment record {} does not match ledger at {}",
            record.contract_id,
            path.display()
        );
    }
    Ok(ledger)
}

pub async fn deposit(
    store: &DeploymentStore,
    owner: &Address,
    amount: &str,
) -> Result<TokenAmount> {
    let ledger = open_ledger(store)?;
    let amount = parse_amount(amount, ledger.token())?;
    ledger
        .deposit(owner, amount)
        .await
        .context("depositing into the reward pool")
}

pub async fn withdraw(
    store: &DeploymentStore,
    owner: &Address,
    amount: &str,
) -> Result<TokenAmount> {
    let ledger = open_ledger(store)?;
    let amount = parse_amount(amount, ledger.token())?;
    ledger
        .withdraw(owner, amount)
        .await
        .context("withdrawing from the reward pool")
}

pub fn balance(store: &DeploymentStore) -> Result<LedgerState> {
    Ok(open_ledger(store)?.snapshot()?)
}

pub fn parse_amount(raw: &str, token: &TokenInfo) -> Result<TokenAmount> {
    let amount = TokenAmount::parse_units(raw, token.decimals).ok_or_else(|| {
        anyhow!(
            "invalid amount '{raw}': expected whole {} with at most {} decimals",
            token.symbol,
            token.decimals
        )
    })?;
    if amount.is_zero() {
        bail!("amount must be greater than zero");
    }
    Ok(amount)
}
