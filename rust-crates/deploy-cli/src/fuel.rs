// Owner utilities against a deployed reward contract on a Fuel network.
use crate::local::parse_amount;
use anyhow::{
    Context,
    Result,
    anyhow,
};
use deployments::{
    DeploymentRecord,
    DeploymentStore,
    NewDeployment,
    record_deployment,
};
use fuels::{
    accounts::wallet::Wallet,
    prelude::{
        AssetId,
        ContractId,
        Provider,
    },
    types::Identity,
};
use generated_abi::DeployParams;
use ledger::{
    Address,
    FUEL_TOKEN_DECIMALS,
    FuelLedger,
    LedgerAdmin,
    RewardLedger,
    TokenAmount,
};
use std::str::FromStr;
use tap_to_earn::wallets;

pub struct FuelTarget {
    pub rpc_url: String,
    pub wallet: Wallet,
    pub owner: Address,
    pub base_asset: AssetId,
}

pub async fn connect(
    rpc_url: &str,
    wallet_name: &str,
    wallet_dir: Option<&str>,
) -> Result<FuelTarget> {
    let provider = Provider::connect(rpc_url)
        .await
        .context("failed to connect to provider")?;
    let dir = wallets::resolve_wallet_dir(wallet_dir)
        .map_err(|e| anyhow!("{e:#}"))
        .context("resolving wallet directory")?;
    let descriptor = wallets::find_wallet(&dir, wallet_name)
        .map_err(|e| anyhow!("{e:#}"))
        .context("locating requested wallet")?;
    let wallet = wallets::unlock_wallet(&descriptor, &provider)
        .map_err(|e| anyhow!("{e:#}"))
        .context("unlocking forc-wallet profile")?;
    let consensus_parameters = provider
        .consensus_parameters()
        .await
        .context("fetching consensus parameters")?;
    let owner = Address::new(hex::encode(*wallet.address()));
    Ok(FuelTarget {
        rpc_url: rpc_url.to_string(),
        wallet,
        owner,
        base_asset: *consensus_parameters.base_asset_id(),
    })
}

pub async fn deploy(
    target: &FuelTarget,
    store: &DeploymentStore,
    symbol: &str,
    token_asset_id: Option<&str>,
) -> Result<(DeploymentRecord, FuelLedger)> {
    let token = match token_asset_id {
        Some(raw) => parse_asset_id(raw)?,
        None => {
            println!(
                "No token asset id specified, defaulting to the base asset id: 0x{}",
                hex::encode(*target.base_asset)
            );
            target.base_asset
        }
    };
    let bytecode_hash = deployments::compute_bytecode_hash(generated_abi::tap_to_earn_bin_path())
        .context("hashing tap-to-earn binary")?;
    let params = DeployParams {
        owner: Identity::Address(target.wallet.address()),
        token,
        token_decimals: FUEL_TOKEN_DECIMALS as u8,
    };
    let (instance, contract_id) =
        generated_abi::deploy_tap_to_earn(target.wallet.clone(), &params)
            .await
            .context("deploying tap-to-earn contract")?;
    tracing::info!(contract_id = %contract_id, "reward contract deployed");

    let ledger = FuelLedger::connect(instance, token, symbol, FUEL_TOKEN_DECIMALS)
        .await
        .context("reading deployed contract")?;
    let record = record_deployment(
        store,
        NewDeployment {
            contract_id: contract_id.to_string(),
            network_url: target.rpc_url.clone(),
            bytecode_hash: Some(bytecode_hash),
            token_asset_id: Some(format!("0x{}", hex::encode(*token))),
            token_symbol: Some(symbol.to_string()),
            token_decimals: FUEL_TOKEN_DECIMALS,
            interface: generated_abi::interface(),
            ledger_path: None,
        },
    )
    .context("recording deployment")?;
    Ok((record, ledger))
}

pub async fn open_ledger(target: &FuelTarget, store: &DeploymentStore) -> Result<FuelLedger> {
    let record = store
        .load_required()
        .context("loading deployment record; run --action deploy first")?;
    let contract_id = ContractId::from_str(&record.contract_id)
        .map_err(|e| anyhow!("parsing stored contract id: {e}"))?;
    let asset = match record.token_asset_id.as_deref() {
        Some(raw) => parse_asset_id(raw)?,
        None => target.base_asset,
    };
    let symbol = record.token_symbol.unwrap_or_else(|| "TAP".to_string());
    let contract =
        generated_abi::separate_contract_instance(&contract_id, target.wallet.clone());
    FuelLedger::connect(contract, asset, symbol, FUEL_TOKEN_DECIMALS)
        .await
        .context("connecting to reward contract")
}

pub async fn deposit(ledger: &FuelLedger, owner: &Address, amount: &str) -> Result<TokenAmount> {
    let amount = parse_amount(amount, ledger.token())?;
    ledger
        .deposit(owner, amount)
        .await
        .context("depositing into the reward pool")
}

pub async fn withdraw(ledger: &FuelLedger, owner: &Address, amount: &str) -> Result<TokenAmount> {
    let amount = parse_amount(amount, ledger.token())?;
    ledger
        .withdraw(owner, amount)
        .await
        .context("withdrawing from the reward pool")
}

fn parse_asset_id(raw: &str) -> Result<AssetId> {
    let cleaned = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(cleaned).context("decoding token asset id")?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow!("token asset id must be 32 bytes (64 hex chars)"))?;
    Ok(AssetId::from(arr))
}
