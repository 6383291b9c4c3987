#[cfg(feature = "fuel")]
mod fuel;
mod local;

use anyhow::{
    Context,
    Result,
};
use clap::{
    ArgGroup,
    Parser,
};
use deployments::{
    DEPLOYMENTS_ROOT,
    DeploymentEnv,
    DeploymentStore,
};
use ledger::{
    Address,
    RewardLedger,
    TokenAmount,
    TokenInfo,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_TESTNET_RPC_URL: &str = "https://testnet.fuel.network";
const DEFAULT_DEVNET_RPC_URL: &str = "https://devnet.fuel.network";
const DEFAULT_TOKEN_SYMBOL: &str = "TAP";

#[derive(Parser, Debug)]
#[command(
    name = "tap-to-earn-deploy",
    about = "Deploy the tap-to-earn reward contract or perform owner utilities (deposit, withdraw, balance)",
    version,
    group(
        ArgGroup::new("network")
            .args(["devnet", "testnet", "local"])
            .required(true)
    )
)]
struct Args {
    /// Deploy to Fuel devnet
    #[arg(long)]
    devnet: bool,

    /// Deploy to Fuel testnet
    #[arg(long)]
    testnet: bool,

    /// Use the file-backed local ledger
    #[arg(long)]
    local: bool,

    /// Override RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Owner profile: forc-wallet name on Fuel, any name locally
    #[arg(long)]
    wallet: String,

    /// Override forc-wallet directory (defaults to ~/.fuel/wallets)
    #[arg(long)]
    wallet_dir: Option<String>,

    /// Which action to perform (defaults to deploy)
    #[arg(short, long, value_enum, default_value = "deploy")]
    action: Action,

    /// Amount in whole tokens (decimals allowed). Initial funding when deploying
    #[arg(long)]
    amount: Option<String>,

    /// Display symbol of the reward token
    #[arg(long, default_value = DEFAULT_TOKEN_SYMBOL)]
    symbol: String,

    /// Asset id of the reward token (Fuel only, defaults to the chain base asset)
    #[arg(long)]
    token_asset_id: Option<String>,

    /// Where deployment records live
    #[arg(long, default_value = DEPLOYMENTS_ROOT)]
    deployments_root: PathBuf,

    /// Replace an existing local ledger when deploying
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Action {
    Deploy,
    Deposit,
    Withdraw,
    Balance,
}

impl Args {
    fn env(&self) -> DeploymentEnv {
        if self.devnet {
            DeploymentEnv::Dev
        } else if self.testnet {
            DeploymentEnv::Test
        } else {
            DeploymentEnv::Local
        }
    }

    fn required_amount(&self) -> Result<&str> {
        self.amount.as_deref().ok_or_else(|| {
            anyhow::anyhow!("--amount <tokens> is required for the {:?} action", self.action)
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    deployments::ensure_structure(&args.deployments_root)
        .context("initializing deployment directories")?;
    let store = DeploymentStore::with_root(&args.deployments_root, args.env())
        .context("opening deployment store")?;

    match args.env() {
        DeploymentEnv::Local => {
            if args.rpc_url.is_some() || args.token_asset_id.is_some() {
                anyhow::bail!("--rpc-url and --token-asset-id have no effect with --local");
            }
            run_local(&args, &store).await
        }
        DeploymentEnv::Dev => run_fuel(&args, &store, DEFAULT_DEVNET_RPC_URL).await,
        DeploymentEnv::Test => run_fuel(&args, &store, DEFAULT_TESTNET_RPC_URL).await,
    }
}

async fn run_local(args: &Args, store: &DeploymentStore) -> Result<()> {
    let owner = Address::for_profile(&args.wallet);
    match args.action {
        Action::Deploy => {
            let record = local::deploy(store, &owner, &args.symbol, args.force).await?;
            println!(
                "Local ledger deployed: {} (owner {})",
                record.contract_id, owner
            );
            if let Some(amount) = args.amount.as_deref() {
                let balance = local::deposit(store, &owner, amount).await?;
                let token = local::open_ledger(store)?.token().clone();
                print_pool(&token, balance);
            }
            println!("Deployment metadata written to {}", store.path().display());
        }
        Action::Deposit => {
            let balance = local::deposit(store, &owner, args.required_amount()?).await?;
            print_pool(local::open_ledger(store)?.token(), balance);
        }
        Action::Withdraw => {
            let balance = local::withdraw(store, &owner, args.required_amount()?).await?;
            print_pool(local::open_ledger(store)?.token(), balance);
        }
        Action::Balance => {
            let state = local::balance(store)?;
            println!("Contract {}", state.contract_id);
            println!("  Owner: {}", state.owner);
            print_pool(&state.token, state.balance);
            println!(
                "  Paid out: {} {} over {} claims",
                state.token.format(state.total_paid, 3),
                state.token.symbol,
                state.claims
            );
            println!(
                "  Wallet '{}' holds {} {}",
                args.wallet,
                state.token.format(state.holding_of(&owner), 3),
                state.token.symbol
            );
        }
    }
    Ok(())
}

#[cfg(feature = "fuel")]
async fn run_fuel(args: &Args, store: &DeploymentStore, default_url: &str) -> Result<()> {
    use ledger::LedgerAdmin;

    let rpc_url = args.rpc_url.as_deref().unwrap_or(default_url);
    let target = fuel::connect(rpc_url, &args.wallet, args.wallet_dir.as_deref()).await?;
    match args.action {
        Action::Deploy => {
            let (record, ledger) = fuel::deploy(
                &target,
                store,
                &args.symbol,
                args.token_asset_id.as_deref(),
            )
            .await?;
            println!(
                "Reward contract deployed: {} (owner {})",
                record.contract_id, target.owner
            );
            if let Some(amount) = args.amount.as_deref() {
                let balance = fuel::deposit(&ledger, &target.owner, amount).await?;
                print_pool(ledger.token(), balance);
            }
            println!("Deployment metadata written to {}", store.path().display());
        }
        Action::Deposit => {
            let ledger = fuel::open_ledger(&target, store).await?;
            let balance =
                fuel::deposit(&ledger, &target.owner, args.required_amount()?).await?;
            print_pool(ledger.token(), balance);
        }
        Action::Withdraw => {
            let ledger = fuel::open_ledger(&target, store).await?;
            let balance =
                fuel::withdraw(&ledger, &target.owner, args.required_amount()?).await?;
            print_pool(ledger.token(), balance);
        }
        Action::Balance => {
            let ledger = fuel::open_ledger(&target, store).await?;
            let owner = ledger.owner().await.context("reading contract owner")?;
            let balance = ledger
                .pool_balance()
                .await
                .context("reading pool balance")?;
            println!("Owner: {owner}");
            print_pool(ledger.token(), balance);
        }
    }
    Ok(())
}

#[cfg(not(feature = "fuel"))]
async fn run_fuel(_args: &Args, _store: &DeploymentStore, _default_url: &str) -> Result<()> {
    anyhow::bail!("Fuel networks need a build with the `fuel` feature enabled")
}

fn print_pool(token: &TokenInfo, balance: TokenAmount) {
    println!(
        "  Pool balance: {} {}",
        token.format(balance, 3),
        token.symbol
    );
}
