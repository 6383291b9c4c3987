use color_eyre::eyre::{
    Result,
    eyre,
};
use deployments::DEPLOYMENTS_ROOT;
use std::{
    path::PathBuf,
    time::Duration,
};
use tap_to_earn::{
    client,
    connector::ConnectorStrategy,
    wallets,
};

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: tap-to-earn (--local | --devnet | --testnet) [--rpc-url <url>]\n\
         [--wallet <name>] [--wallet-dir <path>] [--connector <strategy>]\n\
         [--deployments-root <path>] [--confirm-delay-ms <ms>]\n\
         \n\
         Flags:\n\
           --local                   Play against the file-backed local ledger\n\
           --devnet                  Connect to Fuel devnet (default RPC {})\n\
           --testnet                 Connect to Fuel testnet (default RPC {})\n\
           --rpc-url <url>           Override the RPC URL for the selected Fuel network\n\
           --wallet <name>           Wallet profile (forc-wallet name on Fuel, any name locally)\n\
           --wallet-dir <path>       Override forc-wallet directory (defaults to ~/.fuel/wallets)\n\
           --connector <strategy>    modal (default), miniapp or miniapp-eager\n\
           --deployments-root <path> Where deployment records live (defaults to {})\n\
           --confirm-delay-ms <ms>   Simulated confirmation latency for the local ledger",
        client::DEFAULT_DEVNET_RPC_URL,
        client::DEFAULT_TESTNET_RPC_URL,
        DEPLOYMENTS_ROOT,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<client::AppConfig> {
    parse_args(std::env::args().skip(1))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<client::AppConfig> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Devnet,
        Testnet,
        Local,
    }

    fn set_once<T>(slot: &mut Option<T>, value: T, flag: &str) -> Result<()> {
        if slot.is_some() {
            return Err(eyre!("{flag} may only be specified once"));
        }
        *slot = Some(value);
        Ok(())
    }

    let mut args = args.into_iter();
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;
    let mut strategy: Option<ConnectorStrategy> = None;
    let mut deployments_root: Option<String> = None;
    let mut confirm_delay: Option<Duration> = None;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| eyre!("{flag} requires an argument"))
        };
        match arg.as_str() {
            "--devnet" | "--testnet" | "--local" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --devnet/--testnet/--local"
                    ));
                }
                network_flag = Some(match arg.as_str() {
                    "--devnet" => NetworkFlag::Devnet,
                    "--testnet" => NetworkFlag::Testnet,
                    _ => NetworkFlag::Local,
                });
            }
            "--rpc-url" => {
                let url = value("--rpc-url")?;
                match network_flag {
                    None => {
                        return Err(eyre!(
                            "--rpc-url must follow a network flag (--devnet/--testnet)"
                        ));
                    }
                    Some(NetworkFlag::Local) => {
                        return Err(eyre!("--rpc-url has no effect with --local"));
                    }
                    Some(_) => set_once(&mut custom_url, url, "--rpc-url")?,
                }
            }
            "--wallet-dir" => {
                let dir = value("--wallet-dir")?;
                set_once(&mut wallet_dir, dir, "--wallet-dir")?;
            }
            "--wallet" => {
                let name = value("--wallet")?;
                set_once(&mut wallet_name, name, "--wallet")?;
            }
            "--connector" => {
                let parsed = value("--connector")?
                    .parse::<ConnectorStrategy>()
                    .map_err(|e| eyre!(e))?;
                set_once(&mut strategy, parsed, "--connector")?;
            }
            "--deployments-root" => {
                let root = value("--deployments-root")?;
                set_once(&mut deployments_root, root, "--deployments-root")?;
            }
            "--confirm-delay-ms" => {
                let raw = value("--confirm-delay-ms")?;
                let ms: u64 = raw
                    .parse()
                    .map_err(|_| eyre!("--confirm-delay-ms expects milliseconds, got {raw}"))?;
                set_once(
                    &mut confirm_delay,
                    Duration::from_millis(ms),
                    "--confirm-delay-ms",
                )?;
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = match network_flag {
        None => {
            return Err(eyre!(
                "Select a network with --local, --devnet, or --testnet"
            ));
        }
        Some(NetworkFlag::Devnet) => client::NetworkTarget::Devnet {
            url: custom_url.unwrap_or_else(|| client::DEFAULT_DEVNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Testnet) => client::NetworkTarget::Testnet {
            url: custom_url
                .unwrap_or_else(|| client::DEFAULT_TESTNET_RPC_URL.to_string()),
        },
        Some(NetworkFlag::Local) => client::NetworkTarget::Local,
    };

    Ok(client::AppConfig {
        network,
        strategy: strategy.unwrap_or_default(),
        wallet: wallet_name,
        wallet_dir: wallet_dir.as_deref().map(wallets::expand_path),
        deployments_root: deployments_root
            .as_deref()
            .map(wallets::expand_path)
            .unwrap_or_else(|| PathBuf::from(DEPLOYMENTS_ROOT)),
        confirm_delay: confirm_delay.unwrap_or_default(),
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let app_config = parse_cli_args()?;
    let _log_guard = client::init_tracing()?;
    tracing::info!(
        network = %app_config.network.label(),
        connector = %app_config.strategy,
        "starting tap-to-earn client"
    );
    client::run_app(app_config).await
}
