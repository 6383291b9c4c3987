use anyhow::{
    Context,
    Result,
    ensure,
};
use clap::{
    Parser,
    Subcommand,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    process::Command,
};

const SWAY_PROJECT: &str = "sway-projects/tap-to-earn";
const FUEL_FEATURES: &str = "tui/fuel,deploy-cli/fuel";

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Tap-to-earn helper tasks (build Sway, regen ABI, clippy, tests)",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the reward contract (release) to refresh its binary and ABI
    BuildSway,
    /// Rebuild the contract and recompile generated_abi with Fuel bindings
    Abi {
        /// Skip rebuilding the Sway contract first
        #[arg(long)]
        skip_sway: bool,
    },
    /// Run clippy for the entire workspace with warnings-as-errors
    Clippy {
        /// Include the Fuel-backed code paths (needs a built contract ABI)
        #[arg(long)]
        fuel: bool,
    },
    /// Run the workspace tests, integration suite included
    Test {
        /// Also build the contract and test the Fuel-backed code paths
        #[arg(long)]
        fuel: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = repo_root()?;

    match cli.command {
        Commands::BuildSway => build_sway(&root)?,
        Commands::Abi { skip_sway } => {
            if !skip_sway {
                build_sway(&root)?;
            }
            build_generated_abi(&root)?;
        }
        Commands::Clippy { fuel } => run_clippy(&root, fuel)?,
        Commands::Test { fuel } => {
            if fuel {
                build_sway(&root)?;
            }
            run_tests(&root, fuel)?;
        }
    }

    Ok(())
}

fn repo_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask has no parent directory")
}

fn build_sway(root: &Path) -> Result<()> {
    let path = root.join(SWAY_PROJECT);
    ensure!(path.exists(), "missing Sway project at {}", path.display());
    let mut cmd = Command::new("forc");
    cmd.arg("build").arg("--release").current_dir(&path);
    run_command(cmd, &format!("forc build ({SWAY_PROJECT})"))
}

fn build_generated_abi(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("check")
        .arg("-p")
        .arg("generated_abi")
        .arg("--features")
        .arg("fuel")
        .arg("--quiet")
        .current_dir(root);
    run_command(cmd, "cargo check -p generated_abi --features fuel")
}

fn run_clippy(root: &Path, fuel: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("clippy").arg("--workspace").arg("--all-targets");
    if fuel {
        cmd.arg("--features").arg(FUEL_FEATURES);
    }
    cmd.arg("--").arg("-D").arg("warnings").current_dir(root);
    run_command(cmd, "cargo clippy")
}

fn run_tests(root: &Path, fuel: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("test").arg("--workspace");
    if fuel {
        cmd.arg("--features").arg(FUEL_FEATURES);
    }
    cmd.current_dir(root);
    run_command(cmd, "cargo test --workspace")
}

fn run_command(mut cmd: Command, label: &str) -> Result<()> {
    println!("Running: {}", label);
    let status = cmd
        .status()
        .with_context(|| format!("failed to run {label}"))?;
    ensure!(status.success(), "{label} failed with status {status}");
    Ok(())
}
