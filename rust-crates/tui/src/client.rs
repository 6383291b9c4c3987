use crate::{
    claim::{
        ClaimStage,
        ClaimSubmitter,
        ClaimUpdate,
    },
    connector::{
        AccountEvent,
        AccountEvents,
        Capabilities,
        ConnectorStrategy,
        LocalConnector,
        WalletConnector,
        compose_share_link,
    },
    session::{
        ClaimRequest,
        Phase,
        Session,
        SessionError,
    },
    ui,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    ClaimedTotalsStore,
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
};
use ledger::{
    Address,
    ClaimReceipt,
    FailureKind,
    LedgerError,
    LocalLedger,
    RewardLedger,
    TokenAmount,
    TokenInfo,
};
use std::{
    path::PathBuf,
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    error,
    warn,
};

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://testnet.fuel.network";
pub const DEFAULT_DEVNET_RPC_URL: &str = "https://devnet.fuel.network";
pub const DEFAULT_LOCAL_PROFILE: &str = "player";
const MAX_ERRORS: usize = 50;
const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub enum NetworkTarget {
    Testnet { url: String },
    Devnet { url: String },
    Local,
}

impl NetworkTarget {
    pub fn deployment_env(&self) -> DeploymentEnv {
        match self {
            NetworkTarget::Testnet { .. } => DeploymentEnv::Test,
            NetworkTarget::Devnet { .. } => DeploymentEnv::Dev,
            NetworkTarget::Local => DeploymentEnv::Local,
        }
    }

    pub fn label(&self) -> String {
        match self {
            NetworkTarget::Testnet { url } | NetworkTarget::Devnet { url } => {
                format!("{} ({url})", self.deployment_env())
            }
            NetworkTarget::Local => "Local ledger".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub strategy: ConnectorStrategy,
    pub wallet: Option<String>,
    pub wallet_dir: Option<PathBuf>,
    pub deployments_root: PathBuf,
    pub confirm_delay: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    pub message: String,
}

impl Status {
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("contract configuration unavailable: {0}")]
    ConfigUnavailable(String),
    #[error("no wallet connected")]
    WalletNotConnected,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("no claim is waiting for approval")]
    NoPendingApproval,
}

impl ControllerError {
    fn status(&self, strategy: ConnectorStrategy) -> Status {
        match self {
            ControllerError::ConfigUnavailable(_) => Status::new(
                StatusKind::Error,
                "Contract configuration unavailable; on-chain actions are disabled",
            ),
            ControllerError::WalletNotConnected => {
                let prompt = if strategy.capabilities().contains(Capabilities::AUTO_CONNECT)
                {
                    "Waiting for the wallet to connect..."
                } else {
                    "Connect a wallet to play (press w)"
                };
                Status::new(StatusKind::Warning, prompt)
            }
            ControllerError::Session(SessionError::AlreadyActive) => {
                Status::new(StatusKind::Info, "A session is already running")
            }
            ControllerError::Session(SessionError::NotActive) => {
                Status::new(StatusKind::Warning, "Start a session first (press s)")
            }
            ControllerError::Session(SessionError::ClaimInFlight) => {
                Status::new(StatusKind::Info, "A claim is already in progress")
            }
            ControllerError::Session(SessionError::ZeroTaps) => {
                Status::new(StatusKind::Warning, "Tap at least once before claiming!")
            }
            ControllerError::NoPendingApproval => {
                Status::new(StatusKind::Info, "Nothing to approve")
            }
        }
    }
}

/// Claim waiting on the user's wallet approval.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalPrompt {
    pub taps: u64,
    pub reward: TokenAmount,
}

/// Immutable view of the controller handed to the renderer.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub network: String,
    pub strategy: ConnectorStrategy,
    pub account: Option<Address>,
    pub contract_id: Option<String>,
    pub config_error: Option<String>,
    pub token: Option<TokenInfo>,
    pub phase: Phase,
    pub tap_count: u64,
    pub elapsed: Duration,
    pub remaining: Duration,
    pub can_tap: bool,
    pub potential_reward: TokenAmount,
    pub claimed_total: TokenAmount,
    pub pool_balance: Option<TokenAmount>,
    pub claim_stage: Option<ClaimStage>,
    pub approval: Option<ApprovalPrompt>,
    pub last_receipt: Option<ClaimReceipt>,
    pub share_link: Option<String>,
    pub status: Status,
    pub errors: Vec<String>,
}

struct LedgerBinding<L> {
    submitter: ClaimSubmitter<L>,
    token: TokenInfo,
    contract_id: String,
    totals: ClaimedTotalsStore,
}

/// Owns the tap session and everything the screen shows. All state changes
/// go through its methods.
pub struct AppController<L> {
    strategy: ConnectorStrategy,
    network: String,
    session: Session,
    account: Option<Address>,
    binding: Option<LedgerBinding<L>>,
    config_error: Option<String>,
    claimed_total: TokenAmount,
    pool_balance: Option<TokenAmount>,
    claim_stage: Option<ClaimStage>,
    awaiting_approval: Option<ClaimRequest>,
    last_receipt: Option<ClaimReceipt>,
    share_link: Option<String>,
    status: Status,
    errors: Vec<String>,
    claim_tx: mpsc::UnboundedSender<ClaimUpdate>,
}

impl<L: RewardLedger + 'static> AppController<L> {
    pub fn new(
        strategy: ConnectorStrategy,
        network: impl Into<String>,
        claim_tx: mpsc::UnboundedSender<ClaimUpdate>,
    ) -> Self {
        Self {
            strategy,
            network: network.into(),
            session: Session::new(),
            account: None,
            binding: None,
            config_error: None,
            claimed_total: TokenAmount::ZERO,
            pool_balance: None,
            claim_stage: None,
            awaiting_approval: None,
            last_receipt: None,
            share_link: None,
            status: Status::new(StatusKind::Info, "Loading contract configuration..."),
            errors: Vec::new(),
            claim_tx,
        }
    }

    /// Attaches the ledger described by `record`. A descriptor that cannot
    /// drive a claim leaves the controller in the configuration-error state.
    pub fn bind_ledger(
        &mut self,
        ledger: Arc<L>,
        record: &DeploymentRecord,
        totals: ClaimedTotalsStore,
    ) {
        if let Err(e) = record.validate() {
            self.config_failed(format!("{e:#}"));
            return;
        }
        let token = ledger.token().clone();
        if token.decimals != record.token_decimals {
            warn!(
                ledger = token.decimals,
                descriptor = record.token_decimals,
                "token decimals differ between ledger and descriptor"
            );
        }
        self.binding = Some(LedgerBinding {
            submitter: ClaimSubmitter::new(ledger),
            token,
            contract_id: record.contract_id.clone(),
            totals,
        });
        self.config_error = None;
        self.reload_claimed_total();
        self.set_status(StatusKind::Info, "Contract loaded. Press s to start a session.");
    }

    pub fn config_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(error = %message, "contract configuration unavailable");
        self.binding = None;
        self.config_error = Some(message.clone());
        self.set_status(
            StatusKind::Error,
            "Contract configuration unavailable; on-chain actions are disabled",
        );
        self.push_errors(vec![format!("Configuration error: {message}")]);
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn account(&self) -> Option<&Address> {
        self.account.as_ref()
    }

    pub fn claimed_total(&self) -> TokenAmount {
        self.claimed_total
    }

    pub fn potential_reward(&self) -> TokenAmount {
        self.binding
            .as_ref()
            .and_then(|b| b.token.reward_for(self.session.tap_count()))
            .unwrap_or_default()
    }

    pub fn on_account_event(&mut self, event: AccountEvent, _now: Instant) {
        match event {
            AccountEvent::Connected(address) => {
                tracing::info!(address = %address, "account connected");
                let message = format!("Connected {}", address.short());
                self.account = Some(address);
                self.reload_claimed_total();
                self.set_status(StatusKind::Success, message);
            }
            AccountEvent::Disconnected => {
                self.account = None;
                self.claimed_total = TokenAmount::ZERO;
                if self.session.is_active() {
                    warn!(
                        taps = self.session.tap_count(),
                        "wallet disconnected during session; discarding taps"
                    );
                    self.session.reset();
                    self.awaiting_approval = None;
                    self.claim_stage = None;
                    self.set_status(StatusKind::Warning, "Wallet disconnected; session reset");
                } else {
                    self.set_status(StatusKind::Info, "Wallet disconnected");
                }
            }
        }
    }

    pub fn start_session(&mut self, now: Instant) -> Result<(), ControllerError> {
        self.ensure_ready()?;
        self.session
            .start(now)
            .map_err(|e| self.reject(ControllerError::from(e)))?;
        self.share_link = None;
        self.set_status(StatusKind::Info, "Session started! Tap away.");
        Ok(())
    }

    pub fn tap(&mut self, now: Instant) -> bool {
        let counted = self.session.tap(now);
        if !counted && self.session.phase() == Phase::TimedOut {
            self.announce_timeout();
        }
        counted
    }

    pub fn tick(&mut self, now: Instant) {
        if self.session.tick(now) {
            tracing::info!(taps = self.session.tap_count(), "session hit the time limit");
            self.announce_timeout();
        }
    }

    /// Stops tapping and asks the wallet holder to approve the claim.
    pub fn stop_and_claim(&mut self, now: Instant) -> Result<ClaimRequest, ControllerError> {
        self.ensure_ready()?;
        let request = self
            .session
            .begin_claim(now)
            .map_err(|e| self.reject(ControllerError::from(e)))?;
        let reward = self.potential_reward();
        self.awaiting_approval = Some(request);
        let message = format!(
            "Approve claim of {} in your wallet (y/n)",
            self.format_amount(reward)
        );
        self.set_status(StatusKind::Info, message);
        Ok(request)
    }

    pub fn approve_claim(&mut self) -> Result<(), ControllerError> {
        let request = self
            .awaiting_approval
            .take()
            .ok_or_else(|| self.reject(ControllerError::NoPendingApproval))?;
        let (Some(binding), Some(claimant)) = (self.binding.as_ref(), self.account.clone())
        else {
            self.session.reset();
            return Err(self.reject(ControllerError::WalletNotConnected));
        };
        tracing::info!(
            taps = request.tap_count.get(),
            address = %claimant,
            "submitting claim"
        );
        binding
            .submitter
            .spawn(claimant, request, self.claim_tx.clone());
        self.claim_stage = Some(ClaimStage::Submitting);
        self.set_status(StatusKind::Info, ClaimStage::Submitting.message());
        Ok(())
    }

    pub fn decline_claim(&mut self, now: Instant) -> Result<(), ControllerError> {
        let request = self
            .awaiting_approval
            .take()
            .ok_or_else(|| self.reject(ControllerError::NoPendingApproval))?;
        self.claim_failed(request.session_id, &LedgerError::UserRejected, now);
        Ok(())
    }

    pub fn on_claim_update(&mut self, update: ClaimUpdate, now: Instant) {
        match update {
            ClaimUpdate::Stage { session_id, stage } => {
                if session_id == self.session.session_id()
                    && self.session.phase() == Phase::ClaimPending
                {
                    self.claim_stage = Some(stage);
                    self.set_status(StatusKind::Info, stage.message());
                }
            }
            ClaimUpdate::Finished {
                session_id,
                claimant,
                result: Ok(receipt),
            } => self.claim_succeeded(session_id, &claimant, receipt),
            ClaimUpdate::Finished {
                session_id,
                result: Err(e),
                ..
            } => self.claim_failed(session_id, &e, now),
        }
    }

    pub async fn refresh_pool_balance(&mut self) {
        let Some(binding) = self.binding.as_ref() else {
            return;
        };
        match binding.submitter.ledger().pool_balance().await {
            Ok(balance) => self.pool_balance = Some(balance),
            Err(e) => {
                warn!(error = %e, "pool balance refresh failed");
                self.push_errors(vec![format!("Pool balance unavailable: {e}")]);
            }
        }
    }

    pub fn snapshot(&self, now: Instant) -> AppSnapshot {
        AppSnapshot {
            network: self.network.clone(),
            strategy: self.strategy,
            account: self.account.clone(),
            contract_id: self.binding.as_ref().map(|b| b.contract_id.clone()),
            config_error: self.config_error.clone(),
            token: self.binding.as_ref().map(|b| b.token.clone()),
            phase: self.session.phase(),
            tap_count: self.session.tap_count(),
            elapsed: self.session.elapsed(now),
            remaining: self.session.remaining(now),
            can_tap: self.session.can_tap(now),
            potential_reward: self.potential_reward(),
            claimed_total: self.claimed_total,
            pool_balance: self.pool_balance,
            claim_stage: self.claim_stage,
            approval: self.awaiting_approval.map(|request| ApprovalPrompt {
                taps: request.tap_count.get(),
                reward: self.potential_reward(),
            }),
            last_receipt: self.last_receipt.clone(),
            share_link: self.share_link.clone(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    fn claim_succeeded(&mut self, session_id: u64, claimant: &Address, receipt: ClaimReceipt) {
        self.credit_total(claimant, receipt.reward);
        let reward_text = self.format_amount(receipt.reward);
        if !self.session.claim_succeeded(session_id) {
            tracing::info!(session_id, reward = %reward_text, "earlier claim confirmed");
            // A newer claim owns the status line until it settles.
            if self.session.phase() != Phase::ClaimPending {
                self.set_status(
                    StatusKind::Info,
                    format!("Earlier claim confirmed: {reward_text}"),
                );
            }
            self.last_receipt = Some(receipt);
            return;
        }
        self.claim_stage = None;
        if self.strategy.capabilities().contains(Capabilities::COMPOSE_SHARE) {
            let symbol = self
                .binding
                .as_ref()
                .map(|b| b.token.symbol.clone())
                .unwrap_or_default();
            let amount = self
                .binding
                .as_ref()
                .map(|b| b.token.format(receipt.reward, 3))
                .unwrap_or_default();
            match compose_share_link(receipt.taps, &amount, &symbol) {
                Ok(link) => self.share_link = Some(link),
                Err(e) => self.push_errors(vec![format!("{e:#}")]),
            }
        }
        let tap_label = if receipt.taps == 1 { "tap" } else { "taps" };
        self.set_status(
            StatusKind::Success,
            format!("Claimed {reward_text} for {} {tap_label}!", receipt.taps),
        );
        self.last_receipt = Some(receipt);
    }

    fn claim_failed(&mut self, session_id: u64, err: &LedgerError, now: Instant) {
        if !self.session.claim_failed(session_id, now) {
            warn!(error = %err, session_id, "claim failed for a session that is gone");
            return;
        }
        self.claim_stage = None;
        let kind = match err.kind() {
            FailureKind::UserRejected => StatusKind::Warning,
            _ => StatusKind::Error,
        };
        if err.kind() != FailureKind::UserRejected {
            self.push_errors(vec![format!("Claim failed: {err}")]);
        }
        self.set_status(kind, err.user_message());
    }

    fn credit_total(&mut self, claimant: &Address, reward: TokenAmount) {
        let Some(binding) = self.binding.as_ref() else {
            return;
        };
        match binding.totals.add(claimant.as_str(), reward.base_units()) {
            Ok(total) => {
                if self.account.as_ref() == Some(claimant) {
                    self.claimed_total = TokenAmount::new(total);
                }
            }
            Err(e) => {
                error!(error = %e, "failed to persist claimed total");
                self.push_errors(vec![format!("Could not save claimed total: {e:#}")]);
            }
        }
    }

    fn reload_claimed_total(&mut self) {
        let (Some(binding), Some(account)) = (self.binding.as_ref(), self.account.as_ref())
        else {
            return;
        };
        match binding.totals.total_for(account.as_str()) {
            Ok(total) => self.claimed_total = TokenAmount::new(total),
            Err(e) => {
                error!(error = %e, "failed to read claimed total");
                self.push_errors(vec![format!("Could not load claimed total: {e:#}")]);
            }
        }
    }

    fn ensure_ready(&mut self) -> Result<(), ControllerError> {
        if let Some(message) = self.config_error.clone() {
            return Err(self.reject(ControllerError::ConfigUnavailable(message)));
        }
        if self.binding.is_none() {
            return Err(self.reject(ControllerError::ConfigUnavailable(
                "no contract loaded".to_string(),
            )));
        }
        if self.account.is_none() {
            return Err(self.reject(ControllerError::WalletNotConnected));
        }
        Ok(())
    }

    fn announce_timeout(&mut self) {
        self.set_status(
            StatusKind::Warning,
            "Maximum session time reached! Please claim.",
        );
    }

    fn reject(&mut self, err: ControllerError) -> ControllerError {
        self.status = err.status(self.strategy);
        err
    }

    fn format_amount(&self, amount: TokenAmount) -> String {
        match self.binding.as_ref() {
            Some(b) => format!("{} {}", b.token.format(amount, 3), b.token.symbol),
            None => amount.to_string(),
        }
    }

    fn set_status(&mut self, kind: StatusKind, message: impl Into<String>) {
        self.status = Status::new(kind, message);
    }

    pub fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let overflow = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..overflow);
        }
    }
}

pub fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{
        EnvFilter,
        fmt,
    };
    std::fs::create_dir_all("logs").wrap_err("Failed to create logs directory")?;
    let appender = tracing_appender::rolling::daily("logs", "tap-to-earn.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("Failed to initialise tracing: {e}"))?;
    Ok(guard)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    match config.network.clone() {
        NetworkTarget::Local => run_local(config).await,
        #[cfg(feature = "fuel")]
        NetworkTarget::Devnet { url } | NetworkTarget::Testnet { url } => {
            fuel_app::run_fuel(config, url).await
        }
        #[cfg(not(feature = "fuel"))]
        NetworkTarget::Devnet { .. } | NetworkTarget::Testnet { .. } => Err(eyre!(
            "This build has no Fuel support; rebuild with `--features fuel` or use --local"
        )),
    }
}

async fn run_local(config: AppConfig) -> Result<()> {
    let (claim_tx, claim_rx) = mpsc::unbounded_channel();
    let mut controller =
        AppController::<LocalLedger>::new(config.strategy, config.network.label(), claim_tx);
    let profile = config
        .wallet
        .clone()
        .unwrap_or_else(|| DEFAULT_LOCAL_PROFILE.to_string());
    let (mut connector, account_events) = LocalConnector::new(profile);

    if config.strategy.connects_before_config() {
        connector.connect()?;
    }
    match load_local_ledger(&config) {
        Ok((ledger, record, totals)) => controller.bind_ledger(ledger, &record, totals),
        Err(e) => controller.config_failed(format!("{e:#}")),
    }
    if config.strategy.capabilities().contains(Capabilities::AUTO_CONNECT)
        && !config.strategy.connects_before_config()
    {
        connector.connect()?;
    }
    controller.refresh_pool_balance().await;
    drive_terminal(controller, connector, account_events, claim_rx).await
}

fn load_local_ledger(
    config: &AppConfig,
) -> Result<(Arc<LocalLedger>, DeploymentRecord, ClaimedTotalsStore)> {
    let store =
        DeploymentStore::with_root(&config.deployments_root, config.network.deployment_env())
            .map_err(|e| eyre!(e))?;
    let record = store.load_required().map_err(|e| eyre!("{e:#}"))?;
    let path = record
        .ledger_path
        .clone()
        .unwrap_or_else(|| store.local_ledger_path());
    let ledger = LocalLedger::open(&path)
        .wrap_err_with(|| format!("Failed to open local ledger {}", path.display()))?
        .with_confirm_delay(config.confirm_delay);
    let ledger_id = ledger.contract_id()?;
    if ledger_id != record.contract_id {
        return Err(eyre!(
            "Deployment record points at {} but the ledger file holds {}",
            record.contract_id,
            ledger_id
        ));
    }
    Ok((Arc::new(ledger), record, store.totals()))
}

async fn drive_terminal<L, C>(
    controller: AppController<L>,
    connector: C,
    account_events: AccountEvents,
    claim_rx: mpsc::UnboundedReceiver<ClaimUpdate>,
) -> Result<()>
where
    L: RewardLedger + 'static,
    C: WalletConnector,
{
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();
    ui::terminal_enter(&mut ui_state)?;
    tracing::info!("UI ready");
    let res = run_loop(
        controller,
        connector,
        account_events,
        claim_rx,
        &mut ui_state,
        &mut input_events,
    )
    .await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<L, C>(
    mut controller: AppController<L>,
    mut connector: C,
    mut account_events: AccountEvents,
    mut claim_updates: mpsc::UnboundedReceiver<ClaimUpdate>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()>
where
    L: RewardLedger + 'static,
    C: WalletConnector,
{
    tracing::info!("Running app loop");
    let mut ticker = time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    ui::draw(ui_state, &controller.snapshot(Instant::now()))
        .wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                controller.tick(Instant::now());
            }
            Some(event) = account_events.recv() => {
                controller.on_account_event(event, Instant::now());
            }
            Some(update) = claim_updates.recv() => {
                let finished = matches!(update, ClaimUpdate::Finished { .. });
                controller.on_claim_update(update, Instant::now());
                if finished {
                    controller.refresh_pool_balance().await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                let now = Instant::now();
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Tap => {
                        controller.tap(now);
                    }
                    ui::UserEvent::StartSession => {
                        let _ = controller.start_session(now);
                    }
                    ui::UserEvent::StopAndClaim => {
                        let _ = controller.stop_and_claim(now);
                    }
                    ui::UserEvent::ApproveClaim => {
                        let _ = controller.approve_claim();
                    }
                    ui::UserEvent::DeclineClaim => {
                        let _ = controller.decline_claim(now);
                    }
                    ui::UserEvent::Connect => {
                        if let Err(e) = connector.connect() {
                            controller.push_errors(vec![format!("Wallet connection failed: {e:#}")]);
                        }
                    }
                    ui::UserEvent::Disconnect => connector.disconnect(),
                    ui::UserEvent::Redraw => {}
                }
            }
        }
        ui::draw(ui_state, &controller.snapshot(Instant::now()))
            .wrap_err("draw failed")?;
    }
    Ok(())
}

#[cfg(feature = "fuel")]
mod fuel_app {
    use super::*;
    use crate::{
        connector::UnlockedConnector,
        wallets,
    };
    use fuels::prelude::{
        AssetId,
        ContractId,
        Provider,
    };
    use ledger::{
        FUEL_TOKEN_DECIMALS,
        FuelLedger,
    };
    use std::str::FromStr;

    pub(super) async fn run_fuel(config: AppConfig, url: String) -> Result<()> {
        let provider = Provider::connect(&url)
            .await
            .wrap_err_with(|| format!("Failed to connect to {url}"))?;
        let name = config.wallet.clone().ok_or_else(|| {
            eyre!("Specify --wallet <name> to select a forc-wallet profile")
        })?;
        let dir = match &config.wallet_dir {
            Some(dir) => dir.clone(),
            None => wallets::default_wallet_dir()?,
        };
        let descriptor = wallets::find_wallet(&dir, &name)?;
        // Password prompt has to happen before raw mode.
        let wallet = wallets::unlock_wallet(&descriptor, &provider)?;
        let address = Address::new(hex::encode(*wallet.address()));

        let (claim_tx, claim_rx) = mpsc::unbounded_channel();
        let mut controller =
            AppController::<FuelLedger>::new(config.strategy, config.network.label(), claim_tx);
        let (mut connector, account_events) = UnlockedConnector::new(address);

        if config.strategy.connects_before_config() {
            connector.connect()?;
        }
        match load_fuel_ledger(&config, wallet).await {
            Ok((ledger, record, totals)) => controller.bind_ledger(ledger, &record, totals),
            Err(e) => controller.config_failed(format!("{e:#}")),
        }
        if config.strategy.capabilities().contains(Capabilities::AUTO_CONNECT)
            && !config.strategy.connects_before_config()
        {
            connector.connect()?;
        }
        controller.refresh_pool_balance().await;
        drive_terminal(controller, connector, account_events, claim_rx).await
    }

    async fn load_fuel_ledger(
        config: &AppConfig,
        wallet: fuels::prelude::Wallet,
    ) -> Result<(Arc<FuelLedger>, DeploymentRecord, ClaimedTotalsStore)> {
        let store = DeploymentStore::with_root(
            &config.deployments_root,
            config.network.deployment_env(),
        )
        .map_err(|e| eyre!(e))?;
        let record = store.load_required().map_err(|e| eyre!("{e:#}"))?;
        let contract_id = ContractId::from_str(&record.contract_id)
            .map_err(|e| eyre!("Invalid contract id {}: {e}", record.contract_id))?;
        let asset = record
            .token_asset_id
            .as_deref()
            .ok_or_else(|| eyre!("Deployment record has no token asset id"))?;
        let asset = AssetId::from_str(asset)
            .map_err(|e| eyre!("Invalid token asset id {asset}: {e}"))?;
        let symbol = record
            .token_symbol
            .clone()
            .unwrap_or_else(|| "TAP".to_string());
        let decimals = if record.token_decimals == 0 {
            FUEL_TOKEN_DECIMALS
        } else {
            record.token_decimals
        };
        let contract = generated_abi::separate_contract_instance(&contract_id, wallet);
        let ledger = FuelLedger::connect(contract, asset, symbol, decimals).await?;
        Ok((Arc::new(ledger), record, store.totals()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use deployments::{
        CLAIM_FUNCTION,
        InterfaceFunction,
    };
    use tempdir::TempDir;

    fn record(contract_id: &str, interface: Vec<InterfaceFunction>) -> DeploymentRecord {
        DeploymentRecord {
            deployed_at: "now".to_string(),
            contract_id: contract_id.to_string(),
            network_url: "file://ledger.json".to_string(),
            bytecode_hash: None,
            token_asset_id: None,
            token_symbol: Some("TAP".to_string()),
            token_decimals: 18,
            interface,
            ledger_path: None,
        }
    }

    fn controller(
        strategy: ConnectorStrategy,
    ) -> (
        AppController<LocalLedger>,
        mpsc::UnboundedReceiver<ClaimUpdate>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (AppController::new(strategy, "test", tx), rx)
    }

    #[test]
    fn start_session__is_blocked_without_configuration() {
        // given
        let (mut controller, _rx) = controller(ConnectorStrategy::Modal);
        controller.config_failed("deployments.json is empty");
        controller.on_account_event(
            AccountEvent::Connected(Address::new("0xaa")),
            Instant::now(),
        );

        // when
        let result = controller.start_session(Instant::now());

        // then
        assert!(matches!(result, Err(ControllerError::ConfigUnavailable(_))));
        assert_eq!(controller.status().kind, StatusKind::Error);
        assert!(!controller.session().is_active());
    }

    #[test]
    fn bind_ledger__rejects_descriptor_without_claim() {
        // given
        let dir = TempDir::new("controller").unwrap();
        let (mut controller, _rx) = controller(ConnectorStrategy::Modal);
        let ledger = LocalLedger::in_memory(
            Address::new("0x01"),
            TokenInfo::whole_token_per_tap("TAP", 18),
        );

        // when
        controller.bind_ledger(
            Arc::new(ledger),
            &record("0x01", vec![InterfaceFunction::view("owner", &[])]),
            ClaimedTotalsStore::new(dir.path()),
        );

        // then
        let snapshot = controller.snapshot(Instant::now());
        assert!(snapshot.config_error.unwrap().contains(CLAIM_FUNCTION));
        assert!(snapshot.contract_id.is_none());
    }

    #[test]
    fn start_session__prompts_for_wallet_in_modal_mode() {
        // given
        let dir = TempDir::new("controller").unwrap();
        let (mut controller, _rx) = controller(ConnectorStrategy::Modal);
        let ledger = LocalLedger::in_memory(
            Address::new("0x01"),
            TokenInfo::whole_token_per_tap("TAP", 18),
        );
        controller.bind_ledger(
            Arc::new(ledger),
            &record("0x01", vec![InterfaceFunction::call(CLAIM_FUNCTION, &["u64"])]),
            ClaimedTotalsStore::new(dir.path()),
        );

        // when
        let result = controller.start_session(Instant::now());

        // then
        assert!(matches!(result, Err(ControllerError::WalletNotConnected)));
        assert_eq!(controller.status().kind, StatusKind::Warning);
        assert!(controller.status().message.contains("press w"));
    }

    #[test]
    fn push_errors__keeps_only_the_most_recent() {
        let (mut controller, _rx) = controller(ConnectorStrategy::Modal);

        controller.push_errors((0..60).map(|i| i.to_string()).collect());

        let errors = controller.snapshot(Instant::now()).errors;
        assert_eq!(errors.len(), MAX_ERRORS);
        assert_eq!(errors.first().map(String::as_str), Some("10"));
    }

    #[test]
    fn label__names_the_network() {
        let target = NetworkTarget::Devnet {
            url: DEFAULT_DEVNET_RPC_URL.to_string(),
        };

        assert_eq!(target.deployment_env(), DeploymentEnv::Dev);
        assert!(target.label().starts_with("Devnet"));
        assert_eq!(NetworkTarget::Local.deployment_env(), DeploymentEnv::Local);
    }
}
