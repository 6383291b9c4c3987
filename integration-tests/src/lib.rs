// Shared fixtures for end-to-end tests against a file-backed ledger.
use deployments::{
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
    NewDeployment,
    record_deployment,
};
use ledger::{
    Address,
    ClaimReceipt,
    LedgerAdmin,
    LedgerError,
    LocalLedger,
    RewardLedger,
    TokenAmount,
    TokenInfo,
};
use std::{
    sync::Arc,
    time::Instant,
};
use tap_to_earn::{
    AppController,
    ConnectorStrategy,
    claim::ClaimUpdate,
    connector::AccountEvent,
};
use tempdir::TempDir;
use tokio::sync::mpsc;

pub const TOKEN_DECIMALS: u32 = 18;
pub const DEFAULT_POOL_TOKENS: u64 = 1_000;

pub struct TestContext {
    pub owner: Address,
    pub player: Address,
    ledger: Arc<LocalLedger>,
    store: DeploymentStore,
    record: DeploymentRecord,
    _dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_pool(DEFAULT_POOL_TOKENS).await
    }

    /// Deploys a fresh ledger and funds it with `tokens` whole tokens.
    pub async fn with_pool(tokens: u64) -> Self {
        let dir = TempDir::new("tap-to-earn").expect("tempdir");
        let store =
            DeploymentStore::with_root(dir.path(), DeploymentEnv::Local).expect("store");
        let owner = Address::for_profile("owner");
        let player = Address::for_profile("player");
        let token = TokenInfo::whole_token_per_tap("TAP", TOKEN_DECIMALS);
        let ledger = LocalLedger::create(store.local_ledger_path(), owner.clone(), token)
            .expect("create ledger");
        if tokens > 0 {
            ledger
                .deposit(&owner, ledger.token().unit_reward.checked_mul(tokens).expect("amount"))
                .await
                .expect("fund pool");
        }
        let record = record_deployment(
            &store,
            NewDeployment {
                contract_id: ledger.contract_id().expect("contract id"),
                network_url: "file://ledger.json".to_string(),
                bytecode_hash: None,
                token_asset_id: None,
                token_symbol: Some("TAP".to_string()),
                token_decimals: TOKEN_DECIMALS,
                interface: generated_abi::interface(),
                ledger_path: Some(store.local_ledger_path()),
            },
        )
        .expect("record deployment");
        Self {
            owner,
            player,
            ledger: Arc::new(ledger),
            store,
            record,
            _dir: dir,
        }
    }

    pub fn ledger(&self) -> &LocalLedger {
        &self.ledger
    }

    /// A second handle on the same ledger file, as another process would see it.
    pub fn reopen(&self) -> LocalLedger {
        LocalLedger::open(self.store.local_ledger_path()).expect("reopen ledger")
    }

    pub fn store(&self) -> &DeploymentStore {
        &self.store
    }

    pub fn tokens(&self, whole: u64) -> TokenAmount {
        self.ledger
            .token()
            .unit_reward
            .checked_mul(whole)
            .expect("token amount")
    }

    pub async fn pool_balance(&self) -> TokenAmount {
        self.ledger.pool_balance().await.expect("pool balance")
    }

    pub fn holding_of(&self, address: &Address) -> TokenAmount {
        self.ledger.holding_of(address).expect("holding")
    }

    pub async fn claim(&self, claimant: &Address, taps: u64) -> Result<ClaimReceipt, LedgerError> {
        let pending = self.ledger.submit_claim(claimant, taps).await?;
        self.ledger.confirm(pending).await
    }

    /// Controller bound to this ledger with `player` already connected.
    pub fn controller(&self, strategy: ConnectorStrategy) -> ControllerHarness {
        let (claim_tx, claim_rx) = mpsc::unbounded_channel();
        let mut controller = AppController::new(strategy, "Local", claim_tx);
        controller.bind_ledger(self.ledger.clone(), &self.record, self.store.totals());
        controller.on_account_event(AccountEvent::Connected(self.player.clone()), Instant::now());
        ControllerHarness {
            controller,
            claim_rx,
        }
    }
}

pub struct ControllerHarness {
    pub controller: AppController<LocalLedger>,
    pub claim_rx: mpsc::UnboundedReceiver<ClaimUpdate>,
}

impl ControllerHarness {
    pub fn tap_times(&mut self, taps: u64, now: Instant) -> u64 {
        (0..taps).filter(|_| self.controller.tap(now)).count() as u64
    }

    /// Feeds claim updates into the controller until the claim settles.
    pub async fn settle_claim(&mut self, now: Instant) -> Result<ClaimReceipt, LedgerError> {
        loop {
            let update = self.claim_rx.recv().await.expect("claim channel closed");
            let outcome = match &update {
                ClaimUpdate::Finished { result, .. } => Some(result.clone()),
                ClaimUpdate::Stage { .. } => None,
            };
            self.controller.on_claim_update(update, now);
            if let Some(result) = outcome {
                return result;
            }
        }
    }
}
