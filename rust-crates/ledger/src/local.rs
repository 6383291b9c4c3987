//! In-process reward ledger with the same all-or-nothing claim rules as the
//! on-chain contract. Optionally backed by a JSON file so the owner CLI and
//! the game client can share one ledger.
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
        REVERT_NO_TAPS,
        REVERT_NOT_ENOUGH_TOKENS,
        REVERT_NOT_OWNER,
        REVERT_REWARD_OVERFLOW,
        REVERT_WITHDRAW_FAILED,
    },
};
use fs2::FileExt;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    fs::{
        self,
        File,
        OpenOptions,
    },
    io::Write,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
    time::Duration,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub contract_id: String,
    pub owner: Address,
    pub token: TokenInfo,
    pub balance: TokenAmount,
    #[serde(default)]
    pub holdings: BTreeMap<Address, TokenAmount>,
    #[serde(default)]
    pub claims: u64,
    #[serde(default)]
    pub total_paid: TokenAmount,
    #[serde(default)]
    pub tx_count: u64,
}

impl LedgerState {
    pub fn new(owner: Address, token: TokenInfo) -> Self {
        Self {
            contract_id: random_id(),
            owner,
            token,
            balance: TokenAmount::ZERO,
            holdings: BTreeMap::new(),
            claims: 0,
            total_paid: TokenAmount::ZERO,
            tx_count: 0,
        }
    }

    pub fn holding_of(&self, address: &Address) -> TokenAmount {
        self.holdings.get(address).copied().unwrap_or_default()
    }

    pub fn deposit(
        &mut self,
        caller: &Address,
        amount: TokenAmount,
    ) -> LedgerResult<TokenAmount> {
        self.require_owner(caller)?;
        if amount.is_zero() {
            return Err(revert(REVERT_DEPOSIT_FAILED));
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| revert(REVERT_DEPOSIT_FAILED))?;
        self.tx_count += 1;
        Ok(self.balance)
    }

    pub fn withdraw(
        &mut self,
        caller: &Address,
        amount: TokenAmount,
    ) -> LedgerResult<TokenAmount> {
        self.require_owner(caller)?;
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| revert(REVERT_WITHDRAW_FAILED))?;
        self.credit(caller, amount);
        self.tx_count += 1;
        Ok(self.balance)
    }

    /// Checks that a claim of `taps` would succeed against the current pool.
    pub fn check_claim(&self, taps: u64) -> LedgerResult<TokenAmount> {
        if taps == 0 {
            return Err(revert(REVERT_NO_TAPS));
        }
        let reward = self
            .token
            .reward_for(taps)
            .ok_or_else(|| revert(REVERT_REWARD_OVERFLOW))?;
        if reward > self.balance {
            return Err(revert(REVERT_NOT_ENOUGH_TOKENS));
        }
        Ok(reward)
    }

    /// Pays `taps × unit_reward` to `claimant` in full, or changes nothing.
    pub fn claim(&mut self, claimant: &Address, taps: u64) -> LedgerResult<TokenAmount> {
        let reward = self.check_claim(taps)?;
        self.balance = self
            .balance
            .checked_sub(reward)
            .ok_or_else(|| revert(REVERT_NOT_ENOUGH_TOKENS))?;
        self.credit(claimant, reward);
        self.claims += 1;
        self.total_paid = self.total_paid.saturating_add(reward);
        Ok(reward)
    }

    fn next_tx_id(&mut self) -> String {
        self.tx_count += 1;
        random_id()
    }

    fn credit(&mut self, address: &Address, amount: TokenAmount) {
        let entry = self.holdings.entry(address.clone()).or_default();
        *entry = entry.saturating_add(amount);
    }

    fn require_owner(&self, caller: &Address) -> LedgerResult<()> {
        if caller != &self.owner {
            return Err(revert(REVERT_NOT_OWNER));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalPendingClaim {
    pub tx_id: String,
    pub claimant: Address,
    pub taps: u64,
}

#[derive(Clone, Debug)]
pub struct LocalLedger {
    state: Arc<Mutex<LedgerState>>,
    token: TokenInfo,
    path: Option<PathBuf>,
    confirm_delay: Duration,
}

impl LocalLedger {
    pub fn in_memory(owner: Address, token: TokenInfo) -> Self {
        Self::from_state(LedgerState::new(owner, token), None)
    }

    /// Creates a new file-backed ledger. Refuses to overwrite an existing one.
    pub fn create(
        path: impl AsRef<Path>,
        owner: Address,
        token: TokenInfo,
    ) -> LedgerResult<Self> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let _file_lock = lock_file(path)?;
        if path.exists() {
            return Err(LedgerError::Storage(format!(
                "ledger already exists at {}",
                path.display()
            )));
        }
        let state = LedgerState::new(owner, token);
        write_state(path, &state)?;
        tracing::info!(
            "created local ledger {} at {}",
            state.contract_id,
            path.display()
        );
        Ok(Self::from_state(state, Some(path.to_path_buf())))
    }

    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let state = read_state(path)?;
        Ok(Self::from_state(state, Some(path.to_path_buf())))
    }

    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = delay;
        self
    }

    fn from_state(state: LedgerState, path: Option<PathBuf>) -> Self {
        Self {
            token: state.token.clone(),
            state: Arc::new(Mutex::new(state)),
            path,
            confirm_delay: Duration::ZERO,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn snapshot(&self) -> LedgerResult<LedgerState> {
        self.transact(|state| Ok(state.clone()))
    }

    pub fn contract_id(&self) -> LedgerResult<String> {
        Ok(self.snapshot()?.contract_id)
    }

    pub fn holding_of(&self, address: &Address) -> LedgerResult<TokenAmount> {
        Ok(self.snapshot()?.holding_of(address))
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Storage("ledger state lock poisoned".into()))
    }

    // Reload, apply to a copy, persist, then publish. A failed op leaves both
    // the file and the in-memory state untouched. File-backed ledgers hold the
    // sidecar lock for the whole sequence so other handles and processes wait.
    fn transact<T>(
        &self,
        op: impl FnOnce(&mut LedgerState) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let mut guard = self.lock()?;
        let _file_lock = match &self.path {
            Some(path) => {
                let file_lock = lock_file(path)?;
                *guard = read_state(path)?;
                Some(file_lock)
            }
            None => None,
        };
        let mut next = guard.clone();
        let out = op(&mut next)?;
        if next != *guard {
            if let Some(path) = &self.path {
                write_state(path, &next)?;
            }
            *guard = next;
        }
        Ok(out)
    }
}

impl RewardLedger for LocalLedger {
    type Pending = LocalPendingClaim;

    fn token(&self) -> &TokenInfo {
        &self.token
    }

    async fn pool_balance(&self) -> LedgerResult<TokenAmount> {
        self.transact(|state| Ok(state.balance))
    }

    async fn submit_claim(
        &self,
        claimant: &Address,
        taps: u64,
    ) -> LedgerResult<LocalPendingClaim> {
        let tx_id = self.transact(|state| {
            state.check_claim(taps)?;
            Ok(state.next_tx_id())
        })?;
        tracing::debug!("submitted claim {tx_id} for {taps} taps by {claimant}");
        Ok(LocalPendingClaim {
            tx_id,
            claimant: claimant.clone(),
            taps,
        })
    }

    async fn confirm(&self, pending: LocalPendingClaim) -> LedgerResult<ClaimReceipt> {
        if !self.confirm_delay.is_zero() {
            tokio::time::sleep(self.confirm_delay).await;
        }
        let reward = self.transact(|state| state.claim(&pending.claimant, pending.taps))?;
        tracing::info!(
            "claim {} paid {} to {}",
            pending.tx_id,
            reward,
            pending.claimant
        );
        Ok(ClaimReceipt {
            tx_id: pending.tx_id,
            taps: pending.taps,
            reward,
        })
    }
}

impl LedgerAdmin for LocalLedger {
    async fn owner(&self) -> LedgerResult<Address> {
        self.transact(|state| Ok(state.owner.clone()))
    }

    async fn deposit(
        &self,
        caller: &Address,
        amount: TokenAmount,
    ) -> LedgerResult<TokenAmount> {
        let balance = self.transact(|state| state.deposit(caller, amount))?;
        tracing::info!("deposited {amount}, pool now {balance}");
        Ok(balance)
    }

    async fn withdraw(
        &self,
        caller: &Address,
        amount: TokenAmount,
    ) -> LedgerResult<TokenAmount> {
        let balance = self.transact(|state| state.withdraw(caller, amount))?;
        tracing::info!("withdrew {amount}, pool now {balance}");
        Ok(balance)
    }
}

fn revert(reason: &str) -> LedgerError {
    LedgerError::Reverted(reason.to_string())
}

fn random_id() -> String {
    let bytes: [u8; 32] = rand::random();
    format!("0x{}", hex::encode(bytes))
}

fn read_state(path: &Path) -> LedgerResult<LedgerState> {
    let data = fs::read(path).map_err(|e| {
        LedgerError::Storage(format!("failed to read ledger {}: {e}", path.display()))
    })?;
    serde_json::from_slice(&data).map_err(|e| {
        LedgerError::Storage(format!("failed to parse ledger {}: {e}", path.display()))
    })
}

fn ensure_parent(path: &Path) -> LedgerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            LedgerError::Storage(format!(
                "failed to create directory {}: {e}",
                parent.display()
            ))
        })?;
    }
    Ok(())
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

/// Exclusive advisory lock on `<ledger>.lock`, released when the handle drops.
/// The sidecar keeps its inode across the rename in `write_state`.
fn lock_file(path: &Path) -> LedgerResult<File> {
    let lock_path = lock_path(path);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| {
            LedgerError::Storage(format!("failed to open {}: {e}", lock_path.display()))
        })?;
    FileExt::lock_exclusive(&file).map_err(|e| {
        LedgerError::Storage(format!("failed to lock {}: {e}", lock_path.display()))
    })?;
    Ok(file)
}

// Readers only ever see the old file or the new one, never a partial write.
fn write_state(path: &Path, state: &LedgerState) -> LedgerResult<()> {
    ensure_parent(path)?;
    let storage = |e: std::io::Error| {
        LedgerError::Storage(format!("failed to write ledger {}: {e}", path.display()))
    };
    let json = serde_json::to_vec_pretty(state)
        .map_err(|e| LedgerError::Storage(format!("failed to serialize ledger: {e}")))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(storage)?;
    tmp.write_all(&json).map_err(storage)?;
    tmp.as_file().sync_all().map_err(storage)?;
    tmp.persist(path).map_err(|e| storage(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::FailureKind;
    use proptest::prelude::*;
    use tempdir::TempDir;

    fn owner() -> Address {
        Address::new("0x0000000000000000000000000000000000000000000000000000000000000001")
    }

    fn player() -> Address {
        Address::new("0x00000000000000000000000000000000000000000000000000000000000000aa")
    }

    fn token() -> TokenInfo {
        TokenInfo::whole_token_per_tap("TAP", 18)
    }

    fn tokens(n: u128) -> TokenAmount {
        TokenAmount::new(n * 10u128.pow(18))
    }

    async fn claim(ledger: &LocalLedger, who: &Address, taps: u64) -> LedgerResult<ClaimReceipt> {
        let pending = ledger.submit_claim(who, taps).await?;
        ledger.confirm(pending).await
    }

    #[tokio::test]
    async fn claim__pays_one_token_per_tap() {
        // given
        let ledger = LocalLedger::in_memory(owner(), token());
        ledger.deposit(&owner(), tokens(100)).await.unwrap();

        // when
        let receipt = claim(&ledger, &player(), 5).await.unwrap();

        // then
        assert_eq!(receipt.taps, 5);
        assert_eq!(receipt.reward, tokens(5));
        assert_eq!(ledger.pool_balance().await.unwrap(), tokens(95));
        assert_eq!(ledger.holding_of(&player()).unwrap(), tokens(5));
    }

    #[tokio::test]
    async fn submit_claim__rejects_zero_taps() {
        let ledger = LocalLedger::in_memory(owner(), token());
        ledger.deposit(&owner(), tokens(10)).await.unwrap();

        let err = ledger.submit_claim(&player(), 0).await.unwrap_err();

        assert_eq!(err, LedgerError::Reverted(REVERT_NO_TAPS.into()));
    }

    #[tokio::test]
    async fn claim__underfunded_pool_pays_nothing() {
        // given
        let ledger = LocalLedger::in_memory(owner(), token());
        ledger.deposit(&owner(), tokens(3)).await.unwrap();

        // when
        let err = claim(&ledger, &player(), 4).await.unwrap_err();

        // then
        assert_eq!(err.kind(), FailureKind::LedgerUnderfunded);
        assert_eq!(ledger.pool_balance().await.unwrap(), tokens(3));
        assert_eq!(ledger.holding_of(&player()).unwrap(), TokenAmount::ZERO);
    }

    #[tokio::test]
    async fn confirm__rechecks_balance_drained_after_submit() {
        // given
        let ledger = LocalLedger::in_memory(owner(), token());
        ledger.deposit(&owner(), tokens(5)).await.unwrap();
        let pending = ledger.submit_claim(&player(), 5).await.unwrap();
        ledger.withdraw(&owner(), tokens(1)).await.unwrap();

        // when
        let err = ledger.confirm(pending).await.unwrap_err();

        // then
        assert_eq!(err, LedgerError::Reverted(REVERT_NOT_ENOUGH_TOKENS.into()));
        assert_eq!(ledger.pool_balance().await.unwrap(), tokens(4));
    }

    #[tokio::test]
    async fn deposit__is_owner_only() {
        let ledger = LocalLedger::in_memory(owner(), token());

        let err = ledger.deposit(&player(), tokens(1)).await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::NotOwner);
        assert_eq!(ledger.pool_balance().await.unwrap(), TokenAmount::ZERO);
    }

    #[tokio::test]
    async fn withdraw__cannot_exceed_pool() {
        // given
        let ledger = LocalLedger::in_memory(owner(), token());
        ledger.deposit(&owner(), tokens(2)).await.unwrap();

        // when
        let err = ledger.withdraw(&owner(), tokens(3)).await.unwrap_err();

        // then
        assert_eq!(err, LedgerError::Reverted(REVERT_WITHDRAW_FAILED.into()));
        assert_eq!(ledger.pool_balance().await.unwrap(), tokens(2));
    }

    #[tokio::test]
    async fn withdraw__returns_tokens_to_owner() {
        let ledger = LocalLedger::in_memory(owner(), token());
        ledger.deposit(&owner(), tokens(10)).await.unwrap();

        let balance = ledger.withdraw(&owner(), tokens(4)).await.unwrap();

        assert_eq!(balance, tokens(6));
        assert_eq!(ledger.holding_of(&owner()).unwrap(), tokens(4));
    }

    #[tokio::test]
    async fn open__sees_changes_made_through_another_handle() {
        // given
        let dir = TempDir::new("ledger").unwrap();
        let path = dir.path().join("ledger.json");
        let admin = LocalLedger::create(&path, owner(), token()).unwrap();
        let client = LocalLedger::open(&path).unwrap();

        // when
        admin.deposit(&owner(), tokens(7)).await.unwrap();
        claim(&client, &player(), 2).await.unwrap();

        // then
        assert_eq!(admin.pool_balance().await.unwrap(), tokens(5));
        assert_eq!(admin.snapshot().unwrap().claims, 1);
        assert_eq!(
            admin.contract_id().unwrap(),
            client.contract_id().unwrap()
        );
    }

    #[test]
    fn deposit__handles_on_one_file_never_lose_updates() {
        // given
        let dir = TempDir::new("ledger").unwrap();
        let path = dir.path().join("ledger.json");
        LocalLedger::create(&path, owner(), token()).unwrap();
        let unit = TokenAmount::new(1);

        // when four handles deposit concurrently while a fifth keeps reopening
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let rt = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .unwrap();
                    let ledger = LocalLedger::open(&path).unwrap();
                    rt.block_on(async {
                        for _ in 0..50 {
                            ledger.deposit(&owner(), unit).await.unwrap();
                        }
                    });
                })
            })
            .collect();
        let reader = {
            let path = path.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let reopened = LocalLedger::open(&path).unwrap();
                    assert!(reopened.snapshot().unwrap().balance <= TokenAmount::new(200));
                }
            })
        };
        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        // then
        let state = LocalLedger::open(&path).unwrap().snapshot().unwrap();
        assert_eq!(state.balance, TokenAmount::new(200));
        assert_eq!(state.tx_count, 200);
    }

    #[test]
    fn create__refuses_to_overwrite_existing_ledger() {
        let dir = TempDir::new("ledger").unwrap();
        let path = dir.path().join("ledger.json");
        LocalLedger::create(&path, owner(), token()).unwrap();

        let result = LocalLedger::create(&path, owner(), token());

        assert!(matches!(result, Err(LedgerError::Storage(_))));
    }

    #[test]
    fn open__fails_on_missing_file() {
        let dir = TempDir::new("ledger").unwrap();

        let result = LocalLedger::open(dir.path().join("absent.json"));

        assert!(matches!(result, Err(LedgerError::Storage(_))));
    }

    proptest! {
        #[test]
        fn claim__conserves_tokens(
            funded in 0u128..1_000,
            batches in proptest::collection::vec(0u64..50, 0..20),
        ) {
            let mut state = LedgerState::new(owner(), token());
            if funded > 0 {
                state.deposit(&owner(), tokens(funded)).unwrap();
            }
            for taps in batches {
                let before = state.clone();
                match state.claim(&player(), taps) {
                    Ok(reward) => prop_assert_eq!(reward, tokens(u128::from(taps))),
                    Err(_) => prop_assert_eq!(&state, &before),
                }
            }
            let paid = state.holding_of(&player());
            prop_assert_eq!(paid, state.total_paid);
            prop_assert_eq!(
                paid.checked_add(state.balance).unwrap(),
                tokens(funded)
            );
        }
    }
}
