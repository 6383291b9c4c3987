use anyhow::{
    Context,
    Result,
    anyhow,
    bail,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub mod totals;

pub use totals::ClaimedTotalsStore;

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";
const LOCAL_LEDGER_FILE: &str = "ledger.json";

/// Name of the contract entry point every descriptor has to advertise.
pub const CLAIM_FUNCTION: &str = "claim";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Dev,
    Test,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Test => "test",
            DeploymentEnv::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Devnet",
            DeploymentEnv::Test => "Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

/// One callable entry of the deployed contract's interface.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InterfaceFunction {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub read_only: bool,
}

impl InterfaceFunction {
    pub fn call(name: &str, inputs: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            inputs: inputs.iter().map(|i| i.to_string()).collect(),
            read_only: false,
        }
    }

    pub fn view(name: &str, inputs: &[&str]) -> Self {
        Self {
            read_only: true,
            ..Self::call(name, inputs)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub contract_id: String,
    pub network_url: String,
    #[serde(default)]
    pub bytecode_hash: Option<String>,
    #[serde(default)]
    pub token_asset_id: Option<String>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    pub token_decimals: u32,
    #[serde(default)]
    pub interface: Vec<InterfaceFunction>,
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

impl DeploymentRecord {
    pub fn supports(&self, function: &str) -> bool {
        self.interface.iter().any(|f| f.name == function)
    }

    /// Rejects descriptors that cannot drive a claim.
    pub fn validate(&self) -> Result<()> {
        if self.contract_id.trim().is_empty() {
            bail!("Deployment record has an empty contract id");
        }
        if !self.supports(CLAIM_FUNCTION) {
            bail!(
                "Contract {} does not expose `{CLAIM_FUNCTION}` in its interface description",
                self.contract_id
            );
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    root: PathBuf,
    env: DeploymentEnv,
    path: PathBuf,
}

impl DeploymentStore {
    pub fn with_root(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let path = ensure_store(&root, env)?;
        Ok(Self { root, env, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn env(&self) -> DeploymentEnv {
        self.env
    }

    pub fn env_dir(&self) -> PathBuf {
        self.root.join(self.env.dir_name())
    }

    /// Default location of the file-backed local ledger for this env.
    pub fn local_ledger_path(&self) -> PathBuf {
        self.env_dir().join(LOCAL_LEDGER_FILE)
    }

    pub fn totals(&self) -> ClaimedTotalsStore {
        ClaimedTotalsStore::new(self.env_dir())
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        read_record(&self.path)
    }

    /// Loads the descriptor the client cannot run without.
    pub fn load_required(&self) -> Result<DeploymentRecord> {
        let record = self.load()?.ok_or_else(|| {
            anyhow!(
                "No deployment recorded for {} in {}",
                self.env,
                self.path.display()
            )
        })?;
        record.validate()?;
        Ok(record)
    }

    pub fn save(&self, record: DeploymentRecord) -> Result<()> {
        write_record(&self.path, &record)
    }
}

pub fn compute_bytecode_hash(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| {
        format!(
            "Failed to read contract bytecode for hashing: {}",
            path.display()
        )
    })?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn ensure_structure(root: impl AsRef<Path>) -> Result<()> {
    for env in [
        DeploymentEnv::Dev,
        DeploymentEnv::Test,
        DeploymentEnv::Local,
    ] {
        let _ = ensure_store(root.as_ref(), env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    if !root.exists() {
        fs::create_dir_all(root).with_context(|| {
            format!("Failed to create deployments directory {}", root.display())
        })?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!("Failed to create {} directory", env_dir.display())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).with_context(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"").with_context(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.is_empty() || data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(Some(record));
    }
    if let Ok(mut records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records.pop());
    }
    Err(anyhow!(
        "Failed to parse deployment record JSON; expected a single deployment object"
    ))
}

fn write_record(path: impl AsRef<Path>, record: &DeploymentRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .context("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment record")?;
    Ok(())
}

pub struct NewDeployment {
    pub contract_id: String,
    pub network_url: String,
    pub bytecode_hash: Option<String>,
    pub token_asset_id: Option<String>,
    pub token_symbol: Option<String>,
    pub token_decimals: u32,
    pub interface: Vec<InterfaceFunction>,
    pub ledger_path: Option<PathBuf>,
}

pub fn record_deployment(
    store: &DeploymentStore,
    deployment: NewDeployment,
) -> Result<DeploymentRecord> {
    let record = DeploymentRecord {
        deployed_at: Utc::now().to_rfc3339(),
        contract_id: deployment.contract_id,
        network_url: deployment.network_url,
        bytecode_hash: deployment.bytecode_hash,
        token_asset_id: deployment.token_asset_id,
        token_symbol: deployment.token_symbol,
        token_decimals: deployment.token_decimals,
        interface: deployment.interface,
        ledger_path: deployment.ledger_path,
    };
    store.save(record.clone())?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    fn sample_deployment(interface: Vec<InterfaceFunction>) -> NewDeployment {
        NewDeployment {
            contract_id: "local-0001".to_string(),
            network_url: "file://ledger.json".to_string(),
            bytecode_hash: None,
            token_asset_id: None,
            token_symbol: Some("TAP".to_string()),
            token_decimals: 18,
            interface,
            ledger_path: None,
        }
    }

    #[test]
    fn load_required__fails_when_nothing_was_recorded() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::with_root(dir.path(), DeploymentEnv::Local).unwrap();

        // when
        let result = store.load_required();

        // then
        let err = result.unwrap_err().to_string();
        assert!(err.contains("No deployment recorded"), "{err}");
    }

    #[test]
    fn load_required__returns_recorded_descriptor() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::with_root(dir.path(), DeploymentEnv::Local).unwrap();
        record_deployment(
            &store,
            sample_deployment(vec![InterfaceFunction::call(CLAIM_FUNCTION, &["u64"])]),
        )
        .unwrap();

        // when
        let record = store.load_required().unwrap();

        // then
        assert_eq!(record.contract_id, "local-0001");
        assert_eq!(record.token_decimals, 18);
        assert!(record.supports(CLAIM_FUNCTION));
    }

    #[test]
    fn record_deployment__writes_only_descriptor_fields() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::with_root(dir.path(), DeploymentEnv::Local).unwrap();

        // when
        record_deployment(
            &store,
            sample_deployment(vec![InterfaceFunction::call(CLAIM_FUNCTION, &["u64"])]),
        )
        .unwrap();

        // then
        let json = fs::read_to_string(store.path()).unwrap();
        assert!(json.contains("\"contract_id\""));
        assert!(!json.contains("block_height"), "{json}");
    }

    #[test]
    fn load__tolerates_records_with_retired_fields() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::with_root(dir.path(), DeploymentEnv::Local).unwrap();
        let json = r#"{"deployed_at": "a", "contract_id": "old", "network_url": "x",
            "token_decimals": 9, "deployment_block_height": 42}"#;
        fs::write(store.path(), json).unwrap();

        // when
        let record = store.load().unwrap().unwrap();

        // then
        assert_eq!(record.contract_id, "old");
    }

    #[test]
    fn load_required__rejects_interface_without_claim() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::with_root(dir.path(), DeploymentEnv::Dev).unwrap();
        record_deployment(
            &store,
            sample_deployment(vec![InterfaceFunction::view("owner", &[])]),
        )
        .unwrap();

        // when
        let result = store.load_required();

        // then
        assert!(result.unwrap_err().to_string().contains("claim"));
    }

    #[test]
    fn load__surfaces_unparsable_json() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::with_root(dir.path(), DeploymentEnv::Test).unwrap();
        fs::write(store.path(), b"{ not json").unwrap();

        // when
        let result = store.load();

        // then
        assert!(result.is_err());
    }

    #[test]
    fn load__accepts_a_list_and_keeps_the_latest() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::with_root(dir.path(), DeploymentEnv::Local).unwrap();
        let json = r#"[
            {"deployed_at": "a", "contract_id": "old", "network_url": "x", "token_decimals": 9},
            {"deployed_at": "b", "contract_id": "new", "network_url": "x", "token_decimals": 9}
        ]"#;
        fs::write(store.path(), json).unwrap();

        // when
        let record = store.load().unwrap().unwrap();

        // then
        assert_eq!(record.contract_id, "new");
        assert!(record.interface.is_empty());
    }
}
