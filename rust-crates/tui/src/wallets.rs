use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".fuel").join("wallets"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => Ok(expand_path(raw)),
        None => default_wallet_dir(),
    }
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Keystore files (`<name>.wallet`) in `dir`, sorted by name.
pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("wallet")
        {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    list_wallets(dir)?
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

/// Prompts for the keystore password. Must run before the terminal enters raw mode.
#[cfg(feature = "fuel")]
pub fn unlock_wallet(
    descriptor: &WalletDescriptor,
    provider: &fuels::prelude::Provider,
) -> Result<fuels::prelude::Wallet> {
    use eth_keystore::decrypt_key;
    use fuels::{
        crypto::SecretKey,
        prelude::{
            Wallet,
            derivation::DEFAULT_DERIVATION_PATH,
            private_key::PrivateKeySigner,
        },
    };
    use rpassword::prompt_password;

    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    if let Ok(secret_key) = SecretKey::try_from(secret.as_slice()) {
        return Ok(Wallet::new(
            PrivateKeySigner::new(secret_key),
            provider.clone(),
        ));
    }
    if let Ok(mnemonic) = std::str::from_utf8(&secret)
        && mnemonic.split_whitespace().count() >= 12
    {
        let private_key = SecretKey::new_from_mnemonic_phrase_with_path(
            mnemonic,
            DEFAULT_DERIVATION_PATH,
        )?;
        return Ok(Wallet::new(
            PrivateKeySigner::new(private_key),
            provider.clone(),
        ));
    }
    Err(eyre!(
        "Wallet '{}' contained unsupported key material",
        descriptor.name
    ))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn list_wallets__only_returns_keystore_files_sorted() {
        // given
        let dir = TempDir::new("wallets").unwrap();
        fs::write(dir.path().join("zoe.wallet"), b"{}").unwrap();
        fs::write(dir.path().join("amy.wallet"), b"{}").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        // when
        let wallets = list_wallets(dir.path()).unwrap();

        // then
        let names: Vec<_> = wallets.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["amy", "zoe"]);
    }

    #[test]
    fn find_wallet__errors_on_unknown_name() {
        let dir = TempDir::new("wallets").unwrap();

        let err = find_wallet(dir.path(), "ghost").unwrap_err();

        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn list_wallets__is_empty_for_missing_dir() {
        let dir = TempDir::new("wallets").unwrap();

        let wallets = list_wallets(&dir.path().join("absent")).unwrap();

        assert!(wallets.is_empty());
    }
}
