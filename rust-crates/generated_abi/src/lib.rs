use deployments::{
    CLAIM_FUNCTION,
    InterfaceFunction,
};
use std::path::{
    Path,
    PathBuf,
};

#[cfg(feature = "fuel")]
pub use fuel::*;

pub const CONTRACT_NAME: &str = "tap-to-earn";

/// Interface of the reward contract as recorded in deployment descriptors.
pub fn interface() -> Vec<InterfaceFunction> {
    vec![
        InterfaceFunction::call(CLAIM_FUNCTION, &["taps: u64"]),
        InterfaceFunction::call("deposit", &[]),
        InterfaceFunction::call("withdraw", &["amount: u64"]),
        InterfaceFunction::view("owner", &[]),
        InterfaceFunction::view("token", &[]),
        InterfaceFunction::view("unit_reward", &[]),
        InterfaceFunction::view("balance", &[]),
    ]
}

pub(crate) fn manifest_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

pub fn tap_to_earn_bin_path() -> PathBuf {
    manifest_path("../../sway-projects/tap-to-earn/out/release/tap-to-earn.bin")
}

#[cfg(feature = "fuel")]
mod fuel {
    use super::tap_to_earn_bin_path;
    use fuels::{
        accounts::wallet::Wallet,
        prelude::{
            AssetId,
            ContractId,
            LoadConfiguration,
            Result,
            TxPolicies,
        },
        programs::contract::{
            Contract,
            Regular,
        },
        types::Identity,
    };

    pub mod tap_types {
        use fuels::macros::abigen;

        abigen!(Contract(
            name = "TapToEarn",
            abi = "../../sway-projects/tap-to-earn/out/release/tap-to-earn-abi.json"
        ));
    }

    pub use tap_types::{
        TapToEarn,
        TapToEarnConfigurables,
    };

    pub struct DeployParams {
        pub owner: Identity,
        pub token: AssetId,
        pub token_decimals: u8,
    }

    fn configured_contract(params: &DeployParams) -> Result<Contract<Regular>> {
        let configurables = TapToEarnConfigurables::default()
            .with_OWNER(params.owner)?
            .with_TOKEN(params.token)?
            .with_TOKEN_DECIMALS(params.token_decimals)?;
        Contract::load_from(
            tap_to_earn_bin_path(),
            LoadConfiguration::default().with_configurables(configurables),
        )
    }

    pub fn contract_id(params: &DeployParams) -> Result<ContractId> {
        Ok(configured_contract(params)?.contract_id())
    }

    pub async fn deploy_tap_to_earn(
        wallet: Wallet,
        params: &DeployParams,
    ) -> Result<(TapToEarn<Wallet>, ContractId)> {
        let res = configured_contract(params)?
            .deploy(&wallet, TxPolicies::default())
            .await?;
        let contract_id = res.contract_id;
        let instance = TapToEarn::new(contract_id, wallet);
        Ok((instance, contract_id))
    }

    pub fn separate_contract_instance(
        id: &ContractId,
        wallet: Wallet,
    ) -> TapToEarn<Wallet> {
        TapToEarn::new(*id, wallet)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn interface__advertises_claim_and_owner_funding() {
        let names: Vec<String> = interface().into_iter().map(|f| f.name).collect();

        assert!(names.contains(&CLAIM_FUNCTION.to_string()));
        assert!(names.contains(&"deposit".to_string()));
        assert!(names.contains(&"withdraw".to_string()));
    }

    #[test]
    fn interface__marks_reads_as_read_only() {
        let reads: Vec<String> = interface()
            .into_iter()
            .filter(|f| f.read_only)
            .map(|f| f.name)
            .collect();

        assert_eq!(reads, vec!["owner", "token", "unit_reward", "balance"]);
    }
}
