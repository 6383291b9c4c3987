use color_eyre::eyre::{
    Result,
    WrapErr,
};
use ledger::Address;
use std::{
    fmt,
    ops::BitOr,
    str::FromStr,
};
use tokio::sync::mpsc;
use url::Url;

const COMPOSE_URL: &str = "https://warpcast.com/~/compose";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const AUTO_CONNECT: Capabilities = Capabilities(1);
    pub const COMPOSE_SHARE: Capabilities = Capabilities(1 << 1);

    pub fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Self) -> Self::Output {
        Capabilities(self.0 | rhs.0)
    }
}

/// How the wallet identity is obtained, chosen once at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectorStrategy {
    /// User connects explicitly from the UI.
    #[default]
    Modal,
    /// Hosted mini-app: identity is supplied by the host once the app is ready.
    MiniApp,
    /// Like `MiniApp`, but connects before the contract descriptor is loaded.
    MiniAppEager,
}

impl ConnectorStrategy {
    pub fn capabilities(self) -> Capabilities {
        match self {
            ConnectorStrategy::Modal => Capabilities::NONE,
            ConnectorStrategy::MiniApp | ConnectorStrategy::MiniAppEager => {
                Capabilities::AUTO_CONNECT | Capabilities::COMPOSE_SHARE
            }
        }
    }

    pub fn connects_before_config(self) -> bool {
        self == ConnectorStrategy::MiniAppEager
    }
}

impl FromStr for ConnectorStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "modal" => Ok(ConnectorStrategy::Modal),
            "miniapp" => Ok(ConnectorStrategy::MiniApp),
            "miniapp-eager" => Ok(ConnectorStrategy::MiniAppEager),
            other => Err(format!(
                "unknown connector '{other}'; expected modal, miniapp or miniapp-eager"
            )),
        }
    }
}

impl fmt::Display for ConnectorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectorStrategy::Modal => "modal",
            ConnectorStrategy::MiniApp => "miniapp",
            ConnectorStrategy::MiniAppEager => "miniapp-eager",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountEvent {
    Connected(Address),
    Disconnected,
}

pub type AccountEvents = mpsc::UnboundedReceiver<AccountEvent>;

/// Source of the player's wallet identity. Changes are published on the
/// subscription handed out when the connector is built.
pub trait WalletConnector {
    fn connect(&mut self) -> Result<Address>;

    fn disconnect(&mut self);

    fn address(&self) -> Option<&Address>;
}

/// Identity derived from a named local profile.
pub struct LocalConnector {
    profile: String,
    connected: Option<Address>,
    events: mpsc::UnboundedSender<AccountEvent>,
}

impl LocalConnector {
    pub fn new(profile: impl Into<String>) -> (Self, AccountEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let connector = Self {
            profile: profile.into(),
            connected: None,
            events,
        };
        (connector, rx)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }
}

impl WalletConnector for LocalConnector {
    fn connect(&mut self) -> Result<Address> {
        let address = Address::for_profile(&self.profile);
        self.connected = Some(address.clone());
        tracing::info!(address = %address, profile = %self.profile, "wallet connected");
        let _ = self.events.send(AccountEvent::Connected(address.clone()));
        Ok(address)
    }

    fn disconnect(&mut self) {
        if self.connected.take().is_some() {
            tracing::info!(profile = %self.profile, "wallet disconnected");
            let _ = self.events.send(AccountEvent::Disconnected);
        }
    }

    fn address(&self) -> Option<&Address> {
        self.connected.as_ref()
    }
}

/// A wallet that was unlocked up front and only announces itself on connect.
#[cfg(feature = "fuel")]
pub struct UnlockedConnector {
    address: Address,
    connected: bool,
    events: mpsc::UnboundedSender<AccountEvent>,
}

#[cfg(feature = "fuel")]
impl UnlockedConnector {
    pub fn new(address: Address) -> (Self, AccountEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let connector = Self {
            address,
            connected: false,
            events,
        };
        (connector, rx)
    }
}

#[cfg(feature = "fuel")]
impl WalletConnector for UnlockedConnector {
    fn connect(&mut self) -> Result<Address> {
        self.connected = true;
        let _ = self
            .events
            .send(AccountEvent::Connected(self.address.clone()));
        Ok(self.address.clone())
    }

    fn disconnect(&mut self) {
        if std::mem::take(&mut self.connected) {
            let _ = self.events.send(AccountEvent::Disconnected);
        }
    }

    fn address(&self) -> Option<&Address> {
        self.connected.then_some(&self.address)
    }
}

pub fn compose_share_link(taps: u64, reward: &str, symbol: &str) -> Result<String> {
    let tap_label = if taps == 1 { "tap" } else { "taps" };
    let text = format!("I just earned {reward} {symbol} with {taps} {tap_label} on Tap to Earn!");
    let url = Url::parse_with_params(COMPOSE_URL, &[("text", text)])
        .wrap_err("Failed to build share link")?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn capabilities__modal_has_none() {
        let caps = ConnectorStrategy::Modal.capabilities();

        assert!(!caps.contains(Capabilities::AUTO_CONNECT));
        assert!(!caps.contains(Capabilities::COMPOSE_SHARE));
    }

    #[test]
    fn capabilities__mini_app_variants_share_the_same_set() {
        for strategy in [ConnectorStrategy::MiniApp, ConnectorStrategy::MiniAppEager] {
            let caps = strategy.capabilities();
            assert!(caps.contains(Capabilities::AUTO_CONNECT));
            assert!(caps.contains(Capabilities::COMPOSE_SHARE));
        }
        assert!(ConnectorStrategy::MiniAppEager.connects_before_config());
        assert!(!ConnectorStrategy::MiniApp.connects_before_config());
    }

    #[test]
    fn from_str__parses_cli_names() {
        assert_eq!("modal".parse(), Ok(ConnectorStrategy::Modal));
        assert_eq!("miniapp-eager".parse(), Ok(ConnectorStrategy::MiniAppEager));
        assert!("walletconnect".parse::<ConnectorStrategy>().is_err());
    }

    #[test]
    fn connect__publishes_account_events() {
        // given
        let (mut connector, mut events) = LocalConnector::new("alice");

        // when
        let address = connector.connect().unwrap();
        connector.disconnect();
        connector.disconnect();

        // then
        assert_eq!(events.try_recv().unwrap(), AccountEvent::Connected(address));
        assert_eq!(events.try_recv().unwrap(), AccountEvent::Disconnected);
        assert!(events.try_recv().is_err());
        assert!(connector.address().is_none());
    }

    #[test]
    fn compose_share_link__encodes_the_message() {
        let link = compose_share_link(5, "5.000", "TAP").unwrap();

        assert!(link.starts_with("https://warpcast.com/~/compose?text="));
        assert!(link.contains("5+taps") || link.contains("5%20taps"));
        assert!(!link.contains(' '));
    }
}
