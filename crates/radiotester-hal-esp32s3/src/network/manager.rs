use embassy_net::Stack;
use embassy_time::{Duration, Timer, WithTimeout};
use esp_radio::wifi::{AuthMethod, ClientConfig, ModeConfig, WifiController, WifiError};
use log::info;
use radiotester_core::net::{
    ConnectParams, ConnectionManager, InterfaceType, SecurityMode, WifiBand, pack_ipv4,
};

use super::ConnectivityHandle;

const DHCP_TIMEOUT_SECS: u64 = 15;
const LINK_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug)]
pub enum NetworkError {
    /// Only station mode is brought up.
    UnsupportedInterface(InterfaceType),
    /// The ESP32-S3 radio only covers 2.4 GHz.
    UnsupportedBand(WifiBand),
    NotInitialised,
    Config(WifiError),
    Start(WifiError),
    Connect(WifiError),
    DhcpTimeout,
}

/// Station-mode connection manager over esp-radio + embassy-net.
pub struct EspConnectionManager<'d> {
    controller: WifiController<'d>,
    stack: Stack<'d>,
    connectivity: &'static ConnectivityHandle,
    initialised: bool,
}

impl<'d> EspConnectionManager<'d> {
    pub fn new(
        controller: WifiController<'d>,
        stack: Stack<'d>,
        connectivity: &'static ConnectivityHandle,
    ) -> Self {
        Self {
            controller,
            stack,
            connectivity,
            initialised: false,
        }
    }

    async fn drop_link(&mut self) {
        self.connectivity.mark_disconnected();
        let _ = self.controller.disconnect_async().await;
    }
}

impl ConnectionManager for EspConnectionManager<'_> {
    type Error = NetworkError;

    async fn init(&mut self, interface: InterfaceType) -> Result<(), Self::Error> {
        if interface != InterfaceType::Sta {
            return Err(NetworkError::UnsupportedInterface(interface));
        }
        self.connectivity.mark_disconnected();
        self.initialised = true;
        Ok(())
    }

    async fn connect_ap(&mut self, params: &ConnectParams) -> Result<u32, Self::Error> {
        if !self.initialised {
            return Err(NetworkError::NotInitialised);
        }
        if params.band() == WifiBand::Band5GHz {
            return Err(NetworkError::UnsupportedBand(params.band()));
        }

        self.connectivity.mark_connecting();

        let client_config = ClientConfig::default()
            .with_ssid(params.ssid().into())
            .with_password(params.password().into())
            .with_auth_method(auth_method(params.security()));
        self.controller
            .set_config(&ModeConfig::Client(client_config))
            .map_err(NetworkError::Config)?;

        if !self.controller.is_started().unwrap_or(false) {
            if let Err(err) = self.controller.start_async().await {
                self.connectivity.mark_disconnected();
                return Err(NetworkError::Start(err));
            }
        }

        if let Err(err) = self.controller.connect_async().await {
            self.drop_link().await;
            return Err(NetworkError::Connect(err));
        }

        if self
            .stack
            .wait_config_up()
            .with_timeout(Duration::from_secs(DHCP_TIMEOUT_SECS))
            .await
            .is_err()
        {
            info!("wifi: dhcp timeout; dropping link");
            self.drop_link().await;
            return Err(NetworkError::DhcpTimeout);
        }

        let Some(config) = self.stack.config_v4() else {
            self.drop_link().await;
            return Err(NetworkError::DhcpTimeout);
        };
        let ipv4 = pack_ipv4(config.address.address().octets());
        self.connectivity
            .update_link_ip(self.stack.is_link_up(), Some(ipv4));
        Ok(ipv4)
    }
}

fn auth_method(security: SecurityMode) -> AuthMethod {
    match security {
        SecurityMode::Open => AuthMethod::None,
        SecurityMode::Wpa2AesPsk => AuthMethod::Wpa2Personal,
        SecurityMode::Wpa3Sae => AuthMethod::Wpa3Personal,
    }
}

/// Keeps the shared connectivity handle in sync with the stack.
pub async fn monitor_link(stack: Stack<'_>, connectivity: &'static ConnectivityHandle) -> ! {
    loop {
        let ipv4 = stack
            .config_v4()
            .map(|config| pack_ipv4(config.address.address().octets()));
        connectivity.update_link_ip(stack.is_link_up(), ipv4);
        Timer::after_millis(LINK_POLL_INTERVAL_MS).await;
    }
}
