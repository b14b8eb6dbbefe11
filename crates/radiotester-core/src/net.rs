//! Access-point credentials, join policy and IPv4 helpers.

use core::fmt::Write;

use heapless::String;

pub const SSID_MAX_BYTES: usize = 32;
pub const KEY_MAX_BYTES: usize = 64;
/// Longest dotted-quad (`255.255.255.255`) plus one spare byte.
pub const IP_STR_LEN: usize = 16;

pub type IpString = String<IP_STR_LEN>;

/// Link-layer security used when joining.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SecurityMode {
    Open,
    Wpa2AesPsk,
    Wpa3Sae,
}

/// Radio band restriction for the join.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WifiBand {
    Any,
    Band2_4GHz,
    Band5GHz,
}

/// Interface mode the connection manager is brought up in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InterfaceType {
    Sta,
    Ap,
    ApSta,
}

/// Statically compiled network credentials.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WifiCredentials {
    pub ssid: &'static str,
    pub password: &'static str,
    pub security: SecurityMode,
    pub band: WifiBand,
}

impl WifiCredentials {
    pub const fn new(ssid: &'static str, password: &'static str) -> Self {
        Self {
            ssid,
            password,
            security: SecurityMode::Wpa2AesPsk,
            band: WifiBand::Any,
        }
    }

    pub const fn with_security(mut self, security: SecurityMode) -> Self {
        self.security = security;
        self
    }

    pub const fn with_band(mut self, band: WifiBand) -> Self {
        self.band = band;
        self
    }
}

/// Parameters handed to the connection manager for one join attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectParams {
    ssid: String<SSID_MAX_BYTES>,
    password: String<KEY_MAX_BYTES>,
    security: SecurityMode,
    band: WifiBand,
}

impl ConnectParams {
    pub const fn zeroed() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            security: SecurityMode::Open,
            band: WifiBand::Any,
        }
    }

    pub fn from_credentials(credentials: &WifiCredentials) -> Result<Self, JoinError> {
        let mut params = Self::zeroed();
        params.fill(credentials)?;
        Ok(params)
    }

    /// Clears every field and copies the credentials back in.
    ///
    /// On error the parameters are left zeroed.
    pub fn fill(&mut self, credentials: &WifiCredentials) -> Result<(), JoinError> {
        *self = Self::zeroed();

        if credentials.ssid.is_empty() {
            return Err(JoinError::InvalidCredentials);
        }
        if self.ssid.push_str(credentials.ssid).is_err()
            || self.password.push_str(credentials.password).is_err()
        {
            *self = Self::zeroed();
            return Err(JoinError::InvalidCredentials);
        }

        self.security = credentials.security;
        self.band = credentials.band;
        Ok(())
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub const fn security(&self) -> SecurityMode {
        self.security
    }

    pub const fn band(&self) -> WifiBand {
        self.band
    }
}

/// Bounded retry policy for the access-point join.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JoinPolicy {
    pub max_attempts: u8,
    pub retry_delay_ms: u32,
}

impl JoinPolicy {
    pub const fn new() -> Self {
        Self {
            max_attempts: 15,
            retry_delay_ms: 500,
        }
    }

    pub const fn with_max_attempts(mut self, max_attempts: u8) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub const fn with_retry_delay_ms(mut self, retry_delay_ms: u32) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinError {
    /// Credentials are empty or do not fit the join parameters.
    InvalidCredentials,
    /// The connection manager could not be initialised.
    InterfaceUnavailable,
    AttemptsExhausted { attempts: u8 },
}

/// Result of a successful join.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JoinedNetwork {
    /// IPv4 address packed with the first octet in the low byte.
    pub ipv4: u32,
    pub attempts: u8,
}

impl JoinedNetwork {
    pub fn ip_string(&self) -> IpString {
        format_ipv4(self.ipv4)
    }
}

/// Connection manager that owns the radio's station state machine.
pub trait ConnectionManager {
    type Error: core::fmt::Debug;

    async fn init(&mut self, interface: InterfaceType) -> Result<(), Self::Error>;

    /// Joins the access point and returns the assigned IPv4 address, packed
    /// as [`pack_ipv4`] does.
    async fn connect_ap(&mut self, params: &ConnectParams) -> Result<u32, Self::Error>;
}

/// Packs address octets so that the first octet lands in the low byte.
pub const fn pack_ipv4(octets: [u8; 4]) -> u32 {
    u32::from_le_bytes(octets)
}

/// Formats an address packed by [`pack_ipv4`] as dotted decimal.
pub fn format_ipv4(raw: u32) -> IpString {
    let [a, b, c, d] = raw.to_le_bytes();
    let mut out = IpString::new();
    // 15 bytes at most, always fits.
    let _ = write!(out, "{a}.{b}.{c}.{d}");
    out
}
