use std::env;
use std::path::PathBuf;

use tracing::info;

/// SMTP account for outbound mail.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub address: String,
    pub app_password: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl MailConfig {
    /// Reads `EMAIL_ADDRESS` and `EMAIL_APP_PASSWORD`. `None` when either is
    /// absent; the email tool then loads as `Unconfigured` instead of
    /// failing.
    pub fn from_env() -> Option<Self> {
        let address = non_empty_var("EMAIL_ADDRESS")?;
        let app_password = non_empty_var("EMAIL_APP_PASSWORD")?;
        let smtp_host =
            non_empty_var("EMAIL_SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".into());
        let smtp_port = non_empty_var("EMAIL_SMTP_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(465);
        Some(Self {
            address,
            app_password,
            smtp_host,
            smtp_port,
        })
    }
}

/// Key for the distance-matrix lookup.
#[derive(Debug, Clone)]
pub struct MapsConfig {
    pub api_key: String,
}

impl MapsConfig {
    pub fn from_env() -> Option<Self> {
        Some(Self {
            api_key: non_empty_var("MAPS_PLACE_API_KEY")?,
        })
    }
}

/// Client-credentials pair for the flight-shopping API.
#[derive(Debug, Clone)]
pub struct FlightConfig {
    pub api_key: String,
    pub api_secret: String,
}

impl FlightConfig {
    pub fn from_env() -> Option<Self> {
        Some(Self {
            api_key: non_empty_var("AMADEUS_API_KEY")?,
            api_secret: non_empty_var("AMADEUS_API_SECRET")?,
        })
    }
}

/// Everything the default provider set needs. Each integration is `None`
/// when its credentials are missing; absence routes the owning tools to
/// their unconfigured fallback, never to a crash.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mail: Option<MailConfig>,
    pub maps: Option<MapsConfig>,
    pub flight: Option<FlightConfig>,
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Load from the process environment, after a best-effort `.env` read.
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_ok() {
            info!("loaded environment from .env");
        }
        Self {
            mail: MailConfig::from_env(),
            maps: MapsConfig::from_env(),
            flight: FlightConfig::from_env(),
            data_dir: env::var("CONCIERGE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
