use std::{fmt, str::FromStr, time::Duration};

use serde::Deserialize;

use crate::{Error, RetryConfig, DEFAULT_MAX_RETRIES};

/// Site24x7 data center, which decides both the API host and the Zoho
/// accounts server that issues tokens.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum DataCenter {
    #[default]
    US,
    EU,
    IN,
    AU,
    CN,
    JP,
    CA,
}

impl DataCenter {
    /// Every supported data center.
    pub const ALL: [DataCenter; 7] = [
        DataCenter::US,
        DataCenter::EU,
        DataCenter::IN,
        DataCenter::AU,
        DataCenter::CN,
        DataCenter::JP,
        DataCenter::CA,
    ];

    /// Short code such as `"EU"`, as accepted by [`FromStr`].
    pub fn code(self) -> &'static str {
        match self {
            DataCenter::US => "US",
            DataCenter::EU => "EU",
            DataCenter::IN => "IN",
            DataCenter::AU => "AU",
            DataCenter::CN => "CN",
            DataCenter::JP => "JP",
            DataCenter::CA => "CA",
        }
    }

    /// Human-readable region name.
    pub fn display_name(self) -> &'static str {
        match self {
            DataCenter::US => "United States",
            DataCenter::EU => "Europe",
            DataCenter::IN => "India",
            DataCenter::AU => "Australia",
            DataCenter::CN => "China",
            DataCenter::JP => "Japan",
            DataCenter::CA => "Canada",
        }
    }

    /// Site24x7 REST API base URL for this region.
    pub fn api_base_url(self) -> &'static str {
        match self {
            DataCenter::US => "https://www.site24x7.com/api",
            DataCenter::EU => "https://www.site24x7.eu/api",
            DataCenter::IN => "https://www.site24x7.in/api",
            DataCenter::AU => "https://www.site24x7.net.au/api",
            DataCenter::CN => "https://www.site24x7.cn/api",
            DataCenter::JP => "https://www.site24x7.jp/api",
            DataCenter::CA => "https://www.site24x7.ca/api",
        }
    }

    /// Zoho accounts token endpoint for this region.
    pub fn token_url(self) -> &'static str {
        match self {
            DataCenter::US => "https://accounts.zoho.com/oauth/v2/token",
            DataCenter::EU => "https://accounts.zoho.eu/oauth/v2/token",
            DataCenter::IN => "https://accounts.zoho.in/oauth/v2/token",
            DataCenter::AU => "https://accounts.zoho.com.au/oauth/v2/token",
            DataCenter::CN => "https://accounts.zoho.com.cn/oauth/v2/token",
            DataCenter::JP => "https://accounts.zoho.jp/oauth/v2/token",
            DataCenter::CA => "https://accounts.zohocloud.ca/oauth/v2/token",
        }
    }
}

impl fmt::Display for DataCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DataCenter {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        DataCenter::ALL
            .into_iter()
            .find(|dc| dc.code().eq_ignore_ascii_case(value))
            .ok_or_else(|| Error::Config(format!("unknown data center '{value}'")))
    }
}

impl TryFrom<String> for DataCenter {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Credentials and transport settings for an [`ApiClient`](crate::ApiClient).
///
/// Explicit `api_base_url` / `token_url` values override the ones derived from
/// `data_center`.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Previously issued access token, used until it expires.
    pub access_token: Option<String>,
    /// Lifetime of `access_token` in seconds. Without it the token never expires.
    pub access_token_expiry_secs: Option<u64>,
    pub data_center: DataCenter,
    pub api_base_url: Option<String>,
    pub token_url: Option<String>,
    /// Zero means the default of one second.
    pub retry_min_wait_secs: u64,
    /// Zero means the default of thirty seconds.
    pub retry_max_wait_secs: u64,
    pub max_retries: Option<u32>,
    /// MSP customer account id, sent as the `zaaid` cookie on every request.
    pub zaaid: Option<String>,
}

impl ClientConfig {
    /// Credentials for the US data center with default retry settings.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            ..Self::default()
        }
    }

    /// Reads configuration from the environment.
    ///
    /// Required:
    /// - `SITE24X7_OAUTH2_CLIENT_ID`
    /// - `SITE24X7_OAUTH2_CLIENT_SECRET`
    /// - `SITE24X7_OAUTH2_REFRESH_TOKEN`
    ///
    /// Optional: `SITE24X7_OAUTH2_ACCESS_TOKEN`, `SITE24X7_ACCESS_TOKEN_EXPIRY`
    /// (seconds), `SITE24X7_DATA_CENTER`, `SITE24X7_API_BASE_URL`,
    /// `SITE24X7_TOKEN_URL`, `SITE24X7_RETRY_MIN_WAIT`,
    /// `SITE24X7_RETRY_MAX_WAIT` (seconds), `SITE24X7_MAX_RETRIES` and
    /// `SITE24X7_ZAAID`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| match lookup(key) {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
            Some(_) => Err(Error::Config(format!("{key} is set but empty"))),
            None => Err(Error::Config(format!("missing {key} environment variable"))),
        };
        let optional = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let number = |key: &str| {
            optional(key)
                .map(|value| {
                    value.parse::<u64>().map_err(|_| {
                        Error::Config(format!("{key} must be a whole number, got '{value}'"))
                    })
                })
                .transpose()
        };

        let max_retries = number("SITE24X7_MAX_RETRIES")?
            .map(|value| {
                u32::try_from(value).map_err(|_| {
                    Error::Config(format!("SITE24X7_MAX_RETRIES is too large: {value}"))
                })
            })
            .transpose()?;

        Ok(Self {
            client_id: required("SITE24X7_OAUTH2_CLIENT_ID")?,
            client_secret: required("SITE24X7_OAUTH2_CLIENT_SECRET")?,
            refresh_token: required("SITE24X7_OAUTH2_REFRESH_TOKEN")?,
            access_token: optional("SITE24X7_OAUTH2_ACCESS_TOKEN"),
            access_token_expiry_secs: number("SITE24X7_ACCESS_TOKEN_EXPIRY")?,
            data_center: optional("SITE24X7_DATA_CENTER")
                .map(|value| value.parse())
                .transpose()?
                .unwrap_or_default(),
            api_base_url: optional("SITE24X7_API_BASE_URL"),
            token_url: optional("SITE24X7_TOKEN_URL"),
            retry_min_wait_secs: number("SITE24X7_RETRY_MIN_WAIT")?.unwrap_or(0),
            retry_max_wait_secs: number("SITE24X7_RETRY_MAX_WAIT")?.unwrap_or(0),
            max_retries,
            zaaid: optional("SITE24X7_ZAAID"),
        })
    }

    /// Selects the region; explicit URLs still take precedence.
    pub fn with_data_center(mut self, data_center: DataCenter) -> Self {
        self.data_center = data_center;
        self
    }

    /// Acts on behalf of the MSP customer identified by `zaaid`.
    pub fn with_zaaid(mut self, zaaid: impl Into<String>) -> Self {
        self.zaaid = Some(zaaid.into());
        self
    }

    /// Seeds an already issued access token, valid for `expiry_secs` if given.
    pub fn with_access_token(
        mut self,
        access_token: impl Into<String>,
        expiry_secs: Option<u64>,
    ) -> Self {
        self.access_token = Some(access_token.into());
        self.access_token_expiry_secs = expiry_secs;
        self
    }

    /// API base URL, explicit or derived from the data center.
    pub fn api_base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or_else(|| self.data_center.api_base_url())
    }

    /// Token endpoint, explicit or derived from the data center.
    pub fn token_url(&self) -> &str {
        self.token_url
            .as_deref()
            .unwrap_or_else(|| self.data_center.token_url())
    }

    /// Retry settings with unset values replaced by their defaults.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .with_min_wait(Duration::from_secs(self.retry_min_wait_secs))
            .with_max_wait(Duration::from_secs(self.retry_max_wait_secs))
            .with_max_retries(self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES))
            .with_defaults()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("access_token_expiry_secs", &self.access_token_expiry_secs)
            .field("data_center", &self.data_center)
            .field("api_base_url", &self.api_base_url())
            .field("token_url", &self.token_url())
            .field("retry_min_wait_secs", &self.retry_min_wait_secs)
            .field("retry_max_wait_secs", &self.retry_max_wait_secs)
            .field("max_retries", &self.max_retries)
            .field("zaaid", &self.zaaid)
            .finish()
    }
}
