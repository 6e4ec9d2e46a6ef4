use std::{
    fs::File,
    io::BufReader,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::bot::commands::{CommandSet, Intent};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PRIVATE_KEY_PATH: &str = "GitHub_private_key.pem";
const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_DOCUMENTATION_URL: &str =
    "https://github.com/hanabi/hanabi.github.io/blob/main/misc/convention-changes.md";
const DEFAULT_REQUESTS_PER_SECOND: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("couldn't parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("`{key}` is missing, set it in the config file or with the {env} environment variable")]
    Missing { key: &'static str, env: &'static str },

    #[error("{env} environment variable of `{value}` is invalid: {reason}")]
    Malformed {
        env: &'static str,
        value: String,
        reason: String,
    },

    #[error("`{key}` can't be empty")]
    Empty { key: &'static str },

    #[error("the {intent} command has an empty trigger, which would match every comment")]
    EmptyTrigger { intent: Intent },
}

/// Settings as written in the configuration file, every one of them can be overridden from the
/// environment.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Address the webhook server listens on
    pub address: Option<IpAddr>,
    /// Port the webhook server listens on
    pub port: Option<u16>,
    /// Identifier of the GitHub App
    pub github_app_id: Option<u64>,
    /// Identifier of the installation of the GitHub App on the repositories to moderate
    pub github_installation_id: Option<u64>,
    /// PEM file holding the private key generated for the GitHub App
    pub github_private_key_path: Option<PathBuf>,
    /// Secret shared with GitHub to sign webhook payloads
    pub github_webhook_secret: Option<String>,
    /// Root of the GitHub REST API, only needs changing for GitHub Enterprise
    pub github_api_url: Option<Url>,
    /// Login of the only user allowed to close issues through the bot
    pub authorized_user: Option<String>,
    /// Comment substrings triggering each command
    pub commands: Option<CommandSet>,
    /// Link appended to every closing comment
    pub documentation_url: Option<Url>,
    /// Webhook requests accepted per second from a single address, `0` disables the limit
    pub requests_per_second: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub address: IpAddr,
    pub port: u16,
    pub requests_per_second: u32,
    pub github: GitHubConfig,
    pub moderation: ModerationConfig,
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub app_id: u64,
    pub installation_id: u64,
    pub private_key_path: PathBuf,
    pub webhook_secret: String,
    pub api_url: Url,
}

#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub authorized_user: String,
    pub commands: CommandSet,
    pub documentation_url: Url,
}

impl RawConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Open {
            path: path.to_owned(),
            source,
        })?;

        serde_yaml::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Overrides file values with the environment variables found through `lookup`.
    pub fn merge_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&mut self.address, "ADDRESS", &lookup)?;
        override_parsed(&mut self.port, "PORT", &lookup)?;
        override_parsed(&mut self.github_app_id, "GITHUB_APP_ID", &lookup)?;
        override_parsed(&mut self.github_installation_id, "GITHUB_INSTALLATION_ID", &lookup)?;
        override_parsed(&mut self.github_private_key_path, "GITHUB_PRIVATE_KEY_PATH", &lookup)?;
        override_parsed(&mut self.github_webhook_secret, "GITHUB_WEBHOOK_SECRET", &lookup)?;
        override_parsed(&mut self.github_api_url, "GITHUB_API_URL", &lookup)?;
        override_parsed(&mut self.authorized_user, "AUTHORIZED_USER", &lookup)?;

        Ok(self)
    }

    /// Checks that every required setting is present and fills in the defaults.
    pub fn validate(self) -> Result<BotConfig, ConfigError> {
        let github = GitHubConfig {
            app_id: required(self.github_app_id, "github_app_id", "GITHUB_APP_ID")?,
            installation_id: required(
                self.github_installation_id,
                "github_installation_id",
                "GITHUB_INSTALLATION_ID",
            )?,
            private_key_path: self
                .github_private_key_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PRIVATE_KEY_PATH)),
            webhook_secret: required_non_empty(
                self.github_webhook_secret,
                "github_webhook_secret",
                "GITHUB_WEBHOOK_SECRET",
            )?,
            api_url: match self.github_api_url {
                Some(url) => url,
                None => default_url(DEFAULT_API_URL)?,
            },
        };

        let commands = self.commands.unwrap_or_default();
        if let Some(intent) = commands.find_empty_trigger() {
            return Err(ConfigError::EmptyTrigger { intent });
        }

        let moderation = ModerationConfig {
            authorized_user: required_non_empty(
                self.authorized_user,
                "authorized_user",
                "AUTHORIZED_USER",
            )?,
            commands,
            documentation_url: match self.documentation_url {
                Some(url) => url,
                None => default_url(DEFAULT_DOCUMENTATION_URL)?,
            },
        };

        Ok(BotConfig {
            address: self.address.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            port: self.port.unwrap_or(DEFAULT_PORT),
            requests_per_second: self
                .requests_per_second
                .unwrap_or(DEFAULT_REQUESTS_PER_SECOND),
            github,
            moderation,
        })
    }
}

impl BotConfig {
    /// Reads the optional config file, then applies the process environment on top of it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let raw = match path {
            Some(path) => RawConfig::from_file(path)?,
            None => RawConfig::default(),
        };

        raw.merge_env(|key| std::env::var(key).ok())?.validate()
    }
}

fn override_parsed<T, F>(
    field: &mut Option<T>,
    env: &'static str,
    lookup: &F,
) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let value = match lookup(env) {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(()),
    };

    match value.parse() {
        Ok(parsed) => {
            *field = Some(parsed);
            Ok(())
        }
        Err(e) => Err(ConfigError::Malformed {
            env,
            reason: e.to_string(),
            value,
        }),
    }
}

fn required<T>(value: Option<T>, key: &'static str, env: &'static str) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::Missing { key, env })
}

fn required_non_empty(
    value: Option<String>,
    key: &'static str,
    env: &'static str,
) -> Result<String, ConfigError> {
    let value = required(value, key, env)?;
    if value.is_empty() {
        return Err(ConfigError::Empty { key });
    }

    Ok(value)
}

fn default_url(url: &'static str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|e| ConfigError::Malformed {
        env: "default",
        value: url.to_owned(),
        reason: e.to_string(),
    })
}
