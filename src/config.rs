//! Worker, IMAP and SMTP configuration
//!
//! The worker itself is configured from the environment. IMAP and SMTP
//! settings normally travel inside each request; the IMAP settings fall
//! back to the environment when a request carries none.

use crate::arguments::Arguments;
use crate::error::{Error, OperationError, Result};
use std::env;
use std::fmt;

/// How the IMAP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImapSecurity {
    /// TLS from the first byte (port 993).
    Tls,
    /// Plain connection upgraded with `STARTTLS` (port 143, local bridges).
    StartTls,
}

impl ImapSecurity {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "tls" | "ssl" | "implicit" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            other => Err(Error::Config(format!("Invalid IMAP_SECURITY: {other}"))),
        }
    }
}

/// IMAP connection settings for one mailbox account.
#[derive(Clone, PartialEq, Eq)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub security: ImapSecurity,
}

impl fmt::Debug for ImapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("security", &self.security)
            .finish()
    }
}

impl ImapConfig {
    /// Load IMAP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_HOST` (default: `127.0.0.1`)
    /// - `IMAP_PORT` (default: `993`)
    /// - `IMAP_SECURITY` (`tls` or `starttls`, default: `tls`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: env::var("IMAP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("IMAP_PORT")
                .unwrap_or_else(|_| "993".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?,
            username: env::var("IMAP_USERNAME")
                .map_err(|_| Error::Config("IMAP_USERNAME not set".into()))?,
            password: env::var("IMAP_PASSWORD")
                .map_err(|_| Error::Config("IMAP_PASSWORD not set".into()))?,
            security: env::var("IMAP_SECURITY")
                .map_or(Ok(ImapSecurity::Tls), |v| ImapSecurity::parse(&v))?,
        })
    }

    /// Build the settings for one request.
    ///
    /// Request keys are `imap_hostname`, `imap_username`,
    /// `imap_password`, `imap_port` (993) and `imap_use_ssl` (true;
    /// false selects STARTTLS). A request without `imap_hostname` uses
    /// `fallback`.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the missing keys when neither
    /// the request nor the fallback provide an account.
    pub fn from_arguments(
        args: &Arguments,
        fallback: Option<&Self>,
    ) -> std::result::Result<Self, OperationError> {
        if !args.contains("imap_hostname") {
            if let Some(config) = fallback {
                return Ok(config.clone());
            }
        }
        args.require(&["imap_hostname", "imap_username", "imap_password"])?;

        let port = args.u32("imap_port")?.unwrap_or(993);
        let port = u16::try_from(port).map_err(|_| {
            OperationError::Validation(format!("\"imap_port\" out of range: {port}"))
        })?;
        let security = if args.bool_or("imap_use_ssl", true)? {
            ImapSecurity::Tls
        } else {
            ImapSecurity::StartTls
        };

        Ok(Self {
            host: args.required_string("imap_hostname")?,
            port,
            username: args.required_string("imap_username")?,
            password: args.required_string("imap_password")?,
            security,
        })
    }
}

/// SMTP submission settings.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Implicit TLS when set, STARTTLS otherwise.
    pub use_ssl: bool,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .finish()
    }
}

impl SmtpConfig {
    /// Read SMTP settings from a request.
    ///
    /// Keys may sit at the top level or inside a `smtp_config` object,
    /// which wins. `smtp_server` and `smtp_user` are accepted in place
    /// of `smtp_host` and `smtp_username`.
    ///
    /// # Errors
    ///
    /// Returns `Missing SMTP connection parameters.` when host, port,
    /// username or password is absent.
    pub fn from_arguments(args: &Arguments) -> std::result::Result<Self, OperationError> {
        let nested = args.object("smtp_config")?;
        let lookup = |keys: &[&str]| -> std::result::Result<Option<String>, OperationError> {
            for source in nested.iter().chain(std::iter::once(args)) {
                for key in keys {
                    if let Some(value) = source.string(key)? {
                        if !value.is_empty() {
                            return Ok(Some(value));
                        }
                    }
                }
            }
            Ok(None)
        };

        let missing = || OperationError::Validation("Missing SMTP connection parameters.".into());
        let host = lookup(&["smtp_host", "smtp_server"])?.ok_or_else(missing)?;
        let port = lookup(&["smtp_port"])?
            .ok_or_else(missing)?
            .trim()
            .parse::<u16>()
            .map_err(|e| OperationError::Validation(format!("\"smtp_port\" is invalid: {e}")))?;
        let username = lookup(&["smtp_username", "smtp_user"])?.ok_or_else(missing)?;
        let password = lookup(&["smtp_password"])?.ok_or_else(missing)?;
        let use_ssl = match &nested {
            Some(inner) if inner.contains("use_ssl") => inner.bool_or("use_ssl", false)?,
            _ => args.bool_or("use_ssl", false)?,
        };

        Ok(Self {
            host,
            port,
            username,
            password,
            use_ssl,
        })
    }
}

/// Settings of the worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub amqp_url: String,
    pub queue: String,
    /// Number of consumer channels, each with prefetch 1.
    pub workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            amqp_url: "amqp://127.0.0.1:5672/%2f".to_string(),
            queue: "mail_rpc_queue".to_string(),
            workers: 1,
        }
    }
}

impl WorkerConfig {
    /// Load worker configuration from environment variables
    ///
    /// Reads from `.env` file if present. All optional:
    /// - `AMQP_URL` (default: `amqp://127.0.0.1:5672/%2f`)
    /// - `RPC_QUEUE` (default: `mail_rpc_queue`)
    /// - `RPC_WORKERS` (default: `1`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `RPC_WORKERS` is not a positive
    /// integer.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let workers = match env::var("RPC_WORKERS") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|e| Error::Config(format!("Invalid RPC_WORKERS: {e}")))?,
            Err(_) => defaults.workers,
        };
        if workers == 0 {
            return Err(Error::Config("RPC_WORKERS must be at least 1".into()));
        }

        Ok(Self {
            amqp_url: env::var("AMQP_URL").unwrap_or(defaults.amqp_url),
            queue: env::var("RPC_QUEUE").unwrap_or(defaults.queue),
            workers,
        })
    }
}
