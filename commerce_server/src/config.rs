use std::env;

use chrono::Duration;
use commerce_common::{parse_boolean_flag, Secret};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8360;
const DEFAULT_INTENT_TTL_MINUTES: i64 = 15;
const DEFAULT_ZOMBIE_THRESHOLD_MINUTES: i64 = 30;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// How long a payment intent stays confirmable before the expiry sweep fails it.
    pub intent_ttl: Duration,
    /// How old a pending, intent-less online order must be before the zombie sweep
    /// cancels it.
    pub zombie_threshold: Duration,
    /// Seconds between sweep worker runs.
    pub sweep_interval_secs: u64,
    /// Shared key for the admin routes, sent as `x-api-key`. Empty disables the admin
    /// surface entirely.
    pub admin_api_key: Secret<String>,
    /// HMAC secret for payment webhook signatures.
    pub webhook_secret: Secret<String>,
    /// When false, webhook signatures are not checked. **DANGER**: only for local testing.
    pub verify_webhook_signatures: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_url: String::default(),
            intent_ttl: Duration::minutes(DEFAULT_INTENT_TTL_MINUTES),
            zombie_threshold: Duration::minutes(DEFAULT_ZOMBIE_THRESHOLD_MINUTES),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            admin_api_key: Secret::default(),
            webhook_secret: Secret::default(),
            verify_webhook_signatures: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = ServerConfig::default();
        let intent_ttl = env_minutes("COMMERCE_INTENT_TTL_MINUTES").unwrap_or(defaults.intent_ttl);
        let zombie_threshold =
            env_minutes("COMMERCE_ZOMBIE_THRESHOLD_MINUTES").unwrap_or(defaults.zombie_threshold);
        Self {
            host: env::var("COMMERCE_HOST").unwrap_or(defaults.host),
            port: env::var("COMMERCE_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(defaults.port),
            database_url: env::var("COMMERCE_DATABASE_URL").unwrap_or(defaults.database_url),
            intent_ttl,
            zombie_threshold,
            sweep_interval_secs: env::var("COMMERCE_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_interval_secs),
            admin_api_key: Secret::new(env::var("COMMERCE_ADMIN_API_KEY").unwrap_or_default()),
            webhook_secret: Secret::new(env::var("COMMERCE_WEBHOOK_SECRET").unwrap_or_default()),
            verify_webhook_signatures: parse_boolean_flag(
                env::var("COMMERCE_VERIFY_WEBHOOK_SIGNATURES").ok(),
                defaults.verify_webhook_signatures,
            ),
        }
    }
}

fn env_minutes(key: &str) -> Option<Duration> {
    env::var(key).ok().and_then(|v| v.parse::<i64>().ok()).map(Duration::minutes)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8360);
        assert_eq!(config.intent_ttl, Duration::minutes(15));
        assert_eq!(config.zombie_threshold, Duration::minutes(30));
        assert!(config.verify_webhook_signatures);
    }

    #[test]
    fn secrets_do_not_leak_via_debug() {
        let mut config = ServerConfig::default();
        config.admin_api_key = Secret::new("super-secret".to_string());
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret"));
    }
}
