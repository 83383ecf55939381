use std::env;

use fdg_common::{parse_boolean_flag, Secret};
use field_dispatch_engine::DispatchConfig;
use log::*;
use processor_tools::ProcessorConfig;

const DEFAULT_FDG_HOST: &str = "127.0.0.1";
const DEFAULT_FDG_PORT: u16 = 8360;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Matching radii for the dispatch engine.
    pub dispatch: DispatchConfig,
    /// The secret used to verify HMAC signatures on incoming payment-event webhooks.
    pub webhook_secret: Secret<String>,
    /// If true, unsigned webhook deliveries are rejected. Only disable this in local testing.
    pub webhook_signature_checks: bool,
    /// Connection details for the external card processor.
    pub processor: ProcessorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FDG_HOST.to_string(),
            port: DEFAULT_FDG_PORT,
            database_url: String::default(),
            dispatch: DispatchConfig::default(),
            webhook_secret: Secret::default(),
            webhook_signature_checks: true,
            processor: ProcessorConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FDG_HOST").ok().unwrap_or_else(|| DEFAULT_FDG_HOST.into());
        let port = env::var("FDG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for FDG_PORT. {e} Using the default, {DEFAULT_FDG_PORT}, instead."
                    );
                    DEFAULT_FDG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_FDG_PORT);
        let database_url = env::var("FDG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ FDG_DATABASE_URL is not set. Please set it to the URL for the dispatch database.");
            String::default()
        });
        let dispatch = configure_dispatch_radii();
        let webhook_secret = env::var("FDG_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ FDG_WEBHOOK_SECRET is not set. Please set it to the signing key the payment processor uses for \
                 webhook deliveries."
            );
            String::default()
        });
        let webhook_secret = Secret::new(webhook_secret);
        let webhook_signature_checks = parse_boolean_flag(env::var("FDG_WEBHOOK_SIGNATURE_CHECKS").ok(), true);
        if !webhook_signature_checks {
            warn!(
                "🚨️ Webhook signature checks are disabled. Anyone who can reach this server can forge payment \
                 events. Do not run production like this."
            );
        }
        let processor = ProcessorConfig::new_from_env_or_default();
        Self { host, port, database_url, dispatch, webhook_secret, webhook_signature_checks, processor }
    }
}

fn configure_dispatch_radii() -> DispatchConfig {
    let defaults = DispatchConfig::default();
    let default_radius_miles = env::var("FDG_DEFAULT_RADIUS_MILES")
        .map_err(|_| {
            info!(
                "🪛️ FDG_DEFAULT_RADIUS_MILES is not set. Using the default value of {} miles.",
                defaults.default_radius_miles
            )
        })
        .and_then(|s| {
            s.parse::<f64>().map_err(|e| warn!("🪛️ Invalid configuration value for FDG_DEFAULT_RADIUS_MILES. {e}"))
        })
        .ok()
        .unwrap_or(defaults.default_radius_miles);
    let expanded_radius_miles = env::var("FDG_EXPANDED_RADIUS_MILES")
        .map_err(|_| {
            info!(
                "🪛️ FDG_EXPANDED_RADIUS_MILES is not set. Using the default value of {} miles.",
                defaults.expanded_radius_miles
            )
        })
        .and_then(|s| {
            s.parse::<f64>().map_err(|e| warn!("🪛️ Invalid configuration value for FDG_EXPANDED_RADIUS_MILES. {e}"))
        })
        .ok()
        .unwrap_or(defaults.expanded_radius_miles);
    if expanded_radius_miles < default_radius_miles {
        warn!(
            "🪛️ The expanded search radius ({expanded_radius_miles} mi) is smaller than the default radius \
             ({default_radius_miles} mi). The fallback search will never find additional providers."
        );
    }
    DispatchConfig { default_radius_miles, expanded_radius_miles }
}
