mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, ServerSettings, Settings};

#[cfg(test)]
mod tests;

/// Prefix of the environment variables read by [`load_config`], e.g.
/// `POPBRIDGE_BROKER__ENDPOINT`.
pub const ENV_PREFIX: &str = "POPBRIDGE";

/// Loads the configuration from the default file and environment variables
/// and merges it with default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let server = partial.server;
    let broker = partial.broker;

    Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
        },
        broker: BrokerSettings {
            endpoint: broker
                .as_ref()
                .and_then(|b| b.endpoint.clone())
                .or(default.broker.endpoint),
            group_id: broker
                .as_ref()
                .and_then(|b| b.group_id.clone())
                .unwrap_or(default.broker.group_id),
            session_timeout_ms: broker
                .as_ref()
                .and_then(|b| b.session_timeout_ms)
                .unwrap_or(default.broker.session_timeout_ms),
            send_timeout_ms: broker
                .as_ref()
                .and_then(|b| b.send_timeout_ms)
                .unwrap_or(default.broker.send_timeout_ms),
            partition: broker
                .as_ref()
                .and_then(|b| b.partition)
                .unwrap_or(default.broker.partition),
            username: broker
                .as_ref()
                .and_then(|b| b.username.clone())
                .or(default.broker.username),
            password: broker
                .as_ref()
                .and_then(|b| b.password.clone())
                .or(default.broker.password),
        },
    }
}
