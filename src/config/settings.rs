use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for both the HTTP server and the broker connection.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
}

/// Configuration settings for the HTTP ingress server.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings for the broker connection.
///
/// `endpoint` has no default: it must come from the configuration file, the
/// environment or the command line.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub endpoint: Option<String>,
    pub group_id: String,
    pub session_timeout_ms: u64,
    pub send_timeout_ms: u64,
    pub partition: u32,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub endpoint: Option<String>,
    pub group_id: Option<String>,
    pub session_timeout_ms: Option<u64>,
    pub send_timeout_ms: Option<u64>,
    pub partition: Option<u32>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl BrokerSettings {
    /// Credentials for the producer handshake, present only when both halves are set.
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 10200,
            },
            broker: BrokerSettings {
                endpoint: None,
                group_id: "RETAIL".to_string(),
                session_timeout_ms: 1000,
                send_timeout_ms: 5000,
                partition: 0,
                username: None,
                password: None,
            },
        }
    }
}
