use serde::{Deserialize, Serialize};

/// Bot configuration file (YAML).
///
/// Example `bot.yaml`:
/// ```yaml
/// service-id: solo-bot
/// lease-duration-secs: 60
/// wait-for-lease: true
/// max-wait-secs: 120
/// lease-store-url: http://10.0.0.5:7070
/// data-dir: /var/lib/solo/bot
/// whatsapp-number: "+972501234567"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfigFile {
    #[serde(default, alias = "service-id")]
    pub service_id: Option<String>,
    #[serde(default, alias = "instance-id")]
    pub instance_id: Option<String>,
    #[serde(default, alias = "lease-duration-secs")]
    pub lease_duration_secs: Option<u64>,
    #[serde(default, alias = "wait-for-lease")]
    pub wait_for_lease: Option<bool>,
    #[serde(default, alias = "max-wait-secs")]
    pub max_wait_secs: Option<u64>,
    #[serde(default, alias = "lease-store-url")]
    pub lease_store_url: Option<String>,
    #[serde(default, alias = "lease-store-token")]
    pub lease_store_token: Option<String>,
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default, alias = "whatsapp-number")]
    pub whatsapp_number: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Lease server configuration file (YAML).
///
/// Example `leased.yaml`:
/// ```yaml
/// port: 7070
/// data-dir: /var/lib/solo/leases
/// token: my-secret-token
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeasedConfigFile {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
