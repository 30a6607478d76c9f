use clap::Parser;
use clap::builder::BoolishValueParser;
use pkg_constants::bot::DEFAULT_WHATSAPP_NUMBER;
use pkg_constants::env;
use pkg_constants::lease::{DEFAULT_LEASE_DURATION_SECS, DEFAULT_SERVICE_ID};
use pkg_constants::network::DEFAULT_HEALTH_PORT;
use pkg_constants::paths::{DEFAULT_BOT_CONFIG, DEFAULT_BOT_DATA_DIR};
use pkg_leader::WaitPolicy;
use pkg_types::config::BotConfigFile;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "solo-bot", about = "Chat bot that runs as a single leader across instances")]
pub struct Cli {
    /// Path to YAML config file
    #[arg(long, short, env = env::CONFIG_PATH, default_value = DEFAULT_BOT_CONFIG)]
    pub config: String,

    /// Logical service identity (the lease id)
    #[arg(long, env = env::SERVICE_ID)]
    pub service_id: Option<String>,

    /// Explicit instance id; falls back to the platform id, then hostname:pid
    #[arg(long, env = env::INSTANCE_ID)]
    pub instance_id: Option<String>,

    /// Lease duration in seconds
    #[arg(long, env = env::LEASE_DURATION_SECS)]
    pub lease_duration_secs: Option<u64>,

    /// Wait for the lease instead of exiting when another instance holds it
    #[arg(long, env = env::WAIT_FOR_LEASE, value_parser = BoolishValueParser::new())]
    pub wait_for_lease: Option<bool>,

    /// Upper bound on the wait, in seconds (0 = forever)
    #[arg(long, env = env::MAX_WAIT_SECS)]
    pub max_wait_secs: Option<u64>,

    /// Base URL of the lease server
    #[arg(long, env = env::LEASE_STORE_URL)]
    pub lease_store_url: Option<String>,

    #[arg(long, env = env::LEASE_STORE_TOKEN, hide_env_values = true)]
    pub lease_store_token: Option<String>,

    /// Chat API token
    #[arg(long, env = env::BOT_TOKEN, hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Chat that receives contact requests and may ask for /stats
    #[arg(long, env = env::OWNER_CHAT_ID)]
    pub owner_chat_id: Option<i64>,

    #[arg(long, env = env::WHATSAPP_NUMBER)]
    pub whatsapp_number: Option<String>,

    /// Directory for the activity store
    #[arg(long, env = env::BOT_DATA_DIR)]
    pub data_dir: Option<String>,

    /// Health server port
    #[arg(long, env = env::PORT)]
    pub port: Option<u16>,

    /// `text` or `json`
    #[arg(long, env = env::LOG_FORMAT, default_value = "text")]
    pub log_format: String,
}

/// Effective bot settings after merging CLI/env > config file > defaults.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub service_id: String,
    pub instance_id: Option<String>,
    pub lease_duration: Duration,
    pub wait: WaitPolicy,
    pub lease_store_url: Option<String>,
    pub lease_store_token: Option<String>,
    pub bot_token: Option<String>,
    pub owner_chat_id: Option<i64>,
    pub whatsapp_number: String,
    pub data_dir: String,
    pub port: u16,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl BotSettings {
    pub fn merge(cli: Cli, file: BotConfigFile) -> Self {
        let wait = cli.wait_for_lease.or(file.wait_for_lease).unwrap_or(false);
        let max_wait_secs = cli.max_wait_secs.or(file.max_wait_secs).unwrap_or(0);
        let lease_secs = cli
            .lease_duration_secs
            .or(file.lease_duration_secs)
            .unwrap_or(DEFAULT_LEASE_DURATION_SECS);

        Self {
            service_id: non_blank(cli.service_id)
                .or(non_blank(file.service_id))
                .unwrap_or_else(|| DEFAULT_SERVICE_ID.to_string()),
            instance_id: non_blank(cli.instance_id).or(non_blank(file.instance_id)),
            lease_duration: Duration::from_secs(lease_secs),
            wait: WaitPolicy::from_flags(wait, max_wait_secs),
            lease_store_url: non_blank(cli.lease_store_url).or(non_blank(file.lease_store_url)),
            lease_store_token: non_blank(cli.lease_store_token)
                .or(non_blank(file.lease_store_token)),
            bot_token: non_blank(cli.bot_token),
            owner_chat_id: cli.owner_chat_id,
            whatsapp_number: non_blank(cli.whatsapp_number)
                .or(non_blank(file.whatsapp_number))
                .unwrap_or_else(|| DEFAULT_WHATSAPP_NUMBER.to_string()),
            data_dir: non_blank(cli.data_dir)
                .or(non_blank(file.data_dir))
                .unwrap_or_else(|| DEFAULT_BOT_DATA_DIR.to_string()),
            port: cli.port.or(file.port).unwrap_or(DEFAULT_HEALTH_PORT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["solo-bot"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_beats_file() {
        let file: BotConfigFile = serde_yaml::from_str(
            "service-id: from-file\nlease-duration-secs: 30\ndata-dir: /srv/bot\n",
        )
        .unwrap();
        let cli = parse(&["--service-id", "from-cli", "--lease-duration-secs", "9"]);

        let settings = BotSettings::merge(cli, file);
        assert_eq!(settings.service_id, "from-cli");
        assert_eq!(settings.lease_duration, Duration::from_secs(9));
        assert_eq!(settings.data_dir, "/srv/bot");
    }

    #[test]
    fn test_wait_flags() {
        let cli = parse(&["--wait-for-lease", "yes", "--max-wait-secs", "120"]);
        let settings = BotSettings::merge(cli, BotConfigFile::default());
        assert_eq!(
            settings.wait,
            WaitPolicy::Blocking {
                max_wait: Some(Duration::from_secs(120))
            }
        );

        let cli = parse(&["--wait-for-lease", "false", "--max-wait-secs", "120"]);
        let settings = BotSettings::merge(cli, BotConfigFile::default());
        assert_eq!(settings.wait, WaitPolicy::NonBlocking);
    }

    #[test]
    fn test_blank_values_fall_through() {
        let file: BotConfigFile = serde_yaml::from_str("service-id: svc-file\n").unwrap();
        let cli = parse(&["--service-id", "  ", "--bot-token", ""]);

        let settings = BotSettings::merge(cli, file);
        assert_eq!(settings.service_id, "svc-file");
        assert!(settings.bot_token.is_none());
    }
}
