use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// MiChat chat server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "michat-server", version, about = "MiChat real-time chat server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "MICHAT_PORT", default_value = "8000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "MICHAT_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./michat.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "MICHAT_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, JWT key)
    #[arg(long, env = "MICHAT_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Admin account username (seeded on first boot, reserved thereafter)
    #[arg(long, env = "MICHAT_ADMIN_USERNAME", default_value = "admin")]
    pub admin_username: String,

    /// Admin account password (used only when seeding the account)
    #[arg(long, env = "MICHAT_ADMIN_PASSWORD", default_value = "admin")]
    pub admin_password: String,

    /// Admin display color
    #[arg(long, env = "MICHAT_ADMIN_COLOR", default_value = "#ff0000")]
    pub admin_color: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
            config: "./michat.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            admin_color: "#ff0000".to_string(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (MICHAT_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("MICHAT_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r##"# MiChat Server Configuration
# Place this file at ./michat.toml or specify with --config <path>
# All settings can be overridden via environment variables (MICHAT_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8000)
# port = 8000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for SQLite database and JWT signing key
# data_dir = "./data"

# Admin account seeded on first boot. The username stays reserved:
# nobody can register it.
# admin_username = "admin"
# admin_password = "admin"
# admin_color = "#ff0000"
"##
    .to_string()
}
