//! Argumentos de linha de comando.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Caminho padrão do arquivo de configuração.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/graphite_sender.toml";

/// Envia temperaturas 1-wire e estatísticas Wi-Fi para o Graphite.
#[derive(Debug, Parser)]
#[command(name = "graphite_sender", version, about)]
pub struct Cli {
    /// Caminho do config.toml
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Saída detalhada; repita (-vv) para debug
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Escreve um exemplo de configuração no STDOUT e sai
    #[arg(long)]
    pub example_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Envia as temperaturas 1-wire uma vez para o Home Assistant e sai (cron)
    Hass {
        /// URL base do Home Assistant, ex: http://hostname:8123
        #[arg(short, long)]
        url: String,

        /// Long-Lived Access Token
        #[arg(short, long, env = "HASS_TOKEN")]
        token: Option<String>,
    },
}

impl Cli {
    /// Diretiva de log vinda de `-v`, se houver.
    pub fn log_directive(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("info"),
            _ => Some("debug"),
        }
    }
}
