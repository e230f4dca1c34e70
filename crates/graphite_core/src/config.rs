//! Configuração unificada via TOML.
//!
//! ```toml
//! [graphite]
//! host = "127.0.0.1"
//! port = 2003
//! metric_prefix = "graphite_sender.%HOSTNAME%"
//!
//! [sender]
//! polling_interval_secs = 60
//!
//! [sensor_names]
//! "28-0008010ff558" = "tempA"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Placeholder substituído pelo hostname no prefixo.
pub const HOSTNAME_PLACEHOLDER: &str = "%HOSTNAME%";

/// Níveis aceitos em `logging_level`.
pub const LOGGING_LEVELS: [&str; 6] = ["CRITICAL", "ERROR", "WARNING", "INFO", "DEBUG", "NOTSET"];

/// Erros de configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao ler {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuração inválida em {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Erro ao serializar configuração: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Erro ao gravar {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destino Graphite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphiteConfig {
    /// Hostname ou IP do carbon
    pub host: String,
    /// Porta plaintext
    pub port: u16,
    /// Prefixo de todas as métricas; `%HOSTNAME%` vira o hostname
    pub metric_prefix: String,
    /// Timeout de conexão/envio (segundos)
    pub timeout_secs: u64,
}

impl Default for GraphiteConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: crate::protocol::DEFAULT_PORT,
            metric_prefix: format!("graphite_sender.{HOSTNAME_PLACEHOLDER}"),
            timeout_secs: crate::transport::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Configuração do loop de coleta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SenderConfig {
    /// Intervalo de polling em segundos
    pub polling_interval_secs: u64,
    /// Enviar estatísticas das interfaces Wi-Fi
    pub send_wifi_metrics: bool,
    /// Enviar temperaturas dos componentes do host (sysinfo)
    pub send_system_temps: bool,
    /// Diretório do cache de lotes não entregues
    pub cache_dir: PathBuf,
    /// Nível de log quando nenhum `-v` é passado
    pub logging_level: String,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            polling_interval_secs: 60,
            send_wifi_metrics: true,
            send_system_temps: false,
            cache_dir: PathBuf::from("/var/lib/graphite_sender"),
            logging_level: "INFO".into(),
        }
    }
}

/// Configuração raiz.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub graphite: GraphiteConfig,
    pub sender: SenderConfig,
    /// Endereço do sensor 1-wire → nome amigável usado na métrica
    pub sensor_names: BTreeMap<String, String>,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    ///
    /// Arquivo inexistente resulta na configuração padrão; arquivo ilegível ou
    /// com chaves desconhecidas é erro.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("{} não existe, usando configuração padrão", path.display());
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str::<AppConfig>(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Configuração carregada de {}", path.display());
        Ok(config)
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.graphite.host.trim().is_empty() {
            errors.push("graphite.host não pode ser vazio".into());
        }
        if self.graphite.port == 0 {
            errors.push("graphite.port não pode ser 0".into());
        }
        if self.graphite.timeout_secs == 0 {
            errors.push("graphite.timeout_secs não pode ser 0".into());
        }
        if self.sender.polling_interval_secs == 0 {
            errors.push("sender.polling_interval_secs não pode ser 0".into());
        }
        if !LOGGING_LEVELS.contains(&self.sender.logging_level.as_str()) {
            errors.push(format!(
                "sender.logging_level inválido: {} (um de {:?})",
                self.sender.logging_level, LOGGING_LEVELS
            ));
        }
        for (id, name) in &self.sensor_names {
            if name.is_empty() || name.contains(char::is_whitespace) {
                errors.push(format!("sensor_names.{id}: nome inválido {name:?}"));
            }
        }

        debug!("Validação concluída com {} erro(s)", errors.len());
        errors
    }

    /// Prefixo efetivo, com `%HOSTNAME%` substituído.
    ///
    /// Pontos do hostname viram `_` para não criar níveis extras no Graphite.
    pub fn metric_prefix(&self, hostname: &str) -> String {
        self.graphite
            .metric_prefix
            .replace(HOSTNAME_PLACEHOLDER, &hostname.replace('.', "_"))
    }

    /// Nome da métrica para um sensor 1-wire (ou o próprio id, se não mapeado).
    pub fn metric_name_for_sensor<'a>(&'a self, sensor_id: &'a str) -> &'a str {
        self.sensor_names
            .get(sensor_id)
            .map(String::as_str)
            .unwrap_or(sensor_id)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.sender.polling_interval_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.graphite.timeout_secs)
    }

    /// Diretiva de filtro do `tracing` para `logging_level`.
    pub fn log_directive(&self) -> &'static str {
        match self.sender.logging_level.as_str() {
            "CRITICAL" | "ERROR" => "error",
            "WARNING" => "warn",
            "DEBUG" => "debug",
            "NOTSET" => "trace",
            _ => "info",
        }
    }

    /// Exemplo de configuração (TOML) e sua documentação.
    pub fn example_config() -> Result<(String, &'static str), ConfigError> {
        let mut example = AppConfig::default();
        example
            .sensor_names
            .insert("28-0008010ff558".into(), "tempA".into());
        example
            .sensor_names
            .insert("28-0008010ff563".into(), "tempB".into());
        Ok((toml::to_string_pretty(&example)?, EXAMPLE_DOCS))
    }
}

const EXAMPLE_DOCS: &str = "\
Descrição da configuração:

[graphite] - servidor Graphite:
  host           - (string) hostname do carbon
  port           - (int) porta plaintext
  metric_prefix  - (string) prefixo de todas as métricas. \"%HOSTNAME%\" é
                   substituído pelo hostname atual.
  timeout_secs   - (int) timeout de conexão e envio

[sender] - loop de coleta:
  polling_interval_secs - (int) intervalo de polling em segundos
  send_wifi_metrics     - (bool) enviar estatísticas Wi-Fi
  send_system_temps     - (bool) enviar temperaturas do host
  cache_dir             - (string) diretório dos lotes não entregues
  logging_level         - CRITICAL, ERROR, WARNING, INFO, DEBUG ou NOTSET

[sensor_names] - endereço do sensor (diretório em /sys/bus/w1/devices/) para
  o nome usado nas métricas no lugar do endereço.
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn default_timeout_matches_transport() {
        let config = AppConfig::default();
        assert_eq!(config.send_timeout(), crate::transport::DEFAULT_TIMEOUT);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[graphite]
host = "graphite.lan"

[sensor_names]
"28-abc" = "porch"
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.graphite.host, "graphite.lan");
        assert_eq!(config.graphite.port, 2003);
        assert_eq!(config.sender.polling_interval_secs, 60);
        assert_eq!(config.metric_name_for_sensor("28-abc"), "porch");
        assert_eq!(config.metric_name_for_sensor("28-def"), "28-def");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let bad = r#"
[graphite]
hots = "typo"
"#;
        assert!(toml::from_str::<AppConfig>(bad).is_err());
    }

    #[test]
    fn hostname_placeholder_is_replaced() {
        let config = AppConfig::default();
        assert_eq!(
            config.metric_prefix("raspberrypi.local"),
            "graphite_sender.raspberrypi_local"
        );
    }

    #[test]
    fn invalid_logging_level_is_reported() {
        let mut config = AppConfig::default();
        config.sender.logging_level = "VERBOSE".into();
        config.graphite.port = 0;
        let errors = config.validate();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn log_directive_mapping() {
        let mut config = AppConfig::default();
        assert_eq!(config.log_directive(), "info");
        config.sender.logging_level = "WARNING".into();
        assert_eq!(config.log_directive(), "warn");
        config.sender.logging_level = "CRITICAL".into();
        assert_eq!(config.log_directive(), "error");
    }

    #[test]
    fn example_config_parses_back() {
        let (example, docs) = AppConfig::example_config().unwrap();
        let parsed: AppConfig = toml::from_str(&example).unwrap();
        assert_eq!(parsed.sensor_names.len(), 2);
        assert!(docs.contains("metric_prefix"));
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.graphite.port, 2003);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.graphite.port = 2013;
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.graphite.port, 2013);
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[graphite]\nport = \"abc\"\n").unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
