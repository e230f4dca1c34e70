//! Sensores de temperatura 1-wire (DS18B20 e família) via sysfs.
//!
//! O driver `w1_therm` expõe cada sensor em `/sys/bus/w1/devices/<id>/w1_slave`:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```

use graphite_core::{AppConfig, Sample};
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Diretório padrão dos dispositivos 1-wire.
pub const W1_DEVICES_DIR: &str = "/sys/bus/w1/devices";

/// Famílias de sensores de temperatura suportadas pelo `w1_therm`.
const THERM_FAMILIES: [&str; 5] = ["10", "22", "28", "3b", "42"];

#[derive(Debug, thiserror::Error)]
pub enum OneWireError {
    #[error("Erro ao ler {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CRC inválido na leitura do sensor")]
    CrcFailed,

    #[error("Leitura sem campo t=")]
    MissingTemperature,

    #[error("Temperatura inválida: {0}")]
    BadTemperature(String),
}

/// Extrai a temperatura (°C) do conteúdo de `w1_slave`.
pub fn parse_w1_slave(content: &str) -> Result<f64, OneWireError> {
    let mut lines = content.lines();
    let crc_line = lines.next().unwrap_or_default();
    if !crc_line.trim_end().ends_with("YES") {
        return Err(OneWireError::CrcFailed);
    }

    let data_line = lines.next().ok_or(OneWireError::MissingTemperature)?;
    let (_, raw) = data_line
        .split_once("t=")
        .ok_or(OneWireError::MissingTemperature)?;
    let millis: i64 = raw
        .trim()
        .parse()
        .map_err(|_| OneWireError::BadTemperature(raw.trim().to_string()))?;
    Ok(millis as f64 / 1000.0)
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    ((c * 9.0 / 5.0 + 32.0) * 1000.0).round() / 1000.0
}

/// Coletor de todos os sensores 1-wire de temperatura.
pub struct OneWireCollector {
    devices_dir: PathBuf,
    /// Fonte do mapeamento endereço → nome da métrica
    config: AppConfig,
}

impl OneWireCollector {
    pub fn new(devices_dir: impl Into<PathBuf>, config: &AppConfig) -> Self {
        Self {
            devices_dir: devices_dir.into(),
            config: config.clone(),
        }
    }

    /// IDs dos sensores de temperatura presentes, ordenados.
    fn available_sensors(&self) -> std::io::Result<Vec<String>> {
        let mut ids: Vec<String> = std::fs::read_dir(&self.devices_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| {
                name.split_once('-')
                    .is_some_and(|(family, _)| THERM_FAMILIES.contains(&family))
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn read_sensor(&self, id: &str) -> Result<f64, OneWireError> {
        let path = self.devices_dir.join(id).join("w1_slave");
        let content =
            std::fs::read_to_string(&path).map_err(|source| OneWireError::Io { path, source })?;
        parse_w1_slave(&content)
    }

    /// Lê todos os sensores. Falhas individuais são logadas e puladas.
    pub fn poll(&self, ts: i64) -> Vec<Sample> {
        info!("Lendo sensores 1-wire");
        let sensors = match self.available_sensors() {
            Ok(s) => s,
            Err(e) => {
                error!("Não foi possível listar sensores em {}: {e}", self.devices_dir.display());
                return Vec::new();
            }
        };

        let mut samples = Vec::with_capacity(sensors.len() * 2);
        for id in &sensors {
            let name = self.config.metric_name_for_sensor(id);
            match self.read_sensor(id) {
                Ok(celsius) => {
                    debug!("Sensor {id} ({name}): {celsius}°C");
                    samples.push(Sample::new(format!("{name}.temp_c"), celsius, ts));
                    samples.push(Sample::new(
                        format!("{name}.temp_f"),
                        celsius_to_fahrenheit(celsius),
                        ts,
                    ));
                }
                Err(e) => error!("Erro lendo sensor {id}: {e}"),
            }
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const GOOD: &str = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n\
                        72 01 4b 46 7f ff 0e 10 57 t=22500\n";

    fn fake_sensor(dir: &Path, id: &str, content: &str) {
        let sensor = dir.join(id);
        std::fs::create_dir_all(&sensor).unwrap();
        std::fs::write(sensor.join("w1_slave"), content).unwrap();
    }

    #[test]
    fn parses_valid_reading() {
        assert_eq!(parse_w1_slave(GOOD).unwrap(), 22.5);
    }

    #[test]
    fn parses_negative_reading() {
        let content = "ff ff : crc=aa YES\nff ff t=-1062\n";
        assert_eq!(parse_w1_slave(content).unwrap(), -1.062);
    }

    #[test]
    fn rejects_bad_crc() {
        let content = "72 01 : crc=57 NO\n72 01 t=22500\n";
        assert!(matches!(parse_w1_slave(content), Err(OneWireError::CrcFailed)));
    }

    #[test]
    fn rejects_missing_temperature() {
        let content = "72 01 : crc=57 YES\n";
        assert!(matches!(
            parse_w1_slave(content),
            Err(OneWireError::MissingTemperature)
        ));
    }

    #[test]
    fn fahrenheit_conversion() {
        assert_eq!(celsius_to_fahrenheit(22.5), 72.5);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
        assert_eq!(celsius_to_fahrenheit(85.0), 185.0);
    }

    #[test]
    fn poll_maps_names_and_skips_broken_sensors() {
        let tmp = tempfile::tempdir().unwrap();
        fake_sensor(tmp.path(), "28-0008010ff558", GOOD);
        fake_sensor(tmp.path(), "28-0008010ff563", "garbage\n");
        // Master do barramento, não é sensor
        std::fs::create_dir_all(tmp.path().join("w1_bus_master1")).unwrap();

        let mut config = AppConfig::default();
        config
            .sensor_names
            .insert("28-0008010ff558".to_string(), "tempA".to_string());
        let collector = OneWireCollector::new(tmp.path(), &config);

        let samples = collector.poll(1000);
        assert_eq!(
            samples,
            vec![
                Sample::new("tempA.temp_c", 22.5, 1000),
                Sample::new("tempA.temp_f", 72.5, 1000),
            ]
        );
    }

    #[test]
    fn unmapped_sensor_uses_device_id() {
        let tmp = tempfile::tempdir().unwrap();
        fake_sensor(tmp.path(), "10-000801", GOOD);
        let collector = OneWireCollector::new(tmp.path(), &AppConfig::default());
        let samples = collector.poll(5);
        assert_eq!(samples[0].name, "10-000801.temp_c");
    }

    #[test]
    fn missing_bus_yields_empty_batch() {
        let collector = OneWireCollector::new("/nonexistent/w1", &AppConfig::default());
        assert!(collector.poll(1).is_empty());
    }
}
