//! Push das temperaturas 1-wire para o Home Assistant (API REST de estados).
//!
//! Roda uma vez e sai; pensado para cron.

use graphite_core::Sample;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info};

/// Leitura de power-on reset do DS18B20 (85 °C), nunca é real.
const POWER_ON_RESET_F: f64 = 185.0;

#[derive(Debug, thiserror::Error)]
pub enum HassError {
    #[error("Erro HTTP: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Serialize, PartialEq)]
struct HassAttributes {
    unit_of_measurement: &'static str,
    friendly_name: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct HassState {
    state: f64,
    attributes: HassAttributes,
}

/// Primeira letra maiúscula, resto minúsculo.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub struct HassSender {
    base_url: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HassSender {
    pub fn new(url: &str, token: Option<String>) -> Result<Self, HassError> {
        let mut base_url = url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url,
            token,
            client,
        })
    }

    /// URL e corpo do POST para um sensor.
    fn request_for(&self, name: &str, temp_f: f64) -> (String, HassState) {
        let url = format!(
            "{}api/states/sensor.graphite_sender_1wire_{name}",
            self.base_url
        );
        let body = HassState {
            state: (temp_f * 100.0).round() / 100.0,
            attributes: HassAttributes {
                unit_of_measurement: "°F",
                friendly_name: format!("{} Temperature", capitalize(name)),
            },
        };
        (url, body)
    }

    fn post(&self, name: &str, temp_f: f64) -> Result<(), HassError> {
        let (url, body) = self.request_for(name, temp_f);
        info!("POST para {url} - {body:?}");

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send()?;
        info!("Resposta do servidor: {}", response.status());
        response.error_for_status()?;
        Ok(())
    }

    /// Envia todas as amostras `<nome>.temp_f`. Para no primeiro erro HTTP.
    pub fn send(&self, samples: &[Sample]) -> Result<usize, HassError> {
        debug!("Resultado do polling: {samples:?}");
        let mut sent = 0;
        for (name, temp_f) in fahrenheit_readings(samples) {
            self.post(name, temp_f)?;
            sent += 1;
        }
        info!("{sent} sensor(es) enviados ao Home Assistant");
        Ok(sent)
    }
}

/// Pares `(nome, °F)` que devem ir para o Home Assistant.
fn fahrenheit_readings(samples: &[Sample]) -> Vec<(&str, f64)> {
    samples
        .iter()
        .filter_map(|s| {
            let name = s.name.strip_suffix(".temp_f")?;
            if s.value == POWER_ON_RESET_F {
                error!("Temperatura errônea de 185.0 F em {name}; ignorando");
                return None;
            }
            Some((name, s.value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_like_a_title() {
        assert_eq!(capitalize("porch"), "Porch");
        assert_eq!(capitalize("tEMPa"), "Tempa");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn only_fahrenheit_readings_are_pushed() {
        let samples = vec![
            Sample::new("porch.temp_c", 22.5, 1),
            Sample::new("porch.temp_f", 72.5, 1),
            Sample::new("attic.temp_f", 185.0, 1),
            Sample::new("wlan0.quality", 70.0, 1),
        ];
        assert_eq!(fahrenheit_readings(&samples), vec![("porch", 72.5)]);
    }

    #[test]
    fn request_shape() {
        let sender = HassSender::new("http://ha:8123", Some("t".into())).unwrap();
        let (url, body) = sender.request_for("porch", 72.456);
        assert_eq!(url, "http://ha:8123/api/states/sensor.graphite_sender_1wire_porch");
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "state": 72.46,
                "attributes": {
                    "unit_of_measurement": "°F",
                    "friendly_name": "Porch Temperature"
                }
            })
        );
    }
}
