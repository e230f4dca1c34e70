//! Sensor Monitor – junta as fontes de métricas de um ciclo de polling.
//!
//! - 1-wire (sysfs) — temperaturas das sondas DS18B20
//! - `/proc/net/wireless` — qualidade de link, ruído, descartes (opcional)
//! - `sysinfo` — temperaturas dos componentes do host (opcional)
//!
//! Todas as amostras de um ciclo compartilham o mesmo timestamp.

use crate::onewire::{OneWireCollector, W1_DEVICES_DIR};
use crate::wifi::WifiCollector;
use graphite_core::types::unix_now;
use graphite_core::{AppConfig, Batch, Sample};
use sysinfo::Components;
use tracing::{debug, info};

/// Monitor de sensores principal.
pub struct SensorMonitor {
    onewire: OneWireCollector,
    wifi: Option<WifiCollector>,
    components: Option<Components>,
}

impl SensorMonitor {
    /// Cria o monitor com as fontes habilitadas na configuração.
    pub fn new(config: &AppConfig) -> Self {
        let onewire = OneWireCollector::new(W1_DEVICES_DIR, config);

        let wifi = config.sender.send_wifi_metrics.then(WifiCollector::default);
        if wifi.is_some() {
            info!("✓ Métricas Wi-Fi habilitadas");
        }

        let components = config
            .sender
            .send_system_temps
            .then(Components::new_with_refreshed_list);
        if let Some(c) = &components {
            info!("✓ sysinfo: {} componentes térmicos", c.iter().count());
        }

        Self {
            onewire,
            wifi,
            components,
        }
    }

    /// Faz uma leitura de todas as fontes e retorna o lote do ciclo.
    pub fn collect(&mut self) -> Batch {
        info!("Polling...");
        let ts = unix_now();

        let mut batch = self.onewire.poll(ts);
        if let Some(wifi) = &self.wifi {
            batch.extend(wifi.poll(ts));
        }
        if let Some(components) = &mut self.components {
            components.refresh(true);
            batch.extend(component_temps(components, ts));
        }

        debug!("Ciclo produziu {} amostras", batch.len());
        batch
    }
}

/// Temperaturas do sysinfo como `system.<label>.temp_c`.
fn component_temps(components: &Components, ts: i64) -> Vec<Sample> {
    let mut samples = Vec::new();
    for comp in components.iter() {
        if let Some(t) = comp.temperature() {
            // Leituras absurdas de sensores desconectados
            if t.is_finite() && t > -50.0 && t < 150.0 {
                let label = sanitize_label(comp.label());
                samples.push(Sample::new(format!("system.{label}.temp_c"), t, ts));
            }
        }
    }
    samples
}

/// Converte um rótulo livre num segmento de métrica do Graphite.
fn sanitize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for ch in label.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "unknown".into()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_become_single_segment() {
        assert_eq!(sanitize_label("cpu_thermal temp1"), "cpu_thermal_temp1");
        assert_eq!(sanitize_label("Package id 0"), "package_id_0");
        assert_eq!(sanitize_label("acpitz.temp1"), "acpitz_temp1");
        assert_eq!(sanitize_label("  --  "), "unknown");
    }

    #[test]
    fn collect_with_sources_disabled() {
        let mut config = AppConfig::default();
        config.sender.send_wifi_metrics = false;
        config.sender.send_system_temps = false;
        let mut monitor = SensorMonitor::new(&config);
        // Sem 1-wire no ambiente de teste: lote vazio ou só sensores reais
        let batch = monitor.collect();
        assert!(batch.iter().all(|s| s.name.ends_with(".temp_c") || s.name.ends_with(".temp_f")));
    }
}
