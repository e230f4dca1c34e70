//! Tipos básicos de métricas.
//!
//! Uma [`Sample`] é uma leitura única `(nome, valor, timestamp)`. O conjunto de
//! amostras de um ciclo de polling forma um [`Batch`].

use std::time::{SystemTime, UNIX_EPOCH};

// ──────────────────────────────────────────────
// Sample
// ──────────────────────────────────────────────

/// Uma leitura de sensor pronta para o Graphite.
///
/// `name` é o caminho hierárquico separado por pontos, **sem** o prefixo
/// configurado (ex: `tempA.temp_f`, `wlan0.signal_level`).
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Caminho da métrica sem prefixo
    pub name: String,
    /// Valor numérico
    pub value: f64,
    /// Segundos desde o epoch
    pub timestamp: i64,
}

impl Sample {
    pub fn new(name: impl Into<String>, value: impl Into<f64>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp,
        }
    }
}

/// Amostras de um ciclo de polling, na ordem em que foram produzidas.
pub type Batch = Vec<Sample>;

/// Timestamp atual em segundos desde o epoch.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
