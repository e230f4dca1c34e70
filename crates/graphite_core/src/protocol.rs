//! Protocolo plaintext do Graphite (carbon).
//!
//! Cada amostra vira uma linha:
//!
//! ```text
//! <prefixo>.<nome> <valor> <timestamp>\n
//! ```
//!
//! O [`Payload`] resultante é a unidade atômica do sistema: é enviado numa
//! única escrita TCP ou gravado inteiro no cache, nunca re-parseado.

use crate::types::Sample;
use std::fmt::Write as _;

/// Porta plaintext padrão do carbon.
pub const DEFAULT_PORT: u16 = 2003;

/// Lote serializado no formato plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload(String);

impl Payload {
    /// Envolve texto já serializado (ex: lido do cache).
    pub fn from_raw(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Número de métricas (linhas) no payload.
    pub fn line_count(&self) -> usize {
        self.0.lines().count()
    }
}

/// Monta o nome completo da métrica com o prefixo.
///
/// Prefixo vazio não gera ponto inicial.
pub fn metric_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Serializa um lote de amostras, preservando a ordem.
pub fn encode_batch(prefix: &str, batch: &[Sample]) -> Payload {
    let mut out = String::with_capacity(batch.len() * 48);
    for sample in batch {
        // Escrever numa String nunca falha
        let _ = writeln!(
            out,
            "{} {} {}",
            metric_path(prefix, &sample.name),
            sample.value,
            sample.timestamp
        );
    }
    Payload(out)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_single_sample() {
        let payload = encode_batch("pi.host", &[Sample::new("tempA.temp_f", 72.5, 1000)]);
        assert_eq!(payload.as_str(), "pi.host.tempA.temp_f 72.5 1000\n");
    }

    #[test]
    fn preserves_batch_order() {
        let batch = vec![
            Sample::new("b", 2.0, 10),
            Sample::new("a", 1.0, 10),
            Sample::new("c", 3.25, 11),
        ];
        let payload = encode_batch("p", &batch);
        assert_eq!(payload.as_str(), "p.b 2 10\np.a 1 10\np.c 3.25 11\n");
        assert_eq!(payload.line_count(), 3);
    }

    #[test]
    fn integral_values_have_no_fraction() {
        let payload = encode_batch("p", &[Sample::new("wlan0.associated", 1u8, 5)]);
        assert_eq!(payload.as_str(), "p.wlan0.associated 1 5\n");
    }

    #[test]
    fn negative_values() {
        let payload = encode_batch("p", &[Sample::new("wlan0.signal_level", -40.0, 5)]);
        assert_eq!(payload.as_str(), "p.wlan0.signal_level -40 5\n");
    }

    #[test]
    fn empty_prefix_has_no_leading_dot() {
        let payload = encode_batch("", &[Sample::new("x.y", 3.5, 7)]);
        assert_eq!(payload.as_str(), "x.y 3.5 7\n");
    }

    #[test]
    fn empty_batch_is_empty_payload() {
        let payload = encode_batch("p", &[]);
        assert!(payload.is_empty());
        assert_eq!(payload.line_count(), 0);
    }
}
