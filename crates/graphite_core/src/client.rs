//! Cliente Graphite com entrega durável.
//!
//! Fluxo de um [`DeliveryClient::deliver`]:
//!
//! ```text
//! lote ──► encode ──► envio TCP ──ok──► flush do cache (em ordem) ──► contador
//!                          │
//!                          └─falha──► grava entrada no cache
//! ```
//!
//! Uma entrada do cache só é apagada depois de entregue. O flush para na
//! primeira falha, então uma entrada nunca é entregue antes de outra mais
//! antiga que ainda esteja pendente.

use crate::cache::{CacheDir, CacheEntry};
use crate::protocol::{Payload, encode_batch};
use crate::transport::Transport;
use crate::types::{Sample, unix_now};
use tracing::{Span, debug, error, info, warn};

/// Métrica interna enviada após esvaziar o cache.
pub const FLUSH_COUNTER_METRIC: &str = "graphite_sender.cached_sets_flushed";

/// Resultado de um flush do cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entradas entregues e removidas nesta passada
    pub flushed: usize,
    /// Entradas que continuam no cache
    pub remaining: usize,
    /// A passada parou antes do fim
    pub aborted: bool,
}

/// O que aconteceu com um lote entregue ao cliente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Lote vazio, nada a fazer
    Empty,
    /// Enviado agora; inclui o flush que veio em seguida
    Sent(FlushReport),
    /// Envio falhou; lote guardado no cache
    Cached(CacheEntry),
    /// Envio e gravação em disco falharam; lote perdido
    Lost,
}

/// Cliente que entrega lotes ou os guarda em disco até o carbon voltar.
pub struct DeliveryClient<T: Transport> {
    transport: T,
    cache: CacheDir,
    prefix: String,
    span: Span,
}

impl<T: Transport> DeliveryClient<T> {
    /// `span` é o contexto de log de todas as operações do cliente.
    pub fn new(transport: T, cache: CacheDir, prefix: impl Into<String>, span: Span) -> Self {
        Self {
            transport,
            cache,
            prefix: prefix.into(),
            span,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn cache(&self) -> &CacheDir {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Entrega um lote agora ou o guarda no cache.
    ///
    /// Nunca retorna erro: falhas são logadas e o loop de polling segue.
    pub fn deliver(&mut self, batch: &[Sample]) -> DeliveryOutcome {
        let span = self.span.clone();
        let _enter = span.enter();

        if batch.is_empty() {
            debug!("Lote vazio, nada a enviar");
            return DeliveryOutcome::Empty;
        }

        let payload = encode_batch(&self.prefix, batch);
        match self.transport.send(&payload) {
            Ok(()) => {
                info!("{} métricas enviadas ao Graphite", batch.len());
                DeliveryOutcome::Sent(self.flush_queue())
            }
            Err(e) => {
                error!("Envio ao Graphite falhou: {e}; guardando lote em disco");
                match self.cache.enqueue(&payload) {
                    Ok(entry) => DeliveryOutcome::Cached(entry),
                    Err(e) => {
                        error!("Lote de {} métricas perdido: {e}", batch.len());
                        DeliveryOutcome::Lost
                    }
                }
            }
        }
    }

    /// Reenvia todas as entradas do cache em ordem, parando na primeira falha.
    ///
    /// Chamado por [`deliver`](Self::deliver) logo após um envio bem-sucedido.
    pub fn flush_queue(&mut self) -> FlushReport {
        let span = self.span.clone();
        let _enter = span.enter();

        let entries = match self.cache.list_entries() {
            Ok(entries) => entries,
            Err(e) => {
                error!("Não foi possível listar o cache: {e}");
                return FlushReport {
                    aborted: true,
                    ..Default::default()
                };
            }
        };

        if entries.is_empty() {
            debug!("Nenhuma entrada no cache");
            return FlushReport::default();
        }

        let total = entries.len();
        info!("{total} lote(s) no cache para reenviar");

        let mut report = FlushReport::default();
        for entry in &entries {
            match self.flush_entry(entry) {
                FlushStep::Delivered => report.flushed += 1,
                FlushStep::DeliveredNotRemoved => {
                    report.flushed += 1;
                    report.aborted = true;
                    break;
                }
                FlushStep::Failed => {
                    report.aborted = true;
                    break;
                }
            }
        }
        report.remaining = total - report.flushed;

        if report.aborted {
            error!(
                flushed = report.flushed,
                remaining = report.remaining,
                "Flush do cache interrompido"
            );
            return report;
        }

        debug!("Cache esvaziado ({} lotes)", report.flushed);
        self.send_flush_counter(report.flushed);
        report
    }

    fn flush_entry(&mut self, entry: &CacheEntry) -> FlushStep {
        let payload = match self.cache.read(entry) {
            Ok(payload) => payload,
            Err(e) => {
                error!("{e}");
                return FlushStep::Failed;
            }
        };

        if let Err(e) = self.transport.send(&payload) {
            error!("Reenvio de {} falhou: {e}", entry.file_name());
            return FlushStep::Failed;
        }

        match self.cache.remove(entry) {
            Ok(()) => FlushStep::Delivered,
            Err(e) => {
                // Se continuasse, esta entrada seria reenviada depois das seguintes
                error!("{e}");
                FlushStep::DeliveredNotRemoved
            }
        }
    }

    /// Contador de lotes reenviados; se falhar, é descartado.
    ///
    /// Vai numa tentativa própria, logo numa conexão nova, e não junto do
    /// último payload do flush. O carbon recebe as mesmas linhas de um jeito
    /// ou de outro.
    fn send_flush_counter(&mut self, flushed: usize) {
        let sample = Sample::new(FLUSH_COUNTER_METRIC, flushed as f64, unix_now());
        let payload: Payload = encode_batch(&self.prefix, &[sample]);
        if let Err(e) = self.transport.send(&payload) {
            warn!("Contador {FLUSH_COUNTER_METRIC} descartado: {e}");
        }
    }
}

enum FlushStep {
    Delivered,
    DeliveredNotRemoved,
    Failed,
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
