//! # Graphite Core
//!
//! Crate compartilhada com o modelo de métricas, o protocolo plaintext do
//! Graphite, a configuração TOML e o cliente de entrega durável.
//!
//! ## Módulos
//! - [`types`] – `Sample` e `Batch`
//! - [`protocol`] – Serialização plaintext (`<path> <valor> <ts>\n`)
//! - [`config`] – Configuração unificada via TOML
//! - [`cache`] – Fila em disco dos lotes não entregues
//! - [`transport`] – Envio TCP, uma conexão por tentativa
//! - [`client`] – Entrega imediata com fallback para o cache e replay em ordem

pub mod types;
pub mod protocol;
pub mod config;
pub mod cache;
pub mod transport;
pub mod client;

// Re-exports convenientes
pub use types::{Batch, Sample};
pub use protocol::{Payload, encode_batch};
pub use config::{AppConfig, ConfigError};
pub use cache::{CacheDir, CacheEntry, CacheError};
pub use transport::{TcpTransport, Transport, TransportError};
pub use client::{DeliveryClient, DeliveryOutcome, FlushReport};
