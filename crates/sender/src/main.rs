//! # Graphite Sender
//!
//! Lê sensores 1-wire, Wi-Fi e do host em intervalo fixo e envia as métricas
//! para o Graphite. Quando o carbon está fora do ar, os lotes ficam em disco e
//! são reenviados em ordem assim que um envio volta a funcionar.
//!
//! ## Uso
//! ```bash
//! graphite_sender -c /etc/graphite_sender.toml -v
//! graphite_sender --example-config > /etc/graphite_sender.toml
//! graphite_sender hass --url http://hass:8123 --token <token>
//! ```

mod cli;
mod hass;
mod monitor;
mod onewire;
mod wifi;

use clap::Parser;
use cli::{Cli, Command};
use graphite_core::types::unix_now;
use graphite_core::{AppConfig, CacheDir, DeliveryClient, TcpTransport};
use hass::HassSender;
use monitor::SensorMonitor;
use onewire::{OneWireCollector, W1_DEVICES_DIR};
use std::process::ExitCode;
use std::time::Instant;
use sysinfo::System;
use tracing::{debug, error, info, info_span, warn};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.example_config {
        return match AppConfig::example_config() {
            Ok((example, docs)) => {
                println!("{example}");
                eprintln!("{docs}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    // ── Carregar config ──
    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // ── Logging ──
    // RUST_LOG > -v > logging_level do config
    let directive = cli.log_directive().unwrap_or(config.log_directive());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| directive.into()),
        )
        .init();

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Configuração inválida: {e}");
        }
        return ExitCode::FAILURE;
    }

    // Salva config padrão se não existir
    if !cli.config.exists() {
        if let Err(e) = config.save(&cli.config) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    match cli.command {
        Some(Command::Hass { url, token }) => run_hass(&config, &url, token),
        None => run(&config),
    }
}

/// Envia as temperaturas 1-wire ao Home Assistant uma única vez.
fn run_hass(config: &AppConfig, url: &str, token: Option<String>) -> ExitCode {
    let sender = match HassSender::new(url, token) {
        Ok(sender) => sender,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let onewire = OneWireCollector::new(W1_DEVICES_DIR, config);
    match sender.send(&onewire.poll(unix_now())) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Falha ao enviar para o Home Assistant: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Loop principal: coleta, entrega e dorme o resto do intervalo.
fn run(config: &AppConfig) -> ! {
    let hostname = System::host_name().unwrap_or_else(|| "localhost".into());
    let prefix = config.metric_prefix(&hostname);
    let interval = config.polling_interval();

    let transport = TcpTransport::new(
        config.graphite.host.clone(),
        config.graphite.port,
        config.send_timeout(),
    );
    let target = transport.target();
    let cache = CacheDir::new(config.sender.cache_dir.clone());
    let span = info_span!("graphite", sink = %target);
    let mut client = DeliveryClient::new(transport, cache, prefix, span);

    let mut monitor = SensorMonitor::new(config);
    info!("Sensor monitor inicializado");

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   GRAPHITE SENDER – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Destino:   {target}");
    println!("  Prefixo:   {}", client.prefix());
    println!("  Intervalo: {}s", interval.as_secs());
    println!("  Cache:     {}", client.cache().path().display());
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    info!("Entrando no loop principal");
    loop {
        let cycle_start = Instant::now();

        let batch = monitor.collect();
        let outcome = client.deliver(&batch);
        debug!("Resultado do ciclo: {outcome:?}");

        // Dormir pelo tempo restante do intervalo
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            debug!("Dormindo {:?} até o próximo polling", interval - elapsed);
            std::thread::sleep(interval - elapsed);
        } else {
            info!(
                "Polling levou mais que o intervalo configurado (intervalo={:?}, polling={:?})",
                interval, elapsed
            );
        }
    }
}
