//! Envio de um payload ao carbon via TCP.
//!
//! Uma conexão nova por tentativa, uma única escrita, nenhuma resposta lida.
//! Resolução de nome, conexão e escrita respeitam o mesmo timeout.

use crate::protocol::Payload;
use std::io::Write;
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout padrão de conexão e escrita.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Falhas de envio. O cliente trata todas da mesma forma.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Falha ao resolver {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Resolução de {addr} excedeu {timeout:?}")]
    ResolveTimeout { addr: String, timeout: Duration },

    #[error("Nenhum endereço para {0}")]
    NoAddress(String),

    #[error("Falha ao conectar em {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Falha ao enviar para {addr}: {source}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Uma tentativa de entrega de um payload.
pub trait Transport {
    fn send(&mut self, payload: &Payload) -> Result<(), TransportError>;
}

/// Transporte TCP plaintext.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Endereços do destino.
    ///
    /// IP literal não passa pelo resolver. Hostname é resolvido numa thread
    /// auxiliar e a espera é limitada pelo timeout; uma consulta que estoura o
    /// prazo termina sozinha em segundo plano.
    fn resolve(&self) -> Result<Vec<SocketAddr>, TransportError> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, self.port)]);
        }

        let target = self.target();
        let resolve_err = |source| TransportError::Resolve {
            addr: target.clone(),
            source,
        };
        let (tx, rx) = mpsc::channel();
        let host = self.host.clone();
        let port = self.port;
        thread::Builder::new()
            .name("graphite-dns".into())
            .spawn(move || {
                let result = (host.as_str(), port)
                    .to_socket_addrs()
                    .map(|addrs| addrs.collect::<Vec<_>>());
                // O receptor pode já ter desistido
                let _ = tx.send(result);
            })
            .map_err(resolve_err)?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result.map_err(resolve_err),
            Err(RecvTimeoutError::Timeout) => {
                warn!("Resolução de {target} excedeu {:?}", self.timeout);
                Err(TransportError::ResolveTimeout {
                    addr: target,
                    timeout: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::NoAddress(target)),
        }
    }

    /// Tenta cada endereço resolvido até um conectar.
    fn connect(&self) -> Result<TcpStream, TransportError> {
        let target = self.target();
        let addrs = self.resolve()?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("Conexão com {addr} falhou: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(source) => TransportError::Connect {
                addr: target,
                source,
            },
            None => TransportError::NoAddress(target),
        })
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, payload: &Payload) -> Result<(), TransportError> {
        debug!("Abrindo conexão com {}", self.target());
        let mut stream = self.connect()?;
        let peer = stream
            .peer_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.port)));
        let send_err = |source| TransportError::Send { addr: peer, source };

        stream.set_write_timeout(Some(self.timeout)).map_err(send_err)?;
        stream.set_nodelay(true).map_err(send_err)?;
        debug!("Enviando {} bytes para {peer}", payload.len());
        stream.write_all(payload.as_bytes()).map_err(send_err)?;
        stream.flush().map_err(send_err)?;
        stream.shutdown(Shutdown::Write).map_err(send_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn sends_payload_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = String::new();
            conn.read_to_string(&mut buf).unwrap();
            buf
        });

        let mut transport = TcpTransport::new("127.0.0.1", port, Duration::from_secs(2));
        let payload = Payload::from_raw("p.a 1 10\np.b 2.5 10\n".into());
        transport.send(&payload).unwrap();

        assert_eq!(server.join().unwrap(), "p.a 1 10\np.b 2.5 10\n");
    }

    #[test]
    fn ip_literals_skip_the_resolver() {
        let v4 = TcpTransport::new("127.0.0.1", 2003, Duration::from_millis(1));
        assert_eq!(v4.resolve().unwrap(), vec![SocketAddr::from(([127, 0, 0, 1], 2003))]);

        let v6 = TcpTransport::new("::1", 2004, Duration::from_millis(1));
        let addrs = v6.resolve().unwrap();
        assert_eq!(addrs.len(), 1);
        assert!(addrs[0].ip().is_loopback());
        assert_eq!(addrs[0].port(), 2004);
    }

    #[test]
    fn connection_refused_is_an_error() {
        // Porta livre: bind e solta
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut transport = TcpTransport::new("127.0.0.1", port, Duration::from_secs(1));
        let result = transport.send(&Payload::from_raw("x 1 1\n".into()));
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
