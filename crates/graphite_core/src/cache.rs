//! Cache em disco dos lotes que não puderam ser entregues.
//!
//! Cada lote falho vira um arquivo no diretório de cache:
//!
//! ```text
//! /var/lib/graphite_sender/
//! ├── 1718000000.000000000.json
//! ├── 1718000060.123456789.json
//! └── 1718000060.123456790.json   ← mesmo instante, chave incrementada
//! ```
//!
//! O nome codifica uma chave de criação estritamente crescente; a listagem
//! ordenada por essa chave é a ordem de replay. O conteúdo é o payload
//! plaintext (a extensão `.json` é só cosmética, herdada do formato antigo).
//! Nomes antigos `<segundos>.json` continuam sendo aceitos.

use crate::protocol::Payload;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const ENTRY_EXTENSION: &str = "json";

/// Erros do cache em disco.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Erro ao criar diretório de cache {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao listar {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao gravar {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao ler {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao remover {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ──────────────────────────────────────────────
// Chave de ordenação
// ──────────────────────────────────────────────

/// Instante de criação de uma entrada, com resolução de nanossegundos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    pub secs: u64,
    pub nanos: u32,
}

impl EntryKey {
    fn now() -> Self {
        let d = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: d.as_secs(),
            nanos: d.subsec_nanos(),
        }
    }

    /// Próxima chave possível depois desta.
    fn successor(self) -> Self {
        if self.nanos >= 999_999_999 {
            Self {
                secs: self.secs + 1,
                nanos: 0,
            }
        } else {
            Self {
                secs: self.secs,
                nanos: self.nanos + 1,
            }
        }
    }

    fn file_name(self) -> String {
        format!("{:010}.{:09}.{ENTRY_EXTENSION}", self.secs, self.nanos)
    }

    /// Aceita `<segundos>.<nanos>.json` e o formato antigo `<segundos>.json`.
    fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".json")?;
        let (secs, nanos) = match stem.split_once('.') {
            Some((secs, nanos)) => (secs, nanos.parse().ok()?),
            None => (stem, 0),
        };
        if nanos > 999_999_999 {
            return None;
        }
        Some(Self {
            secs: secs.parse().ok()?,
            nanos,
        })
    }
}

/// Uma entrada persistida na fila.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// `None` para arquivos cujo nome não segue o formato de chave
    pub key: Option<EntryKey>,
    pub path: PathBuf,
}

impl CacheEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Chaves válidas primeiro (em ordem), depois nomes estranhos por nome.
    fn sort_key(&self) -> (bool, Option<EntryKey>, String) {
        (self.key.is_none(), self.key, self.file_name())
    }
}

// ──────────────────────────────────────────────
// Diretório de cache
// ──────────────────────────────────────────────

/// Fila persistente de payloads não entregues.
///
/// Um único processo deve usar um dado diretório por vez.
#[derive(Debug)]
pub struct CacheDir {
    dir: PathBuf,
    last_key: Option<EntryKey>,
}

impl CacheDir {
    /// Não toca no disco; o diretório é criado no primeiro `enqueue`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_key: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<(), CacheError> {
        if !self.dir.is_dir() {
            info!("Criando diretório de cache em {}", self.dir.display());
        }
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::CreateDir {
            path: self.dir.clone(),
            source,
        })
    }

    /// Chave nova, sempre maior que qualquer entrada já existente.
    fn next_key(&mut self) -> Result<EntryKey, CacheError> {
        let floor = match self.last_key {
            Some(key) => Some(key),
            None => self.list_entries()?.iter().filter_map(|e| e.key).max(),
        };
        let now = EntryKey::now();
        let key = match floor {
            Some(last) if now <= last => last.successor(),
            _ => now,
        };
        self.last_key = Some(key);
        Ok(key)
    }

    /// Grava o payload como nova entrada.
    ///
    /// A escrita vai para um arquivo oculto temporário e depois é renomeada,
    /// então a listagem nunca vê uma entrada pela metade.
    pub fn enqueue(&mut self, payload: &Payload) -> Result<CacheEntry, CacheError> {
        self.ensure_dir()?;

        let key = self.next_key()?;
        let name = key.file_name();
        let path = self.dir.join(&name);
        let tmp_path = self.dir.join(format!(".{name}.tmp"));

        if let Err(source) = write_atomic(&tmp_path, &path, payload) {
            // Temporário órfão seria invisível para list_entries
            if let Err(e) = fs::remove_file(&tmp_path) {
                debug!("Temporário {} não removido: {e}", tmp_path.display());
            }
            return Err(CacheError::Write { path, source });
        }

        warn!(
            "Lote não enviado guardado em {} ({} métricas)",
            path.display(),
            payload.line_count()
        );
        Ok(CacheEntry {
            key: Some(key),
            path,
        })
    }

    /// Todas as entradas, na ordem de replay.
    ///
    /// Diretório inexistente equivale a fila vazia.
    pub fn list_entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let list_err = |source| CacheError::List {
            path: self.dir.clone(),
            source,
        };

        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(list_err(e)),
        };

        let mut entries = Vec::new();
        for item in read_dir {
            let item = item.map_err(list_err)?;
            let file_type = item.file_type().map_err(list_err)?;
            if !file_type.is_file() {
                continue;
            }
            let name = item.file_name().to_string_lossy().into_owned();
            // Temporários de escrita em andamento
            if name.starts_with('.') {
                continue;
            }
            let key = EntryKey::parse(&name);
            if key.is_none() {
                debug!("Entrada de cache com nome fora do padrão: {name}");
            }
            entries.push(CacheEntry {
                key,
                path: item.path(),
            });
        }

        entries.sort_by_cached_key(CacheEntry::sort_key);
        Ok(entries)
    }

    /// Lê o payload de uma entrada.
    pub fn read(&self, entry: &CacheEntry) -> Result<Payload, CacheError> {
        fs::read_to_string(&entry.path)
            .map(Payload::from_raw)
            .map_err(|source| CacheError::Read {
                path: entry.path.clone(),
                source,
            })
    }

    /// Remove uma entrada já entregue.
    pub fn remove(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        fs::remove_file(&entry.path).map_err(|source| CacheError::Remove {
            path: entry.path.clone(),
            source,
        })?;
        debug!("Entrada {} removida do cache", entry.file_name());
        Ok(())
    }
}

/// Escreve em `tmp_path`, sincroniza e renomeia para `path`.
fn write_atomic(tmp_path: &Path, path: &Path, payload: &Payload) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp_path)?;
    file.write_all(payload.as_bytes())?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp_path, path)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
