//! Estatísticas das interfaces Wi-Fi via `/proc/net/wireless`.
//!
//! ```text
//! Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE
//!  face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22
//!  wlan0: 0000   70.  -40.  -256        0      0      0      0      0        0
//! ```

use graphite_core::Sample;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

pub const PROC_NET_WIRELESS: &str = "/proc/net/wireless";

/// Uma linha de `/proc/net/wireless`.
#[derive(Debug, Clone, PartialEq)]
pub struct NicStats {
    pub name: String,
    pub link: f64,
    pub level: f64,
    pub noise: f64,
    pub discard_nwid: u64,
    pub discard_crypt: u64,
    pub discard_frag: u64,
    pub discard_retry: u64,
    pub discard_misc: u64,
    pub missed_beacons: u64,
}

impl NicStats {
    /// Link zerado: interface sem AP associado.
    pub fn is_associated(&self) -> bool {
        self.link > 0.0
    }

    pub fn samples(&self, ts: i64) -> Vec<Sample> {
        let nic = &self.name;
        if !self.is_associated() {
            warn!("{nic} não associado");
            return vec![Sample::new(format!("{nic}.associated"), 0u8, ts)];
        }

        vec![
            Sample::new(format!("{nic}.associated"), 1u8, ts),
            Sample::new(format!("{nic}.quality"), self.link, ts),
            Sample::new(format!("{nic}.signal_level"), self.level, ts),
            Sample::new(format!("{nic}.noise_level"), self.noise, ts),
            Sample::new(format!("{nic}.discard_nwid"), self.discard_nwid as f64, ts),
            Sample::new(format!("{nic}.discard_crypt"), self.discard_crypt as f64, ts),
            Sample::new(format!("{nic}.discard_frag"), self.discard_frag as f64, ts),
            Sample::new(format!("{nic}.discard_retry"), self.discard_retry as f64, ts),
            Sample::new(format!("{nic}.discard_misc"), self.discard_misc as f64, ts),
            Sample::new(format!("{nic}.missed_beacons"), self.missed_beacons as f64, ts),
        ]
    }
}

fn parse_level(token: &str) -> Option<f64> {
    token.trim_end_matches('.').parse().ok()
}

fn parse_nic_line(line: &str) -> Option<NicStats> {
    let (name, rest) = line.split_once(':')?;
    let t: Vec<&str> = rest.split_whitespace().collect();
    if t.len() < 10 {
        return None;
    }
    Some(NicStats {
        name: name.trim().to_string(),
        // t[0] é o status
        link: parse_level(t[1])?,
        level: parse_level(t[2])?,
        noise: parse_level(t[3])?,
        discard_nwid: t[4].parse().ok()?,
        discard_crypt: t[5].parse().ok()?,
        discard_frag: t[6].parse().ok()?,
        discard_retry: t[7].parse().ok()?,
        discard_misc: t[8].parse().ok()?,
        missed_beacons: t[9].parse().ok()?,
    })
}

/// Parseia o conteúdo inteiro, ignorando o cabeçalho de duas linhas.
pub fn parse_proc_wireless(content: &str) -> Vec<NicStats> {
    content
        .lines()
        .skip(2)
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let parsed = parse_nic_line(line);
            if parsed.is_none() {
                debug!("Linha de /proc/net/wireless ignorada: {line:?}");
            }
            parsed
        })
        .collect()
}

pub struct WifiCollector {
    path: PathBuf,
}

impl Default for WifiCollector {
    fn default() -> Self {
        Self::new(PROC_NET_WIRELESS)
    }
}

impl WifiCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn poll(&self, ts: i64) -> Vec<Sample> {
        info!("Lendo estatísticas Wi-Fi");
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse_proc_wireless(&content)
                .iter()
                .flat_map(|nic| nic.samples(ts))
                .collect(),
            Err(e) => {
                error!("Erro lendo {}: {e}; sem métricas Wi-Fi", self.path.display());
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Inter-| sta-|   Quality        |   Discarded packets               | Missed | WE
 face | tus | link level noise |  nwid  crypt   frag  retry   misc | beacon | 22
 wlan0: 0000   70.  -40.  -256        0      1      2      3      4        5
 wlan1: 0000    0.    0.     0        0      0      0      0      0        0
";

    #[test]
    fn parses_interfaces() {
        let nics = parse_proc_wireless(SAMPLE);
        assert_eq!(nics.len(), 2);
        assert_eq!(
            nics[0],
            NicStats {
                name: "wlan0".into(),
                link: 70.0,
                level: -40.0,
                noise: -256.0,
                discard_nwid: 0,
                discard_crypt: 1,
                discard_frag: 2,
                discard_retry: 3,
                discard_misc: 4,
                missed_beacons: 5,
            }
        );
        assert!(!nics[1].is_associated());
    }

    #[test]
    fn associated_nic_reports_everything() {
        let nics = parse_proc_wireless(SAMPLE);
        let samples = nics[0].samples(100);
        assert_eq!(samples.len(), 10);
        assert_eq!(samples[0], Sample::new("wlan0.associated", 1u8, 100));
        assert_eq!(samples[2], Sample::new("wlan0.signal_level", -40.0, 100));
        assert_eq!(samples[9], Sample::new("wlan0.missed_beacons", 5.0, 100));
    }

    #[test]
    fn unassociated_nic_reports_only_association() {
        let nics = parse_proc_wireless(SAMPLE);
        assert_eq!(
            nics[1].samples(100),
            vec![Sample::new("wlan1.associated", 0u8, 100)]
        );
    }

    #[test]
    fn header_only_means_no_interfaces() {
        let header: String = SAMPLE.lines().take(2).map(|l| format!("{l}\n")).collect();
        assert!(parse_proc_wireless(&header).is_empty());
    }

    #[test]
    fn poll_reads_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wireless");
        std::fs::write(&path, SAMPLE).unwrap();
        let samples = WifiCollector::new(&path).poll(7);
        assert_eq!(samples.len(), 11);
        assert!(samples.iter().all(|s| s.timestamp == 7));
    }

    #[test]
    fn missing_file_yields_nothing() {
        assert!(WifiCollector::new("/nonexistent/wireless").poll(1).is_empty());
    }
}
