//! Konfiguration des Relais
//!
//! Die Endpunkt-Raten sind feste Konstanten des Wire-Protokolls und
//! werden nicht verhandelt. Alles andere sind Tunables mit sinnvollen
//! Standardwerten, sodass das Relais ohne Konfigurationsdatei
//! lauffaehig ist (TOML-Laden nach dem Muster der Host-Konfiguration).

use serde::{Deserialize, Serialize};
use sprechdraht_audio::UeberlaufVerhalten;
use std::time::Duration;

use crate::error::{RelaisError, RelaisResult};

/// Rate der Audio-Daten Richtung Sidecar (Mikrofon-Pfad), Hz
pub const ENDPUNKT_EINGANGS_RATE: u32 = 16_000;

/// Rate der Audio-Daten vom Sidecar (Lautsprecher-Pfad), Hz
pub const ENDPUNKT_AUSGANGS_RATE: u32 = 24_000;

/// Hoechste unterstuetzte Session-Rate, Hz
pub const MAX_SESSION_RATE: u32 = 48_000;

/// Groesse des Socket-Empfangspuffers im Reader-Thread, Bytes
pub const EMPFANGS_PUFFER_BYTES: usize = 8192;

/// Queue-Kapazitaet: 90 Sekunden bei der hoechsten Session-Rate.
/// Der Sidecar kann Audio schneller als Echtzeit liefern; die Queue
/// muss einen ganzen Sprecher-Turn aufnehmen koennen.
pub const QUEUE_MAX_BYTES: usize = (MAX_SESSION_RATE as usize) * 2 * 90;

fn standard_queue_max_bytes() -> usize {
    QUEUE_MAX_BYTES
}

/// Tunables des Relais
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaisKonfig {
    /// Dauer des Verwerfen-Fensters nach einem Flush in Millisekunden.
    /// Muss die In-Flight-Daten einer Socket-Roundtrip abdecken;
    /// 500 ms ist konservativ, 50 ms genuegt in lokalen Deployments.
    pub verwerfen_dauer_ms: u64,
    /// Maximale Queue-Belegung in Bytes
    pub queue_max_bytes: usize,
    /// Verhalten bei voller Queue
    pub ueberlauf: UeberlaufVerhalten,
    /// Timeout fuer den Verbindungsaufbau zum Sidecar in Millisekunden
    pub verbindungs_timeout_ms: u64,
}

impl Default for RelaisKonfig {
    fn default() -> Self {
        Self {
            verwerfen_dauer_ms: 500,
            queue_max_bytes: standard_queue_max_bytes(),
            ueberlauf: UeberlaufVerhalten::default(),
            verbindungs_timeout_ms: 5000,
        }
    }
}

impl RelaisKonfig {
    /// Laedt die Konfiguration aus einem TOML-String
    pub fn aus_toml(inhalt: &str) -> RelaisResult<Self> {
        let konfig: Self = toml::from_str(inhalt)
            .map_err(|e| RelaisError::Konfiguration(format!("TOML ungueltig: {}", e)))?;
        konfig.pruefen()?;
        Ok(konfig)
    }

    /// Laedt die Konfiguration aus einer TOML-Datei
    pub fn aus_datei(pfad: &std::path::Path) -> RelaisResult<Self> {
        let inhalt = std::fs::read_to_string(pfad)?;
        Self::aus_toml(&inhalt)
    }

    /// Validiert alle Felder
    pub fn pruefen(&self) -> RelaisResult<()> {
        if self.verwerfen_dauer_ms == 0 {
            return Err(RelaisError::Konfiguration(
                "verwerfen_dauer_ms muss groesser 0 sein".into(),
            ));
        }
        if self.queue_max_bytes == 0 {
            return Err(RelaisError::Konfiguration(
                "queue_max_bytes muss groesser 0 sein".into(),
            ));
        }
        if self.verbindungs_timeout_ms == 0 {
            return Err(RelaisError::Konfiguration(
                "verbindungs_timeout_ms muss groesser 0 sein".into(),
            ));
        }
        Ok(())
    }

    /// Verwerfen-Fenster als Duration
    pub fn verwerfen_dauer(&self) -> Duration {
        Duration::from_millis(self.verwerfen_dauer_ms)
    }

    /// Verbindungs-Timeout als Duration
    pub fn verbindungs_timeout(&self) -> Duration {
        Duration::from_millis(self.verbindungs_timeout_ms)
    }
}
