//! Gemeinsame Identifikations- und Formattypen fuer Sprechdraht
//!
//! Die Session-ID verwendet das Newtype-Pattern um Verwechslungen mit
//! anderen UUIDs zur Compilezeit auszuschliessen. Das Audio-Format
//! beschreibt die Parameter einer Telefonie-Session (Abtastrate und
//! Paketierungsintervall), aus denen sich alle Frame-Groessen ableiten.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Telefonie-Session-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Audio-Format einer Telefonie-Session
///
/// Telefonie-Frames sind mono, 16-bit signed, little-endian. Rate und
/// Paketierungsintervall (ptime) werden vom Host beim Attach uebergeben
/// und aendern sich waehrend der Session nicht.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAudioFormat {
    /// Abtastrate der Session in Hz (z.B. 8000, 16000, 48000)
    pub rate: u32,
    /// Paketierungsintervall in Millisekunden (ueblich: 20)
    pub ptime_ms: u32,
}

impl SessionAudioFormat {
    /// Erstellt ein Format und validiert die Parameter
    pub fn neu(rate: u32, ptime_ms: u32) -> crate::Result<Self> {
        if rate == 0 || rate % 1000 != 0 {
            return Err(crate::SprechdrahtError::Konfiguration(format!(
                "Ungueltige Abtastrate: {} Hz",
                rate
            )));
        }
        if ptime_ms == 0 {
            return Err(crate::SprechdrahtError::Konfiguration(
                "ptime darf nicht 0 sein".into(),
            ));
        }
        Ok(Self { rate, ptime_ms })
    }

    /// Samples pro Frame bei dieser Rate und ptime
    pub fn frame_samples(&self) -> usize {
        (self.rate as usize / 1000) * self.ptime_ms as usize
    }

    /// Bytes pro Frame (16-bit Samples)
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples() * 2
    }

    /// Samples pro Frame fuer eine beliebige andere Rate bei gleicher ptime
    pub fn frame_samples_bei(&self, rate: u32) -> usize {
        (rate as usize / 1000) * self.ptime_ms as usize
    }

    /// Bytes pro Frame fuer eine beliebige andere Rate bei gleicher ptime
    pub fn frame_bytes_bei(&self, rate: u32) -> usize {
        self.frame_samples_bei(rate) * 2
    }

    /// Frame-Dauer als [`std::time::Duration`]
    pub fn frame_dauer(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ptime_ms as u64)
    }
}
