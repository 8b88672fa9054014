//! Lifecycle-Ereignisse des Relais
//!
//! Definiert die Ereignisse, die das Relais an das Event-Subsystem des
//! Hosts melden kann, sowie die Senke-Schnittstelle dafuer. Die konkrete
//! Implementierung (Kanal, ESL-Event, No-Op) liegt beim Host bzw. im
//! Relais-Crate.

use crate::types::SessionId;
use serde::{Deserialize, Serialize};

/// Grund fuer das Ende einer Wiedergabe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoppGrund {
    /// Die Queue ist auf natuerlichem Weg leergelaufen
    Complete,
    /// Die Wiedergabe wurde durch einen Flush unterbrochen (Barge-In)
    Flush,
}

impl std::fmt::Display for StoppGrund {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Flush => write!(f, "flush"),
        }
    }
}

/// Alle Ereignisse die das Relais nach aussen meldet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelaisEreignis {
    /// Erster Frame nach Stille oder nach einem Flush wurde ausgegeben
    WiedergabeGestartet { session_id: SessionId },
    /// Wiedergabe beendet (Queue leer oder Flush)
    WiedergabeGestoppt {
        session_id: SessionId,
        grund: StoppGrund,
    },
}

impl RelaisEreignis {
    /// Session zu der das Ereignis gehoert
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::WiedergabeGestartet { session_id } => *session_id,
            Self::WiedergabeGestoppt { session_id, .. } => *session_id,
        }
    }
}

/// Senke fuer Relais-Ereignisse
///
/// Wird aus dem Reader-Thread heraus aufgerufen und darf deshalb
/// niemals blockieren. Implementierungen muessen volle Puffer durch
/// Verwerfen behandeln, nicht durch Warten.
pub trait EreignisSenke: Send + Sync + 'static {
    /// Meldet ein Ereignis; Verlust ist erlaubt, Blockieren nicht
    fn senden(&self, ereignis: RelaisEreignis);
}
