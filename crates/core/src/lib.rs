//! sprechdraht-core – Gemeinsame Typen, Fehler und Ereignisse
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Sprechdraht-Crates gemeinsam genutzt werden: Session-IDs,
//! das Audio-Format einer Telefonie-Session, den zentralen Fehler-Enum
//! und die Lifecycle-Ereignisse des Relais.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, SprechdrahtError};
pub use event::{EreignisSenke, RelaisEreignis, StoppGrund};
pub use types::{SessionAudioFormat, SessionId};
