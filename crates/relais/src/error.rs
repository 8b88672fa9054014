//! Fehlertypen des Relais-Crates

use sprechdraht_audio::AudioError;
use sprechdraht_core::{SessionId, SprechdrahtError};
use thiserror::Error;

/// Alle moeglichen Fehler des Relais
#[derive(Debug, Error)]
pub enum RelaisError {
    // --- Setup (fatal fuer den Aufbau, Anruf laeuft ohne Relais weiter) ---
    #[error("Ungueltiges Argument: {0}")]
    UngueltigesArgument(String),

    #[error("Adresse nicht aufloesbar: {0}")]
    AdresseNichtAufloesbar(String),

    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Audio-Baustein: {0}")]
    Audio(#[from] AudioError),

    // --- Steuerbefehle ---
    #[error("Session nicht gefunden: {0}")]
    SessionNichtGefunden(SessionId),

    #[error("Relais nicht aktiv auf Session: {0}")]
    RelaisNichtAktiv(SessionId),

    // --- Laufzeit ---
    #[error("Frame-Ausgabe fehlgeschlagen: {0}")]
    AusgabeFehlgeschlagen(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type RelaisResult<T> = Result<T, RelaisError>;

impl From<RelaisError> for SprechdrahtError {
    fn from(e: RelaisError) -> Self {
        match e {
            RelaisError::UngueltigesArgument(m) => SprechdrahtError::UngueltigesArgument(m),
            RelaisError::AdresseNichtAufloesbar(m) => SprechdrahtError::AdresseNichtAufloesbar(m),
            RelaisError::Verbindung(m) => SprechdrahtError::Verbindung(m),
            RelaisError::Audio(e) => SprechdrahtError::Audio(e.to_string()),
            RelaisError::SessionNichtGefunden(id) => {
                SprechdrahtError::SessionNichtGefunden(id.to_string())
            }
            RelaisError::RelaisNichtAktiv(id) => SprechdrahtError::RelaisNichtAktiv(id.to_string()),
            RelaisError::AusgabeFehlgeschlagen(m) => SprechdrahtError::Intern(m),
            RelaisError::Konfiguration(m) => SprechdrahtError::Konfiguration(m),
            RelaisError::Io(e) => SprechdrahtError::Io(e),
        }
    }
}
