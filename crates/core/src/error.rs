//! Fehlertypen fuer Sprechdraht
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule koennen eigene Fehler definieren und via `#[from]` konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer Sprechdraht
pub type Result<T> = std::result::Result<T, SprechdrahtError>;

/// Alle moeglichen Fehler im Sprechdraht-System
#[derive(Debug, Error)]
pub enum SprechdrahtError {
    // --- Setup & Verbindung ---
    #[error("Ungueltiges Argument: {0}")]
    UngueltigesArgument(String),

    #[error("Adresse nicht aufloesbar: {0}")]
    AdresseNichtAufloesbar(String),

    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    // --- Steuerbefehle ---
    #[error("Session nicht gefunden: {0}")]
    SessionNichtGefunden(String),

    #[error("Relais nicht aktiv auf Session: {0}")]
    RelaisNichtAktiv(String),

    // --- Audio ---
    #[error("Audiofehler: {0}")]
    Audio(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl SprechdrahtError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler ein Setup-Fehler ist
    /// (Relais wurde nie aktiv, Anruf laeuft ohne Relais weiter)
    pub fn ist_setup_fehler(&self) -> bool {
        matches!(
            self,
            Self::UngueltigesArgument(_)
                | Self::AdresseNichtAufloesbar(_)
                | Self::Verbindung(_)
                | Self::Audio(_)
                | Self::Konfiguration(_)
        )
    }

    /// Gibt true zurueck wenn der Fehler wiederholbar sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(self, Self::Verbindung(_) | Self::Getrennt(_) | Self::Io(_))
    }
}
