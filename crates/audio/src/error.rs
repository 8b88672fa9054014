//! Fehlertypen fuer die Audio-Bausteine

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Bausteine
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Raten-Paar nicht unterstuetzt: {von} Hz -> {nach} Hz")]
    RateNichtUnterstuetzt { von: u32, nach: u32 },

    #[error("Resampler-Fehler: {0}")]
    Resampler(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;
