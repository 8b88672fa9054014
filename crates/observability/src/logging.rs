//! Structured Logging Setup via tracing-subscriber
//!
//! Konfiguriert wird ueber [`LoggingEinstellungen`] (z.B. aus der
//! TOML-Konfiguration des Hosts); Umgebungsvariablen haben Vorrang:
//! - `SD_LOG_LEVEL`: Log-Level (trace/debug/info/warn/error)
//! - `SD_LOG_FORMAT`: Format (text/json)

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: trace/debug/info/warn/error
    pub level: String,
    /// Ausgabeformat: "text" oder "json"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl LoggingEinstellungen {
    /// Prueft ob Level und Format gueltige Werte tragen
    pub fn gueltig(&self) -> bool {
        level_gueltig(&self.level) && format_gueltig(&self.format)
    }
}

/// Initialisiert das Logging-System.
///
/// `SD_LOG_LEVEL` und `SD_LOG_FORMAT` ueberschreiben die Einstellungen.
/// Mehrfachaufruf ist harmlos (der zweite Init schlaegt still fehl).
pub fn logging_initialisieren(einstellungen: &LoggingEinstellungen) {
    let filter = EnvFilter::try_from_env("SD_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(&einstellungen.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var("SD_LOG_FORMAT").unwrap_or_else(|_| einstellungen.format.clone());

    let ergebnis = match format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging war bereits initialisiert");
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
