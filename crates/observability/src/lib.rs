//! sprechdraht-observability – Structured Logging fuer das Relais
//!
//! Das Relais selbst loggt ausschliesslich ueber `tracing`; dieses Crate
//! liefert die Subscriber-Initialisierung fuer Hosts, die keinen eigenen
//! Subscriber mitbringen (z.B. Integrationstests oder ein Sidecar-
//! Harness). Metriken und Health-Endpunkte sind Sache des Hosts.

pub mod logging;

pub use logging::{logging_initialisieren, LoggingEinstellungen};
