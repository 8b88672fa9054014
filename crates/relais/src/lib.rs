//! sprechdraht-relais – Echtzeit-Audio-Relais zwischen Telefonie und Sidecar
//!
//! Bruecke zwischen dem Media-Stream einer Telefonie-Session und einem
//! externen Roh-PCM-Endpunkt (Sidecar) ueber TCP. Das Relais ist eine
//! reine Transportkomponente: Signalisierung, Protokoll-Framing und
//! Call-Control liegen beim Sidecar; hier laufen nur die Audio-Pipeline
//! und die Unterbrechungs-Logik (Barge-In).
//!
//! ## Architektur
//!
//! ```text
//! Telefonie-Mikrofon
//!     |
//!     v
//! MediaTap::mikrofon_frame()     <- Echtzeit-Thread des Hosts, blockiert nie
//!     |
//!     v
//! Resampler (Session -> 16 kHz)
//!     |
//!     v
//! TCP-Socket (non-blocking Send) ---> Sidecar ---> TCP-Socket
//!                                                      |
//!                                                      v
//!                                         Reader-Thread (blocking Recv)
//!                                                      |
//!                                                      v
//!                                         Resampler (24 kHz -> Session)
//!                                                      |
//!                                                      v
//!                                  Flush-Automat -> JitterQueue
//!                                                      |
//!                                                      v
//!                                  getaktete Frame-Ausgabe (AusgabeSenke)
//! ```
//!
//! ## Module
//! - [`session`] – Session-Entitaet mit geteiltem Zustand und Aufbau
//! - [`flush`] – Flush/Verwerfen-Automat (Barge-In-Protokoll)
//! - [`reader`] – Empfangs-Schleife und getaktete Wiedergabe
//! - [`tap`] – Media-Tap-Callbacks fuer den Echtzeit-Pfad des Hosts
//! - [`commands`] – Kommando-Schnittstelle (start/flush/stop) und Registry
//! - [`sink`] – Ausgabe- und Ereignis-Senken (Host-Grenze)
//! - [`telemetry`] – Session-eigene Diagnostik-Zaehler
//! - [`config`] – Endpunkt-Konstanten und Tunables

pub mod commands;
pub mod config;
pub mod error;
pub mod flush;
pub mod reader;
pub mod session;
pub mod sink;
pub mod tap;
pub mod telemetry;

pub use commands::{Antwort, Kommando, RelaisVerwaltung};
pub use config::{RelaisKonfig, ENDPUNKT_AUSGANGS_RATE, ENDPUNKT_EINGANGS_RATE};
pub use error::{RelaisError, RelaisResult};
pub use flush::FlushZustand;
pub use session::RelaisSession;
pub use sink::{AusgabeSenke, KanalEreignisSenke, NullSenke, PufferSenke};
pub use tap::MediaTap;
pub use telemetry::TelemetrieSnapshot;
