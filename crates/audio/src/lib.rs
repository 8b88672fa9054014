//! sprechdraht-audio – Audio-Bausteine fuer das Relais
//!
//! Enthaelt die beiden Blatt-Komponenten der Audio-Pipeline:
//! - [`resampler`] – zustandsbehafteter Sample-Raten-Konverter (rubato)
//! - [`queue`] – begrenzte Byte-FIFO mit Ueberlauf-Politik (Jitter-Queue)
//!
//! Dieses Crate ist bewusst synchron und frei von I/O: beide Komponenten
//! werden von den Threads des Relais-Crates angesteuert.

pub mod error;
pub mod queue;
pub mod resampler;

pub use error::{AudioError, AudioResult};
pub use queue::{JitterQueue, UeberlaufVerhalten};
pub use resampler::Resampler;
