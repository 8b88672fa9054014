//! Senken an der Host-Grenze
//!
//! Das Relais schreibt nie selbst in den Ausgabepfad des Hosts; es
//! haengt von der Faehigkeit [`AusgabeSenke`] ab, die der Host
//! implementiert (z.B. direkte Frame-Injektion in die Telefonie).
//! Ereignisse laufen analog ueber [`EreignisSenke`]; beide Richtungen
//! duerfen den aufrufenden Thread nicht blockieren.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use sprechdraht_core::{EreignisSenke, RelaisEreignis};
use tracing::trace;

use crate::error::RelaisResult;

/// Ausgabe-Faehigkeit des Hosts: nimmt genau einen Telefonie-Frame
/// (Session-Rate, 16-bit LE mono) entgegen.
///
/// Fehler gelten als transient: der Drain-Zyklus des Aufrufers endet,
/// der Reader-Thread lebt weiter.
pub trait AusgabeSenke: Send + Sync + 'static {
    fn frame_ausgeben(&self, frame: &[u8]) -> RelaisResult<()>;
}

/// Ereignis-Senke die alles verwirft (Hosts ohne Event-Subsystem)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSenke;

impl EreignisSenke for NullSenke {
    fn senden(&self, _ereignis: RelaisEreignis) {}
}

/// Ereignis-Senke ueber einen begrenzten Kanal.
///
/// `try_send` statt `send`: ein voller Kanal verwirft das Ereignis,
/// der Reader-Thread wartet nie auf einen traegen Konsumenten.
pub struct KanalEreignisSenke {
    tx: Sender<RelaisEreignis>,
}

impl KanalEreignisSenke {
    /// Erstellt Senke und Empfaenger mit begrenzter Kapazitaet
    pub fn neu(kapazitaet: usize) -> (Self, Receiver<RelaisEreignis>) {
        let (tx, rx) = crossbeam_channel::bounded(kapazitaet);
        (Self { tx }, rx)
    }
}

impl EreignisSenke for KanalEreignisSenke {
    fn senden(&self, ereignis: RelaisEreignis) {
        match self.tx.try_send(ereignis) {
            Ok(()) => {}
            Err(TrySendError::Full(e)) => {
                trace!(session = %e.session_id(), "Ereignis verworfen: Kanal voll");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Sammelnde Ausgabe-Senke fuer Tests und Harness-Aufbauten:
/// haengt jeden Frame an einen internen Puffer an.
#[derive(Default)]
pub struct PufferSenke {
    daten: Mutex<Vec<u8>>,
    frames: Mutex<usize>,
}

impl PufferSenke {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Alle bisher ausgegebenen Bytes in Reihenfolge
    pub fn gesammelt(&self) -> Vec<u8> {
        self.daten.lock().clone()
    }

    /// Anzahl ausgegebener Frames
    pub fn frame_anzahl(&self) -> usize {
        *self.frames.lock()
    }
}

impl AusgabeSenke for PufferSenke {
    fn frame_ausgeben(&self, frame: &[u8]) -> RelaisResult<()> {
        self.daten.lock().extend_from_slice(frame);
        *self.frames.lock() += 1;
        Ok(())
    }
}
