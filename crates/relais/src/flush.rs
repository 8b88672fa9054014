//! Flush/Verwerfen-Automat fuer Unterbrechungen (Barge-In)
//!
//! Ein blosses Leeren der Queue genuegt bei einer Unterbrechung nicht:
//! im Moment des Flushs sind bereits weitere veraltete Audio-Daten auf
//! dem Socket unterwegs und treffen innerhalb einer Roundtrip-Zeit ein.
//! Deshalb haengt an jedem Flush ein zeitgesteuertes Verwerfen-Fenster,
//! das diesen In-Flight-Rest deterministisch schluckt.
//!
//! Zustaende, abgeleitet aus zwei Feldern:
//! - **Normal**: eingehende Daten werden eingereiht
//! - **Flushing** (`flush_flag` gesetzt, transient): Queue leeren,
//!   Flag loeschen, Fenster scharf stellen
//! - **Discarding** (`verwerfen_bis` in der Zukunft): eingehende Daten
//!   stillschweigend verwerfen, bis die Frist ablaeuft
//!
//! Alle Uebergaenge nehmen den Zeitpunkt als Parameter entgegen, damit
//! die Frist-Grenzen ohne echte Uhr testbar sind. Die Synchronisation
//! (ein Mutex pro Session) liegt eine Ebene hoeher in [`crate::session`].

use sprechdraht_audio::JitterQueue;
use std::time::{Duration, Instant};

/// Abgeleiteter Zustand des Automaten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushZustand {
    /// Eingehende Daten werden eingereiht
    Normal,
    /// Flush angefordert, Uebergang steht aus
    Flushing,
    /// Verwerfen-Fenster aktiv
    Discarding,
}

/// Ergebnis der Einreihung eines eingehenden Blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EingangsErgebnis {
    /// Block wurde eingereiht
    Eingereiht {
        /// Durch die Ueberlauf-Politik verworfene Bytes (0 im Normalfall)
        ueberlauf: usize,
        /// true wenn dieser Block das abgelaufene Verwerfen-Fenster beendet hat
        wieder_aufgenommen: bool,
    },
    /// Flush-Uebergang ausgefuehrt, Block verworfen
    Geflusht { geleert: usize },
    /// Verwerfen-Fenster aktiv, Block stillschweigend verworfen
    Verworfen,
}

/// Ergebnis einer Frame-Entnahme fuer die Wiedergabe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameErgebnis {
    /// Frame vollstaendig entnommen
    Entnommen,
    /// Zu wenig Daten fuer einen vollen Frame
    ZuWenigDaten {
        /// Verbleibende Belegung in Bytes
        rest: usize,
    },
    /// Flush-Uebergang ausgefuehrt, Entnahme abgebrochen
    Geflusht { geleert: usize },
}

/// Geteilter Zustand einer Session: Queue plus Flush-Felder.
///
/// Lebt hinter dem Session-Mutex; saemtliche Mutationen laufen ueber
/// die Methoden hier, der Lock selbst wird nie nach aussen gereicht.
pub(crate) struct Geteilt {
    pub(crate) queue: JitterQueue,
    flush_flag: bool,
    verwerfen_bis: Option<Instant>,
}

impl Geteilt {
    pub(crate) fn neu(queue: JitterQueue) -> Self {
        Self {
            queue,
            flush_flag: false,
            verwerfen_bis: None,
        }
    }

    /// Abgeleiteter Automaten-Zustand zum Zeitpunkt `jetzt`
    pub(crate) fn zustand(&self, jetzt: Instant) -> FlushZustand {
        if self.flush_flag {
            FlushZustand::Flushing
        } else if self.verwerfen_bis.is_some_and(|bis| jetzt < bis) {
            FlushZustand::Discarding
        } else {
            FlushZustand::Normal
        }
    }

    /// Fordert einen Flush an (edge-getriggert, idempotent)
    pub(crate) fn flush_anfordern(&mut self) {
        self.flush_flag = true;
    }

    /// Fuehrt den Flush-Uebergang aus: Queue leeren, Flag loeschen,
    /// Verwerfen-Fenster scharf stellen. Gibt die geleerten Bytes zurueck.
    pub(crate) fn flush_ausfuehren(&mut self, jetzt: Instant, fenster: Duration) -> usize {
        let geleert = self.queue.leeren();
        self.flush_flag = false;
        self.verwerfen_bis = Some(jetzt + fenster);
        geleert
    }

    /// Defensiver Flush aus dem Ausgabe-Tap: leert Queue und Flag, stellt
    /// aber kein Fenster scharf (das uebernimmt der Reader-Pfad).
    /// Gibt `None` zurueck wenn kein Flush anstand.
    pub(crate) fn tap_flush(&mut self) -> Option<usize> {
        if self.flush_flag {
            self.flush_flag = false;
            Some(self.queue.leeren())
        } else {
            None
        }
    }

    /// Stuft einen eingehenden Block ein und reiht ihn ggf. ein.
    pub(crate) fn eingang(
        &mut self,
        daten: &[u8],
        jetzt: Instant,
        fenster: Duration,
    ) -> EingangsErgebnis {
        if self.flush_flag {
            let geleert = self.flush_ausfuehren(jetzt, fenster);
            return EingangsErgebnis::Geflusht { geleert };
        }

        let mut wieder_aufgenommen = false;
        match self.verwerfen_bis {
            Some(bis) if jetzt < bis => return EingangsErgebnis::Verworfen,
            Some(_) => {
                // Fenster abgelaufen: beim ersten Check zuruecksetzen
                self.verwerfen_bis = None;
                wieder_aufgenommen = true;
            }
            None => {}
        }

        let ueberlauf = self.queue.schreiben(daten);
        EingangsErgebnis::Eingereiht {
            ueberlauf,
            wieder_aufgenommen,
        }
    }

    /// Entnimmt einen Frame fuer die Wiedergabe; prueft vorher erneut
    /// auf einen Flush, damit eine Unterbrechung innerhalb eines
    /// Frame-Intervalls greift statt erst im naechsten Empfangszyklus.
    pub(crate) fn frame(
        &mut self,
        ziel: &mut [u8],
        jetzt: Instant,
        fenster: Duration,
    ) -> FrameErgebnis {
        if self.flush_flag {
            let geleert = self.flush_ausfuehren(jetzt, fenster);
            return FrameErgebnis::Geflusht { geleert };
        }
        if self.queue.belegt() < ziel.len() {
            return FrameErgebnis::ZuWenigDaten {
                rest: self.queue.belegt(),
            };
        }
        self.queue.lesen(ziel);
        FrameErgebnis::Entnommen
    }
}
