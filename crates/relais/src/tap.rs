//! Media-Tap – Callbacks im Echtzeit-Pfad des Hosts
//!
//! Der Host ruft die Tap-Methoden aus seinem Media-Thread heraus auf,
//! einmal pro Paketierungsintervall und Richtung. Harte Vorgabe: kein
//! Aufruf darf blockieren.
//!
//! - Mikrofon-Pfad: Frame durch den privaten Konverter, non-blocking
//!   Send an den Sidecar. Kann der Send nicht sofort durchgefuehrt
//!   werden, entfaellt der Frame – nie einreihen, nie wiederholen.
//!   Dieser Pfad nimmt den Session-Mutex nicht; der Konverter gehoert
//!   exklusiv dem Echtzeit-Thread.
//! - Lautsprecher-Pfad: bedient ausschliesslich einen anstehenden
//!   Flush (zweite, defensive Pruefstelle neben dem Reader).
//! - Teardown: kooperatives Ende von Thread und Socket, idempotent.

use sprechdraht_audio::Resampler;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::commands::RelaisVerwaltung;
use crate::session::RelaisSession;

/// Intervall der periodischen Pegel-Diagnose in Mikrofon-Frames
/// (250 Frames sind bei 20 ms ptime etwa 5 Sekunden)
const PEGEL_LOG_INTERVALL: u64 = 250;

/// Ergebnis eines non-blocking Sendeversuchs
#[derive(Debug)]
pub(crate) enum SendeErgebnis {
    /// Bytes wurden (ggf. teilweise) uebergeben
    Gesendet(usize),
    /// Peer-Puffer voll, nichts uebergeben
    WuerdeBlockieren,
    /// Anderer Socket-Fehler
    Fehler(std::io::Error),
}

/// Sendet ohne zu blockieren (MSG_DONTWAIT pro Aufruf).
///
/// Der Socket bleibt dabei fuer die Empfangsseite blockierend – nur
/// dieser eine Sendeaufruf kehrt sofort zurueck.
pub(crate) fn nicht_blockierend_senden(socket: &TcpStream, daten: &[u8]) -> SendeErgebnis {
    let sock = socket2::SockRef::from(socket);
    #[cfg(unix)]
    let flags = libc::MSG_DONTWAIT;
    #[cfg(not(unix))]
    let flags = 0;

    match sock.send_with_flags(daten, flags) {
        Ok(n) => SendeErgebnis::Gesendet(n),
        Err(e) if e.kind() == ErrorKind::WouldBlock => SendeErgebnis::WuerdeBlockieren,
        Err(e) => SendeErgebnis::Fehler(e),
    }
}

/// Tap-Objekt, das der Host an seinen Media-Pfad haengt.
///
/// Der Mikrofon-Konverter lebt hier und nicht in der Session: er wird
/// ausschliesslich vom Echtzeit-Thread beruehrt und braucht darum
/// keinen Lock.
pub struct MediaTap {
    session: Arc<RelaisSession>,
    verwaltung: Arc<RelaisVerwaltung>,
    resampler: Option<Resampler>,
    /// Wiederverwendeter LE-Byte-Puffer fuer den Sendepfad
    sende_puffer: Vec<u8>,
}

impl MediaTap {
    pub(crate) fn neu(
        session: Arc<RelaisSession>,
        verwaltung: Arc<RelaisVerwaltung>,
        resampler: Option<Resampler>,
    ) -> Self {
        let kapazitaet = session.endpunkt_frame_bytes().max(session.session_frame_bytes());
        Self {
            session,
            verwaltung,
            resampler,
            sende_puffer: Vec::with_capacity(kapazitaet * 2),
        }
    }

    /// Session zu der dieser Tap gehoert
    pub fn session_id(&self) -> sprechdraht_core::SessionId {
        self.session.id()
    }

    /// Gibt true zurueck solange das Relais aktiv ist
    pub fn aktiv(&self) -> bool {
        self.session.laeuft()
    }

    /// Mikrofon-Frame vom Host: konvertieren und non-blocking senden.
    ///
    /// Fehler werden lokal absorbiert (Frame entfaellt, Zaehler), nichts
    /// verlaesst diese Methode als Fehler Richtung Echtzeit-Pfad.
    pub fn mikrofon_frame(&mut self, samples: &[i16]) {
        if samples.is_empty() || !self.session.laeuft() {
            return;
        }

        let frame_nr = self.session.zaehler().mikrofon_frame();
        if frame_nr % PEGEL_LOG_INTERVALL == 0 {
            let pegel = spitzen_pegel(samples);
            debug!(
                session = %self.session.id(),
                frame = frame_nr,
                pegel,
                prozent = pegel as f64 * 100.0 / 32768.0,
                "Mikrofon-Pegel"
            );
        }

        let konvertiert;
        let daten: &[i16] = match self.resampler.as_mut() {
            Some(r) => {
                konvertiert = r.verarbeiten(samples);
                &konvertiert
            }
            None => samples,
        };
        if daten.is_empty() {
            return; // Konverter puffert noch
        }

        self.sende_puffer.clear();
        for s in daten {
            self.sende_puffer.extend_from_slice(&s.to_le_bytes());
        }

        match nicht_blockierend_senden(self.session.socket(), &self.sende_puffer) {
            SendeErgebnis::Gesendet(n) => {
                if n < self.sende_puffer.len() {
                    trace!(
                        session = %self.session.id(),
                        gesendet = n,
                        erwartet = self.sende_puffer.len(),
                        "Teilweiser Send, Rest entfaellt"
                    );
                }
                self.session.zaehler().frame_gesendet();
            }
            SendeErgebnis::WuerdeBlockieren => {
                // Peer-Puffer voll: Frame entfaellt ersatzlos
                self.session.zaehler().frame_verworfen();
            }
            SendeErgebnis::Fehler(e) => {
                self.session.zaehler().frame_verworfen();
                if self.session.zaehler().verworfene_frames() % PEGEL_LOG_INTERVALL == 1 {
                    debug!(session = %self.session.id(), fehler = %e, "Sendefehler, Frame entfaellt");
                }
            }
        }
    }

    /// Lautsprecher-Tap: bedient nur einen anstehenden Flush, synchron
    /// zum Ausgabepfad des Hosts
    pub fn lautsprecher_tap(&self) {
        if let Some(geleert) = self.session.tap_flush_bedienen() {
            debug!(session = %self.session.id(), geleert, "Queue im Ausgabe-Tap geleert");
        }
    }

    /// Teardown: beendet Thread und Socket, meldet die Session ab.
    /// Idempotent – auch sicher wenn der Thread bereits beendet ist.
    pub fn schliessen(&self) {
        if self.session.laeuft() {
            info!(session = %self.session.id(), "Media-Tap wird geschlossen");
        }
        self.verwaltung.abmelden(self.session.id());
        self.session.beenden();
    }
}

impl Drop for MediaTap {
    fn drop(&mut self) {
        self.schliessen();
    }
}

/// Betragsmaximum der ersten 160 Samples (eine 20-ms-Frame bei 8 kHz)
fn spitzen_pegel(samples: &[i16]) -> i32 {
    samples
        .iter()
        .take(160)
        .map(|&s| (s as i32).abs())
        .max()
        .unwrap_or(0)
}
