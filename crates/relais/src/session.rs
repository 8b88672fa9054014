//! Relais-Session – geteilter Zustand zwischen Echtzeit-Pfad und Reader
//!
//! Eine [`RelaisSession`] existiert pro aktivem Anruf, solange das Relais
//! angehaengt ist. Zwei unabhaengig getaktete Kontexte teilen sie sich:
//! der Echtzeit-Media-Thread des Hosts (via [`crate::tap::MediaTap`])
//! und der Reader-Thread (via [`crate::reader`]). Der geteilte Zustand
//! {Queue, Flush-Flag, Verwerfen-Frist} liegt hinter genau einem Mutex
//! und ist nur ueber kurze, atomare Operationen erreichbar; der
//! Send-Pfad des Echtzeit-Threads beruehrt den Mutex nie.
//!
//! Lebensdauer: `laeuft` wechselt genau einmal von true auf false und
//! nie zurueck. Der Reader haelt eine Arc-Referenz, die nur gueltig
//! verwendet wird solange `laeuft` true ist.

use parking_lot::Mutex;
use sprechdraht_audio::JitterQueue;
use sprechdraht_core::{EreignisSenke, SessionAudioFormat, SessionId};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{RelaisKonfig, ENDPUNKT_EINGANGS_RATE, MAX_SESSION_RATE};
use crate::error::{RelaisError, RelaisResult};
use crate::flush::{EingangsErgebnis, FlushZustand, FrameErgebnis, Geteilt};
use crate::telemetry::{SessionZaehler, TelemetrieSnapshot};

/// Session-Zustand des Relais fuer einen aktiven Anruf
pub struct RelaisSession {
    id: SessionId,
    format: SessionAudioFormat,
    konfig: RelaisKonfig,
    socket: TcpStream,
    laeuft: AtomicBool,
    geteilt: Mutex<Geteilt>,
    zaehler: SessionZaehler,
    ereignisse: Arc<dyn EreignisSenke>,
    /// Bytes pro Telefonie-Frame bei Session-Rate
    session_frame_bytes: usize,
    /// Bytes pro Frame Richtung Sidecar (16 kHz)
    endpunkt_frame_bytes: usize,
}

impl RelaisSession {
    /// Loest die Sidecar-Adresse auf, verbindet und baut die Session auf.
    ///
    /// Jeder Fehlschlag laesst nichts Angehaengtes zurueck: alle bis
    /// dahin erworbenen Ressourcen (insbesondere der Socket) werden
    /// beim Verlassen des Scopes wieder freigegeben.
    pub(crate) fn verbinden(
        id: SessionId,
        format: SessionAudioFormat,
        konfig: RelaisKonfig,
        ereignisse: Arc<dyn EreignisSenke>,
        host: &str,
        port: u16,
    ) -> RelaisResult<Self> {
        konfig.pruefen()?;
        if format.rate > MAX_SESSION_RATE {
            return Err(RelaisError::UngueltigesArgument(format!(
                "Session-Rate {} Hz ueber Maximum {} Hz",
                format.rate, MAX_SESSION_RATE
            )));
        }

        let adressen: Vec<_> = (host, port)
            .to_socket_addrs()
            .map_err(|e| RelaisError::AdresseNichtAufloesbar(format!("{}:{}: {}", host, port, e)))?
            .collect();
        if adressen.is_empty() {
            return Err(RelaisError::AdresseNichtAufloesbar(format!(
                "{}:{}",
                host, port
            )));
        }

        let mut letzter_fehler = None;
        let mut socket = None;
        for adresse in &adressen {
            match TcpStream::connect_timeout(adresse, konfig.verbindungs_timeout()) {
                Ok(s) => {
                    socket = Some(s);
                    break;
                }
                Err(e) => letzter_fehler = Some(e),
            }
        }
        let socket = socket.ok_or_else(|| {
            RelaisError::Verbindung(format!(
                "{}:{}: {}",
                host,
                port,
                letzter_fehler
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unbekannt".into())
            ))
        })?;

        // Nagle aus: jede Verzoegerung hier ist hoerbare Latenz
        socket.set_nodelay(true)?;

        let ziel = format!("{}:{}", host, port);
        info!(
            session = %id,
            ziel = %ziel,
            rate = format.rate,
            ptime = format.ptime_ms,
            frame_bytes = format.frame_bytes(),
            "Mit Sidecar verbunden"
        );

        let queue = JitterQueue::neu(konfig.queue_max_bytes, konfig.ueberlauf);

        Ok(Self {
            id,
            format,
            socket,
            laeuft: AtomicBool::new(true),
            geteilt: Mutex::new(Geteilt::neu(queue)),
            zaehler: SessionZaehler::neu(),
            ereignisse,
            session_frame_bytes: format.frame_bytes(),
            endpunkt_frame_bytes: format.frame_bytes_bei(ENDPUNKT_EINGANGS_RATE),
            konfig,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn format(&self) -> SessionAudioFormat {
        self.format
    }

    pub(crate) fn konfig(&self) -> &RelaisKonfig {
        &self.konfig
    }

    pub(crate) fn socket(&self) -> &TcpStream {
        &self.socket
    }

    pub(crate) fn zaehler(&self) -> &SessionZaehler {
        &self.zaehler
    }

    pub(crate) fn ereignisse(&self) -> &Arc<dyn EreignisSenke> {
        &self.ereignisse
    }

    /// Bytes pro Telefonie-Frame bei Session-Rate
    pub fn session_frame_bytes(&self) -> usize {
        self.session_frame_bytes
    }

    /// Bytes pro Frame Richtung Sidecar
    pub fn endpunkt_frame_bytes(&self) -> usize {
        self.endpunkt_frame_bytes
    }

    /// Groesse des Arbeitspuffers fuer einen Frame bei der hoechsten
    /// unterstuetzten Rate (Session-unabhaengig dimensioniert)
    pub(crate) fn max_frame_bytes(&self) -> usize {
        self.format.frame_bytes_bei(MAX_SESSION_RATE)
    }

    /// Gibt true zurueck solange die Session lebt
    pub fn laeuft(&self) -> bool {
        self.laeuft.load(Ordering::Acquire)
    }

    /// Beendet die Session kooperativ: `laeuft` loeschen und den Socket
    /// schliessen, damit ein blockierender Empfang im Reader aufwacht.
    /// Idempotent – auch sicher wenn der Thread bereits beendet ist.
    pub fn beenden(&self) {
        if self.laeuft.swap(false, Ordering::AcqRel) {
            debug!(session = %self.id, "Session wird beendet");
        }
        // Shutdown auch ausserhalb des ersten Aufrufs wiederholen:
        // der Reader kann zwischen Flag und Shutdown neu blockiert haben
        let _ = self.socket.shutdown(Shutdown::Both);
    }

    // -----------------------------------------------------------------------
    // Atomare Operationen auf dem geteilten Zustand
    // -----------------------------------------------------------------------

    /// Fordert einen Flush an (Kommando-Pfad); idempotent
    pub fn flush_anfordern(&self) {
        self.geteilt.lock().flush_anfordern();
    }

    /// Abgeleiteter Zustand des Flush-Automaten
    pub fn flush_zustand(&self) -> FlushZustand {
        self.geteilt.lock().zustand(Instant::now())
    }

    /// Reiht einen eingehenden Block ein bzw. fuehrt Flush/Verwerfen aus
    pub(crate) fn eingang_verarbeiten(&self, daten: &[u8], jetzt: Instant) -> EingangsErgebnis {
        let ergebnis = self
            .geteilt
            .lock()
            .eingang(daten, jetzt, self.konfig.verwerfen_dauer());
        match ergebnis {
            EingangsErgebnis::Geflusht { .. } => self.zaehler.flush(),
            EingangsErgebnis::Eingereiht { ueberlauf, .. } if ueberlauf > 0 => {
                self.zaehler.ueberlauf(ueberlauf)
            }
            _ => {}
        }
        ergebnis
    }

    /// Entnimmt einen Wiedergabe-Frame (mit erneutem Flush-Check)
    pub(crate) fn frame_entnehmen(&self, ziel: &mut [u8], jetzt: Instant) -> FrameErgebnis {
        let ergebnis = self
            .geteilt
            .lock()
            .frame(ziel, jetzt, self.konfig.verwerfen_dauer());
        if matches!(ergebnis, FrameErgebnis::Geflusht { .. }) {
            self.zaehler.flush();
        }
        ergebnis
    }

    /// Bedient einen anstehenden Flush aus dem Ausgabe-Tap heraus
    pub(crate) fn tap_flush_bedienen(&self) -> Option<usize> {
        self.geteilt.lock().tap_flush()
    }

    /// Aktuelle Queue-Belegung in Bytes
    pub fn queue_belegt(&self) -> usize {
        self.geteilt.lock().queue.belegt()
    }

    /// Momentaufnahme der Session-Zaehler
    pub fn telemetrie(&self) -> TelemetrieSnapshot {
        TelemetrieSnapshot::erfassen(self.id, &self.zaehler, self.queue_belegt())
    }
}

impl std::fmt::Debug for RelaisSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaisSession")
            .field("id", &self.id)
            .field("rate", &self.format.rate)
            .field("ptime_ms", &self.format.ptime_ms)
            .field("laeuft", &self.laeuft())
            .finish()
    }
}
