//! Session-eigene Diagnostik-Zaehler
//!
//! Alle Zaehler leben in der Session selbst, nie prozessweit: so stoeren
//! sich parallele Anrufe nicht gegenseitig und der Teardown ist sauber.
//! Die Zaehler werden lock-frei (AtomicU64, relaxed) aus beiden Threads
//! beschrieben und als Snapshot gelesen.

use sprechdraht_core::SessionId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Zaehler einer Relais-Session
#[derive(Debug, Default)]
pub struct SessionZaehler {
    /// Vom Host angelieferte Mikrofon-Frames
    mikrofon_frames: AtomicU64,
    /// Erfolgreich an den Sidecar gesendete Frames
    frames_gesendet: AtomicU64,
    /// Verworfene Mikrofon-Frames (Send haette blockiert oder schlug fehl)
    frames_verworfen: AtomicU64,
    /// Vom Sidecar empfangene Bytes
    bytes_empfangen: AtomicU64,
    /// Durch Queue-Ueberlauf verworfene Bytes
    bytes_ueberlauf: AtomicU64,
    /// In die Telefonie ausgegebene Frames
    frames_abgespielt: AtomicU64,
    /// Ausgefuehrte Flush-Uebergaenge
    flushes: AtomicU64,
}

impl SessionZaehler {
    pub fn neu() -> Self {
        Self::default()
    }

    pub(crate) fn mikrofon_frame(&self) -> u64 {
        self.mikrofon_frames.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn frame_gesendet(&self) {
        self.frames_gesendet.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_verworfen(&self) {
        self.frames_verworfen.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bytes_empfangen(&self, n: usize) {
        self.bytes_empfangen.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn ueberlauf(&self, n: usize) {
        self.bytes_ueberlauf.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn frame_abgespielt(&self) {
        self.frames_abgespielt.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Anzahl verworfener Mikrofon-Frames
    pub fn verworfene_frames(&self) -> u64 {
        self.frames_verworfen.load(Ordering::Relaxed)
    }
}

/// Momentaufnahme der Session-Zaehler
#[derive(Debug, Clone)]
pub struct TelemetrieSnapshot {
    pub session_id: SessionId,
    pub mikrofon_frames: u64,
    pub frames_gesendet: u64,
    pub frames_verworfen: u64,
    pub bytes_empfangen: u64,
    pub bytes_ueberlauf: u64,
    pub frames_abgespielt: u64,
    pub flushes: u64,
    /// Aktuelle Queue-Belegung in Bytes
    pub queue_belegt: usize,
}

impl TelemetrieSnapshot {
    pub(crate) fn erfassen(
        session_id: SessionId,
        zaehler: &SessionZaehler,
        queue_belegt: usize,
    ) -> Self {
        Self {
            session_id,
            mikrofon_frames: zaehler.mikrofon_frames.load(Ordering::Relaxed),
            frames_gesendet: zaehler.frames_gesendet.load(Ordering::Relaxed),
            frames_verworfen: zaehler.frames_verworfen.load(Ordering::Relaxed),
            bytes_empfangen: zaehler.bytes_empfangen.load(Ordering::Relaxed),
            bytes_ueberlauf: zaehler.bytes_ueberlauf.load(Ordering::Relaxed),
            frames_abgespielt: zaehler.frames_abgespielt.load(Ordering::Relaxed),
            flushes: zaehler.flushes.load(Ordering::Relaxed),
            queue_belegt,
        }
    }

    /// Gibt eine lesbare Zusammenfassung zurueck
    pub fn zusammenfassung(&self) -> String {
        format!(
            "{}: Mic {}/{} gesendet/verworfen, Empfang {} B (Ueberlauf {} B), Wiedergabe {} Frames, {} Flushes, Queue {} B",
            self.session_id,
            self.frames_gesendet,
            self.frames_verworfen,
            self.bytes_empfangen,
            self.bytes_ueberlauf,
            self.frames_abgespielt,
            self.flushes,
            self.queue_belegt,
        )
    }
}
