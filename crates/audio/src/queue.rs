//! Begrenzte Byte-FIFO fuer eingehende Wiedergabe-Daten (Jitter-Queue)
//!
//! Puffert rohe PCM-Bytes zwischen stossweiser, schneller-als-Echtzeit
//! Anlieferung und der getakteten Frame-Ausgabe. Die Kapazitaet ist bei
//! Erstellung fixiert; Ueberlauf wird per Politik behandelt:
//! - **AeltesteVerwerfen**: die aeltesten noch nicht abgespielten Bytes
//!   weichen den neuen (Standard)
//! - **NeuesteVerwerfen**: neue Bytes die nicht mehr passen entfallen
//!
//! ## Performance-Eigenschaften
//! - O(1) amortisiert fuer Schreiben, Lesen und Verwerfen (BytesMut)
//! - Keine Locks: Synchronisation erfolgt auf hoeherer Ebene
//!   (ein Mutex pro Session im Relais-Crate)

use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Verhalten bei vollem Puffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UeberlaufVerhalten {
    /// Aelteste Bytes verwerfen, neue annehmen
    #[default]
    AeltesteVerwerfen,
    /// Neue Bytes verwerfen, Bestand behalten
    NeuesteVerwerfen,
}

/// Begrenzte Byte-FIFO mit Ueberlauf-Politik
pub struct JitterQueue {
    daten: BytesMut,
    kapazitaet: usize,
    verhalten: UeberlaufVerhalten,
}

impl JitterQueue {
    /// Erstellt eine leere Queue mit fester Kapazitaet in Bytes
    pub fn neu(kapazitaet: usize, verhalten: UeberlaufVerhalten) -> Self {
        Self {
            daten: BytesMut::with_capacity(kapazitaet.min(64 * 1024)),
            kapazitaet,
            verhalten,
        }
    }

    /// Aktuelle Belegung in Bytes
    pub fn belegt(&self) -> usize {
        self.daten.len()
    }

    /// Maximale Kapazitaet in Bytes
    pub fn kapazitaet(&self) -> usize {
        self.kapazitaet
    }

    /// Gibt true zurueck wenn die Queue leer ist
    pub fn ist_leer(&self) -> bool {
        self.daten.is_empty()
    }

    /// Haengt Bytes an und wendet bei Ueberlauf die Politik an.
    ///
    /// Gibt die Anzahl verworfener Bytes zurueck (0 im Normalfall).
    /// Nach jedem Aufruf gilt `belegt() <= kapazitaet()`.
    pub fn schreiben(&mut self, neu: &[u8]) -> usize {
        let frei = self.kapazitaet - self.daten.len();
        if neu.len() <= frei {
            self.daten.extend_from_slice(neu);
            return 0;
        }

        let verworfen = neu.len() - frei;
        match self.verhalten {
            UeberlaufVerhalten::AeltesteVerwerfen => {
                if neu.len() >= self.kapazitaet {
                    // Neue Daten fuellen die Queue allein: Bestand und
                    // Anfang der neuen Daten entfallen komplett
                    let alt = self.daten.len();
                    self.daten.clear();
                    self.daten
                        .extend_from_slice(&neu[neu.len() - self.kapazitaet..]);
                    let gesamt = alt + (neu.len() - self.kapazitaet);
                    warn!(verworfen = gesamt, "Queue-Ueberlauf, aelteste Bytes verworfen");
                    gesamt
                } else {
                    self.daten.advance(verworfen);
                    self.daten.extend_from_slice(neu);
                    warn!(verworfen, "Queue-Ueberlauf, aelteste Bytes verworfen");
                    verworfen
                }
            }
            UeberlaufVerhalten::NeuesteVerwerfen => {
                self.daten.extend_from_slice(&neu[..frei]);
                warn!(verworfen, "Queue-Ueberlauf, neueste Bytes verworfen");
                verworfen
            }
        }
    }

    /// Entnimmt exakt `ziel.len()` Bytes vom aeltesten Ende.
    ///
    /// Der Aufrufer muss vorher `belegt() >= ziel.len()` sicherstellen.
    pub fn lesen(&mut self, ziel: &mut [u8]) {
        assert!(
            ziel.len() <= self.daten.len(),
            "Queue-Unterlauf: {} Bytes angefordert, {} belegt",
            ziel.len(),
            self.daten.len()
        );
        let kopf = self.daten.split_to(ziel.len());
        ziel.copy_from_slice(&kopf);
    }

    /// Leert die Queue vollstaendig; gibt die verworfene Byte-Anzahl zurueck
    pub fn leeren(&mut self) -> usize {
        let n = self.daten.len();
        self.daten.clear();
        n
    }
}

impl std::fmt::Debug for JitterQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitterQueue")
            .field("belegt", &self.belegt())
            .field("kapazitaet", &self.kapazitaet)
            .field("verhalten", &self.verhalten)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_von(n: usize, start: u8) -> Vec<u8> {
        (0..n).map(|i| start.wrapping_add(i as u8)).collect()
    }

    #[test]
    fn schreiben_und_lesen_fifo() {
        let mut q = JitterQueue::neu(1024, UeberlaufVerhalten::AeltesteVerwerfen);
        q.schreiben(&[1, 2, 3, 4]);
        q.schreiben(&[5, 6]);
        assert_eq!(q.belegt(), 6);

        let mut ziel = [0u8; 4];
        q.lesen(&mut ziel);
        assert_eq!(ziel, [1, 2, 3, 4], "Reihenfolge muss erhalten bleiben");
        assert_eq!(q.belegt(), 2);
    }

    #[test]
    fn belegung_bleibt_unter_kapazitaet() {
        let mut q = JitterQueue::neu(100, UeberlaufVerhalten::AeltesteVerwerfen);
        for i in 0..50 {
            q.schreiben(&bytes_von(17, i));
            assert!(q.belegt() <= q.kapazitaet(), "Invariante verletzt");
        }
    }

    #[test]
    fn ueberlauf_verwirft_aelteste_exakt() {
        let mut q = JitterQueue::neu(8, UeberlaufVerhalten::AeltesteVerwerfen);
        q.schreiben(&[1, 2, 3, 4, 5, 6, 7, 8]);

        // 3 neue Bytes verdraengen die 3 aeltesten
        let verworfen = q.schreiben(&[9, 10, 11]);
        assert_eq!(verworfen, 3);
        assert_eq!(q.belegt(), 8);

        let mut ziel = [0u8; 8];
        q.lesen(&mut ziel);
        assert_eq!(
            ziel,
            [4, 5, 6, 7, 8, 9, 10, 11],
            "Queue muss exakt die juengsten Kapazitaet-Bytes enthalten"
        );
    }

    #[test]
    fn ueberlauf_durch_uebergrossen_block() {
        let mut q = JitterQueue::neu(4, UeberlaufVerhalten::AeltesteVerwerfen);
        q.schreiben(&[1, 2]);

        // Block groesser als die Gesamtkapazitaet
        let verworfen = q.schreiben(&[10, 11, 12, 13, 14, 15]);
        assert_eq!(verworfen, 2 + 2, "Bestand plus Block-Anfang entfallen");
        assert_eq!(q.belegt(), 4);

        let mut ziel = [0u8; 4];
        q.lesen(&mut ziel);
        assert_eq!(ziel, [12, 13, 14, 15]);
    }

    #[test]
    fn ueberlauf_verwirft_neueste() {
        let mut q = JitterQueue::neu(4, UeberlaufVerhalten::NeuesteVerwerfen);
        q.schreiben(&[1, 2, 3]);
        let verworfen = q.schreiben(&[4, 5, 6]);
        assert_eq!(verworfen, 2);

        let mut ziel = [0u8; 4];
        q.lesen(&mut ziel);
        assert_eq!(ziel, [1, 2, 3, 4], "Bestand hat Vorrang");
    }

    #[test]
    fn leeren_gibt_belegung_zurueck() {
        let mut q = JitterQueue::neu(64, UeberlaufVerhalten::AeltesteVerwerfen);
        q.schreiben(&bytes_von(48, 0));
        assert_eq!(q.leeren(), 48);
        assert!(q.ist_leer());
        assert_eq!(q.leeren(), 0, "Leeren einer leeren Queue ist harmlos");
    }

    #[test]
    #[should_panic(expected = "Queue-Unterlauf")]
    fn lesen_ueber_belegung_panikt() {
        let mut q = JitterQueue::neu(16, UeberlaufVerhalten::AeltesteVerwerfen);
        q.schreiben(&[1, 2]);
        let mut ziel = [0u8; 4];
        q.lesen(&mut ziel);
    }
}
