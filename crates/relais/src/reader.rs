//! Empfangs-Schleife und getaktete Wiedergabe (Reader-Thread)
//!
//! Ein dedizierter Thread pro Session besitzt die Empfangsseite des
//! Sidecar-Sockets und treibt die Wiedergabe in die Telefonie. Der
//! Host-Takt laesst sich nicht als Pull-Quelle verwenden, wenn der
//! Sidecar schneller als Echtzeit liefert; deshalb schreibt dieser
//! Thread selbst mit expliziten Schlaf-Intervallen: Aufnahme-Rate und
//! Wiedergabe-Rate sind entkoppelt, und der Host bekommt nie mehr als
//! einen Frame pro Paketierungsintervall.
//!
//! ## Ablauf einer Iteration
//! 1. Blockierender Empfang (0 Bytes oder Fehler beendet den Thread)
//! 2. Resampling 24 kHz -> Session-Rate (falls Konverter vorhanden)
//! 3. Flush-Check: Uebergang ausfuehren, Block verwerfen
//! 4. Verwerfen-Fenster: Block stillschweigend verwerfen
//! 5. Block in die Queue (Ueberlauf-Politik)
//! 6. Drain: pro vollem Frame erneuter Flush-Check, Ausgabe, ein
//!    Intervall schlafen
//!
//! Beendigung ist kooperativ: `laeuft`-Flag plus Socket-Shutdown als
//! Wecksignal; der Empfang selbst hat kein Timeout.

use sprechdraht_audio::Resampler;
use sprechdraht_core::{RelaisEreignis, StoppGrund};
use std::io::Read;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EMPFANGS_PUFFER_BYTES;
use crate::flush::{EingangsErgebnis, FrameErgebnis};
use crate::session::RelaisSession;
use crate::sink::AusgabeSenke;

/// Startet den Reader-Thread fuer eine Session.
///
/// Der JoinHandle wird bewusst verworfen: der Thread laeuft detached,
/// seine Lebensdauer haengt am `laeuft`-Flag und am Socket.
pub(crate) fn starten(
    session: Arc<RelaisSession>,
    resampler: Option<Resampler>,
    ausgabe: Arc<dyn AusgabeSenke>,
) -> std::io::Result<()> {
    let id_hex = session.id().inner().simple().to_string();
    let name = format!("sd-reader-{}", &id_hex[..8]);
    std::thread::Builder::new()
        .name(name)
        .spawn(move || empfangs_schleife(session, resampler, ausgabe))?;
    Ok(())
}

/// Hauptschleife des Reader-Threads
fn empfangs_schleife(
    session: Arc<RelaisSession>,
    mut resampler: Option<Resampler>,
    ausgabe: Arc<dyn AusgabeSenke>,
) {
    let frame_bytes = session.session_frame_bytes();
    let frame_dauer = session.format().frame_dauer();
    let mut empfangs_puffer = [0u8; EMPFANGS_PUFFER_BYTES];
    // Arbeitspuffer fuer einen Frame, dimensioniert fuer die hoechste Rate
    let mut frame_puffer = vec![0u8; session.max_frame_bytes()];
    // TCP kennt keine Sample-Grenzen: ein halbes Sample kann am
    // Blockende haengen und gehoert an den Anfang des naechsten Blocks
    let mut halbes_sample: Option<u8> = None;
    let mut spielt = false;
    // Read auf &TcpStream: der Socket selbst bleibt in der Session
    let mut socket_leser = session.socket();

    info!(session = %session.id(), "Reader-Thread gestartet");

    while session.laeuft() {
        let gelesen = match socket_leser.read(&mut empfangs_puffer) {
            Ok(0) => {
                info!(session = %session.id(), "Sidecar hat die Verbindung geschlossen");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                info!(session = %session.id(), fehler = %e, "Empfang beendet");
                break;
            }
        };
        session.zaehler().bytes_empfangen(gelesen);

        // Block auf ganze Samples ausrichten
        let mut roh = Vec::with_capacity(gelesen + 1);
        if let Some(b) = halbes_sample.take() {
            roh.push(b);
        }
        roh.extend_from_slice(&empfangs_puffer[..gelesen]);
        if roh.len() % 2 == 1 {
            halbes_sample = roh.pop();
        }
        if roh.is_empty() {
            continue;
        }

        // 24 kHz -> Session-Rate, falls die Raten abweichen
        let wiedergabe_bytes: Vec<u8> = match resampler.as_mut() {
            Some(r) => {
                let samples: Vec<i16> = roh
                    .chunks_exact(2)
                    .map(|p| i16::from_le_bytes([p[0], p[1]]))
                    .collect();
                let konvertiert = r.verarbeiten(&samples);
                let mut bytes = Vec::with_capacity(konvertiert.len() * 2);
                for s in konvertiert {
                    bytes.extend_from_slice(&s.to_le_bytes());
                }
                bytes
            }
            None => roh,
        };
        if wiedergabe_bytes.is_empty() {
            continue; // Konverter puffert noch (unvollstaendiger Chunk)
        }

        match session.eingang_verarbeiten(&wiedergabe_bytes, Instant::now()) {
            EingangsErgebnis::Geflusht { geleert } => {
                info!(
                    session = %session.id(),
                    geleert,
                    fenster_ms = session.konfig().verwerfen_dauer_ms,
                    "Unterbrechung: Queue geleert, Verwerfen-Fenster aktiv"
                );
                wiedergabe_stoppen(&session, &mut spielt, StoppGrund::Flush);
                continue;
            }
            EingangsErgebnis::Verworfen => continue,
            EingangsErgebnis::Eingereiht {
                wieder_aufgenommen, ..
            } => {
                if wieder_aufgenommen {
                    info!(session = %session.id(), "Audio nach Verwerfen-Fenster wieder aufgenommen");
                }
            }
        }

        // Drain: getaktete Ausgabe ganzer Frames
        while session.laeuft() {
            let ziel = &mut frame_puffer[..frame_bytes];
            match session.frame_entnehmen(ziel, Instant::now()) {
                FrameErgebnis::Geflusht { geleert } => {
                    info!(
                        session = %session.id(),
                        geleert,
                        fenster_ms = session.konfig().verwerfen_dauer_ms,
                        "Unterbrechung waehrend der Wiedergabe: Queue geleert"
                    );
                    wiedergabe_stoppen(&session, &mut spielt, StoppGrund::Flush);
                    break;
                }
                FrameErgebnis::ZuWenigDaten { rest } => {
                    if rest == 0 {
                        wiedergabe_stoppen(&session, &mut spielt, StoppGrund::Complete);
                    }
                    break;
                }
                FrameErgebnis::Entnommen => {
                    if let Err(e) = ausgabe.frame_ausgeben(&frame_puffer[..frame_bytes]) {
                        // Transient: dieser Drain-Zyklus endet, der Thread lebt weiter
                        warn!(session = %session.id(), fehler = %e, "Frame-Ausgabe fehlgeschlagen");
                        break;
                    }
                    if !spielt {
                        spielt = true;
                        debug!(session = %session.id(), "Wiedergabe gestartet");
                        session.ereignisse().senden(RelaisEreignis::WiedergabeGestartet {
                            session_id: session.id(),
                        });
                    }
                    session.zaehler().frame_abgespielt();
                    std::thread::sleep(frame_dauer);
                }
            }
        }
    }

    wiedergabe_stoppen(&session, &mut spielt, StoppGrund::Complete);
    session.beenden();
    info!(session = %session.id(), "Reader-Thread beendet");
}

/// Meldet das Wiedergabe-Ende, falls gerade gespielt wurde
fn wiedergabe_stoppen(session: &RelaisSession, spielt: &mut bool, grund: StoppGrund) {
    if *spielt {
        *spielt = false;
        debug!(session = %session.id(), grund = %grund, "Wiedergabe gestoppt");
        session.ereignisse().senden(RelaisEreignis::WiedergabeGestoppt {
            session_id: session.id(),
            grund,
        });
    }
}
