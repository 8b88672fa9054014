//! Kommando-Schnittstelle und Session-Registry
//!
//! Der Sidecar steuert das Relais ueber den Control-Kanal des Hosts;
//! die drei Operationen laufen alle ueber die [`RelaisVerwaltung`]:
//! - `starten` – Teil des Session-Aufbaus: verbinden, Konverter bauen,
//!   Reader-Thread starten, Tap zurueckgeben
//! - `flush` – Wiedergabe unterbrechen (Barge-In)
//! - `stop` – Relais abhaengen und Ressourcen freigeben
//!
//! Fehler gehen als strukturierte Antwort mit Begruendung an den
//! Aufrufer zurueck; fehlgeschlagene Kommandos mutieren keinen Zustand.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sprechdraht_audio::Resampler;
use sprechdraht_core::{EreignisSenke, SessionAudioFormat, SessionId};
use std::sync::Arc;
use tracing::info;

use crate::config::{RelaisKonfig, ENDPUNKT_AUSGANGS_RATE, ENDPUNKT_EINGANGS_RATE};
use crate::error::{RelaisError, RelaisResult};
use crate::reader;
use crate::session::RelaisSession;
use crate::sink::AusgabeSenke;
use crate::tap::MediaTap;
use crate::telemetry::TelemetrieSnapshot;

/// Steuerbefehle des Sidecars (serde-kompatibel fuer Control-Kanaele)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kommando", rename_all = "snake_case")]
pub enum Kommando {
    /// Wiedergabe-Queue leeren und Verwerfen-Fenster starten
    Flush { session_id: SessionId },
    /// Relais beenden und abhaengen
    Stop { session_id: SessionId },
}

/// Strukturierte Antwort an den Kommando-Aufrufer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Antwort {
    Ok { nachricht: String },
    Fehler { grund: String },
}

/// Registry und Kommando-Ausfuehrung fuer alle aktiven Relais-Sessions
pub struct RelaisVerwaltung {
    sessions: DashMap<SessionId, Arc<RelaisSession>>,
    konfig: RelaisKonfig,
    ereignisse: Arc<dyn EreignisSenke>,
}

impl RelaisVerwaltung {
    /// Erstellt eine neue Verwaltung
    pub fn neu(konfig: RelaisKonfig, ereignisse: Arc<dyn EreignisSenke>) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            konfig,
            ereignisse,
        })
    }

    /// Haengt das Relais an eine Session: Argumente pruefen, Konverter
    /// bauen (fail-fast), verbinden, Reader-Thread starten, registrieren.
    ///
    /// Kehrt sofort nach der Verdrahtung zurueck. Schlaegt irgendein
    /// Schritt fehl, werden alle bereits erworbenen Ressourcen wieder
    /// freigegeben und nichts bleibt angehaengt – der Anruf laeuft dann
    /// ohne Relais weiter.
    pub fn starten(
        self: &Arc<Self>,
        session_id: SessionId,
        format: SessionAudioFormat,
        host: &str,
        port_text: &str,
        ausgabe: Arc<dyn AusgabeSenke>,
    ) -> RelaisResult<MediaTap> {
        if host.trim().is_empty() {
            return Err(RelaisError::UngueltigesArgument(
                "Verwendung: starten <host> <port>".into(),
            ));
        }
        let port: u16 = port_text
            .trim()
            .parse()
            .map_err(|_| RelaisError::UngueltigesArgument(format!("Ungueltiger Port: {}", port_text)))?;
        if port == 0 {
            return Err(RelaisError::UngueltigesArgument(
                "Port muss zwischen 1 und 65535 liegen".into(),
            ));
        }
        if self.sessions.contains_key(&session_id) {
            return Err(RelaisError::UngueltigesArgument(format!(
                "Relais bereits aktiv auf {}",
                session_id
            )));
        }

        // Konverter zuerst: billig und fail-fast, kein halber Aufbau
        let mikrofon_resampler = if format.rate != ENDPUNKT_EINGANGS_RATE {
            Some(Resampler::neu(format.rate, ENDPUNKT_EINGANGS_RATE)?)
        } else {
            None
        };
        let lautsprecher_resampler = if format.rate != ENDPUNKT_AUSGANGS_RATE {
            Some(Resampler::neu(ENDPUNKT_AUSGANGS_RATE, format.rate)?)
        } else {
            None
        };

        let session = Arc::new(RelaisSession::verbinden(
            session_id,
            format,
            self.konfig.clone(),
            Arc::clone(&self.ereignisse),
            host,
            port,
        )?);

        if let Err(e) = reader::starten(Arc::clone(&session), lautsprecher_resampler, ausgabe) {
            // Thread-Start fehlgeschlagen: Session sofort wieder abbauen
            session.beenden();
            return Err(RelaisError::Io(e));
        }

        self.sessions.insert(session_id, Arc::clone(&session));
        info!(session = %session_id, host, port, "Relais angehaengt");

        Ok(MediaTap::neu(session, Arc::clone(self), mikrofon_resampler))
    }

    /// Fordert einen Flush an (idempotent, auch waehrend eines Flushs)
    pub fn flush(&self, session_id: SessionId) -> RelaisResult<String> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or(RelaisError::RelaisNichtAktiv(session_id))?;
        session.flush_anfordern();
        info!(session = %session_id, "Flush angefordert");
        Ok("Flush angefordert".into())
    }

    /// Beendet das Relais einer Session und meldet sie ab.
    ///
    /// Sicher gegen einen bereits beendeten Reader-Thread; ein zweiter
    /// Stop nach dem Abmelden meldet "nicht aktiv".
    pub fn stop(&self, session_id: SessionId) -> RelaisResult<String> {
        let (_, session) = self
            .sessions
            .remove(&session_id)
            .ok_or(RelaisError::RelaisNichtAktiv(session_id))?;
        session.beenden();
        info!(session = %session_id, "Relais gestoppt");
        Ok("Relais gestoppt".into())
    }

    /// Fuehrt ein serialisiertes Kommando aus und liefert die Antwort
    pub fn ausfuehren(&self, kommando: Kommando) -> Antwort {
        let ergebnis = match kommando {
            Kommando::Flush { session_id } => self.flush(session_id),
            Kommando::Stop { session_id } => self.stop(session_id),
        };
        match ergebnis {
            Ok(nachricht) => Antwort::Ok { nachricht },
            Err(e) => Antwort::Fehler {
                grund: e.to_string(),
            },
        }
    }

    /// Momentaufnahme der Zaehler einer Session
    pub fn telemetrie(&self, session_id: SessionId) -> RelaisResult<TelemetrieSnapshot> {
        self.sessions
            .get(&session_id)
            .map(|s| s.telemetrie())
            .ok_or(RelaisError::SessionNichtGefunden(session_id))
    }

    /// Gibt true zurueck wenn auf der Session ein Relais haengt
    pub fn ist_aktiv(&self, session_id: SessionId) -> bool {
        self.sessions
            .get(&session_id)
            .map(|s| s.laeuft())
            .unwrap_or(false)
    }

    /// Anzahl registrierter Sessions
    pub fn session_anzahl(&self) -> usize {
        self.sessions.len()
    }

    /// Entfernt eine Session aus der Registry (Tap-Teardown)
    pub(crate) fn abmelden(&self, session_id: SessionId) {
        self.sessions.remove(&session_id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{KanalEreignisSenke, NullSenke, PufferSenke};
    use sprechdraht_core::{RelaisEreignis, StoppGrund};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    fn logging() {
        sprechdraht_observability::logging_initialisieren(&Default::default());
    }

    fn format(rate: u32) -> SessionAudioFormat {
        SessionAudioFormat::neu(rate, 20).unwrap()
    }

    /// Lokaler Sidecar-Stub: Listener plus Adresse
    fn sidecar_stub() -> (TcpListener, String, String) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let adresse = listener.local_addr().unwrap();
        (listener, adresse.ip().to_string(), adresse.port().to_string())
    }

    /// Wartet bis die Bedingung eintritt oder die Frist ablaeuft
    fn warte_bis(frist: Duration, bedingung: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < frist {
            if bedingung() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        bedingung()
    }

    #[test]
    fn ungueltige_argumente_werden_abgelehnt() {
        let verwaltung = RelaisVerwaltung::neu(RelaisKonfig::default(), Arc::new(NullSenke));
        let senke = Arc::new(PufferSenke::neu());

        for (host, port) in [("", "9000"), ("localhost", "0"), ("localhost", "99999"), ("localhost", "abc")] {
            let ergebnis = verwaltung.starten(
                SessionId::new(),
                format(8000),
                host,
                port,
                senke.clone(),
            );
            assert!(
                matches!(ergebnis, Err(RelaisError::UngueltigesArgument(_))),
                "{}:{} haette abgelehnt werden muessen",
                host,
                port
            );
        }
        assert_eq!(verwaltung.session_anzahl(), 0);
    }

    #[test]
    fn aufbau_gegen_unerreichbaren_host_schlaegt_sauber_fehl() {
        logging();
        let (listener, host, port) = sidecar_stub();
        drop(listener); // Niemand lauscht mehr

        let verwaltung = RelaisVerwaltung::neu(RelaisKonfig::default(), Arc::new(NullSenke));
        let ergebnis = verwaltung.starten(
            SessionId::new(),
            format(8000),
            &host,
            &port,
            Arc::new(PufferSenke::neu()),
        );

        // Ein einziger Fehler an den Aufrufer, nichts bleibt haengen
        assert!(matches!(ergebnis, Err(RelaisError::Verbindung(_))));
        assert_eq!(verwaltung.session_anzahl(), 0);
    }

    #[test]
    fn doppelter_start_auf_derselben_session_abgelehnt() {
        let (listener, host, port) = sidecar_stub();
        let verwaltung = RelaisVerwaltung::neu(RelaisKonfig::default(), Arc::new(NullSenke));
        let id = SessionId::new();

        let tap = verwaltung
            .starten(id, format(8000), &host, &port, Arc::new(PufferSenke::neu()))
            .expect("erster Start muss gelingen");
        let _peer = listener.accept().unwrap();

        let zweiter = verwaltung.starten(id, format(8000), &host, &port, Arc::new(PufferSenke::neu()));
        assert!(matches!(zweiter, Err(RelaisError::UngueltigesArgument(_))));
        assert_eq!(verwaltung.session_anzahl(), 1);
        drop(tap);
    }

    #[test]
    fn mikrofon_frames_erreichen_den_sidecar() {
        logging();
        let (listener, host, port) = sidecar_stub();
        let verwaltung = RelaisVerwaltung::neu(RelaisKonfig::default(), Arc::new(NullSenke));
        let id = SessionId::new();

        // Session-Rate == Endpunkt-Rate: Mikrofon-Pfad ohne Konverter
        let mut tap = verwaltung
            .starten(id, format(16000), &host, &port, Arc::new(PufferSenke::neu()))
            .unwrap();
        let (mut peer, _) = listener.accept().unwrap();

        let samples: Vec<i16> = (0..320).map(|i| (i as i16) - 160).collect();
        tap.mikrofon_frame(&samples);

        let mut empfangen = vec![0u8; 640];
        peer.read_exact(&mut empfangen).unwrap();
        for (i, paar) in empfangen.chunks_exact(2).enumerate() {
            assert_eq!(i16::from_le_bytes([paar[0], paar[1]]), samples[i]);
        }

        let t = verwaltung.telemetrie(id).unwrap();
        assert_eq!(t.frames_gesendet, 1);
        assert_eq!(t.frames_verworfen, 0);
    }

    /// 24-kHz-Stille vom Sidecar wird auf Session-Rate konvertiert und
    /// als ganze Frames getaktet ausgegeben
    #[test]
    fn szenario_stille_konvertiert_und_getaktet() {
        logging();
        let (listener, host, port) = sidecar_stub();
        let (ereignisse, ereignis_rx) = KanalEreignisSenke::neu(16);
        let verwaltung = RelaisVerwaltung::neu(RelaisKonfig::default(), Arc::new(ereignisse));
        let senke = Arc::new(PufferSenke::neu());
        let id = SessionId::new();

        let tap = verwaltung
            .starten(id, format(8000), &host, &port, senke.clone())
            .unwrap();
        let (mut peer, _) = listener.accept().unwrap();

        // 40 ms Stille bei 24 kHz: 960 Samples = 1920 Bytes
        let start = Instant::now();
        peer.write_all(&vec![0u8; 1920]).unwrap();

        // Erwartet: 40 ms bei 8 kHz = 640 Bytes = 2 Frames a 320 Bytes
        assert!(
            warte_bis(Duration::from_secs(2), || senke.gesammelt().len() >= 640),
            "Wiedergabe ist nicht angelaufen"
        );
        let ausgabe = senke.gesammelt();
        assert_eq!(ausgabe.len(), 640, "exakt 40 ms bei Session-Rate");
        assert!(ausgabe.iter().all(|&b| b == 0), "Stille muss Stille bleiben");
        assert_eq!(senke.frame_anzahl(), 2);
        assert!(
            start.elapsed() >= Duration::from_millis(20),
            "zweiter Frame darf erst nach einem Intervall kommen"
        );

        // Lifecycle: Start der Wiedergabe, dann natuerliches Ende
        let erstes = ereignis_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("Start-Ereignis fehlt");
        assert!(matches!(erstes, RelaisEreignis::WiedergabeGestartet { .. }));
        let zweites = ereignis_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("Stopp-Ereignis fehlt");
        assert!(matches!(
            zweites,
            RelaisEreignis::WiedergabeGestoppt {
                grund: StoppGrund::Complete,
                ..
            }
        ));

        let t = verwaltung.telemetrie(id).unwrap();
        assert_eq!(t.bytes_empfangen, 1920);
        assert_eq!(t.frames_abgespielt, 2);
        drop(tap);
    }

    /// Flush leert die Queue sofort; nachlaufende Daten innerhalb des
    /// Fensters werden verworfen, danach wird wieder eingereiht
    #[test]
    fn szenario_flush_verwirft_nachzuegler() {
        logging();
        let (listener, host, port) = sidecar_stub();
        let konfig = RelaisKonfig {
            verwerfen_dauer_ms: 200,
            ..RelaisKonfig::default()
        };
        let (ereignisse, ereignis_rx) = KanalEreignisSenke::neu(32);
        let verwaltung = RelaisVerwaltung::neu(konfig, Arc::new(ereignisse));
        let senke = Arc::new(PufferSenke::neu());
        let id = SessionId::new();

        // Session-Rate 24 kHz: Lautsprecher-Pfad ohne Konverter, Bytes
        // kommen unveraendert in der Queue an
        let tap = verwaltung
            .starten(id, format(24000), &host, &port, senke.clone())
            .unwrap();
        let (mut peer, _) = listener.accept().unwrap();

        // Muster A: 48000 Bytes Wiedergabe-Material (0x11)
        peer.write_all(&vec![0x11u8; 48000]).unwrap();
        assert!(
            warte_bis(Duration::from_secs(2), || {
                verwaltung.telemetrie(id).map(|t| t.bytes_empfangen >= 48000).unwrap_or(false)
            }),
            "Material ist nicht angekommen"
        );
        assert!(
            warte_bis(Duration::from_secs(2), || senke.frame_anzahl() >= 1),
            "Wiedergabe ist nicht angelaufen"
        );

        // Barge-In
        let antwort = verwaltung.flush(id).expect("Flush muss gelingen");
        assert!(antwort.contains("Flush"));
        assert!(
            warte_bis(Duration::from_secs(1), || {
                verwaltung.telemetrie(id).map(|t| t.flushes >= 1).unwrap_or(false)
            }),
            "Flush-Uebergang wurde nicht ausgefuehrt"
        );
        let flush_zeitpunkt = Instant::now();
        assert_eq!(
            verwaltung.telemetrie(id).unwrap().queue_belegt,
            0,
            "Queue muss nach dem Flush sofort leer sein"
        );

        // Muster B innerhalb des Fensters: muss stillschweigend entfallen
        peer.write_all(&vec![0x22u8; 4800]).unwrap();
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(verwaltung.telemetrie(id).unwrap().queue_belegt, 0);

        // Fenster ablaufen lassen, dann Muster C: wird wieder gespielt
        std::thread::sleep(
            Duration::from_millis(250).saturating_sub(flush_zeitpunkt.elapsed().min(Duration::from_millis(250))),
        );
        std::thread::sleep(Duration::from_millis(50));
        peer.write_all(&vec![0x33u8; 1920]).unwrap();

        assert!(
            warte_bis(Duration::from_secs(2), || {
                senke.gesammelt().contains(&0x33u8)
            }),
            "Audio nach dem Fenster muss wieder gespielt werden"
        );
        assert!(
            !senke.gesammelt().contains(&0x22u8),
            "Nachzuegler aus dem Fenster duerfen nie hoerbar werden"
        );

        // Unter den Ereignissen muss ein Flush-Stopp sein
        let mut flush_stopp = false;
        while let Ok(ereignis) = ereignis_rx.try_recv() {
            if matches!(
                ereignis,
                RelaisEreignis::WiedergabeGestoppt {
                    grund: StoppGrund::Flush,
                    ..
                }
            ) {
                flush_stopp = true;
            }
        }
        assert!(flush_stopp, "Stopp-Ereignis mit Grund 'flush' fehlt");
        drop(tap);
    }

    /// Der Mikrofon-Pfad darf nie blockieren: liest der Sidecar nicht,
    /// laufen die Kernel-Puffer voll und Frames entfallen ersatzlos
    #[test]
    fn mikrofon_pfad_blockiert_nie_bei_vollem_peer() {
        logging();
        let (listener, host, port) = sidecar_stub();
        let verwaltung = RelaisVerwaltung::neu(RelaisKonfig::default(), Arc::new(NullSenke));
        let id = SessionId::new();

        let mut tap = verwaltung
            .starten(id, format(16000), &host, &port, Arc::new(PufferSenke::neu()))
            .unwrap();
        let (peer, _) = listener.accept().unwrap();
        // Peer liest nie

        let frame = vec![0i16; 320]; // 20 ms bei 16 kHz
        let start = Instant::now();
        for _ in 0..4000 {
            tap.mikrofon_frame(&frame);
            if verwaltung.telemetrie(id).unwrap().frames_verworfen > 0 {
                break;
            }
        }

        let t = verwaltung.telemetrie(id).unwrap();
        assert!(t.frames_verworfen > 0, "volle Puffer muessen Frames verwerfen");
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "Mikrofon-Pfad hat blockiert: {:?}",
            start.elapsed()
        );
        drop(peer);
        drop(tap);
    }

    #[test]
    fn flush_und_stop_auf_unbekannter_session() {
        let verwaltung = RelaisVerwaltung::neu(RelaisKonfig::default(), Arc::new(NullSenke));
        let id = SessionId::new();

        assert!(matches!(
            verwaltung.flush(id),
            Err(RelaisError::RelaisNichtAktiv(_))
        ));
        assert!(matches!(
            verwaltung.stop(id),
            Err(RelaisError::RelaisNichtAktiv(_))
        ));

        // Als Kommando: strukturierte Fehler-Antwort
        let antwort = verwaltung.ausfuehren(Kommando::Flush { session_id: id });
        assert!(matches!(antwort, Antwort::Fehler { .. }));
    }

    #[test]
    fn stop_beendet_und_meldet_ab() {
        logging();
        let (listener, host, port) = sidecar_stub();
        let verwaltung = RelaisVerwaltung::neu(RelaisKonfig::default(), Arc::new(NullSenke));
        let id = SessionId::new();

        let tap = verwaltung
            .starten(id, format(8000), &host, &port, Arc::new(PufferSenke::neu()))
            .unwrap();
        let _peer = listener.accept().unwrap();
        assert!(verwaltung.ist_aktiv(id));

        let antwort = verwaltung.ausfuehren(Kommando::Stop { session_id: id });
        assert!(matches!(antwort, Antwort::Ok { .. }));
        assert_eq!(verwaltung.session_anzahl(), 0);
        assert!(!tap.aktiv(), "laeuft-Flag muss geloescht sein");

        // Zweiter Stop: Relais haengt nicht mehr
        assert!(matches!(
            verwaltung.stop(id),
            Err(RelaisError::RelaisNichtAktiv(_))
        ));
        drop(tap);
    }

    #[test]
    fn tap_teardown_meldet_session_ab() {
        let (listener, host, port) = sidecar_stub();
        let verwaltung = RelaisVerwaltung::neu(RelaisKonfig::default(), Arc::new(NullSenke));
        let id = SessionId::new();

        let tap = verwaltung
            .starten(id, format(8000), &host, &port, Arc::new(PufferSenke::neu()))
            .unwrap();
        let _peer = listener.accept().unwrap();
        assert_eq!(verwaltung.session_anzahl(), 1);

        drop(tap); // Teardown ueber den Drop-Pfad
        assert_eq!(verwaltung.session_anzahl(), 0);
        assert!(!verwaltung.ist_aktiv(id));
    }

    #[test]
    fn sidecar_trennung_beendet_den_reader() {
        logging();
        let (listener, host, port) = sidecar_stub();
        let verwaltung = RelaisVerwaltung::neu(RelaisKonfig::default(), Arc::new(NullSenke));
        let id = SessionId::new();

        let tap = verwaltung
            .starten(id, format(8000), &host, &port, Arc::new(PufferSenke::neu()))
            .unwrap();
        let (peer, _) = listener.accept().unwrap();

        drop(peer); // Sidecar trennt die Verbindung

        assert!(
            warte_bis(Duration::from_secs(2), || !tap.aktiv()),
            "Reader muss bei Trennung das laeuft-Flag loeschen"
        );
        drop(tap);
    }

    #[test]
    fn kommandos_sind_serde_kompatibel() {
        let id = SessionId::new();
        let json = serde_json::to_string(&Kommando::Flush { session_id: id }).unwrap();
        assert!(json.contains("\"kommando\":\"flush\""));
        let zurueck: Kommando = serde_json::from_str(&json).unwrap();
        assert!(matches!(zurueck, Kommando::Flush { session_id } if session_id == id));

        let antwort = Antwort::Ok {
            nachricht: "Relais gestoppt".into(),
        };
        let json = serde_json::to_string(&antwort).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
    }
}
