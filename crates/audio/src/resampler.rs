//! Zustandsbehafteter Sample-Raten-Konverter
//!
//! Wandelt Mono-PCM (16-bit signed) zwischen zwei festen Abtastraten um.
//! Intern arbeitet ein FFT-Resampler (rubato) auf f32-Chunks fester
//! Groesse; Eingabe-Reste werden gepuffert, damit aufeinanderfolgende
//! Aufrufe nahtlos ineinander uebergehen. Der Konverter wird pro
//! Richtung genau einmal pro Session erstellt und niemals pro Aufruf
//! neu aufgebaut – sonst gingen Filterzustand und Kontinuitaet verloren.
//!
//! ## Chunk-Geometrie
//! Chunk-Groesse ist 10 ms bei der Eingangsrate. Damit liefert ein
//! Eingabe-Block, der ein Vielfaches von 10 ms umfasst (der Normalfall
//! bei paketierter Telefonie), exakt die erwartete Ausgabelaenge.

use rubato::{FftFixedIn, Resampler as RubatoResampler};
use tracing::debug;

use crate::error::{AudioError, AudioResult};

/// Sub-Chunks pro FFT-Block (Qualitaet vs. Latenz)
const SUB_CHUNKS: usize = 2;

/// Sample-Raten-Konverter mit erhaltenem Filterzustand
pub struct Resampler {
    inner: FftFixedIn<f32>,
    /// Eingabe-Rest der noch keinen vollen Chunk ergibt
    eingabe_rest: Vec<f32>,
    chunk_groesse: usize,
    von_rate: u32,
    nach_rate: u32,
}

impl Resampler {
    /// Erstellt einen Konverter fuer das gegebene Raten-Paar.
    ///
    /// Schlaegt fehl wenn das Paar nicht unterstuetzt wird (Raten muessen
    /// ganzzahlige 10-ms-Chunks ergeben) oder der interne Resampler nicht
    /// aufgebaut werden kann. Ein Fehlschlag hier bricht den gesamten
    /// Session-Aufbau ab.
    pub fn neu(von_rate: u32, nach_rate: u32) -> AudioResult<Self> {
        if von_rate == 0 || nach_rate == 0 || von_rate % 100 != 0 || nach_rate % 100 != 0 {
            return Err(AudioError::RateNichtUnterstuetzt {
                von: von_rate,
                nach: nach_rate,
            });
        }
        if von_rate == nach_rate {
            return Err(AudioError::Konfiguration(format!(
                "Gleiche Raten ({} Hz): Konverter entfaellt, Samples werden durchgereicht",
                von_rate
            )));
        }

        // 10 ms bei der Eingangsrate
        let chunk_groesse = (von_rate / 100) as usize;

        let inner = FftFixedIn::<f32>::new(
            von_rate as usize,
            nach_rate as usize,
            chunk_groesse,
            SUB_CHUNKS,
            1, // Mono
        )
        .map_err(|e| AudioError::Resampler(format!("{} -> {} Hz: {}", von_rate, nach_rate, e)))?;

        debug!(
            von = von_rate,
            nach = nach_rate,
            chunk = chunk_groesse,
            "Resampler erstellt"
        );

        Ok(Self {
            inner,
            eingabe_rest: Vec::with_capacity(chunk_groesse * 2),
            chunk_groesse,
            von_rate,
            nach_rate,
        })
    }

    /// Eingangsrate in Hz
    pub fn von_rate(&self) -> u32 {
        self.von_rate
    }

    /// Ausgangsrate in Hz
    pub fn nach_rate(&self) -> u32 {
        self.nach_rate
    }

    /// Konvertiert einen Block Mono-Samples.
    ///
    /// Verarbeitet alle vollstaendigen 10-ms-Chunks; ein Rest bleibt im
    /// internen Puffer und wird beim naechsten Aufruf fortgesetzt. Die
    /// Ausgabe kann deshalb leer sein, wenn der Block kleiner als ein
    /// Chunk war.
    pub fn verarbeiten(&mut self, eingabe: &[i16]) -> Vec<i16> {
        self.eingabe_rest
            .extend(eingabe.iter().map(|&s| s as f32 / i16::MAX as f32));

        let mut ausgabe = Vec::new();

        while self.eingabe_rest.len() >= self.chunk_groesse {
            let chunk: Vec<f32> = self.eingabe_rest.drain(..self.chunk_groesse).collect();

            match self.inner.process(&[chunk], None) {
                Ok(konvertiert) => {
                    if let Some(kanal) = konvertiert.first() {
                        ausgabe.extend(kanal.iter().map(|&s| {
                            (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16
                        }));
                    }
                }
                Err(e) => {
                    // Chunk-Groesse ist konstruktionsbedingt korrekt; ein
                    // Fehler hier ist nicht behebbar, der Chunk entfaellt.
                    tracing::error!(fehler = %e, "Resampler-Verarbeitung fehlgeschlagen");
                }
            }
        }

        ausgabe
    }

    /// Anzahl gepufferter Eingabe-Samples (noch kein voller Chunk)
    pub fn gepufferte_samples(&self) -> usize {
        self.eingabe_rest.len()
    }
}
