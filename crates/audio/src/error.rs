//! Fehlertypen fuer die Audio-Schicht

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Schicht
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Nicht unterstuetzte Abtastrate: {0} Hz")]
    NichtUnterstuetzteAbtastrate(u32),

    #[error("Nicht unterstuetzte Kanalzahl: {0}")]
    NichtUnterstuetzteKanalzahl(u16),

    #[error("Nicht unterstuetzte Bittiefe: {0} bit")]
    NichtUnterstuetzteBittiefe(u16),
}

pub type AudioResult<T> = Result<T, AudioError>;
