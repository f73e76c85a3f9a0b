//! Handshake-Zustandsmaschine
//!
//! Uebersetzt die positionsgebundenen Konfigurations-Frames einer neuen
//! Verbindung in ein festes Stream-Format. Zwei Wire-Varianten werden als
//! Konfigurationsvarianten derselben Maschine unterstuetzt:
//!
//! ## Variante RohesPcm (explizites Tripel)
//! ```text
//! ErwarteAbtastrate -> ErwarteKanalzahl -> ErwarteBittiefe -> Streaming
//! ```
//! Drei Text-Frames (dezimales ASCII): Abtastrate, Kanalzahl, Bittiefe.
//! Die Bittiefe toleriert ein nicht-numerisches Suffix (z.B. "16le").
//! Danach ist jeder Frame rohes PCM.
//!
//! ## Variante Opus (nur Abtastrate)
//! ```text
//! ErwarteAbtastrate -> Streaming
//! ```
//! Ein Text-Frame mit der Abtastrate; Kanalzahl und Bittiefe sind fuer den
//! Prozess fest (mono, 16 bit). Der allererste Frame ist nie Audio, auch
//! wenn er sich als solches deuten liesse – das ist eine strikte
//! Protokollregel, keine Heuristik. Danach ist jeder Frame ein
//! komprimierter Audio-Frame.
//!
//! Ein fehlgeschlagener Parse ist terminal: die Felder sind positional und
//! koennen nicht neu synchronisiert werden, die Maschine geht nach
//! `Geschlossen` und die Verbindung muss getrennt werden.

use klangbruecke_core::error::{RelayError, Result};
use klangbruecke_core::types::StreamFormat;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Konstanten der Opus-Variante
// ---------------------------------------------------------------------------

/// Feste Kanalzahl der Opus-Variante
pub const OPUS_KANALZAHL: u16 = 1;

/// Feste Bittiefe der Opus-Variante
pub const OPUS_BITTIEFE: u16 = 16;

// ---------------------------------------------------------------------------
// Typen
// ---------------------------------------------------------------------------

/// Wire-Format-Variante einer Deployment-Konfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeVariante {
    /// Dreistufiger Handshake, Payload ist unkomprimiertes PCM
    RohesPcm,
    /// Einstufiger Handshake, Payload sind komprimierte Opus-Frames
    Opus,
}

/// Phase einer Session
///
/// Die Phasen werden streng monoton durchlaufen und nie erneut betreten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Wartet auf das Abtastraten-Frame
    ErwarteAbtastrate,
    /// Wartet auf das Kanalzahl-Frame (nur RohesPcm)
    ErwarteKanalzahl,
    /// Wartet auf das Bittiefen-Frame (nur RohesPcm)
    ErwarteBittiefe,
    /// Handshake abgeschlossen, jeder weitere Frame ist Audio
    Streaming,
    /// Session beendet
    Geschlossen,
}

/// Ergebnis eines Konfigurationsschritts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Konfigurationsergebnis {
    /// Es fehlen noch weitere Konfigurations-Frames
    MehrErwartet,
    /// Handshake vollstaendig, das Stream-Format steht fest
    Bereit(StreamFormat),
}

// ---------------------------------------------------------------------------
// HandshakeMaschine
// ---------------------------------------------------------------------------

/// Zustandsmaschine fuer den Verbindungs-Handshake
///
/// Die Format-Felder sind write-once: jedes Feld wird genau einmal aus genau
/// einem Frame gelesen, eine spaetere Neuzuweisung gibt es nicht.
#[derive(Debug)]
pub struct HandshakeMaschine {
    variante: HandshakeVariante,
    phase: StreamPhase,
    abtastrate: Option<u32>,
    kanalzahl: Option<u16>,
}

impl HandshakeMaschine {
    /// Erstellt eine neue Maschine in der Startphase
    pub fn neu(variante: HandshakeVariante) -> Self {
        Self {
            variante,
            phase: StreamPhase::ErwarteAbtastrate,
            abtastrate: None,
            kanalzahl: None,
        }
    }

    /// Gibt die aktuelle Phase zurueck
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Gibt die konfigurierte Variante zurueck
    pub fn variante(&self) -> HandshakeVariante {
        self.variante
    }

    /// Verarbeitet einen Konfigurations-Frame
    ///
    /// Bei einem Parse-Fehler geht die Maschine nach `Geschlossen` und der
    /// Fehler ist terminal. In den Phasen `Streaming` und `Geschlossen` darf
    /// diese Methode nicht mehr aufgerufen werden; ein Aufruf dort ist ein
    /// Protokollfehler.
    pub fn konfigurieren(&mut self, frame: &[u8]) -> Result<Konfigurationsergebnis> {
        let ergebnis = match self.phase {
            StreamPhase::ErwarteAbtastrate => {
                let abtastrate = self.feld_parsen::<u32>(frame, "Abtastrate")?;
                self.abtastrate = Some(abtastrate);
                match self.variante {
                    HandshakeVariante::Opus => {
                        self.phase = StreamPhase::Streaming;
                        Konfigurationsergebnis::Bereit(StreamFormat::neu(
                            abtastrate,
                            OPUS_KANALZAHL,
                            OPUS_BITTIEFE,
                        ))
                    }
                    HandshakeVariante::RohesPcm => {
                        self.phase = StreamPhase::ErwarteKanalzahl;
                        Konfigurationsergebnis::MehrErwartet
                    }
                }
            }
            StreamPhase::ErwarteKanalzahl => {
                let kanalzahl = self.feld_parsen::<u16>(frame, "Kanalzahl")?;
                self.kanalzahl = Some(kanalzahl);
                self.phase = StreamPhase::ErwarteBittiefe;
                Konfigurationsergebnis::MehrErwartet
            }
            StreamPhase::ErwarteBittiefe => {
                let bittiefe = self.ziffernfolge_parsen(frame)?;
                self.phase = StreamPhase::Streaming;
                // Invariante: beide Felder wurden in frueheren Phasen gesetzt
                let abtastrate = self.abtastrate.unwrap_or_default();
                let kanalzahl = self.kanalzahl.unwrap_or_default();
                Konfigurationsergebnis::Bereit(StreamFormat::neu(abtastrate, kanalzahl, bittiefe))
            }
            StreamPhase::Streaming | StreamPhase::Geschlossen => {
                self.phase = StreamPhase::Geschlossen;
                return Err(RelayError::UngueltigerHandshake(
                    "Handshake ist bereits abgeschlossen".into(),
                ));
            }
        };
        Ok(ergebnis)
    }

    /// Setzt die Maschine terminal auf `Geschlossen` (idempotent)
    pub fn schliessen(&mut self) {
        self.phase = StreamPhase::Geschlossen;
    }

    /// Parst einen Frame als dezimale Ganzzahl
    fn feld_parsen<T: FromStr>(&mut self, frame: &[u8], feld: &str) -> Result<T> {
        let text = String::from_utf8_lossy(frame);
        let text = text.trim();
        match text.parse::<T>() {
            Ok(wert) => Ok(wert),
            Err(_) => {
                self.phase = StreamPhase::Geschlossen;
                Err(RelayError::UngueltigerHandshake(format!(
                    "{feld} '{text}' ist keine Ganzzahl"
                )))
            }
        }
    }

    /// Parst die erste Ziffernfolge eines Frames (toleriert Suffixe wie "16le")
    fn ziffernfolge_parsen(&mut self, frame: &[u8]) -> Result<u16> {
        let text = String::from_utf8_lossy(frame);
        let ziffern: String = text
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();

        match ziffern.parse::<u16>() {
            Ok(wert) => Ok(wert),
            Err(_) => {
                self.phase = StreamPhase::Geschlossen;
                Err(RelayError::UngueltigerHandshake(format!(
                    "Bittiefe '{}' enthaelt keine Ziffernfolge",
                    text.trim()
                )))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rohes_pcm_durchlaeuft_alle_phasen_monoton() {
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::RohesPcm);
        assert_eq!(maschine.phase(), StreamPhase::ErwarteAbtastrate);

        let schritt = maschine.konfigurieren(b"16000").unwrap();
        assert_eq!(schritt, Konfigurationsergebnis::MehrErwartet);
        assert_eq!(maschine.phase(), StreamPhase::ErwarteKanalzahl);

        let schritt = maschine.konfigurieren(b"1").unwrap();
        assert_eq!(schritt, Konfigurationsergebnis::MehrErwartet);
        assert_eq!(maschine.phase(), StreamPhase::ErwarteBittiefe);

        let schritt = maschine.konfigurieren(b"16").unwrap();
        assert_eq!(
            schritt,
            Konfigurationsergebnis::Bereit(StreamFormat::neu(16000, 1, 16))
        );
        assert_eq!(maschine.phase(), StreamPhase::Streaming);
    }

    #[test]
    fn opus_variante_ist_nach_einem_frame_bereit() {
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::Opus);

        let schritt = maschine.konfigurieren(b"48000").unwrap();
        assert_eq!(
            schritt,
            Konfigurationsergebnis::Bereit(StreamFormat::neu(48000, 1, 16))
        );
        assert_eq!(maschine.phase(), StreamPhase::Streaming);
    }

    #[test]
    fn bittiefe_toleriert_suffix() {
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::RohesPcm);
        maschine.konfigurieren(b"44100").unwrap();
        maschine.konfigurieren(b"2").unwrap();

        let schritt = maschine.konfigurieren(b"16le").unwrap();
        assert_eq!(
            schritt,
            Konfigurationsergebnis::Bereit(StreamFormat::neu(44100, 2, 16))
        );
    }

    #[test]
    fn bittiefe_toleriert_praefix() {
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::RohesPcm);
        maschine.konfigurieren(b"8000").unwrap();
        maschine.konfigurieren(b"1").unwrap();

        // Erste Ziffernfolge zaehlt, egal wo sie beginnt
        let schritt = maschine.konfigurieren(b"s24 foo").unwrap();
        assert_eq!(
            schritt,
            Konfigurationsergebnis::Bereit(StreamFormat::neu(8000, 1, 24))
        );
    }

    #[test]
    fn abtastrate_mit_umgebendem_whitespace() {
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::Opus);
        let schritt = maschine.konfigurieren(b" 24000\n").unwrap();
        assert_eq!(
            schritt,
            Konfigurationsergebnis::Bereit(StreamFormat::neu(24000, 1, 16))
        );
    }

    #[test]
    fn fehlerhafte_abtastrate_schliesst_maschine() {
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::RohesPcm);
        let result = maschine.konfigurieren(b"keine-zahl");
        assert!(matches!(result, Err(RelayError::UngueltigerHandshake(_))));
        assert_eq!(maschine.phase(), StreamPhase::Geschlossen);
    }

    #[test]
    fn fehlerhafte_kanalzahl_schliesst_maschine() {
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::RohesPcm);
        maschine.konfigurieren(b"48000").unwrap();
        let result = maschine.konfigurieren(b"stereo");
        assert!(matches!(result, Err(RelayError::UngueltigerHandshake(_))));
        assert_eq!(maschine.phase(), StreamPhase::Geschlossen);
    }

    #[test]
    fn bittiefe_ohne_ziffern_schliesst_maschine() {
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::RohesPcm);
        maschine.konfigurieren(b"48000").unwrap();
        maschine.konfigurieren(b"2").unwrap();
        let result = maschine.konfigurieren(b"float");
        assert!(matches!(result, Err(RelayError::UngueltigerHandshake(_))));
        assert_eq!(maschine.phase(), StreamPhase::Geschlossen);
    }

    #[test]
    fn leerer_frame_ist_kein_handshake_feld() {
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::Opus);
        let result = maschine.konfigurieren(b"");
        assert!(result.is_err());
        assert_eq!(maschine.phase(), StreamPhase::Geschlossen);
    }

    #[test]
    fn konfigurieren_nach_streaming_ist_protokollfehler() {
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::Opus);
        maschine.konfigurieren(b"48000").unwrap();
        let result = maschine.konfigurieren(b"48000");
        assert!(result.is_err());
        assert_eq!(maschine.phase(), StreamPhase::Geschlossen);
    }

    #[test]
    fn schliessen_ist_idempotent() {
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::RohesPcm);
        maschine.schliessen();
        assert_eq!(maschine.phase(), StreamPhase::Geschlossen);
        maschine.schliessen();
        assert_eq!(maschine.phase(), StreamPhase::Geschlossen);
    }

    #[test]
    fn null_abtastrate_parst_und_scheitert_erst_am_geraet() {
        // Wertebereichs-Pruefung ist Sache der Geraete-Konstruktion,
        // der Handshake verlangt nur Ganzzahl-Syntax
        let mut maschine = HandshakeMaschine::neu(HandshakeVariante::Opus);
        let schritt = maschine.konfigurieren(b"0").unwrap();
        assert_eq!(
            schritt,
            Konfigurationsergebnis::Bereit(StreamFormat::neu(0, 1, 16))
        );
    }
}
