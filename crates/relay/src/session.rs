//! Relay-Session – eine zugelassene Audio-Verbindung
//!
//! Die Session fuehrt die Handshake-Maschine und besitzt Decoder und Sink
//! fuer genau ihre Lebensdauer. Solange der Handshake laeuft, wird jeder
//! Frame als Konfigurationsfeld verarbeitet; sobald das Stream-Format
//! feststeht, werden Decoder (nur Opus-Variante) und Sink in dieser
//! Reihenfolge genau einmal konstruiert und die Session wechselt in eine
//! reine Weiterleitungsschleife.
//!
//! Alle Fehler sind terminal fuer die Session: der Aufrufer trennt die
//! Verbindung und ruft `schliessen` als einzigen Abbaupfad. `schliessen`
//! gibt Sink und Decoder in umgekehrter Konstruktionsreihenfolge frei und
//! ist idempotent.

use klangbruecke_audio::decoder::{DecoderFabrik, FrameDecoder};
use klangbruecke_audio::sink::{AudioSink, SinkOeffner};
use klangbruecke_core::error::{RelayError, Result};
use klangbruecke_core::types::{SessionId, StreamFormat};
use klangbruecke_protocol::handshake::{
    HandshakeMaschine, HandshakeVariante, Konfigurationsergebnis, StreamPhase,
};
use tracing::{info, trace};

/// Eine zugelassene Audio-Session
pub struct RelaySession<S, D>
where
    S: SinkOeffner,
    D: DecoderFabrik,
{
    id: SessionId,
    maschine: HandshakeMaschine,
    sink_oeffner: S,
    decoder_fabrik: D,
    decoder: Option<D::Decoder>,
    sink: Option<S::Sink>,
}

impl<S, D> RelaySession<S, D>
where
    S: SinkOeffner,
    D: DecoderFabrik,
{
    /// Erstellt eine neue Session in der Handshake-Phase
    pub fn neu(id: SessionId, variante: HandshakeVariante, sink_oeffner: S, decoder_fabrik: D) -> Self {
        Self {
            id,
            maschine: HandshakeMaschine::neu(variante),
            sink_oeffner,
            decoder_fabrik,
            decoder: None,
            sink: None,
        }
    }

    /// Gibt die Session-ID zurueck
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Gibt die aktuelle Phase zurueck
    pub fn phase(&self) -> StreamPhase {
        self.maschine.phase()
    }

    /// Verarbeitet einen eingehenden Frame
    ///
    /// Handshake-Frames konfigurieren das Stream-Format, alle weiteren
    /// Frames sind Audio. Ein Fehler ist terminal; der Aufrufer muss die
    /// Verbindung trennen und `schliessen` aufrufen.
    pub fn nachricht(&mut self, frame: &[u8]) -> Result<()> {
        match self.maschine.phase() {
            StreamPhase::Streaming => self.weiterleiten(frame),
            StreamPhase::Geschlossen => {
                // Verspaetete Frames nach dem Schliessen sind wirkungslos
                trace!(session = %self.id, "Frame nach Schliessen ignoriert");
                Ok(())
            }
            _ => self.handshake_schritt(frame),
        }
    }

    /// Baut Sink und Decoder ab und schliesst die Session (idempotent)
    ///
    /// Abbau in umgekehrter Konstruktionsreihenfolge: erst der Sink, dann
    /// der Decoder.
    pub fn schliessen(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.schliessen();
        }
        self.decoder = None;
        self.maschine.schliessen();
    }

    /// Verarbeitet ein Handshake-Feld und oeffnet bei Abschluss den Stream
    fn handshake_schritt(&mut self, frame: &[u8]) -> Result<()> {
        match self.maschine.konfigurieren(frame)? {
            Konfigurationsergebnis::MehrErwartet => Ok(()),
            Konfigurationsergebnis::Bereit(format) => self.stream_oeffnen(format),
        }
    }

    /// Konstruiert Decoder (nur Opus-Variante) und Sink – genau einmal
    fn stream_oeffnen(&mut self, format: StreamFormat) -> Result<()> {
        let decoder = match self.maschine.variante() {
            HandshakeVariante::Opus => Some(
                self.decoder_fabrik
                    .erstellen(format.abtastrate, format.kanalzahl)
                    .map_err(|e| RelayError::Geraet(e.to_string()))?,
            ),
            HandshakeVariante::RohesPcm => None,
        };

        let sink = self
            .sink_oeffner
            .oeffnen(&format)
            .map_err(|e| RelayError::Geraet(e.to_string()))?;

        self.decoder = decoder;
        self.sink = Some(sink);

        info!(session = %self.id, format = %format, "Stream geoeffnet");
        Ok(())
    }

    /// Reicht einen Audio-Frame an den Sink weiter
    ///
    /// PCM-Frames werden unveraendert geschrieben; in der Opus-Variante
    /// laeuft jeder Frame zuerst durch den Decoder. Es findet kein Parsen
    /// und keine Laengenpruefung statt – das Byte-Layout gilt als zum
    /// angekuendigten Format passend.
    fn weiterleiten(&mut self, frame: &[u8]) -> Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Err(RelayError::Geraet("Sink ist nicht geoeffnet".into()));
        };

        match self.decoder.as_mut() {
            Some(decoder) => {
                let pcm = decoder
                    .dekodieren(frame)
                    .map_err(|e| RelayError::Geraet(e.to_string()))?;
                sink.schreiben(&pcm)
                    .map_err(|e| RelayError::Geraet(e.to_string()))?;
            }
            None => {
                sink.schreiben(frame)
                    .map_err(|e| RelayError::Geraet(e.to_string()))?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use klangbruecke_audio::error::{AudioError, AudioResult};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Aufzeichnung aller Sink-/Decoder-Aufrufe einer Session
    #[derive(Debug, Default)]
    struct Protokoll {
        geoeffnet: Vec<StreamFormat>,
        geschrieben: Vec<Vec<u8>>,
        geschlossen: usize,
        decoder_erstellt: Vec<(u32, u16)>,
        dekodiert: Vec<Vec<u8>>,
    }

    type GeteiltesProtokoll = Arc<Mutex<Protokoll>>;

    struct MockSink {
        protokoll: GeteiltesProtokoll,
    }

    impl AudioSink for MockSink {
        fn schreiben(&mut self, pcm: &[u8]) -> AudioResult<()> {
            self.protokoll.lock().geschrieben.push(pcm.to_vec());
            Ok(())
        }

        fn schliessen(&mut self) {
            self.protokoll.lock().geschlossen += 1;
        }
    }

    #[derive(Clone)]
    struct MockSinkOeffner {
        protokoll: GeteiltesProtokoll,
        fehlschlagen: bool,
    }

    impl SinkOeffner for MockSinkOeffner {
        type Sink = MockSink;

        fn oeffnen(&self, format: &StreamFormat) -> AudioResult<MockSink> {
            if self.fehlschlagen {
                return Err(AudioError::KeinStandardAusgabegeraet);
            }
            self.protokoll.lock().geoeffnet.push(*format);
            Ok(MockSink {
                protokoll: Arc::clone(&self.protokoll),
            })
        }
    }

    struct MockDecoder {
        protokoll: GeteiltesProtokoll,
    }

    impl FrameDecoder for MockDecoder {
        fn dekodieren(&mut self, frame: &[u8]) -> AudioResult<Vec<u8>> {
            self.protokoll.lock().dekodiert.push(frame.to_vec());
            // Erkennbar transformierte "PCM"-Bytes
            Ok(frame.iter().rev().copied().collect())
        }
    }

    #[derive(Clone)]
    struct MockDecoderFabrik {
        protokoll: GeteiltesProtokoll,
    }

    impl DecoderFabrik for MockDecoderFabrik {
        type Decoder = MockDecoder;

        fn erstellen(&self, abtastrate: u32, kanalzahl: u16) -> AudioResult<MockDecoder> {
            self.protokoll.lock().decoder_erstellt.push((abtastrate, kanalzahl));
            Ok(MockDecoder {
                protokoll: Arc::clone(&self.protokoll),
            })
        }
    }

    fn test_session(
        variante: HandshakeVariante,
    ) -> (RelaySession<MockSinkOeffner, MockDecoderFabrik>, GeteiltesProtokoll) {
        let protokoll: GeteiltesProtokoll = Arc::new(Mutex::new(Protokoll::default()));
        let session = RelaySession::neu(
            SessionId::neu(),
            variante,
            MockSinkOeffner {
                protokoll: Arc::clone(&protokoll),
                fehlschlagen: false,
            },
            MockDecoderFabrik {
                protokoll: Arc::clone(&protokoll),
            },
        );
        (session, protokoll)
    }

    #[test]
    fn pcm_variante_handshake_und_durchreichen() {
        let (mut session, protokoll) = test_session(HandshakeVariante::RohesPcm);

        session.nachricht(b"16000").unwrap();
        session.nachricht(b"1").unwrap();
        session.nachricht(b"16").unwrap();

        let pcm_frame = vec![0u8; 320];
        session.nachricht(&pcm_frame).unwrap();

        let p = protokoll.lock();
        assert_eq!(p.geoeffnet, vec![StreamFormat::neu(16000, 1, 16)]);
        assert_eq!(p.geschrieben, vec![pcm_frame]);
        // PCM-Variante konstruiert nie einen Decoder
        assert!(p.decoder_erstellt.is_empty());
        assert!(p.dekodiert.is_empty());
    }

    #[test]
    fn pcm_variante_phasen_streng_monoton() {
        let (mut session, _) = test_session(HandshakeVariante::RohesPcm);
        assert_eq!(session.phase(), StreamPhase::ErwarteAbtastrate);

        session.nachricht(b"48000").unwrap();
        assert_eq!(session.phase(), StreamPhase::ErwarteKanalzahl);

        session.nachricht(b"2").unwrap();
        assert_eq!(session.phase(), StreamPhase::ErwarteBittiefe);

        session.nachricht(b"16le").unwrap();
        assert_eq!(session.phase(), StreamPhase::Streaming);

        session.schliessen();
        assert_eq!(session.phase(), StreamPhase::Geschlossen);
    }

    #[test]
    fn opus_variante_konstruiert_decoder_und_sink() {
        let (mut session, protokoll) = test_session(HandshakeVariante::Opus);

        session.nachricht(b"48000").unwrap();

        let opus_frame = vec![1u8, 2, 3, 4];
        session.nachricht(&opus_frame).unwrap();

        let p = protokoll.lock();
        assert_eq!(p.decoder_erstellt, vec![(48000, 1)]);
        assert_eq!(p.geoeffnet, vec![StreamFormat::neu(48000, 1, 16)]);
        assert_eq!(p.dekodiert, vec![opus_frame.clone()]);
        // Geschrieben wird das Decoder-Ergebnis, nicht der rohe Frame
        assert_eq!(p.geschrieben, vec![vec![4u8, 3, 2, 1]]);
    }

    #[test]
    fn sink_wird_hoechstens_einmal_geoeffnet() {
        let (mut session, protokoll) = test_session(HandshakeVariante::Opus);

        session.nachricht(b"48000").unwrap();
        for _ in 0..5 {
            session.nachricht(&[0u8; 40]).unwrap();
        }

        let p = protokoll.lock();
        assert_eq!(p.geoeffnet.len(), 1);
        assert_eq!(p.decoder_erstellt.len(), 1);
        assert_eq!(p.geschrieben.len(), 5);
    }

    #[test]
    fn fehlerhafter_handshake_konstruiert_nichts() {
        let (mut session, protokoll) = test_session(HandshakeVariante::RohesPcm);

        let result = session.nachricht(b"keine-zahl");
        assert!(matches!(result, Err(RelayError::UngueltigerHandshake(_))));
        assert_eq!(session.phase(), StreamPhase::Geschlossen);

        let p = protokoll.lock();
        assert!(p.geoeffnet.is_empty());
        assert!(p.decoder_erstellt.is_empty());
    }

    #[test]
    fn sink_fehler_beim_oeffnen_ist_geraetefehler() {
        let protokoll: GeteiltesProtokoll = Arc::new(Mutex::new(Protokoll::default()));
        let mut session = RelaySession::neu(
            SessionId::neu(),
            HandshakeVariante::Opus,
            MockSinkOeffner {
                protokoll: Arc::clone(&protokoll),
                fehlschlagen: true,
            },
            MockDecoderFabrik {
                protokoll: Arc::clone(&protokoll),
            },
        );

        let result = session.nachricht(b"48000");
        assert!(matches!(result, Err(RelayError::Geraet(_))));
    }

    #[test]
    fn schliessen_ist_idempotent() {
        let (mut session, protokoll) = test_session(HandshakeVariante::Opus);
        session.nachricht(b"48000").unwrap();

        session.schliessen();
        session.schliessen();

        // Kein doppelter Abbau von Sink oder Decoder
        assert_eq!(protokoll.lock().geschlossen, 1);
        assert_eq!(session.phase(), StreamPhase::Geschlossen);
    }

    #[test]
    fn schliessen_vor_handshake_abschluss_ohne_geraete() {
        let (mut session, protokoll) = test_session(HandshakeVariante::RohesPcm);
        session.nachricht(b"16000").unwrap();

        session.schliessen();

        let p = protokoll.lock();
        assert!(p.geoeffnet.is_empty());
        assert_eq!(p.geschlossen, 0);
        assert_eq!(session.phase(), StreamPhase::Geschlossen);
    }

    #[test]
    fn frames_nach_schliessen_sind_wirkungslos() {
        let (mut session, protokoll) = test_session(HandshakeVariante::Opus);
        session.nachricht(b"48000").unwrap();
        session.schliessen();

        session.nachricht(&[9u8; 10]).unwrap();

        assert!(protokoll.lock().geschrieben.is_empty());
    }
}
