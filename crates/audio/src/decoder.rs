//! Opus-Decoder Wrapper
//!
//! Kapselt audiopus hinter der `FrameDecoder`-Schnittstelle: ein
//! komprimierter Frame hinein, rohe i16-PCM-Bytes (little-endian) heraus.
//! Das Byte-Layout entspricht damit exakt dem der unkomprimierten
//! PCM-Variante, sodass der Sink beide Pfade gleich behandelt.
//!
//! Der Decoder ist pro Session zustandsbehaftet und wird von der
//! `DecoderFabrik` genau einmal erzeugt, sobald das Stream-Format bekannt
//! ist. Er darf weder vor dem Handshake-Abschluss noch nach dem Schliessen
//! der Session aufgerufen werden.

use audiopus::{coder::Decoder, Channels, SampleRate};
use tracing::debug;

use crate::error::{AudioError, AudioResult};

/// Frame-Dauer fuer die Puffergroesse in Millisekunden (Opus-Standard)
const FRAME_DAUER_MS: usize = 20;

// ---------------------------------------------------------------------------
// Schnittstellen
// ---------------------------------------------------------------------------

/// Dekodiert einen komprimierten Audio-Frame zu PCM-Bytes
///
/// Ein Aufruf verarbeitet genau einen Frame; ausser dem internen
/// Codec-Zustand gibt es keine frame-uebergreifenden Seiteneffekte.
pub trait FrameDecoder {
    /// Dekodiert `frame` zu little-endian i16-PCM-Bytes
    fn dekodieren(&mut self, frame: &[u8]) -> AudioResult<Vec<u8>>;
}

/// Erzeugt Decoder-Instanzen fuer eine Session
pub trait DecoderFabrik {
    type Decoder: FrameDecoder;

    /// Erstellt einen Decoder fuer das ausgehandelte Format
    fn erstellen(&self, abtastrate: u32, kanalzahl: u16) -> AudioResult<Self::Decoder>;
}

// ---------------------------------------------------------------------------
// Opus-Implementierung
// ---------------------------------------------------------------------------

/// Opus-Decoder: dekodiert Opus-Bytes zu i16-PCM
pub struct OpusDecoder {
    decoder: Decoder,
    frame_samples: usize,
    kanalzahl: u16,
}

impl OpusDecoder {
    /// Erstellt einen neuen Decoder
    ///
    /// Opus erlaubt nur die Abtastraten 8/12/16/24/48 kHz und mono/stereo;
    /// alles andere ist ein Konstruktionsfehler.
    pub fn neu(abtastrate: u32, kanalzahl: u16) -> AudioResult<Self> {
        let rate = abtastrate_nach_opus(abtastrate)?;
        let kanaele = kanalzahl_nach_opus(kanalzahl)?;

        let decoder =
            Decoder::new(rate, kanaele).map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        let frame_samples = abtastrate as usize * FRAME_DAUER_MS / 1000;

        debug!(
            abtastrate = abtastrate,
            kanalzahl = kanalzahl,
            frame_samples = frame_samples,
            "OpusDecoder erstellt"
        );

        Ok(Self {
            decoder,
            frame_samples,
            kanalzahl,
        })
    }

    /// Gibt die erwartete Frame-Groesse in Samples zurueck
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }
}

impl FrameDecoder for OpusDecoder {
    fn dekodieren(&mut self, frame: &[u8]) -> AudioResult<Vec<u8>> {
        let mut pcm = vec![0i16; self.frame_samples * self.kanalzahl as usize];
        let dekodiert = self
            .decoder
            .decode(Some(frame), &mut pcm, false)
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;

        pcm.truncate(dekodiert * self.kanalzahl as usize);

        let mut bytes = Vec::with_capacity(pcm.len() * 2);
        for sample in &pcm {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(bytes)
    }
}

/// Fabrik fuer `OpusDecoder`-Instanzen
#[derive(Debug, Clone, Copy, Default)]
pub struct OpusDecoderFabrik;

impl DecoderFabrik for OpusDecoderFabrik {
    type Decoder = OpusDecoder;

    fn erstellen(&self, abtastrate: u32, kanalzahl: u16) -> AudioResult<Self::Decoder> {
        OpusDecoder::neu(abtastrate, kanalzahl)
    }
}

// ---------------------------------------------------------------------------
// Konvertierungs-Hilfsfunktionen
// ---------------------------------------------------------------------------

fn abtastrate_nach_opus(abtastrate: u32) -> AudioResult<SampleRate> {
    match abtastrate {
        8000 => Ok(SampleRate::Hz8000),
        12000 => Ok(SampleRate::Hz12000),
        16000 => Ok(SampleRate::Hz16000),
        24000 => Ok(SampleRate::Hz24000),
        48000 => Ok(SampleRate::Hz48000),
        andere => Err(AudioError::NichtUnterstuetzteAbtastrate(andere)),
    }
}

fn kanalzahl_nach_opus(kanalzahl: u16) -> AudioResult<Channels> {
    match kanalzahl {
        1 => Ok(Channels::Mono),
        2 => Ok(Channels::Stereo),
        andere => Err(AudioError::NichtUnterstuetzteKanalzahl(andere)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
