//! Audio-Sink via cpal
//!
//! Oeffnet einen cpal OutputStream mit dem ausgehandelten Stream-Format und
//! speist ihn aus einem lock-free Ring-Buffer. Eingehende PCM-Bytes
//! (little-endian, signed) werden beim Schreiben nach f32 konvertiert; der
//! cpal-Callback liest aus dem Ring-Buffer und fuellt fehlende Samples mit
//! Stille auf.
//!
//! Lebenszyklus pro Session: `oeffnen` genau einmal, beliebig viele
//! `schreiben`, `schliessen` gibt das Geraet frei. `schliessen` toleriert
//! einen Stream ohne jemals geschriebene Daten sowie doppeltes Schliessen.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::device::ausgabegeraet_laden;
use crate::error::{AudioError, AudioResult};
use klangbruecke_core::types::StreamFormat;

/// Wartezeit wenn der Ring-Buffer voll ist
///
/// `schreiben` blockiert bis das Geraet Platz schafft – ein langsames Geraet
/// verzoegert den Stream, statt ihn zu beenden.
const RUECKSTAU_PAUSE: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Schnittstellen
// ---------------------------------------------------------------------------

/// Abstraktion ueber das physische Audio-Ausgabegeraet
pub trait AudioSink {
    /// Schreibt einen PCM-Byte-Puffer in Empfangsreihenfolge
    ///
    /// Darf blockieren oder intern puffern, je nach Geraete-Timing.
    fn schreiben(&mut self, pcm: &[u8]) -> AudioResult<()>;

    /// Gibt das Geraet frei (idempotent)
    fn schliessen(&mut self);
}

/// Oeffnet Sink-Instanzen fuer eine Session
pub trait SinkOeffner {
    type Sink: AudioSink;

    /// Oeffnet den Sink mit dem endgueltigen Stream-Format
    ///
    /// Wird pro Session genau einmal aufgerufen, nachdem der Handshake
    /// vollstaendig ist.
    fn oeffnen(&self, format: &StreamFormat) -> AudioResult<Self::Sink>;
}

// ---------------------------------------------------------------------------
// CpalSink
// ---------------------------------------------------------------------------

/// Audio-Sink auf einem cpal-Ausgabegeraet
pub struct CpalSink {
    stream: Option<Stream>,
    producer: HeapProd<f32>,
    bittiefe: u16,
}

impl AudioSink for CpalSink {
    fn schreiben(&mut self, pcm: &[u8]) -> AudioResult<()> {
        if self.stream.is_none() {
            return Err(AudioError::StreamFehler("Sink ist geschlossen".into()));
        }

        let samples = pcm_nach_f32(pcm, self.bittiefe)?;
        let mut rest: &[f32] = &samples;
        while !rest.is_empty() {
            let geschrieben = self.producer.push_slice(rest);
            rest = &rest[geschrieben..];
            if !rest.is_empty() {
                // Geraete-Rueckstau: warten bis der Callback Platz schafft
                std::thread::sleep(RUECKSTAU_PAUSE);
            }
        }
        Ok(())
    }

    fn schliessen(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            debug!("Audio-Sink geschlossen");
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.schliessen();
    }
}

// ---------------------------------------------------------------------------
// CpalSinkOeffner
// ---------------------------------------------------------------------------

/// Oeffnet `CpalSink`-Instanzen auf dem konfigurierten Ausgabegeraet
#[derive(Debug, Clone, Default)]
pub struct CpalSinkOeffner {
    /// Teilstring des Geraetenamens (None = Standard-Ausgabegeraet)
    ausgabegeraet: Option<String>,
}

impl CpalSinkOeffner {
    /// Erstellt einen neuen Oeffner
    pub fn neu(ausgabegeraet: Option<String>) -> Self {
        Self { ausgabegeraet }
    }
}

impl SinkOeffner for CpalSinkOeffner {
    type Sink = CpalSink;

    fn oeffnen(&self, format: &StreamFormat) -> AudioResult<Self::Sink> {
        // Bittiefe zuerst pruefen – definiert die unterstuetzten Byte-Layouts
        if !matches!(format.bittiefe, 16 | 32) {
            return Err(AudioError::NichtUnterstuetzteBittiefe(format.bittiefe));
        }

        let device = ausgabegeraet_laden(self.ausgabegeraet.as_deref())?;

        let stream_config = StreamConfig {
            channels: format.kanalzahl,
            sample_rate: cpal::SampleRate(format.abtastrate),
            buffer_size: cpal::BufferSize::Default,
        };

        // Eine Sekunde Kapazitaet
        let kapazitaet = format.abtastrate as usize * format.kanalzahl as usize;
        let rb = HeapRb::<f32>::new(kapazitaet.max(1));
        let (producer, consumer) = rb.split();

        let err_fn = |err| error!("Playback-Fehler: {}", err);

        let supported = device
            .supported_output_configs()
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?
            .find(|c| {
                c.min_sample_rate().0 <= format.abtastrate
                    && c.max_sample_rate().0 >= format.abtastrate
                    && c.channels() >= format.kanalzahl
            });

        let sample_format = supported
            .map(|c| c.sample_format())
            .unwrap_or(SampleFormat::F32);

        let stream = ausgabestream_bauen(&device, &stream_config, sample_format, consumer, err_fn)?;

        stream
            .play()
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        debug!(format = %format, "Audio-Sink geoeffnet");

        Ok(CpalSink {
            stream: Some(stream),
            producer,
            bittiefe: format.bittiefe,
        })
    }
}

/// Baut den cpal-Ausgabestream im nativen Sample-Format des Geraets
fn ausgabestream_bauen(
    device: &cpal::Device,
    stream_config: &StreamConfig,
    sample_format: SampleFormat,
    mut consumer: HeapCons<f32>,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> AudioResult<Stream> {
    let stream = match sample_format {
        SampleFormat::F32 => device
            .build_output_stream(
                stream_config,
                move |data: &mut [f32], _| {
                    let read = consumer.pop_slice(data);
                    // Stille fuer fehlende Samples
                    if read < data.len() {
                        warn!("Playback Underrun: {} Samples fehlen", data.len() - read);
                        data[read..].fill(0.0);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        SampleFormat::I16 => device
            .build_output_stream(
                stream_config,
                move |data: &mut [i16], _| {
                    let mut float_buf = vec![0.0f32; data.len()];
                    let read = consumer.pop_slice(&mut float_buf);
                    if read < data.len() {
                        warn!("Playback Underrun");
                    }
                    for (out, s) in data.iter_mut().zip(float_buf.iter()) {
                        *out =
                            (*s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?,
        _ => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {:?}",
                sample_format
            )))
        }
    };
    Ok(stream)
}

// ---------------------------------------------------------------------------
// PCM-Konvertierung
// ---------------------------------------------------------------------------

/// Konvertiert little-endian signed PCM-Bytes nach f32 (-1.0..1.0)
///
/// Ein unvollstaendiges Sample am Puffer-Ende wird verworfen.
fn pcm_nach_f32(pcm: &[u8], bittiefe: u16) -> AudioResult<Vec<f32>> {
    match bittiefe {
        16 => Ok(pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect()),
        32 => Ok(pcm
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2147483648.0)
            .collect()),
        andere => Err(AudioError::NichtUnterstuetzteBittiefe(andere)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
