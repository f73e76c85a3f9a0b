//! klangbruecke-audio – Audio-Ausgabe und Opus-Dekodierung
//!
//! Stellt die beiden Faehigkeits-Schnittstellen des Relays bereit:
//! - `FrameDecoder`/`DecoderFabrik`: komprimierter Audio-Frame -> PCM-Bytes
//! - `AudioSink`/`SinkOeffner`: PCM-Bytes -> physisches Ausgabegeraet
//!
//! Die konkreten Implementierungen sind audiopus (Opus) und cpal
//! (Lautsprecher-Playback ueber einen lock-free Ring-Buffer). Die Session
//! im Relay-Crate kennt nur die Traits und bleibt damit ohne Hardware
//! testbar.

pub mod decoder;
pub mod device;
pub mod error;
pub mod sink;

// Bequeme Re-Exporte der wichtigsten Typen
pub use decoder::{DecoderFabrik, FrameDecoder, OpusDecoder, OpusDecoderFabrik};
pub use error::{AudioError, AudioResult};
pub use sink::{AudioSink, CpalSink, CpalSinkOeffner, SinkOeffner};
