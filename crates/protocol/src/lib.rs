//! klangbruecke-protocol – Wire-Format und Handshake-Protokoll
//!
//! Dieses Crate definiert das Frame-Format der TCP-Verbindung sowie die
//! Handshake-Zustandsmaschine, die Konfigurationsnachrichten in ein
//! Stream-Format uebersetzt. Beide Teile sind geraeteunabhaengig und
//! ohne Audio-Hardware testbar.

pub mod handshake;
pub mod wire;

pub use handshake::{
    HandshakeMaschine, HandshakeVariante, Konfigurationsergebnis, StreamPhase,
};
pub use wire::FrameCodec;
