//! klangbruecke-relay – Session, Registry und Verbindungs-Gateway
//!
//! Der Kern des Relays: die `SessionRegistry` laesst prozessweit hoechstens
//! eine aktive Session zu, die `RelaySession` uebersetzt eingehende Frames
//! ueber die Handshake-Maschine in Sink-Schreibvorgaenge, und der
//! `RelayServer` nimmt TCP-Verbindungen an und bindet sie an Sessions.

pub mod listener;
pub mod registry;
pub mod session;

pub use listener::RelayServer;
pub use registry::SessionRegistry;
pub use session::RelaySession;
