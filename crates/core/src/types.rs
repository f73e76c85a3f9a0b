//! Gemeinsame Typen fuer Klangbruecke
//!
//! Die Session-ID verwendet das Newtype-Pattern um Verwechslungen mit
//! anderen Kennungen zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Eindeutige Session-ID
///
/// Wird pro Verbindungsversuch neu gemuenzt und dient als
/// Belegungs-Schluessel der Registry sowie als Log-Kennung.
/// Fuer den Client ist sie opak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn neu() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::neu()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Stream-Format einer Session
///
/// Wird waehrend des Handshakes einmalig festgelegt und bleibt fuer die
/// gesamte Lebensdauer der Session unveraendert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Abtastrate in Hz
    pub abtastrate: u32,
    /// Kanalanzahl
    pub kanalzahl: u16,
    /// Bittiefe der PCM-Samples (little-endian, signed)
    pub bittiefe: u16,
}

impl StreamFormat {
    /// Erstellt ein neues Stream-Format
    pub fn neu(abtastrate: u32, kanalzahl: u16, bittiefe: u16) -> Self {
        Self {
            abtastrate,
            kanalzahl,
            bittiefe,
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz {}ch {}bit",
            self.abtastrate, self.kanalzahl, self.bittiefe
        )
    }
}
