//! Session-Registry – prozessweite Einzelbelegung
//!
//! Ein einziger Belegungs-Slot entscheidet, ob eine neue Verbindung
//! aufgenommen wird: der erste Verbindungsversuch gewinnt, jeder weitere
//! wird mit `Belegt` abgelehnt, bis die aktive Session ihren Slot wieder
//! freigibt. Check-and-set und Freigabe laufen unter einem Mutex, damit
//! auch zeitgleich beobachtete Verbindungsversuche genau einen Gewinner
//! haben.

use klangbruecke_core::error::{RelayError, Result};
use klangbruecke_core::types::SessionId;
use parking_lot::Mutex;

/// Prozessweite Zulassungsstelle fuer Sessions
///
/// Haelt hoechstens eine Belegung, verschluesselt nach `SessionId`.
/// Keine Seiteneffekte ausser dem In-Memory-Slot, kein I/O.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slot: Mutex<Option<SessionId>>,
}

impl SessionRegistry {
    /// Erstellt eine neue leere Registry
    pub fn neu() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Versucht eine Session aufzunehmen (atomares check-and-set)
    pub fn aufnehmen(&self, id: SessionId) -> Result<()> {
        let mut slot = self.slot.lock();
        match *slot {
            Some(_) => Err(RelayError::Belegt),
            None => {
                *slot = Some(id);
                Ok(())
            }
        }
    }

    /// Gibt den Slot frei, aber nur wenn er aktuell `id` gehoert
    ///
    /// Eine verspaetete Freigabe einer bereits abgeloesten Session darf die
    /// Belegung einer neueren Session nicht raeumen; sie ist ein stilles
    /// No-op. Gibt zurueck ob tatsaechlich freigegeben wurde.
    pub fn freigeben(&self, id: SessionId) -> bool {
        let mut slot = self.slot.lock();
        if *slot == Some(id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Gibt die aktuell belegte SessionId zurueck
    pub fn aktive_session(&self) -> Option<SessionId> {
        *self.slot.lock()
    }
}
