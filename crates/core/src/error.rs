//! Fehlertypen fuer Klangbruecke
//!
//! Zentraler Fehler-Enum fuer alle session-bezogenen Fehlerzustaende.
//! Alle Fehler sind session-lokal und terminal: keiner bringt den Prozess
//! zum Absturz, keiner wird automatisch wiederholt.

use thiserror::Error;

/// Globaler Result-Alias fuer Klangbruecke
pub type Result<T> = std::result::Result<T, RelayError>;

/// Alle moeglichen Fehler im Relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Zweiter Verbindungsversuch waehrend eine Session aktiv ist.
    /// Die neue Verbindung wird sofort geschlossen, ohne Datenaustausch.
    #[error("Relay belegt: es ist bereits eine Session aktiv")]
    Belegt,

    /// Ein Konfigurationsfeld des Handshakes konnte nicht geparst werden.
    /// Handshake-Felder sind positionsgebunden und koennen nicht neu
    /// synchronisiert werden, daher ist der Fehler terminal.
    #[error("Ungueltiger Handshake: {0}")]
    UngueltigerHandshake(String),

    /// Sink- oder Decoder-Konstruktion bzw. -Schreiben ist fehlgeschlagen
    #[error("Geraetefehler: {0}")]
    Geraet(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = RelayError::UngueltigerHandshake("'abc' ist keine Ganzzahl".into());
        assert_eq!(
            e.to_string(),
            "Ungueltiger Handshake: 'abc' ist keine Ganzzahl"
        );
    }

    #[test]
    fn belegt_anzeige() {
        assert!(RelayError::Belegt.to_string().contains("belegt"));
    }
}
