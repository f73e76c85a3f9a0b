//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use anyhow::anyhow;
use klangbruecke_protocol::handshake::HandshakeVariante;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Audio-Einstellungen
    pub audio: AudioEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer den TCP-Listener
    pub bind_adresse: String,
    /// Port fuer den TCP-Listener
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 7619,
        }
    }
}

/// Audio-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    /// Wire-Variante: "pcm" (dreistufiger Handshake, rohes PCM) oder
    /// "opus" (einstufiger Handshake, komprimierte Frames)
    pub variante: String,
    /// Teilstring des Ausgabegeraete-Namens (leer = Standardgeraet)
    pub ausgabegeraet: Option<String>,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            variante: "opus".into(),
            ausgabegeraet: None,
            max_frame_groesse: 1024 * 1024,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow!("Konfigurationsdatei '{pfad}' nicht lesbar: {e}")),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Uebersetzt die konfigurierte Audio-Variante in die Wire-Variante
    pub fn handshake_variante(&self) -> anyhow::Result<HandshakeVariante> {
        match self.audio.variante.as_str() {
            "pcm" => Ok(HandshakeVariante::RohesPcm),
            "opus" => Ok(HandshakeVariante::Opus),
            andere => Err(anyhow!(
                "Unbekannte Audio-Variante '{andere}' (erlaubt: \"pcm\", \"opus\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.netzwerk.port, 7619);
        assert_eq!(cfg.audio.variante, "opus");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_adresse(), "0.0.0.0:7619");
    }

    #[test]
    fn variante_wird_uebersetzt() {
        let mut cfg = ServerConfig::default();
        assert_eq!(
            cfg.handshake_variante().unwrap(),
            HandshakeVariante::Opus
        );

        cfg.audio.variante = "pcm".into();
        assert_eq!(
            cfg.handshake_variante().unwrap(),
            HandshakeVariante::RohesPcm
        );

        cfg.audio.variante = "mp3".into();
        assert!(cfg.handshake_variante().is_err());
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            port = 10000

            [audio]
            variante = "pcm"
            ausgabegeraet = "USB"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.port, 10000);
        assert_eq!(cfg.audio.variante, "pcm");
        assert_eq!(cfg.audio.ausgabegeraet.as_deref(), Some("USB"));
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.audio.max_frame_groesse, 1024 * 1024);
    }
}
