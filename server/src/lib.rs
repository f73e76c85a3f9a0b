//! klangbruecke-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und verdrahtet Registry, Geraete-Fabriken
//! und TCP-Listener zu einem lauffaehigen Relay.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use klangbruecke_audio::decoder::OpusDecoderFabrik;
use klangbruecke_audio::sink::CpalSinkOeffner;
use klangbruecke_relay::{RelayServer, SessionRegistry};
use std::net::SocketAddr;
use std::sync::Arc;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet das Relay und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Wire-Variante und Bind-Adresse aus der Konfiguration aufloesen
    /// 2. Registry und Geraete-Fabriken erstellen
    /// 3. TCP-Listener starten
    /// 4. Auf Ctrl-C warten und den Listener herunterfahren
    pub async fn starten(self) -> Result<()> {
        let variante = self.config.handshake_variante()?;
        let bind_addr: SocketAddr = self.config.bind_adresse().parse()?;

        tracing::info!(
            adresse = %bind_addr,
            variante = ?variante,
            ausgabegeraet = self.config.audio.ausgabegeraet.as_deref().unwrap_or("standard"),
            "Server startet"
        );

        let registry = Arc::new(SessionRegistry::neu());
        let sink_oeffner = CpalSinkOeffner::neu(self.config.audio.ausgabegeraet.clone());

        let relay = RelayServer::neu(
            registry,
            sink_oeffner,
            OpusDecoderFabrik,
            variante,
            self.config.audio.max_frame_groesse,
        );

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                let _ = shutdown_tx.send(true);
            }
        });

        relay.starten(bind_addr, shutdown_rx).await?;

        Ok(())
    }
}
