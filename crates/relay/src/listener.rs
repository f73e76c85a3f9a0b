//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `RelayServer` bindet einen TCP-Socket und entscheidet fuer jede
//! eingehende Verbindung an der Registry, ob sie aufgenommen wird. Eine
//! abgelehnte Verbindung wird sofort geschlossen, ohne Antwort-Payload;
//! eine aufgenommene bekommt eine frische `RelaySession` in einem eigenen
//! Task.
//!
//! ## Concurrency-Modell
//! Der cpal-Stream-Handle ist nicht `Send`, daher laufen alle
//! Verbindungs-Tasks in einer `tokio::task::LocalSet` auf einem
//! single-threaded Executor. Frames einer Verbindung werden dadurch strikt
//! in Empfangsreihenfolge verarbeitet; die Registry ist der einzige
//! prozessweite geteilte Zustand.

use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::LocalSet;
use tokio_util::codec::Framed;

use klangbruecke_audio::decoder::DecoderFabrik;
use klangbruecke_audio::sink::SinkOeffner;
use klangbruecke_core::types::SessionId;
use klangbruecke_protocol::handshake::HandshakeVariante;
use klangbruecke_protocol::wire::FrameCodec;

use crate::registry::SessionRegistry;
use crate::session::RelaySession;

/// TCP-Gateway des Relays
///
/// Pro Verbindungsversuch wird eine neue SessionId gemuenzt und an der
/// Registry um den Belegungs-Slot konkurriert.
pub struct RelayServer<S, D>
where
    S: SinkOeffner + Clone + 'static,
    S::Sink: 'static,
    D: DecoderFabrik + Clone + 'static,
    D::Decoder: 'static,
{
    registry: Arc<SessionRegistry>,
    sink_oeffner: S,
    decoder_fabrik: D,
    variante: HandshakeVariante,
    max_frame_groesse: usize,
}

impl<S, D> RelayServer<S, D>
where
    S: SinkOeffner + Clone + 'static,
    S::Sink: 'static,
    D: DecoderFabrik + Clone + 'static,
    D::Decoder: 'static,
{
    /// Erstellt einen neuen RelayServer
    pub fn neu(
        registry: Arc<SessionRegistry>,
        sink_oeffner: S,
        decoder_fabrik: D,
        variante: HandshakeVariante,
        max_frame_groesse: usize,
    ) -> Self {
        Self {
            registry,
            sink_oeffner,
            decoder_fabrik,
            variante,
            max_frame_groesse,
        }
    }

    /// Bindet die Adresse und akzeptiert Verbindungen bis zum Shutdown
    pub async fn starten(
        self,
        bind_addr: SocketAddr,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        tracing::info!(
            adresse = %listener.local_addr()?,
            variante = ?self.variante,
            "Relay-Server gestartet"
        );
        self.mit_listener(listener, shutdown_rx).await
    }

    /// Akzeptiert Verbindungen auf einem bereits gebundenen Listener
    ///
    /// Verwendet eine `LocalSet` fuer alle Verbindungs-Tasks.
    pub async fn mit_listener(
        self,
        listener: TcpListener,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let local = LocalSet::new();
        local
            .run_until(self.accept_schleife(listener, shutdown_rx))
            .await
    }

    /// Interne Accept-Schleife (laeuft innerhalb der LocalSet)
    async fn accept_schleife(
        self,
        listener: TcpListener,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let id = SessionId::neu();

                            // Zulassung: erster Verbinder gewinnt
                            if let Err(e) = self.registry.aufnehmen(id) {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    fehler = %e,
                                    "Verbindung abgelehnt"
                                );
                                drop(stream);
                                continue;
                            }

                            tracing::info!(
                                peer = %peer_addr,
                                session = %id,
                                "Verbindung aufgenommen"
                            );

                            let session = RelaySession::neu(
                                id,
                                self.variante,
                                self.sink_oeffner.clone(),
                                self.decoder_fabrik.clone(),
                            );

                            // Lokaler Task – kein Send erforderlich
                            tokio::task::spawn_local(verbindung_verarbeiten(
                                Arc::clone(&self.registry),
                                session,
                                stream,
                                shutdown_rx.clone(),
                                self.max_frame_groesse,
                            ));
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Relay-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("Relay-Server gestoppt");
        Ok(())
    }
}

/// Verarbeitet eine aufgenommene Verbindung bis zu ihrem Ende
///
/// Liest Frames via `FrameCodec` und fuettert sie der Session in
/// Empfangsreihenfolge. Am Ende laeuft unabhaengig vom Austrittsgrund
/// (Client-Trennung, Lesefehler, Session-Fehler, Shutdown) derselbe
/// Abbaupfad: Session schliessen, Registry-Slot freigeben.
async fn verbindung_verarbeiten<S, D>(
    registry: Arc<SessionRegistry>,
    mut session: RelaySession<S, D>,
    stream: TcpStream,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    max_frame_groesse: usize,
) where
    S: SinkOeffner,
    D: DecoderFabrik,
{
    let id = session.id();
    let mut framed = Framed::new(stream, FrameCodec::with_max_size(max_frame_groesse));

    loop {
        tokio::select! {
            frame = framed.next() => {
                match frame {
                    Some(Ok(frame)) => {
                        if let Err(e) = session.nachricht(&frame) {
                            tracing::warn!(
                                session = %id,
                                fehler = %e,
                                "Session beendet"
                            );
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(session = %id, fehler = %e, "Frame-Lesefehler");
                        break;
                    }
                    None => {
                        tracing::info!(session = %id, "Verbindung vom Client getrennt");
                        break;
                    }
                }
            }

            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!(session = %id, "Shutdown – Verbindung wird getrennt");
                    break;
                }
            }
        }
    }

    // Einziger Abbaupfad: Geraete freigeben, dann den Slot raeumen
    session.schliessen();
    registry.freigeben(id);
    tracing::info!(session = %id, "Session abgebaut");
}
