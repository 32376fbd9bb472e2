// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport boundary (§5 Non-goals: "does not open sockets itself").
//! The executor only ever touches the [`Transport`] trait; a concrete
//! [`UdpTransport`] is supplemented for the binary, grounded on the
//! teacher's `transport/mod.rs` framed-socket wrapper.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::message::Station;

/// Fire-and-forget send boundary. Deliberately synchronous and
/// non-blocking (§5): the executor's `execute` call never awaits I/O.
/// Implementations that need to await a socket do so on a spawned task.
pub trait Transport: Send + Sync {
    fn send(&self, station: Station, bytes: Vec<u8>);
}

/// Callback surface a transport driver pushes into, bridged into
/// `Event`s by `driver.rs`.
pub trait TransportListener: Send + Sync {
    fn on_datagram(&self, station: Station, bytes: Vec<u8>);
    fn on_transport_up(&self);
    fn on_transport_down(&self);
}

/// UDP-backed transport: one shared socket, per-station remote
/// addresses resolved from configuration. Sends are queued onto an
/// internal channel drained by a background task so [`Transport::send`]
/// never blocks the caller.
pub struct UdpTransport {
    remotes: BTreeMap<Station, SocketAddr>,
    queue_tx: mpsc::UnboundedSender<(SocketAddr, Vec<u8>)>,
    local_addr: SocketAddr,
}

impl UdpTransport {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn bind(
        bind_addr: SocketAddr,
        stations: BTreeMap<Station, SocketAddr>,
        listener: Arc<dyn TransportListener>,
        shutdown: CancellationToken,
    ) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        let local_addr = socket.local_addr()?;
        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<(SocketAddr, Vec<u8>)>();

        let send_socket = Arc::clone(&socket);
        let send_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = send_shutdown.cancelled() => break,
                    item = queue_rx.recv() => {
                        let Some((addr, bytes)) = item else { break };
                        let _ = send_socket.send_to(&bytes, addr).await;
                    }
                }
            }
        });

        let recv_socket = Arc::clone(&socket);
        let recv_shutdown = shutdown.clone();
        let by_addr: BTreeMap<SocketAddr, Station> =
            stations.iter().map(|(&s, &addr)| (addr, s)).collect();
        tokio::spawn(async move {
            listener.on_transport_up();
            let mut buf = vec![0u8; 2048];
            loop {
                tokio::select! {
                    _ = recv_shutdown.cancelled() => {
                        listener.on_transport_down();
                        break;
                    }
                    result = recv_socket.recv_from(&mut buf) => {
                        match result {
                            Ok((len, from)) => {
                                if let Some(&station) = by_addr.get(&from) {
                                    listener.on_datagram(station, buf[..len].to_vec());
                                }
                            }
                            Err(_) => {
                                listener.on_transport_down();
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self { remotes: stations, queue_tx, local_addr })
    }
}

impl Transport for UdpTransport {
    fn send(&self, station: Station, bytes: Vec<u8>) {
        if let Some(&addr) = self.remotes.get(&station) {
            let _ = self.queue_tx.send((addr, bytes));
        }
    }
}
