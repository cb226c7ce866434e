//! In-process stand-in for a gateway, for tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::sleep;

type Responder = dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync;

/// Acknowledgement sent for device commands.
pub(crate) const ACK: [u8; 8] = [0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

pub(crate) struct FakeGateway {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<Vec<u8>>>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeGateway {
    /// Answers every command with whatever `responder` returns; `None` stays silent.
    pub(crate) async fn start<F>(responder: F) -> Self
    where
        F: Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        Self::start_split(responder, None).await
    }

    /// Like [`FakeGateway::start`], but writes each response in two halves
    /// separated by `split_delay`.
    pub(crate) async fn start_split<F>(responder: F, split_delay: Option<Duration>) -> Self
    where
        F: Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let responder: Arc<Responder> = Arc::new(responder);

        let task = {
            let commands = Arc::clone(&commands);
            let connections = Arc::clone(&connections);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(
                        stream,
                        Arc::clone(&responder),
                        Arc::clone(&commands),
                        split_delay,
                    ));
                }
            })
        };

        FakeGateway {
            addr,
            commands,
            connections,
            task,
        }
    }

    pub(crate) fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub(crate) fn port(&self) -> u16 {
        self.addr.port()
    }

    pub(crate) fn commands(&self) -> Vec<Vec<u8>> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for FakeGateway {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    responder: Arc<Responder>,
    commands: Arc<Mutex<Vec<Vec<u8>>>>,
    split_delay: Option<Duration>,
) {
    let mut buffer = [0u8; 256];
    loop {
        let n = match stream.read(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let command = buffer[..n].to_vec();
        commands.lock().unwrap().push(command.clone());

        let Some(response) = responder(&command) else {
            continue;
        };
        let written = match split_delay {
            Some(delay) => {
                let (head, tail) = response.split_at(response.len() / 2);
                let head = stream.write_all(head).await;
                sleep(delay).await;
                head.and(stream.write_all(tail).await)
            }
            None => stream.write_all(&response).await,
        };
        if written.is_err() {
            return;
        }
    }
}
