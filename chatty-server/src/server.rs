//! TCP connection server.
//!
//! One accept task, one task per connection, and a single router task. The
//! router is the only owner of the [`RoutingIndex`], the outbound channel of
//! every connection, and the [`CommandExecutor`]; it handles one event at a
//! time so replies and fan-out copies never interleave on a connection.
//!
//! Connection lifecycle:
//! 1. The accept task assigns a [`ConnectionId`] and hands the router the
//!    connection's outbound channel.
//! 2. Each read (bounded by the configured buffer size) is one request line.
//! 3. The router parses, executes, updates the routing index, replies, and
//!    fans an accepted `send` out to the other viewers of the conversation.
//! 4. On EOF, a read error, or a failed write the router forgets the
//!    connection and unregisters it from every conversation.

use std::collections::HashMap;
use std::net::SocketAddr;

use chatty_proto::chat::Conversation;
use chatty_proto::command::{Command, CommandKind};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::executor::{CommandExecutor, INCORRECT_FORMAT, Reply};
use crate::routing::{ConnectionId, RoutingIndex};

/// Default size of the per-connection read buffer, in bytes.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 2048;

/// Tunables for [`start_server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// Upper bound on one request, in bytes.
    pub read_buffer_size: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

/// Errors from starting the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    /// The bound address could not be read back.
    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// Messages from the accept and connection tasks to the router.
#[derive(Debug)]
enum RouterEvent {
    Connected {
        id: ConnectionId,
        outbound: mpsc::UnboundedSender<String>,
    },
    Request {
        id: ConnectionId,
        line: String,
    },
    /// A read that was not valid UTF-8.
    Undecodable {
        id: ConnectionId,
    },
    Disconnected {
        id: ConnectionId,
    },
}

/// Handle to a running server.
#[derive(Debug)]
pub struct ServerHandle {
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
    router_task: JoinHandle<()>,
}

impl ServerHandle {
    /// Signals the server to stop accepting and close every connection.
    ///
    /// Calling this more than once has no further effect.
    pub fn stop(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!("server stopping");
        }
    }

    /// Whether [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Waits for the accept and router tasks to finish.
    pub async fn wait(self) {
        for (name, task) in [("accept", self.accept_task), ("router", self.router_task)] {
            if let Err(e) = task.await {
                tracing::error!(task = name, error = %e, "server task failed");
            }
        }
    }
}

/// Binds `addr` and starts serving.
///
/// Returns the bound address (useful with port `0`) and a handle to stop
/// the server.
///
/// # Errors
///
/// Returns [`ServerError`] if the listener cannot be bound.
pub async fn start_server(
    addr: &str,
    executor: CommandExecutor,
    options: ServerOptions,
) -> Result<(SocketAddr, ServerHandle), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    let bound_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    let (shutdown, shutdown_rx) = watch::channel(false);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let router = Router::new(executor);
    let router_task = tokio::spawn(router.run(events_rx, shutdown_rx.clone()));
    let accept_task = tokio::spawn(accept_loop(listener, events_tx, shutdown_rx, options));

    tracing::info!(addr = %bound_addr, "chatty server listening");

    Ok((
        bound_addr,
        ServerHandle {
            shutdown,
            accept_task,
            router_task,
        },
    ))
}

/// Resolves once the shutdown flag is set or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    events: mpsc::UnboundedSender<RouterEvent>,
    mut shutdown: watch::Receiver<bool>,
    options: ServerOptions,
) {
    let mut next_id = 0u64;
    loop {
        tokio::select! {
            () = stopped(&mut shutdown) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    next_id += 1;
                    let id = ConnectionId(next_id);
                    let (outbound, outbound_rx) = mpsc::unbounded_channel();
                    if events.send(RouterEvent::Connected { id, outbound }).is_err() {
                        break;
                    }
                    tracing::info!(conn = %id, peer = %peer, "client connected");
                    tokio::spawn(handle_connection(
                        stream,
                        id,
                        events.clone(),
                        outbound_rx,
                        options.read_buffer_size,
                    ));
                }
                Err(e) => tracing::warn!(error = %e, "failed to accept connection"),
            },
        }
    }
    tracing::debug!("accept loop finished");
}

/// Moves bytes between one socket and the router.
async fn handle_connection(
    stream: TcpStream,
    id: ConnectionId,
    events: mpsc::UnboundedSender<RouterEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    read_buffer_size: usize,
) {
    let (mut reader, mut writer) = stream.into_split();

    let mut write_task = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if let Err(e) = writer.write_all(text.as_bytes()).await {
                tracing::warn!(conn = %id, error = %e, "write failed");
                break;
            }
        }
    });

    let reader_events = events.clone();
    let mut read_task = tokio::spawn(async move {
        let mut buf = vec![0u8; read_buffer_size.max(1)];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let event = match std::str::from_utf8(&buf[..n]) {
                        Ok(line) => RouterEvent::Request {
                            id,
                            line: line.to_string(),
                        },
                        Err(_) => RouterEvent::Undecodable { id },
                    };
                    if reader_events.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(conn = %id, error = %e, "read failed");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    // The router may already be gone during shutdown.
    let _ = events.send(RouterEvent::Disconnected { id });
    tracing::info!(conn = %id, "client disconnected");
}

/// Single owner of routing state.
struct Router {
    executor: CommandExecutor,
    index: RoutingIndex,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<String>>,
    /// Username each connection last opened a chat as.
    viewers: HashMap<ConnectionId, String>,
}

impl Router {
    fn new(executor: CommandExecutor) -> Self {
        Self {
            executor,
            index: RoutingIndex::new(),
            connections: HashMap::new(),
            viewers: HashMap::new(),
        }
    }

    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<RouterEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                () = stopped(&mut shutdown) => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }
        tracing::info!(open = self.connections.len(), "router stopped, closing connections");
    }

    fn handle(&mut self, event: RouterEvent) {
        match event {
            RouterEvent::Connected { id, outbound } => {
                self.connections.insert(id, outbound);
            }
            RouterEvent::Request { id, line } => self.handle_request(id, &line),
            RouterEvent::Undecodable { id } => {
                tracing::warn!(conn = %id, "request is not valid UTF-8");
                self.deliver(id, INCORRECT_FORMAT);
            }
            RouterEvent::Disconnected { id } => self.forget(id),
        }
    }

    fn handle_request(&mut self, id: ConnectionId, line: &str) {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(conn = %id, error = %e, "malformed command");
                self.deliver(id, INCORRECT_FORMAT);
                return;
            }
        };

        tracing::debug!(conn = %id, command = %command.kind(), "request");
        let reply = self.executor.execute(&command);
        self.track(id, &command, &reply);

        // A dead originator must not cost the other viewers their copy.
        self.deliver(id, reply.text());
        if command.kind() == CommandKind::SendMessage && reply.is_accepted() {
            if let Some(conversation) = Conversation::from_trailing(command.args()) {
                self.broadcast(id, &conversation, reply.text());
            }
        }
    }

    /// Keeps the routing index in step with the chats a connection has open.
    fn track(&mut self, id: ConnectionId, command: &Command, reply: &Reply) {
        match (command.kind(), command.args()) {
            (CommandKind::OpenChat, [friend, me]) if reply.is_accepted() => {
                self.index.register_to_chat(id, me, friend);
                self.viewers.insert(id, me.clone());
            }
            (CommandKind::OpenGroup, [group, me]) if reply.is_accepted() => {
                self.index.register_to_group(id, group);
                self.viewers.insert(id, me.clone());
            }
            (CommandKind::CloseChat, args) => {
                if let Some(conversation) = Conversation::from_trailing(args) {
                    self.index.unregister(id, &conversation);
                }
            }
            (CommandKind::LeaveGroup, [group, me]) if reply.is_accepted() => {
                self.drop_member(group, me);
            }
            (CommandKind::RemoveFromGroup, [user, group, _]) if reply.is_accepted() => {
                self.drop_member(group, user);
            }
            (CommandKind::DeleteGroup, [group, _]) if reply.is_accepted() => {
                let removed = self.index.remove_group(group);
                tracing::debug!(group = %group, viewers = removed, "group closed for all viewers");
            }
            _ => {}
        }
    }

    /// Unregisters every connection `username` has viewing `group`.
    fn drop_member(&mut self, group: &str, username: &str) {
        let conversation = Conversation::group(group);
        for handle in self.index.participants_of(&conversation) {
            if self.viewers.get(&handle).is_some_and(|viewer| viewer == username) {
                self.index.unregister(handle, &conversation);
            }
        }
    }

    /// Pushes `text` to every other connection viewing `conversation`.
    fn broadcast(&mut self, sender: ConnectionId, conversation: &Conversation, text: &str) {
        let targets: Vec<ConnectionId> = self
            .index
            .participants_of(conversation)
            .into_iter()
            .filter(|handle| *handle != sender)
            .collect();
        tracing::debug!(
            conn = %sender,
            conversation = %conversation,
            recipients = targets.len(),
            "fan-out"
        );
        for target in targets {
            self.deliver(target, text);
        }
    }

    /// Queues `text` for one connection. A closed channel counts as a
    /// disconnect.
    fn deliver(&mut self, id: ConnectionId, text: &str) {
        let Some(outbound) = self.connections.get(&id) else {
            return;
        };
        if outbound.send(text.to_string()).is_err() {
            tracing::debug!(conn = %id, "outbound channel closed");
            self.forget(id);
        }
    }

    fn forget(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
        self.viewers.remove(&id);
        self.index.disconnect(id);
    }
}

/// Starts a server on `127.0.0.1:0` backed by a fresh in-memory store.
#[cfg(test)]
pub async fn start_test_server() -> (SocketAddr, ServerHandle) {
    use std::sync::Arc;

    use crate::service::{MemoryBackend, Services};

    let executor = CommandExecutor::new(Services::in_memory(Arc::new(MemoryBackend::new())));
    start_server("127.0.0.1:0", executor, ServerOptions::default())
        .await
        .expect("failed to start test server")
}
