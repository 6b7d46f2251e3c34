//! Background query worker
//!
//! Backend calls block, so they run on a worker thread. The frame loop
//! submits requests and drains replies without ever waiting.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use super::backend::{QueryBackend, QueryRequest, QueryResponse};
use super::types::{ChatError, ChatResult};

/// Identifies a submitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

/// Finished request
#[derive(Debug, Clone, PartialEq)]
pub struct QueryReply {
    pub id: RequestId,
    pub result: ChatResult<QueryResponse>,
}

enum WorkerCommand {
    Query(RequestId, QueryRequest),
    Shutdown,
}

/// Owner of the worker thread
pub struct QueryDispatcher {
    backend: Arc<dyn QueryBackend>,
    commands: Sender<WorkerCommand>,
    replies: Receiver<QueryReply>,
    worker: Option<JoinHandle<()>>,
    next_id: u64,
    in_flight: usize,
}

impl QueryDispatcher {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        let (cmd_tx, cmd_rx) = channel::unbounded();
        let (reply_tx, reply_rx) = channel::unbounded();
        let worker_backend = Arc::clone(&backend);

        let worker = thread::Builder::new()
            .name("talkhead-query".to_string())
            .spawn(move || worker_main(worker_backend, cmd_rx, reply_tx));

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Submissions will fail fast through the closed channel
                warn!(error = %e, "failed to spawn query worker");
                None
            }
        };

        Self {
            backend,
            commands: cmd_tx,
            replies: reply_rx,
            worker,
            next_id: 0,
            in_flight: 0,
        }
    }

    /// Queue a request; the reply arrives through [`try_recv`](Self::try_recv)
    pub fn submit(&mut self, request: QueryRequest) -> ChatResult<RequestId> {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.commands
            .send(WorkerCommand::Query(id, request))
            .map_err(|_| ChatError::NetworkFailure("query worker is not running".to_string()))?;
        self.in_flight += 1;
        Ok(id)
    }

    /// Next finished reply, without blocking
    pub fn try_recv(&mut self) -> Option<QueryReply> {
        let reply = self.replies.try_recv().ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(reply)
    }

    /// Wait up to `timeout` for a reply
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<QueryReply> {
        match self.replies.recv_timeout(timeout) {
            Ok(reply) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Some(reply)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Requests submitted but not yet received
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn audio_url(&self, audio_file: &str) -> String {
        self.backend.audio_url(audio_file)
    }

    /// Stop the worker
    ///
    /// Joins only when nothing is in flight; a worker stuck in a request
    /// exits on its own once the call returns.
    pub fn shutdown(&mut self) {
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.worker.take() {
            if self.in_flight == 0 {
                if handle.join().is_err() {
                    warn!("query worker panicked");
                }
            } else {
                debug!(in_flight = self.in_flight, "detaching busy query worker");
            }
        }
    }
}

impl Drop for QueryDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for QueryDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDispatcher")
            .field("next_id", &self.next_id)
            .field("in_flight", &self.in_flight)
            .field("running", &self.worker.is_some())
            .finish()
    }
}

fn worker_main(
    backend: Arc<dyn QueryBackend>,
    commands: Receiver<WorkerCommand>,
    replies: Sender<QueryReply>,
) {
    debug!("query worker started");
    while let Ok(command) = commands.recv() {
        match command {
            WorkerCommand::Query(id, request) => {
                let result = backend.query(&request);
                if let Err(e) = &result {
                    warn!(error = %e, "query failed");
                }
                if replies.send(QueryReply { id, result }).is_err() {
                    break;
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }
    debug!("query worker exited");
}
