//! Mock API implementation directly using the `vending-machine` crate

use std::sync::Arc;

use eyre::{eyre, Result};
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};
use uuid::Uuid;
use vending_core::{Config, Money, RawRequest, Request, RequestHandler, RequestKind};
use vending_machine::Machine;

use super::{Api, RequestMsg, Response};

pub struct MockMachine {
    machine: Arc<Machine>,
    join_handles: Vec<JoinHandle<()>>,
}

struct MockRawRequest {
    kind: RequestKind,
    content_type: Option<String>,
    payload: Option<Vec<u8>>,
    response_channel: oneshot::Sender<Response>,
}

pub async fn start(threads: u16, config: Config) -> Result<(MockMachine, Api)> {
    let machine = Arc::new(
        task::spawn_blocking(move || vending_machine::launch(&config)).await??,
    );

    let it = (0..threads).map(|_| {
        let (sender, receiver) = flume::bounded::<RequestMsg>(65536);
        let machine = machine.clone();
        let handle = task::spawn_blocking(move || {
            let machine = &*machine;
            for msg in receiver.into_iter() {
                let raw = Box::new(MockRawRequest {
                    kind: msg.kind,
                    content_type: msg.content_type,
                    payload: Some(msg.payload),
                    response_channel: msg.response_channel,
                });
                machine.handle(Request::from_raw(msg.kind, msg.id, raw))
            }
        });
        (sender, handle)
    });
    let (senders, join_handles) = it.unzip();
    tracing::debug!(threads, "mock machine started");

    let mock_machine = MockMachine {
        machine,
        join_handles,
    };
    Ok((mock_machine, Api::new(senders)))
}

impl MockMachine {
    pub async fn shutdown(self) -> Result<()> {
        for handle in self.join_handles {
            handle.await?;
        }
        let machine = Arc::into_inner(self.machine)
            .ok_or_else(|| eyre!("machine is still referenced after its workers stopped"))?;
        task::spawn_blocking(move || machine.shutdown()).await?;
        Ok(())
    }
}

impl MockRawRequest {
    fn send(self: Box<Self>, response: Response) {
        // The receiving test may have timed out already
        let _ = self.response_channel.send(response);
    }
}

impl RawRequest for MockRawRequest {
    fn url(&self) -> &str {
        self.kind.path()
    }

    fn method(&self) -> vending_core::RequestMethod {
        self.kind.method()
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn read_bytes(&mut self, limit: u64) -> std::io::Result<Vec<u8>> {
        let mut payload = self.payload.take().unwrap_or_default();
        payload.truncate(limit.saturating_add(1) as usize);
        Ok(payload)
    }

    fn respond_with_err(self: Box<Self>, status: u16, msg: String, id: Uuid) {
        self.send(Response::Error { status, msg, id })
    }

    fn respond_with_int(self: Box<Self>, i: Money, id: Uuid) {
        self.send(Response::Int { i, id })
    }

    fn respond_with_json(self: Box<Self>, json: Vec<u8>, id: Uuid) {
        self.send(Response::Json { json, id })
    }

    fn respond_with_stored(self: Box<Self>, name: String, id: Uuid) {
        self.send(Response::Stored { name, id })
    }
}
