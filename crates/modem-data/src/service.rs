//! Tokio host for the data manager
//!
//! One task owns the [`DataManager`] and serializes everything that touches
//! it: commands from [`DataServiceHandle`]s, hardware events from the
//! transport side and the manager's own timers.

use modem_data_core::{
    ContextParams, ContextType, DataCall, DataRole, Indication, NetworkState,
    RadioConfigInterface, RadioResponse, RatMask, Serial,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::SlotConfig;
use crate::error::{DataError, DataResult};
use crate::manager::DataManager;
use crate::notify::{DataEvent, DataProperties};
use crate::request::{CallOwner, RequestId};

/// Hardware-side input of the service
#[derive(Debug, Clone)]
pub enum RadioEvent {
    /// Completion of a submitted request
    Response {
        serial: Serial,
        response: RadioResponse,
    },
    /// Unsolicited indication from a slot's modem
    Indication { slot: usize, indication: Indication },
}

type Reply<T> = oneshot::Sender<DataResult<T>>;

enum Command {
    AttachSlot(SlotConfig, Reply<()>),
    DetachSlot(usize, Reply<()>),
    SetRadioConfig(Option<RadioConfigInterface>),
    Allow(usize, DataRole, Reply<()>),
    SetupCall {
        slot: usize,
        params: ContextParams,
        context_type: ContextType,
        owner: Option<CallOwner>,
        started: Reply<RequestId>,
        done: Reply<DataCall>,
    },
    DeactivateCall {
        slot: usize,
        cid: i32,
        started: Reply<RequestId>,
        done: Reply<()>,
    },
    Cancel(RequestId, oneshot::Sender<bool>),
    IsAllowed(usize, oneshot::Sender<bool>),
    Calls(usize, oneshot::Sender<Vec<DataCall>>),
    Grab(usize, i32, CallOwner, oneshot::Sender<bool>),
    Release(usize, i32, CallOwner),
    NetworkChanged(usize, NetworkState),
    ImsiChanged(usize, Option<String>),
    PrefModeChanged(usize, RatMask),
    Shutdown,
}

/// A request submitted through the service, resolved when it completes
pub struct PendingRequest<T> {
    id: RequestId,
    done: oneshot::Receiver<DataResult<T>>,
}

impl<T> PendingRequest<T> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the request's outcome
    pub async fn outcome(self) -> DataResult<T> {
        self.done.await.unwrap_or(Err(DataError::NotReady))
    }
}

/// Cloneable handle to a running data service
#[derive(Clone)]
pub struct DataServiceHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<DataEvent>,
}

impl DataServiceHandle {
    async fn send(&self, cmd: Command) -> DataResult<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| DataError::NotReady)
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> DataResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.unwrap_or(Err(DataError::NotReady))
    }

    async fn query<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> DataResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| DataError::NotReady)
    }

    pub async fn attach_slot(&self, config: SlotConfig) -> DataResult<()> {
        self.call(|reply| Command::AttachSlot(config, reply)).await
    }

    pub async fn detach_slot(&self, slot: usize) -> DataResult<()> {
        self.call(|reply| Command::DetachSlot(slot, reply)).await
    }

    pub async fn set_radio_config(&self, iface: Option<RadioConfigInterface>) -> DataResult<()> {
        self.send(Command::SetRadioConfig(iface)).await
    }

    pub async fn allow(&self, slot: usize, role: DataRole) -> DataResult<()> {
        self.call(|reply| Command::Allow(slot, role, reply)).await
    }

    /// Queue a setup and return as soon as it is queued
    pub async fn request_setup(
        &self,
        slot: usize,
        params: ContextParams,
        context_type: ContextType,
        owner: Option<CallOwner>,
    ) -> DataResult<PendingRequest<DataCall>> {
        let (done_tx, done_rx) = oneshot::channel();
        let id = self
            .call(|started| Command::SetupCall {
                slot,
                params,
                context_type,
                owner,
                started,
                done: done_tx,
            })
            .await?;
        Ok(PendingRequest { id, done: done_rx })
    }

    /// Set up a data call and wait for the outcome
    pub async fn setup_call(
        &self,
        slot: usize,
        params: ContextParams,
        context_type: ContextType,
        owner: Option<CallOwner>,
    ) -> DataResult<DataCall> {
        self.request_setup(slot, params, context_type, owner)
            .await?
            .outcome()
            .await
    }

    pub async fn request_deactivate(
        &self,
        slot: usize,
        cid: i32,
    ) -> DataResult<PendingRequest<()>> {
        let (done_tx, done_rx) = oneshot::channel();
        let id = self
            .call(|started| Command::DeactivateCall {
                slot,
                cid,
                started,
                done: done_tx,
            })
            .await?;
        Ok(PendingRequest { id, done: done_rx })
    }

    pub async fn deactivate_call(&self, slot: usize, cid: i32) -> DataResult<()> {
        self.request_deactivate(slot, cid).await?.outcome().await
    }

    pub async fn cancel(&self, id: RequestId) -> DataResult<bool> {
        self.query(|reply| Command::Cancel(id, reply)).await
    }

    pub async fn is_allowed(&self, slot: usize) -> DataResult<bool> {
        self.query(|reply| Command::IsAllowed(slot, reply)).await
    }

    pub async fn calls(&self, slot: usize) -> DataResult<Vec<DataCall>> {
        self.query(|reply| Command::Calls(slot, reply)).await
    }

    pub async fn grab(&self, slot: usize, cid: i32, owner: CallOwner) -> DataResult<bool> {
        self.query(|reply| Command::Grab(slot, cid, owner, reply))
            .await
    }

    pub async fn release(&self, slot: usize, cid: i32, owner: CallOwner) -> DataResult<()> {
        self.send(Command::Release(slot, cid, owner)).await
    }

    pub async fn network_changed(&self, slot: usize, state: NetworkState) -> DataResult<()> {
        self.send(Command::NetworkChanged(slot, state)).await
    }

    pub async fn imsi_changed(&self, slot: usize, imsi: Option<String>) -> DataResult<()> {
        self.send(Command::ImsiChanged(slot, imsi)).await
    }

    pub async fn pref_mode_changed(&self, slot: usize, mask: RatMask) -> DataResult<()> {
        self.send(Command::PrefModeChanged(slot, mask)).await
    }

    /// Subscribe to every change notification
    pub fn subscribe(&self) -> broadcast::Receiver<DataEvent> {
        self.events.subscribe()
    }

    /// Stop the service; every outstanding request is cancelled
    pub async fn shutdown(&self) -> DataResult<()> {
        self.send(Command::Shutdown).await
    }
}

/// The task that owns the data manager
pub struct DataService {
    manager: DataManager,
    commands: mpsc::Receiver<Command>,
    radio: mpsc::UnboundedReceiver<RadioEvent>,
}

impl DataService {
    pub fn new(
        mut manager: DataManager,
        radio: mpsc::UnboundedReceiver<RadioEvent>,
    ) -> (Self, DataServiceHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (event_tx, _) = broadcast::channel(256);

        let sink = event_tx.clone();
        manager.add_handler(
            DataProperties::all(),
            Box::new(move |event| {
                let _ = sink.send(event.clone());
            }),
        );

        let service = Self {
            manager,
            commands: cmd_rx,
            radio,
        };
        let handle = DataServiceHandle {
            commands: cmd_tx,
            events: event_tx,
        };
        (service, handle)
    }

    /// Spawn the service on the current runtime
    pub fn spawn(
        manager: DataManager,
        radio: mpsc::UnboundedReceiver<RadioEvent>,
    ) -> (JoinHandle<()>, DataServiceHandle) {
        let (service, handle) = Self::new(manager, radio);
        (tokio::spawn(service.run()), handle)
    }

    pub async fn run(mut self) {
        info!("Data service started");
        loop {
            let deadline = self.manager.poll_timeout();
            let timer = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at.into()).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                event = self.radio.recv() => match event {
                    Some(RadioEvent::Response { serial, response }) => {
                        self.manager.handle_response(serial, response);
                    }
                    Some(RadioEvent::Indication { slot, indication }) => {
                        self.manager.handle_indication(slot, indication);
                    }
                    None => {
                        warn!("Radio event channel closed");
                        break;
                    }
                },
                _ = timer => {
                    self.manager.handle_timeout(std::time::Instant::now());
                }
            }
        }

        let slots: Vec<usize> = self.manager.slots().iter().map(|obj| obj.slot()).collect();
        for slot in slots {
            let _ = self.manager.detach_slot(slot);
        }
        info!("Data service stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::AttachSlot(config, reply) => {
                let _ = reply.send(self.manager.attach_slot(&config));
            }
            Command::DetachSlot(slot, reply) => {
                let _ = reply.send(self.manager.detach_slot(slot));
            }
            Command::SetRadioConfig(iface) => self.manager.set_radio_config(iface),
            Command::Allow(slot, role, reply) => {
                let _ = reply.send(self.manager.allow(slot, role));
            }
            Command::SetupCall {
                slot,
                params,
                context_type,
                owner,
                started,
                done,
            } => {
                let result = self
                    .manager
                    .call_setup(slot, params, context_type, owner, move |res| {
                        let _ = done.send(res);
                    });
                let _ = started.send(result);
            }
            Command::DeactivateCall {
                slot,
                cid,
                started,
                done,
            } => {
                let result = self.manager.call_deactivate(slot, cid, move |res| {
                    let _ = done.send(res);
                });
                let _ = started.send(result);
            }
            Command::Cancel(id, reply) => {
                let _ = reply.send(self.manager.cancel(id));
            }
            Command::IsAllowed(slot, reply) => {
                let _ = reply.send(self.manager.is_allowed(slot));
            }
            Command::Calls(slot, reply) => {
                let calls = self
                    .manager
                    .slot(slot)
                    .map(|obj| obj.calls().to_vec())
                    .unwrap_or_default();
                let _ = reply.send(calls);
            }
            Command::Grab(slot, cid, owner, reply) => {
                let _ = reply.send(self.manager.call_grab(slot, cid, owner));
            }
            Command::Release(slot, cid, owner) => self.manager.call_release(slot, cid, owner),
            Command::NetworkChanged(slot, state) => self.manager.on_network_changed(slot, state),
            Command::ImsiChanged(slot, imsi) => self.manager.on_imsi_changed(slot, imsi),
            Command::PrefModeChanged(slot, mask) => self.manager.on_pref_mode_changed(slot, mask),
            Command::Shutdown => {}
        }
    }
}
