//! Process-wide coordinator: inbound dispatch and the books of contacts,
//! sessions, and pending requests.
//!
//! Two tasks mutate engine state: the dispatcher (inbound records) and the
//! UI-driven command handler. Every mutation happens under one exclusive
//! lock, held for the duration of each high-level operation; operations are
//! short and contention is trivial at chat rates.
//!
//! The books are addressed by stable index: removal nulls a slot instead of
//! compacting, and adds reuse the first empty slot before appending, so the
//! handles a user sees stay valid across removals.

use std::path::PathBuf;
use std::sync::Arc;

use ed25519_dalek::SigningKey;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::envelope::{self, Message, PayloadKind};
use crate::error::ChatError;
use crate::profile::{self, Profile, Text};
use crate::session::{Request, Session, SessionStatus};
use crate::transport;

/// Capacity of the inbound record queue and of the UI event stream.
pub const QUEUE_DEPTH: usize = 16;

/// Events surfaced to the UI collaborator.
#[derive(Debug)]
pub enum EngineEvent {
    /// A verified chat request arrived and awaits a decision.
    RequestReceived { index: usize, from: Profile },
    /// A pending session completed its handshake.
    SessionActive { index: usize, id: u64, with: Profile },
    /// A response matched a session but the upgrade failed.
    SessionUpgradeFailed { id: u64, from: Profile },
    /// A text was delivered into the session at `index`.
    TextReceived { index: usize, text: Text },
}

/// State mutated under the engine lock.
struct State {
    me: Profile,
    contacts: Vec<Option<Profile>>,
    sessions: Vec<Option<Session>>,
    requests: Vec<Option<Request>>,
}

/// Insert at the first empty slot, appending only when none is free.
/// Returns the index used.
fn slot_add<T>(list: &mut Vec<Option<T>>, item: T) -> usize {
    for (index, slot) in list.iter_mut().enumerate() {
        if slot.is_none() {
            *slot = Some(item);
            return index;
        }
    }
    list.push(Some(item));
    list.len() - 1
}

/// Null out the slot at `index`. Returns whether anything was there.
fn slot_remove<T>(list: &mut [Option<T>], index: usize) -> bool {
    match list.get_mut(index) {
        Some(slot) if slot.is_some() => {
            *slot = None;
            true
        }
        _ => false,
    }
}

/// The process-wide chat coordinator.
pub struct ChatEngine {
    signing_key: SigningKey,
    state: Mutex<State>,
    events: mpsc::Sender<EngineEvent>,
    contacts_path: Option<PathBuf>,
}

impl ChatEngine {
    /// Build an engine from a loaded profile, contacts, and long-term signing
    /// key. Returns the engine and the receiving end of its event stream.
    /// When `contacts_path` is set, the contacts file is rewritten after
    /// every contacts change.
    pub fn new(
        me: Profile,
        contacts: Vec<Profile>,
        signing_key: SigningKey,
        contacts_path: Option<PathBuf>,
    ) -> (Arc<Self>, mpsc::Receiver<EngineEvent>) {
        let (events_tx, events_rx) = mpsc::channel(QUEUE_DEPTH);
        let engine = Arc::new(Self {
            signing_key,
            state: Mutex::new(State {
                me,
                contacts: contacts.into_iter().map(Some).collect(),
                sessions: Vec::new(),
                requests: Vec::new(),
            }),
            events: events_tx,
            contacts_path,
        });
        (engine, events_rx)
    }

    /// Bind the listener on the profile's port and spawn the listener and
    /// dispatcher tasks. Both observe `shutdown` and exit on signal.
    pub async fn start(
        self: Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(JoinHandle<()>, JoinHandle<()>), ChatError> {
        let port = self.state.lock().await.me.port.clone();
        let listener = transport::Listener::bind(&port).await?;

        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_DEPTH);
        let listener_task = tokio::spawn(listener.run(queue_tx, shutdown.clone()));
        let dispatcher_task = tokio::spawn(self.dispatch_loop(queue_rx, shutdown));
        Ok((listener_task, dispatcher_task))
    }

    /// Consume inbound records in arrival order until shutdown. Decode and
    /// verification failures are logged and the record dropped; the loop
    /// itself never aborts.
    async fn dispatch_loop(
        self: Arc<Self>,
        mut queue: mpsc::Receiver<Message>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                message = queue.recv() => {
                    let Some(message) = message else { break };
                    self.dispatch(message).await;
                }
            }
        }
        info!("dispatcher stopped");
    }

    async fn dispatch(&self, message: Message) {
        match message.kind {
            PayloadKind::Request => self.handle_request(&message).await,
            PayloadKind::Response => self.handle_response(&message).await,
            PayloadKind::Text => self.handle_text(&message).await,
        }
    }

    /// A verified request joins the pending book; accept or reject is the
    /// user's call.
    async fn handle_request(&self, message: &Message) {
        let request = match envelope::unpackage_request(message) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "dropping request");
                return;
            }
        };

        let from = request.profile.clone();
        let index = {
            let mut state = self.state.lock().await;
            slot_add(&mut state.requests, request)
        };
        info!(%from, "chat request received");
        self.emit(EngineEvent::RequestReceived { index, from }).await;
    }

    /// A verified response upgrades the pending session that carries its id.
    async fn handle_response(&self, message: &Message) {
        let response = match envelope::unpackage_response(message) {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, "dropping response");
                return;
            }
        };

        let mut state = self.state.lock().await;
        let index = state.sessions.iter().position(|slot| {
            slot.as_ref()
                .map_or(false, |session| session.id == response.session_id)
        });
        let Some(index) = index else {
            drop(state);
            warn!(id = response.session_id, from = %response.profile, "no session for response");
            return;
        };

        let event = match state.sessions[index].as_mut() {
            Some(session) => match session.upgrade(&response) {
                Ok(()) => {
                    info!(id = session.id, with = %session.other, "session active");
                    EngineEvent::SessionActive {
                        index,
                        id: session.id,
                        with: session.other.clone(),
                    }
                }
                Err(err) => {
                    warn!(%err, id = response.session_id, "session upgrade failed");
                    EngineEvent::SessionUpgradeFailed {
                        id: response.session_id,
                        from: response.profile.clone(),
                    }
                }
            },
            None => return,
        };
        drop(state);
        self.emit(event).await;
    }

    /// Texts carry no session id; try each active session's key until one
    /// decrypts and verifies. No match means the record is dropped.
    async fn handle_text(&self, message: &Message) {
        let mut state = self.state.lock().await;
        let mut delivered = None;
        for (index, slot) in state.sessions.iter_mut().enumerate() {
            let Some(session) = slot else { continue };
            if session.status != SessionStatus::Active {
                continue;
            }
            let Some(key) = session.shared_key().copied() else {
                continue;
            };
            if let Ok(text) = envelope::unpackage_text(message, &key) {
                session.push_in(text.clone());
                delivered = Some((index, text));
                break;
            }
        }
        drop(state);

        match delivered {
            Some((index, text)) => self.emit(EngineEvent::TextReceived { index, text }).await,
            None => debug!("dropping non-sessioned text"),
        }
    }

    async fn emit(&self, event: EngineEvent) {
        if self.events.send(event).await.is_err() {
            debug!("event stream closed");
        }
    }

    //
    // Operations driven by the UI collaborator.
    //

    /// Accept the pending request at `index`: begin a session, send the
    /// response, file the session, drop the request. A send failure leaves
    /// all state unchanged. Returns the new session's index.
    pub async fn accept(&self, index: usize) -> Result<usize, ChatError> {
        let mut state = self.state.lock().await;
        let request = state
            .requests
            .get(index)
            .and_then(|slot| slot.clone())
            .ok_or_else(|| ChatError::NotFound(format!("request {index}")))?;

        let (session, response) = Session::begin(state.me.clone(), &request)?;
        session.send_response(&response, &self.signing_key).await?;

        slot_remove(&mut state.requests, index);
        let at = slot_add(&mut state.sessions, session);
        info!(with = %request.profile, "began session");
        Ok(at)
    }

    /// Drop the pending request at `index`. Silent: no datagram is ever sent.
    /// Rejecting an empty slot is a no-op.
    pub async fn reject(&self, index: usize) -> bool {
        let mut state = self.state.lock().await;
        slot_remove(&mut state.requests, index)
    }

    /// Initiate a handshake toward `to` and file the pending session.
    /// Returns its index.
    pub async fn send_request(&self, to: Profile) -> Result<usize, ChatError> {
        let mut state = self.state.lock().await;
        let (session, request) = Session::initiate(state.me.clone(), to)?;
        session.send_request(&request, &self.signing_key).await?;
        Ok(slot_add(&mut state.sessions, session))
    }

    /// Send `message` inside the session at `index`.
    pub async fn send_text(&self, index: usize, message: &str) -> Result<(), ChatError> {
        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(index)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| ChatError::NotFound(format!("session {index}")))?;
        session.send_text(message).await
    }

    /// Drop the session at `index`.
    pub async fn drop_session(&self, index: usize) -> bool {
        let mut state = self.state.lock().await;
        slot_remove(&mut state.sessions, index)
    }

    /// Add a contact and persist the contacts file. An equal profile already
    /// on file is overwritten in place. Returns the index used.
    pub async fn add_contact(&self, contact: Profile) -> Result<usize, ChatError> {
        let mut state = self.state.lock().await;
        let index = match state
            .contacts
            .iter()
            .position(|slot| slot.as_ref() == Some(&contact))
        {
            Some(index) => {
                state.contacts[index] = Some(contact);
                index
            }
            None => slot_add(&mut state.contacts, contact),
        };
        self.persist_contacts(&state)?;
        Ok(index)
    }

    /// Remove the contact at `index` and persist the contacts file.
    pub async fn remove_contact(&self, index: usize) -> Result<bool, ChatError> {
        let mut state = self.state.lock().await;
        let removed = slot_remove(&mut state.contacts, index);
        if removed {
            self.persist_contacts(&state)?;
        }
        Ok(removed)
    }

    fn persist_contacts(&self, state: &State) -> Result<(), ChatError> {
        let Some(path) = &self.contacts_path else {
            return Ok(());
        };
        let contacts: Vec<Profile> = state.contacts.iter().flatten().cloned().collect();
        profile::write_contacts(&contacts, path)
    }

    //
    // Snapshots for the UI collaborator.
    //

    /// This client's own profile.
    pub async fn me(&self) -> Profile {
        self.state.lock().await.me.clone()
    }

    /// Replace this client's own profile.
    pub async fn set_me(&self, me: Profile) {
        self.state.lock().await.me = me;
    }

    /// Occupied contact slots as `(index, profile)`.
    pub async fn contacts(&self) -> Vec<(usize, Profile)> {
        let state = self.state.lock().await;
        indexed(&state.contacts)
    }

    /// The contact at `index`, if any.
    pub async fn contact(&self, index: usize) -> Option<Profile> {
        self.state.lock().await.contacts.get(index)?.clone()
    }

    /// Occupied pending-request slots as `(index, request)`.
    pub async fn requests(&self) -> Vec<(usize, Request)> {
        let state = self.state.lock().await;
        indexed(&state.requests)
    }

    /// Occupied session slots rendered for display, as `(index, line)`.
    pub async fn sessions(&self) -> Vec<(usize, String)> {
        let state = self.state.lock().await;
        state
            .sessions
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|s| (index, s.to_string())))
            .collect()
    }

    /// `(status, id, history length)` of the session at `index`, if any.
    pub async fn session_info(&self, index: usize) -> Option<(SessionStatus, u64, usize)> {
        let state = self.state.lock().await;
        state
            .sessions
            .get(index)?
            .as_ref()
            .map(|s| (s.status, s.id, s.msgs.len()))
    }

    /// Number of occupied session slots.
    pub async fn session_count(&self) -> usize {
        let state = self.state.lock().await;
        state.sessions.iter().flatten().count()
    }
}

fn indexed<T: Clone>(list: &[Option<T>]) -> Vec<(usize, T)> {
    list.iter()
        .enumerate()
        .filter_map(|(index, slot)| slot.clone().map(|item| (index, item)))
        .collect()
}
