use std::collections::{BTreeMap, HashMap, VecDeque};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::connection::Dispatch;
use crate::error::{Error, Result};
use crate::org_freedesktop_dbus::{
    errors, NameFlag, NameReply, ReleaseNameReply, DESTINATION, INTERFACE, PEER_INTERFACE,
};
use crate::proto::MessageType;
use crate::sasl::Guid;
use crate::transport::CloseHandle;
use crate::{BodyBuf, Message, ObjectPath, SerialCounter, Signature, Value};

use super::MatchRule;

const DBUS_PATH: &ObjectPath = ObjectPath::new_const(b"/org/freedesktop/DBus");

/// Identifier of a connected peer.
pub(crate) type PeerId = u64;

struct Peer {
    unique: Box<str>,
    registered: bool,
    outgoing: mpsc::UnboundedSender<Message>,
    close: CloseHandle,
    rules: Vec<MatchRule>,
}

#[derive(Clone, Copy)]
struct Owner {
    peer: PeerId,
    flags: NameFlag,
}

/// A well-known name, its primary owner and the peers queued for it.
struct Name {
    owner: Owner,
    queue: VecDeque<Owner>,
}

/// A message produced by the bus itself, sent once the current request has
/// been answered.
enum Emit {
    Unicast(PeerId, Message),
    Broadcast(Message),
}

/// An error reply produced by the bus driver.
struct Failure {
    name: &'static str,
    text: String,
}

impl Failure {
    fn new(name: &'static str, text: impl Into<String>) -> Self {
        Self {
            name,
            text: text.into(),
        }
    }

    fn invalid_args(m: &Message) -> Self {
        Self::new(
            errors::INVALID_ARGS,
            format!(
                "Call to {} has wrong arguments ({})",
                m.member().unwrap_or_default(),
                m.signature().as_str()
            ),
        )
    }
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self::new(errors::INVALID_ARGS, error.to_string())
    }
}

type Reply = Result<BodyBuf, Failure>;

/// Routes messages between the peers of a broker and implements the
/// `org.freedesktop.DBus` driver.
pub(crate) struct Router {
    inner: Mutex<Registry>,
}

impl Router {
    pub(crate) fn new(guid: Guid) -> Self {
        Self {
            inner: Mutex::new(Registry {
                guid,
                next_id: 1,
                closed: false,
                peers: BTreeMap::new(),
                uniques: HashMap::new(),
                names: BTreeMap::new(),
                serials: SerialCounter::new(),
                outbox: Vec::new(),
            }),
        }
    }

    /// Register an authenticated peer.
    ///
    /// Returns `None` if the router has been closed.
    pub(crate) fn register(
        &self,
        outgoing: mpsc::UnboundedSender<Message>,
        close: CloseHandle,
    ) -> Option<PeerId> {
        let mut inner = self.inner.lock();

        if inner.closed {
            return None;
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let unique: Box<str> = format!(":1.{id}").into();
        inner.uniques.insert(unique.clone(), id);

        inner.peers.insert(
            id,
            Peer {
                unique,
                registered: false,
                outgoing,
                close,
                rules: Vec::new(),
            },
        );

        tracing::debug!(id, "peer connected");
        Some(id)
    }

    /// Route a message received from the given peer.
    pub(crate) fn handle(&self, id: PeerId, message: Message) {
        let mut inner = self.inner.lock();
        inner.handle(id, message);
        inner.flush();
    }

    /// Remove a peer, releasing every name it owns.
    pub(crate) fn disconnect(&self, id: PeerId) {
        let mut inner = self.inner.lock();
        inner.disconnect(id);
        inner.flush();
    }

    /// Close every peer, and refuse new ones.
    pub(crate) fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;

        for peer in inner.peers.values() {
            peer.close.close();
        }
    }
}

struct Registry {
    guid: Guid,
    next_id: PeerId,
    closed: bool,
    peers: BTreeMap<PeerId, Peer>,
    uniques: HashMap<Box<str>, PeerId>,
    names: BTreeMap<Box<str>, Name>,
    serials: SerialCounter,
    outbox: Vec<Emit>,
}

impl Registry {
    fn handle(&mut self, id: PeerId, message: Message) {
        let Some(peer) = self.peers.get(&id) else {
            return;
        };

        let registered = peer.registered;
        let message = message.with_sender(&peer.unique);

        // Method calls without a destination are addressed to the bus itself.
        let to_driver = match message.destination() {
            Some(destination) => destination == DESTINATION,
            None => message.message_type() == MessageType::METHOD_CALL,
        };

        if !registered {
            let is_hello = to_driver
                && message.member() == Some("Hello")
                && matches!(message.interface(), None | Some(INTERFACE));

            if is_hello {
                self.driver(id, &message);
            } else {
                tracing::debug!(id, "refusing message before Hello");

                self.reply_error(
                    id,
                    &message,
                    Failure::new(
                        errors::ACCESS_DENIED,
                        "Client tried to send a message other than Hello without being registered",
                    ),
                );
            }

            return;
        }

        if to_driver {
            self.driver(id, &message);
            return;
        }

        let Some(destination) = message.destination() else {
            self.broadcast(message);
            return;
        };

        match self.resolve(destination) {
            Some(target) => {
                tracing::trace!(from = id, to = target, serial = message.serial().get(), "forward");
                self.send(target, message);
            }
            None => {
                let text = format!("The name {destination} was not provided by any .service files");
                self.reply_error(id, &message, Failure::new(errors::SERVICE_UNKNOWN, text));
            }
        }
    }

    /// Send everything emitted while handling the last request.
    fn flush(&mut self) {
        for emit in std::mem::take(&mut self.outbox) {
            match emit {
                Emit::Unicast(target, message) => self.send(target, message),
                Emit::Broadcast(message) => self.broadcast(message),
            }
        }
    }

    fn send(&self, target: PeerId, message: Message) {
        let Some(peer) = self.peers.get(&target) else {
            return;
        };

        if peer.outgoing.send(message).is_err() {
            tracing::trace!(to = target, "dropping message to closed peer");
        }
    }

    fn broadcast(&self, message: Message) {
        let sender_names = message.sender().map(|s| self.names_of(s)).unwrap_or_default();

        for (id, peer) in &self.peers {
            if !peer.registered {
                continue;
            }

            if peer.rules.iter().any(|rule| rule.matches(&message, &sender_names)) {
                tracing::trace!(to = id, serial = message.serial().get(), "broadcast");

                if peer.outgoing.send(message.clone()).is_err() {
                    tracing::trace!(to = id, "dropping message to closed peer");
                }
            }
        }
    }

    /// Every name owned by the peer with the given unique name.
    fn names_of<'a>(&'a self, unique: &'a str) -> Vec<&'a str> {
        let Some(&id) = self.uniques.get(unique) else {
            return vec![unique];
        };

        let mut names = vec![unique];

        for (name, entry) in &self.names {
            if entry.owner.peer == id {
                names.push(&**name);
            }
        }

        names
    }

    /// Resolve a bus name into the peer which owns it.
    fn resolve(&self, name: &str) -> Option<PeerId> {
        if name.starts_with(':') {
            let id = *self.uniques.get(name)?;
            return self.peers.get(&id)?.registered.then_some(id);
        }

        Some(self.names.get(name)?.owner.peer)
    }

    fn unique(&self, id: PeerId) -> &str {
        match self.peers.get(&id) {
            Some(peer) => &*peer.unique,
            None => "",
        }
    }

    fn reply(&mut self, id: PeerId, to: &Message, body: BodyBuf) {
        if !to.is_reply_expected() {
            return;
        }

        let reply = to
            .method_return(self.serials.next())
            .with_sender(DESTINATION)
            .with_body(body);

        self.send(id, reply);
    }

    fn reply_error(&mut self, id: PeerId, to: &Message, failure: Failure) {
        if to.message_type() != MessageType::METHOD_CALL || !to.is_reply_expected() {
            return;
        }

        let mut body = BodyBuf::new();

        let reply = to.error(failure.name, self.serials.next()).with_sender(DESTINATION);

        let reply = match body.store(failure.text.as_str()) {
            Ok(()) => reply.with_body(body),
            Err(..) => reply,
        };

        self.send(id, reply);
    }

    fn signal(&mut self, member: &str, body: BodyBuf) -> Message {
        Message::signal(DBUS_PATH, INTERFACE, member, self.serials.next())
            .with_sender(DESTINATION)
            .with_body(body)
    }

    /// Emit `NameOwnerChanged` to every interested peer.
    fn name_owner_changed(&mut self, name: &str, old: &str, new: &str) {
        tracing::debug!(name, old, new, "name owner changed");

        let Ok(body) = strings(&[name, old, new]) else {
            return;
        };

        let signal = self.signal("NameOwnerChanged", body);
        self.outbox.push(Emit::Broadcast(signal));
    }

    /// Emit `NameAcquired` or `NameLost` to the given peer.
    fn name_signal(&mut self, id: PeerId, member: &str, name: &str) {
        let Ok(body) = strings(&[name]) else {
            return;
        };

        let unique = self.unique(id).to_owned();
        let signal = self.signal(member, body).with_destination(&unique);
        self.outbox.push(Emit::Unicast(id, signal));
    }

    fn driver(&mut self, id: PeerId, m: &Message) {
        let member = m.member().unwrap_or_default();

        let result = match m.interface() {
            Some(PEER_INTERFACE) => match member {
                "Ping" => Ok(BodyBuf::new()),
                _ => Err(unknown_method(m)),
            },
            None | Some(INTERFACE) => self.driver_call(id, member, m),
            Some(..) => Err(unknown_method(m)),
        };

        match result {
            Ok(body) => self.reply(id, m, body),
            Err(failure) => {
                tracing::debug!(id, member, error = failure.name, "driver call failed");
                self.reply_error(id, m, failure);
            }
        }
    }

    fn driver_call(&mut self, id: PeerId, member: &str, m: &Message) -> Reply {
        match member {
            "Hello" => self.hello(id),
            "RequestName" => {
                expect_signature(m, "su")?;
                let mut body = m.body();
                let name = body.read::<str>()?;
                let flags = body.load::<NameFlag>()?;
                let reply = self.request_name(id, name, flags)?;
                store(reply)
            }
            "ReleaseName" => {
                expect_signature(m, "s")?;
                let name = m.body().read::<str>()?;
                let reply = self.release_name(id, name)?;
                store(reply)
            }
            "GetNameOwner" => {
                expect_signature(m, "s")?;
                let name = m.body().read::<str>()?;
                let owner = self.get_name_owner(name)?;
                store(owner.as_str())
            }
            "NameHasOwner" => {
                expect_signature(m, "s")?;
                let name = m.body().read::<str>()?;
                let has_owner = name == DESTINATION || self.resolve(name).is_some();
                store(has_owner)
            }
            "ListNames" => {
                let mut names = vec![Value::from(DESTINATION)];

                for peer in self.peers.values().filter(|p| p.registered) {
                    names.push(Value::from(&*peer.unique));
                }

                for name in self.names.keys() {
                    names.push(Value::from(&**name));
                }

                store_strings(names)
            }
            "ListQueuedOwners" => {
                expect_signature(m, "s")?;
                let name = m.body().read::<str>()?;

                let Some(entry) = self.names.get(name) else {
                    return Err(no_owner(name));
                };

                let owners = std::iter::once(&entry.owner)
                    .chain(&entry.queue)
                    .map(|owner| Value::from(self.unique(owner.peer)))
                    .collect();

                store_strings(owners)
            }
            "AddMatch" => {
                expect_signature(m, "s")?;
                let rule = m.body().read::<str>()?;

                let rule = rule
                    .parse::<MatchRule>()
                    .map_err(|e| Failure::new(errors::MATCH_RULE_INVALID, e.to_string()))?;

                tracing::trace!(id, %rule, "add match");

                if let Some(peer) = self.peers.get_mut(&id) {
                    peer.rules.push(rule);
                }

                Ok(BodyBuf::new())
            }
            "RemoveMatch" => {
                expect_signature(m, "s")?;
                let rule = m.body().read::<str>()?;

                let rule = rule
                    .parse::<MatchRule>()
                    .map_err(|e| Failure::new(errors::MATCH_RULE_INVALID, e.to_string()))?;

                let removed = self.peers.get_mut(&id).and_then(|peer| {
                    let index = peer.rules.iter().position(|r| *r == rule)?;
                    Some(peer.rules.remove(index))
                });

                if removed.is_none() {
                    return Err(Failure::new(
                        errors::MATCH_RULE_NOT_FOUND,
                        "The given match rule wasn't found and can't be removed",
                    ));
                }

                Ok(BodyBuf::new())
            }
            "GetId" => store(self.guid.to_string().as_str()),
            _ => Err(unknown_method(m)),
        }
    }

    fn hello(&mut self, id: PeerId) -> Reply {
        let Some(peer) = self.peers.get_mut(&id) else {
            return Err(Failure::new(errors::FAILED, "Unknown peer"));
        };

        if peer.registered {
            return Err(Failure::new(
                errors::FAILED,
                "Already handled an Hello message",
            ));
        }

        peer.registered = true;
        let unique = peer.unique.to_string();

        tracing::debug!(id, %unique, "hello");

        self.name_owner_changed(&unique, "", &unique);
        self.name_signal(id, "NameAcquired", &unique);
        store(unique.as_str())
    }

    fn request_name(&mut self, id: PeerId, name: &str, flags: NameFlag) -> Result<NameReply, Failure> {
        if name.starts_with(':') {
            return Err(Failure::new(
                errors::INVALID_ARGS,
                format!("Cannot acquire a service starting with ':' such as \"{name}\""),
            ));
        }

        if name == DESTINATION {
            return Err(Failure::new(
                errors::INVALID_ARGS,
                format!("Connection is not allowed to own the service \"{name}\" because it is reserved for D-Bus' use only"),
            ));
        }

        if !is_valid_bus_name(name) {
            return Err(Failure::new(
                errors::INVALID_ARGS,
                format!("Requested bus name \"{name}\" is not valid"),
            ));
        }

        let requester = Owner { peer: id, flags };

        let Some(entry) = self.names.get_mut(name) else {
            self.names.insert(
                name.into(),
                Name {
                    owner: requester,
                    queue: VecDeque::new(),
                },
            );

            let unique = self.unique(id).to_owned();
            self.name_owner_changed(name, "", &unique);
            self.name_signal(id, "NameAcquired", name);
            return Ok(NameReply::PRIMARY_OWNER);
        };

        if entry.owner.peer == id {
            entry.owner.flags = flags;
            return Ok(NameReply::ALREADY_OWNER);
        }

        let replace = flags & NameFlag::REPLACE_EXISTING
            && entry.owner.flags & NameFlag::ALLOW_REPLACEMENT;

        if !replace {
            if flags & NameFlag::DO_NOT_QUEUE {
                entry.queue.retain(|o| o.peer != id);
                return Ok(NameReply::EXISTS);
            }

            match entry.queue.iter().position(|o| o.peer == id) {
                Some(index) => entry.queue[index].flags = flags,
                None => entry.queue.push_back(requester),
            }

            return Ok(NameReply::IN_QUEUE);
        }

        let old = std::mem::replace(&mut entry.owner, requester);
        entry.queue.retain(|o| o.peer != id);

        if !(old.flags & NameFlag::DO_NOT_QUEUE) {
            entry.queue.push_front(old);
        }

        let old_unique = self.unique(old.peer).to_owned();
        let new_unique = self.unique(id).to_owned();

        self.name_signal(old.peer, "NameLost", name);
        self.name_owner_changed(name, &old_unique, &new_unique);
        self.name_signal(id, "NameAcquired", name);
        Ok(NameReply::PRIMARY_OWNER)
    }

    fn release_name(&mut self, id: PeerId, name: &str) -> Result<ReleaseNameReply, Failure> {
        if name.starts_with(':') || name == DESTINATION || !is_valid_bus_name(name) {
            return Err(Failure::new(
                errors::INVALID_ARGS,
                format!("Cannot release the service \"{name}\""),
            ));
        }

        let Some(entry) = self.names.get_mut(name) else {
            return Ok(ReleaseNameReply::NON_EXISTENT);
        };

        if entry.owner.peer != id {
            let before = entry.queue.len();
            entry.queue.retain(|o| o.peer != id);

            if entry.queue.len() == before {
                return Ok(ReleaseNameReply::NOT_OWNER);
            }

            return Ok(ReleaseNameReply::RELEASED);
        }

        self.drop_owner(name);
        Ok(ReleaseNameReply::RELEASED)
    }

    /// Remove the primary owner of a name, promoting the next queued peer.
    fn drop_owner(&mut self, name: &str) {
        let Some(entry) = self.names.get_mut(name) else {
            return;
        };

        let old = entry.owner.peer;
        let next = entry.queue.pop_front();

        if let Some(next) = next {
            entry.owner = next;
        } else {
            self.names.remove(name);
        }

        let old_unique = self.unique(old).to_owned();
        self.name_signal(old, "NameLost", name);

        match next {
            Some(next) => {
                let new_unique = self.unique(next.peer).to_owned();
                self.name_owner_changed(name, &old_unique, &new_unique);
                self.name_signal(next.peer, "NameAcquired", name);
            }
            None => {
                self.name_owner_changed(name, &old_unique, "");
            }
        }
    }

    fn get_name_owner(&self, name: &str) -> Result<String, Failure> {
        if name == DESTINATION {
            return Ok(DESTINATION.to_owned());
        }

        match self.resolve(name) {
            Some(id) => Ok(self.unique(id).to_owned()),
            None => Err(no_owner(name)),
        }
    }

    fn disconnect(&mut self, id: PeerId) {
        let Some(peer) = self.peers.get(&id) else {
            return;
        };

        let unique = peer.unique.clone();
        let registered = peer.registered;

        for entry in self.names.values_mut() {
            entry.queue.retain(|o| o.peer != id);
        }

        let owned = self
            .names
            .iter()
            .filter(|(_, entry)| entry.owner.peer == id)
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();

        for name in owned {
            self.drop_owner(&name);
        }

        if registered {
            self.name_owner_changed(&unique, &unique, "");
        }

        // Signals addressed to the departing peer are dropped once it is
        // removed.
        self.peers.remove(&id);
        self.uniques.remove(&unique);
        tracing::debug!(id, %unique, "peer disconnected");
    }
}

fn unknown_method(m: &Message) -> Failure {
    Failure::new(
        errors::UNKNOWN_METHOD,
        format!(
            "{} with signature \"{}\" on interface \"{}\" doesn't exist",
            m.member().unwrap_or_default(),
            m.signature().as_str(),
            m.interface().unwrap_or_default(),
        ),
    )
}

fn no_owner(name: &str) -> Failure {
    Failure::new(
        errors::NAME_HAS_NO_OWNER,
        format!("Could not get owner of name '{name}': no such name"),
    )
}

fn expect_signature(m: &Message, signature: &str) -> Result<(), Failure> {
    if m.signature() != signature {
        return Err(Failure::invalid_args(m));
    }

    Ok(())
}

fn store<T>(value: T) -> Reply
where
    T: crate::Storable,
{
    let mut body = BodyBuf::new();
    body.store(value)?;
    Ok(body)
}

fn strings(values: &[&str]) -> Result<BodyBuf> {
    let mut body = BodyBuf::new();

    for value in values {
        body.store(*value)?;
    }

    Ok(body)
}

fn store_strings(values: Vec<Value>) -> Reply {
    let mut body = BodyBuf::new();
    body.store_value(&Value::Array(Signature::STRING.to_owned(), values))?;
    Ok(body)
}

/// Test if the string is a valid well-known bus name.
fn is_valid_bus_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 255 {
        return false;
    }

    let mut elements = 0;

    for element in name.split('.') {
        let mut bytes = element.bytes();

        let Some(first) = bytes.next() else {
            return false;
        };

        if first.is_ascii_digit() || !is_name_byte(first) {
            return false;
        }

        if !bytes.all(is_name_byte) {
            return false;
        }

        elements += 1;
    }

    elements >= 2
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Feeds messages received from a peer into the [`Router`].
pub(crate) struct PeerDispatch {
    pub(crate) router: std::sync::Arc<Router>,
    pub(crate) id: PeerId,
}

impl Dispatch for PeerDispatch {
    fn dispatch(&mut self, message: Message) {
        self.router.handle(self.id, message);
    }

    fn send_failed(&mut self, message: &Message, error: Error) {
        tracing::warn!(id = self.id, serial = message.serial().get(), %error, "failed to forward message");
    }

    fn malformed(&mut self, error: Error) -> Result<()> {
        tracing::warn!(id = self.id, %error, "closing peer which sent a malformed message");
        Err(error)
    }

    fn closed(&mut self, _: Option<&Error>) {
        self.router.disconnect(self.id);
    }
}
