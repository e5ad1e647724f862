use tokio::sync::mpsc;

use crate::error::Result;
use crate::org_freedesktop_dbus::{errors, NameFlag, NameReply, ReleaseNameReply};
use crate::proto::MessageType;
use crate::sasl::Guid;
use crate::transport::CloseHandle;
use crate::{BodyBuf, Message, MessageKind, ObjectPath, SerialCounter, Value};

use super::router::{PeerId, Router};
use super::MatchRule;

const DBUS: &ObjectPath = ObjectPath::new_const(b"/org/freedesktop/DBus");
const PATH: &ObjectPath = ObjectPath::new_const(b"/se/tedro/Test");

const GUID: Guid = Guid::from_bytes([0x42; 16]);

struct TestPeer {
    id: PeerId,
    rx: mpsc::UnboundedReceiver<Message>,
    serials: SerialCounter,
    close: CloseHandle,
    unique: String,
}

impl TestPeer {
    fn connect(router: &Router) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let close = CloseHandle::new();
        let id = router.register(tx, close.clone()).unwrap();

        Self {
            id,
            rx,
            serials: SerialCounter::new(),
            close,
            unique: String::new(),
        }
    }

    fn hello(router: &Router) -> Self {
        let mut peer = Self::connect(router);
        let reply = peer.call(router, "Hello", BodyBuf::new());
        peer.unique = reply.body().read::<str>().unwrap().to_owned();

        let acquired = peer.next();
        assert_eq!(acquired.member(), Some("NameAcquired"));
        assert_eq!(acquired.body().read::<str>().unwrap(), peer.unique);
        peer
    }

    fn drain(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();

        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }

        messages
    }

    fn next(&mut self) -> Message {
        self.rx.try_recv().expect("expected a message")
    }

    fn bus_call(&self, member: &str, body: BodyBuf) -> Message {
        Message::method_call(DBUS, member, self.serials.next())
            .with_interface("org.freedesktop.DBus")
            .with_destination("org.freedesktop.DBus")
            .with_body(body)
    }

    /// Call a method on the bus and return the reply.
    fn call(&mut self, router: &Router, member: &str, body: BodyBuf) -> Message {
        let m = self.bus_call(member, body);
        let serial = m.serial();
        router.handle(self.id, m);

        let reply = self.next();
        assert_eq!(reply.reply_serial(), Some(serial));
        assert_eq!(reply.sender(), Some("org.freedesktop.DBus"));
        reply
    }

    fn call_str(&mut self, router: &Router, member: &str, arg: &str) -> Message {
        let mut body = BodyBuf::new();
        body.store(arg).unwrap();
        self.call(router, member, body)
    }

    fn request_name(&mut self, router: &Router, name: &str, flags: NameFlag) -> NameReply {
        let mut body = BodyBuf::new();
        body.store(name).unwrap();
        body.store(flags).unwrap();
        let reply = self.call(router, "RequestName", body);
        reply.body().load::<NameReply>().unwrap()
    }

    fn release_name(&mut self, router: &Router, name: &str) -> ReleaseNameReply {
        let reply = self.call_str(router, "ReleaseName", name);
        reply.body().load::<ReleaseNameReply>().unwrap()
    }
}

fn error_name(m: &Message) -> Option<&str> {
    match m.kind() {
        MessageKind::Error { .. } => m.error_name(),
        _ => None,
    }
}

fn strings(m: &Message) -> Vec<String> {
    let values = m.body().values().unwrap();

    let Some(Value::Array(_, values)) = values.into_iter().next() else {
        panic!("expected an array");
    };

    values
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect()
}

fn signal_args(m: &Message) -> Vec<String> {
    m.body()
        .values()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect()
}

#[test]
fn match_rule_parse() -> Result<()> {
    let rule: MatchRule =
        "type='signal', sender='org.freedesktop.DBus',interface='org.freedesktop.DBus',member='NameOwnerChanged',arg0='se.tedro.Test'"
            .parse()?;

    assert_eq!(rule.message_type(), Some(MessageType::SIGNAL));
    assert_eq!(rule.sender(), Some("org.freedesktop.DBus"));
    assert_eq!(rule.interface(), Some("org.freedesktop.DBus"));
    assert_eq!(rule.member(), Some("NameOwnerChanged"));

    let empty: MatchRule = "".parse()?;
    assert_eq!(empty, MatchRule::default());

    let quoted: MatchRule = r"arg0='it'\''s',eavesdrop='true'".parse()?;
    assert_eq!(quoted.to_string(), r"arg0='it'\''s'");
    Ok(())
}

#[test]
fn match_rule_invalid() {
    for rule in [
        "type='bogus'",
        "type='signal',type='signal'",
        "member='A',member='B'",
        "path='/a',path_namespace='/a'",
        "arg64='x'",
        "argx='x'",
        "unknown='x'",
        "member='unterminated",
        "member",
        "='x'",
    ] {
        let error = rule.parse::<MatchRule>().unwrap_err();
        assert!(error.to_string().contains(rule), "{rule}: {error}");
    }
}

#[test]
fn match_rule_display_round_trip() -> Result<()> {
    let rule: MatchRule = "type='method_call',path_namespace='/se/tedro',destination=':1.4',arg2='x,y'".parse()?;
    let again: MatchRule = rule.to_string().parse()?;
    assert_eq!(rule, again);
    Ok(())
}

#[test]
fn match_rule_matches() -> Result<()> {
    let serials = SerialCounter::new();

    let mut body = BodyBuf::new();
    body.store("se.tedro.Test")?;
    body.store(42u32)?;

    let signal = Message::signal(PATH, "se.tedro.Iface", "Changed", serials.next())
        .with_sender(":1.7")
        .with_body(body);

    let senders = [":1.7", "se.tedro.Owner"];

    let matching = [
        "",
        "type='signal'",
        "sender=':1.7'",
        "sender='se.tedro.Owner'",
        "interface='se.tedro.Iface',member='Changed'",
        "path='/se/tedro/Test'",
        "path_namespace='/se/tedro'",
        "path_namespace='/se/tedro/Test'",
        "path_namespace='/'",
        "arg0='se.tedro.Test'",
    ];

    for rule in matching {
        let rule = rule.parse::<MatchRule>()?;
        assert!(rule.matches(&signal, &senders), "{rule}");
    }

    let not_matching = [
        "type='method_call'",
        "sender=':1.8'",
        "member='Other'",
        "path='/se/tedro'",
        "path_namespace='/se/ted'",
        "destination=':1.7'",
        "arg0='other'",
        "arg1='42'",
        "arg5='x'",
    ];

    for rule in not_matching {
        let rule = rule.parse::<MatchRule>()?;
        assert!(!rule.matches(&signal, &senders), "{rule}");
    }

    Ok(())
}

#[test]
fn hello_assigns_unique_names() {
    let router = Router::new(GUID);

    let mut a = TestPeer::hello(&router);
    let b = TestPeer::hello(&router);

    assert!(a.unique.starts_with(":1."));
    assert_ne!(a.unique, b.unique);

    let reply = a.call(&router, "Hello", BodyBuf::new());
    assert_eq!(error_name(&reply), Some(errors::FAILED));
}

#[test]
fn messages_before_hello_are_refused() {
    let router = Router::new(GUID);
    let mut a = TestPeer::connect(&router);

    let reply = a.call_str(&router, "GetNameOwner", "org.freedesktop.DBus");
    assert_eq!(error_name(&reply), Some(errors::ACCESS_DENIED));
}

#[test]
fn forward_rewrites_sender() -> Result<()> {
    let router = Router::new(GUID);

    let mut a = TestPeer::hello(&router);
    let mut b = TestPeer::hello(&router);

    let m = Message::method_call(PATH, "Ping", a.serials.next())
        .with_destination(&b.unique)
        .with_sender(":1.999");

    router.handle(a.id, m.clone());

    let received = b.next();
    assert_eq!(received.sender(), Some(a.unique.as_str()));
    assert_eq!(received.serial(), m.serial());
    assert_eq!(received.member(), Some("Ping"));

    let reply = received.method_return(b.serials.next());
    router.handle(b.id, reply);

    let reply = a.next();
    assert_eq!(reply.reply_serial(), Some(m.serial()));
    assert_eq!(reply.sender(), Some(b.unique.as_str()));
    assert_eq!(reply.destination(), Some(a.unique.as_str()));
    Ok(())
}

#[test]
fn unknown_destination() {
    let router = Router::new(GUID);
    let mut a = TestPeer::hello(&router);

    let m = Message::method_call(PATH, "Ping", a.serials.next()).with_destination("se.tedro.Missing");
    router.handle(a.id, m);

    let reply = a.next();
    assert_eq!(error_name(&reply), Some(errors::SERVICE_UNKNOWN));
}

#[test]
fn request_and_release_names() {
    const NAME: &str = "se.tedro.Test";

    let router = Router::new(GUID);
    let mut a = TestPeer::hello(&router);
    let mut b = TestPeer::hello(&router);
    let mut c = TestPeer::hello(&router);

    assert_eq!(
        a.request_name(&router, NAME, NameFlag::default()),
        NameReply::PRIMARY_OWNER
    );

    let acquired = a.next();
    assert_eq!(acquired.member(), Some("NameAcquired"));
    assert_eq!(acquired.destination(), Some(a.unique.as_str()));

    assert_eq!(
        a.request_name(&router, NAME, NameFlag::default()),
        NameReply::ALREADY_OWNER
    );

    assert_eq!(
        b.request_name(&router, NAME, NameFlag::default()),
        NameReply::IN_QUEUE
    );

    assert_eq!(
        c.request_name(&router, NAME, NameFlag::DO_NOT_QUEUE),
        NameReply::EXISTS
    );

    let owners = strings(&c.call_str(&router, "ListQueuedOwners", NAME));
    assert_eq!(owners, [a.unique.clone(), b.unique.clone()]);

    assert_eq!(c.release_name(&router, NAME), ReleaseNameReply::NOT_OWNER);
    assert_eq!(
        c.release_name(&router, "se.tedro.Missing"),
        ReleaseNameReply::NON_EXISTENT
    );

    // Releasing promotes the next queued owner.
    assert_eq!(a.release_name(&router, NAME), ReleaseNameReply::RELEASED);
    assert_eq!(a.next().member(), Some("NameLost"));

    let acquired = b.next();
    assert_eq!(acquired.member(), Some("NameAcquired"));

    let owner = c.call_str(&router, "GetNameOwner", NAME);
    assert_eq!(owner.body().read::<str>().unwrap(), b.unique);

    assert_eq!(b.release_name(&router, NAME), ReleaseNameReply::RELEASED);

    let reply = c.call_str(&router, "GetNameOwner", NAME);
    assert_eq!(error_name(&reply), Some(errors::NAME_HAS_NO_OWNER));
}

#[test]
fn replace_existing_owner() {
    const NAME: &str = "se.tedro.Replace";

    let router = Router::new(GUID);
    let mut a = TestPeer::hello(&router);
    let mut b = TestPeer::hello(&router);

    a.request_name(&router, NAME, NameFlag::ALLOW_REPLACEMENT);
    a.drain();

    assert_eq!(
        b.request_name(&router, NAME, NameFlag::REPLACE_EXISTING),
        NameReply::PRIMARY_OWNER
    );

    assert_eq!(a.next().member(), Some("NameLost"));
    assert_eq!(b.next().member(), Some("NameAcquired"));

    // The previous owner is queued unless it asked not to be.
    let owners = strings(&b.call_str(&router, "ListQueuedOwners", NAME));
    assert_eq!(owners, [b.unique.clone(), a.unique.clone()]);

    // Without ALLOW_REPLACEMENT the owner keeps the name.
    assert_eq!(
        a.request_name(&router, NAME, NameFlag::REPLACE_EXISTING | NameFlag::DO_NOT_QUEUE),
        NameReply::EXISTS
    );

    let owners = strings(&b.call_str(&router, "ListQueuedOwners", NAME));
    assert_eq!(owners, [b.unique.clone()]);
}

#[test]
fn invalid_names_are_refused() {
    let router = Router::new(GUID);
    let mut a = TestPeer::hello(&router);

    for name in [":1.1", "org.freedesktop.DBus", "nodots", "se..tedro", "se.1tedro", ""] {
        let mut body = BodyBuf::new();
        body.store(name).unwrap();
        body.store(NameFlag::default()).unwrap();

        let reply = a.call(&router, "RequestName", body);
        assert_eq!(error_name(&reply), Some(errors::INVALID_ARGS), "{name}");
    }

    let reply = a.call(&router, "RequestName", BodyBuf::new());
    assert_eq!(error_name(&reply), Some(errors::INVALID_ARGS));
}

#[test]
fn disconnect_releases_names() -> Result<()> {
    const NAME: &str = "se.tedro.Gone";

    let router = Router::new(GUID);
    let mut watcher = TestPeer::hello(&router);
    let mut a = TestPeer::hello(&router);

    watcher.call_str(
        &router,
        "AddMatch",
        "type='signal',interface='org.freedesktop.DBus',member='NameOwnerChanged'",
    );

    a.request_name(&router, NAME, NameFlag::default());
    a.drain();

    let changed = watcher.next();
    assert_eq!(signal_args(&changed), [NAME, "", a.unique.as_str()]);

    router.disconnect(a.id);

    let changed = watcher.next();
    assert_eq!(signal_args(&changed), [NAME, a.unique.as_str(), ""]);

    let changed = watcher.next();
    assert_eq!(signal_args(&changed), [a.unique.as_str(), a.unique.as_str(), ""]);

    let reply = watcher.call_str(&router, "NameHasOwner", NAME);
    assert!(!reply.body().load_bool()?);

    let reply = watcher.call_str(&router, "NameHasOwner", &a.unique);
    assert!(!reply.body().load_bool()?);
    Ok(())
}

#[test]
fn broadcast_follows_match_rules() {
    let router = Router::new(GUID);
    let mut a = TestPeer::hello(&router);
    let mut b = TestPeer::hello(&router);
    let mut c = TestPeer::hello(&router);

    b.call_str(&router, "AddMatch", "type='signal',interface='se.tedro.Iface'");
    c.call_str(&router, "AddMatch", "member='Other'");

    let signal = Message::signal(PATH, "se.tedro.Iface", "Changed", a.serials.next());
    router.handle(a.id, signal);

    let received = b.next();
    assert_eq!(received.member(), Some("Changed"));
    assert_eq!(received.sender(), Some(a.unique.as_str()));

    assert!(a.drain().is_empty());
    assert!(c.drain().is_empty());

    let reply = b.call_str(&router, "RemoveMatch", "type='signal',interface='se.tedro.Iface'");
    assert_eq!(reply.message_type(), MessageType::METHOD_RETURN);

    let reply = b.call_str(&router, "RemoveMatch", "type='signal',interface='se.tedro.Iface'");
    assert_eq!(error_name(&reply), Some(errors::MATCH_RULE_NOT_FOUND));

    let reply = b.call_str(&router, "AddMatch", "type='nope'");
    assert_eq!(error_name(&reply), Some(errors::MATCH_RULE_INVALID));

    let signal = Message::signal(PATH, "se.tedro.Iface", "Changed", a.serials.next());
    router.handle(a.id, signal);
    assert!(b.drain().is_empty());
}

#[test]
fn driver_queries() -> Result<()> {
    let router = Router::new(GUID);
    let mut a = TestPeer::hello(&router);
    let b = TestPeer::hello(&router);

    let id = a.call(&router, "GetId", BodyBuf::new());
    assert_eq!(id.body().read::<str>()?, GUID.to_string());

    let names = strings(&a.call(&router, "ListNames", BodyBuf::new()));
    assert_eq!(names, ["org.freedesktop.DBus", a.unique.as_str(), b.unique.as_str()]);

    let owner = a.call_str(&router, "GetNameOwner", &b.unique);
    assert_eq!(owner.body().read::<str>()?, b.unique);

    let reply = a.call_str(&router, "NameHasOwner", "org.freedesktop.DBus");
    assert!(reply.body().load_bool()?);

    let ping = Message::method_call(PATH, "Ping", a.serials.next())
        .with_interface("org.freedesktop.DBus.Peer")
        .with_destination("org.freedesktop.DBus");
    router.handle(a.id, ping);
    assert_eq!(a.next().message_type(), MessageType::METHOD_RETURN);

    let reply = a.call(&router, "Frobnicate", BodyBuf::new());
    assert_eq!(error_name(&reply), Some(errors::UNKNOWN_METHOD));

    let reply = a.call_str(&router, "ListQueuedOwners", "se.tedro.Nobody");
    assert_eq!(error_name(&reply), Some(errors::NAME_HAS_NO_OWNER));
    Ok(())
}

#[test]
fn no_reply_expected_is_honored() {
    let router = Router::new(GUID);
    let mut a = TestPeer::hello(&router);

    let m = a
        .bus_call("GetId", BodyBuf::new())
        .with_flags(crate::proto::Flags::NO_REPLY_EXPECTED);

    router.handle(a.id, m);
    assert!(a.drain().is_empty());
}

#[test]
fn close_closes_peers_and_refuses_new_ones() {
    let router = Router::new(GUID);
    let a = TestPeer::hello(&router);

    router.close();
    assert!(a.close.is_closed());

    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(router.register(tx, CloseHandle::new()).is_none());
}
