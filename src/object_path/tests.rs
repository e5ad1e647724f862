use super::ObjectPath;

#[test]
fn legal_paths() {
    assert!(ObjectPath::new(b"").is_err());
    assert!(ObjectPath::new(b"a").is_err());
    assert!(ObjectPath::new(b"/").is_ok());
    assert!(ObjectPath::new(b"/a").is_ok());
    assert!(ObjectPath::new(b"//").is_err());
    assert!(ObjectPath::new(b"/se/tedro").is_ok());
    assert!(ObjectPath::new(b"/se/tedro/").is_err());
    assert!(ObjectPath::new(b"/org/freedesktop/DBus").is_ok());
    assert!(ObjectPath::new(b"/with_underscore/x1").is_ok());
    assert!(ObjectPath::new(b"/with-dash").is_err());
    assert!(ObjectPath::new(b"/with.dot").is_err());
}

#[test]
fn namespaces() {
    let path = ObjectPath::new_const(b"/org/freedesktop/DBus");

    assert!(path.starts_with(ObjectPath::new_const(b"/org")));
    assert!(path.starts_with(ObjectPath::new_const(b"/org/freedesktop")));
    assert!(path.starts_with(path));
    assert!(!path.starts_with(ObjectPath::new_const(b"/org/free")));
    assert!(!ObjectPath::new_const(b"/org").starts_with(path));
}
