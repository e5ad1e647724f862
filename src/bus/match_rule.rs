use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorKind};
use crate::proto::MessageType;
use crate::Message;

/// The highest argument index a rule may match on.
const MAX_ARG: usize = 63;

/// A rule selecting which broadcast messages a peer receives.
///
/// Rules are written as comma-separated `key='value'` pairs, where every key
/// present must match for the rule to match. The empty rule matches
/// everything.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::bus::MatchRule;
///
/// let rule: MatchRule = "type='signal',interface='org.freedesktop.DBus',arg0='se.tedro.Example'".parse()?;
/// assert_eq!(rule.interface(), Some("org.freedesktop.DBus"));
///
/// assert!("type='bogus'".parse::<MatchRule>().is_err());
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchRule {
    message_type: Option<MessageType>,
    sender: Option<Box<str>>,
    interface: Option<Box<str>>,
    member: Option<Box<str>>,
    path: Option<Box<str>>,
    path_namespace: Option<Box<str>>,
    destination: Option<Box<str>>,
    args: Vec<(usize, Box<str>)>,
}

impl MatchRule {
    /// The message type matched, if any.
    pub fn message_type(&self) -> Option<MessageType> {
        self.message_type
    }

    /// The sender matched, if any.
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// The interface matched, if any.
    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// The member matched, if any.
    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    /// Test if the rule matches the given message.
    ///
    /// `sender_names` are all names owned by the sender of the message,
    /// which a `sender` key can match against in addition to its unique name.
    pub fn matches(&self, message: &Message, sender_names: &[&str]) -> bool {
        if let Some(ty) = self.message_type {
            if message.message_type() != ty {
                return false;
            }
        }

        if let Some(sender) = self.sender.as_deref() {
            let matched = message.sender() == Some(sender) || sender_names.contains(&sender);

            if !matched {
                return false;
            }
        }

        if !matches_field(self.interface.as_deref(), message.interface())
            || !matches_field(self.member.as_deref(), message.member())
            || !matches_field(self.destination.as_deref(), message.destination())
        {
            return false;
        }

        let path = message.path().map(|p| p.as_str());

        if !matches_field(self.path.as_deref(), path) {
            return false;
        }

        if let Some(namespace) = self.path_namespace.as_deref() {
            let Some(path) = path else {
                return false;
            };

            if !in_namespace(namespace, path) {
                return false;
            }
        }

        if self.args.is_empty() {
            return true;
        }

        let Ok(values) = message.body().values() else {
            return false;
        };

        self.args.iter().all(|(n, expected)| {
            values
                .get(*n)
                .and_then(|value| value.as_str())
                .is_some_and(|value| value == &**expected)
        })
    }
}

fn matches_field(expected: Option<&str>, actual: Option<&str>) -> bool {
    match expected {
        Some(expected) => actual == Some(expected),
        None => true,
    }
}

fn in_namespace(namespace: &str, path: &str) -> bool {
    if namespace == "/" {
        return true;
    }

    match path.strip_prefix(namespace) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl FromStr for MatchRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::new(ErrorKind::InvalidMatchRule(s.into()));

        let mut rule = MatchRule::default();
        let mut parser = Parser { rest: s };

        while let Some((key, value)) = parser.next_pair().ok_or_else(invalid)? {
            let slot = match key {
                "type" => {
                    if rule.message_type.is_some() {
                        return Err(invalid());
                    }

                    rule.message_type = Some(match value.as_str() {
                        "signal" => MessageType::SIGNAL,
                        "method_call" => MessageType::METHOD_CALL,
                        "method_return" => MessageType::METHOD_RETURN,
                        "error" => MessageType::ERROR,
                        _ => return Err(invalid()),
                    });

                    continue;
                }
                "sender" => &mut rule.sender,
                "interface" => &mut rule.interface,
                "member" => &mut rule.member,
                "path" => &mut rule.path,
                "path_namespace" => &mut rule.path_namespace,
                "destination" => &mut rule.destination,
                // Eavesdropping is not supported, but clients commonly ask.
                "eavesdrop" => continue,
                key => {
                    let n = key
                        .strip_prefix("arg")
                        .and_then(|n| n.parse::<usize>().ok())
                        .filter(|n| *n <= MAX_ARG)
                        .ok_or_else(invalid)?;

                    if rule.args.iter().any(|(existing, _)| *existing == n) {
                        return Err(invalid());
                    }

                    rule.args.push((n, value.into()));
                    continue;
                }
            };

            if slot.is_some() {
                return Err(invalid());
            }

            *slot = Some(value.into());
        }

        if rule.path.is_some() && rule.path_namespace.is_some() {
            return Err(invalid());
        }

        Ok(rule)
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";

        let mut pair = |f: &mut fmt::Formatter<'_>, key: &dyn fmt::Display, value: &str| {
            write!(f, "{sep}{key}='{}'", value.replace('\'', "'\\''"))?;
            sep = ",";
            Ok::<_, fmt::Error>(())
        };

        if let Some(ty) = self.message_type {
            let name = match ty {
                MessageType::SIGNAL => "signal",
                MessageType::METHOD_CALL => "method_call",
                MessageType::METHOD_RETURN => "method_return",
                _ => "error",
            };

            pair(f, &"type", name)?;
        }

        let fields = [
            ("sender", &self.sender),
            ("interface", &self.interface),
            ("member", &self.member),
            ("path", &self.path),
            ("path_namespace", &self.path_namespace),
            ("destination", &self.destination),
        ];

        for (key, value) in fields {
            if let Some(value) = value {
                pair(f, &key, value)?;
            }
        }

        for (n, value) in &self.args {
            pair(f, &format_args!("arg{n}"), value)?;
        }

        Ok(())
    }
}

struct Parser<'a> {
    rest: &'a str,
}

impl<'a> Parser<'a> {
    /// Parse the next `key=value` pair, returning `None` on syntax errors.
    fn next_pair(&mut self) -> Option<Option<(&'a str, String)>> {
        self.rest = self.rest.trim_start();

        if self.rest.is_empty() {
            return Some(None);
        }

        let (key, rest) = self.rest.split_once('=')?;
        let key = key.trim();

        if key.is_empty() {
            return None;
        }

        let mut value = String::new();
        let mut chars = rest.char_indices();
        let mut end = rest.len();

        while let Some((i, c)) = chars.next() {
            match c {
                '\'' => loop {
                    match chars.next()? {
                        (_, '\'') => break,
                        (_, c) => value.push(c),
                    }
                },
                '\\' => match chars.clone().next() {
                    Some((_, '\'')) => {
                        chars.next();
                        value.push('\'');
                    }
                    _ => value.push('\\'),
                },
                ',' => {
                    end = i + 1;
                    break;
                }
                c => value.push(c),
            }
        }

        self.rest = &rest[end..];
        Some(Some((key, value)))
    }
}
