use std::env;

use crate::error::{Error, Result};

use super::{
    cookie_digest, current_uid, decode_hex_str, external_identity, line, random_challenge,
    AuthModes, Command, Guid, Keyring, Mechanism,
};

/// What a [`SaslClient`] wants to happen next.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientStep {
    /// Send the given line and wait for the next command.
    Send(String),
    /// Authentication succeeded. `BEGIN` should be sent, after which the
    /// stream carries messages.
    Begin(Guid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Waiting(Mechanism),
    Cancelled,
    Done,
}

/// The client side of the authentication exchange.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::sasl::{AuthModes, ClientStep, Command, SaslClient};
///
/// let mut client = SaslClient::new(AuthModes::EXTERNAL).with_uid(1000);
/// assert_eq!(client.start()?, "AUTH EXTERNAL 31303030\r\n");
///
/// let ok = Command::parse(b"OK 0123456789abcdef0123456789abcdef")?;
/// assert!(matches!(client.step(&ok)?, ClientStep::Begin(..)));
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
#[derive(Debug)]
pub struct SaslClient {
    remaining: Vec<Mechanism>,
    keyring: Option<Keyring>,
    uid: Option<u32>,
    state: State,
}

impl SaslClient {
    /// Construct a client which tries the given mechanisms in order of
    /// preference.
    pub fn new(modes: AuthModes) -> Self {
        Self {
            remaining: modes.iter().collect(),
            keyring: Keyring::user(),
            uid: None,
            state: State::Start,
        }
    }

    /// Use the given keyring for `DBUS_COOKIE_SHA1`.
    pub fn with_keyring(self, keyring: Keyring) -> Self {
        Self {
            keyring: Some(keyring),
            ..self
        }
    }

    /// Authenticate as the given uid instead of the uid of the current
    /// process.
    pub fn with_uid(self, uid: u32) -> Self {
        Self {
            uid: Some(uid),
            ..self
        }
    }

    /// Produce the first `AUTH` line.
    ///
    /// The leading NUL byte is not included.
    pub fn start(&mut self) -> Result<String> {
        if self.state != State::Start {
            return Err(Error::authentication_failed("client already started"));
        }

        self.next_mechanism()
    }

    /// Handle a command received from the server.
    pub fn step(&mut self, command: &Command<'_>) -> Result<ClientStep> {
        match (self.state, command) {
            (State::Waiting(..), Command::Ok(guid)) => {
                let guid = guid.parse::<Guid>()?;
                self.state = State::Done;
                Ok(ClientStep::Begin(guid))
            }
            (State::Waiting(..) | State::Cancelled, Command::Rejected(..)) => {
                let listed = command.rejected_mechanisms().collect::<Vec<_>>();

                if !listed.is_empty() {
                    self.remaining.retain(|m| listed.contains(&m.as_str()));
                }

                Ok(ClientStep::Send(self.next_mechanism()?))
            }
            (State::Waiting(Mechanism::External), Command::Data(..)) => {
                Ok(ClientStep::Send(line(&Command::Data(""))))
            }
            (State::Waiting(Mechanism::CookieSha1), Command::Data(data)) => {
                match self.cookie_response(data) {
                    Ok(response) => Ok(ClientStep::Send(line(&Command::Data(&response)))),
                    Err(error) => {
                        tracing::warn!(%error, "cancelling DBUS_COOKIE_SHA1");
                        self.state = State::Cancelled;
                        Ok(ClientStep::Send(line(&Command::Cancel)))
                    }
                }
            }
            (State::Waiting(..), Command::Error(..)) => {
                self.state = State::Cancelled;
                Ok(ClientStep::Send(line(&Command::Cancel)))
            }
            (_, command) => Err(Error::authentication_failed(format!(
                "unexpected command `{command}`"
            ))),
        }
    }

    /// Start the next mechanism which can produce an initial response.
    fn next_mechanism(&mut self) -> Result<String> {
        while !self.remaining.is_empty() {
            let mechanism = self.remaining.remove(0);

            let identity = match self.identity(mechanism) {
                Ok(identity) => identity,
                Err(error) => {
                    tracing::debug!(%mechanism, %error, "skipping mechanism");
                    continue;
                }
            };

            self.state = State::Waiting(mechanism);
            return Ok(line(&Command::Auth(Some(mechanism.as_str()), Some(&identity))));
        }

        self.state = State::Done;
        Err(Error::authentication_failed("no mechanism left to try"))
    }

    fn identity(&self, mechanism: Mechanism) -> Result<String> {
        let uid = match self.uid {
            Some(uid) => Ok(uid),
            None => current_uid(),
        };

        match mechanism {
            Mechanism::External => Ok(external_identity(uid?)),
            Mechanism::CookieSha1 => {
                if self.keyring.is_none() {
                    return Err(Error::authentication_failed("no keyring"));
                }

                match uid {
                    Ok(uid) => Ok(external_identity(uid)),
                    Err(error) => match env::var("USER") {
                        Ok(user) => Ok(hex::encode(user)),
                        Err(..) => Err(error),
                    },
                }
            }
        }
    }

    /// Compute the response to a `DBUS_COOKIE_SHA1` challenge of the form
    /// `<context> <id> <server-challenge>`.
    fn cookie_response(&self, data: &str) -> Result<String> {
        let Some(keyring) = &self.keyring else {
            return Err(Error::authentication_failed("no keyring"));
        };

        let challenge = decode_hex_str(data)?;
        let mut parts = challenge.split(' ');

        let (Some(context), Some(id), Some(server_challenge), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::authentication_failed("malformed cookie challenge"));
        };

        let Ok(id) = id.parse::<u32>() else {
            return Err(Error::authentication_failed("malformed cookie id"));
        };

        let Some(cookie) = keyring.lookup(context, id)? else {
            return Err(Error::authentication_failed(format!(
                "no cookie {id} in context {context}"
            )));
        };

        let client_challenge = random_challenge();
        let digest = cookie_digest(server_challenge, &client_challenge, &cookie.secret);
        Ok(hex::encode(format!("{client_challenge} {digest}")))
    }
}
