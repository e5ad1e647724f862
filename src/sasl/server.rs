use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

use super::{
    cookie_digest, decode_hex_str, line, random_challenge, AuthModes, Command, Guid, Keyring,
    Mechanism, COOKIE_CONTEXT,
};

/// What a [`SaslServer`] wants to happen next.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServerStep {
    /// Send the given line and wait for the next command.
    Send(String),
    /// Send the given line, then fail authentication.
    Reject(String),
    /// The client sent `BEGIN` after authenticating. The stream now carries
    /// messages.
    Begin,
}

#[derive(Debug)]
enum State {
    WaitingForAuth,
    WaitingForExternalData,
    WaitingForCookieData {
        server_challenge: String,
        secret: Box<str>,
    },
    Authenticated,
}

/// The server side of the authentication exchange.
///
/// # Examples
///
/// ```
/// use tokio_dbus_wire::sasl::{AuthModes, Command, Guid, SaslServer, ServerStep};
///
/// let guid = Guid::generate();
/// let mut server = SaslServer::new(guid, AuthModes::EXTERNAL).with_peer_uid(Some(1000));
///
/// let step = server.step(&Command::Auth(Some("EXTERNAL"), Some("31303030")))?;
/// assert_eq!(step, ServerStep::Send(format!("OK {guid}\r\n")));
/// assert_eq!(server.step(&Command::Begin)?, ServerStep::Begin);
/// # Ok::<_, tokio_dbus_wire::Error>(())
/// ```
#[derive(Debug)]
pub struct SaslServer {
    guid: Guid,
    modes: AuthModes,
    peer_uid: Option<u32>,
    keyring: Option<Keyring>,
    state: State,
}

impl SaslServer {
    /// Construct a server accepting the given mechanisms.
    pub fn new(guid: Guid, modes: AuthModes) -> Self {
        Self {
            guid,
            modes,
            peer_uid: None,
            keyring: None,
            state: State::WaitingForAuth,
        }
    }

    /// The uid of the peer as reported by the operating system, if known.
    pub fn with_peer_uid(self, peer_uid: Option<u32>) -> Self {
        Self { peer_uid, ..self }
    }

    /// The keyring used to issue `DBUS_COOKIE_SHA1` challenges.
    pub fn with_keyring(self, keyring: Keyring) -> Self {
        Self {
            keyring: Some(keyring),
            ..self
        }
    }

    /// Test if the client has successfully authenticated.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, State::Authenticated)
    }

    /// Handle a command received from the client.
    pub fn step(&mut self, command: &Command<'_>) -> Result<ServerStep> {
        if let Command::Begin = command {
            if self.is_authenticated() {
                return Ok(ServerStep::Begin);
            }

            return Err(Error::authentication_failed("BEGIN before authentication"));
        }

        if let Command::Cancel | Command::Error(..) = command {
            self.state = State::WaitingForAuth;
            return Ok(self.rejected());
        }

        if let Command::NegotiateUnixFd = command {
            return Ok(error("unix fd passing is not supported"));
        }

        match (&self.state, command) {
            (State::WaitingForAuth, Command::Auth(mechanism, initial)) => {
                let mechanism = mechanism
                    .and_then(Mechanism::from_name)
                    .filter(|m| self.modes.contains(*m));

                match mechanism {
                    Some(Mechanism::External) => match initial {
                        Some(identity) => Ok(self.external(identity)),
                        None => {
                            self.state = State::WaitingForExternalData;
                            Ok(ServerStep::Send(line(&Command::Data(""))))
                        }
                    },
                    Some(Mechanism::CookieSha1) => match initial {
                        Some(..) => self.cookie_challenge(),
                        None => Ok(self.rejected()),
                    },
                    None => Ok(self.rejected()),
                }
            }
            (State::WaitingForExternalData, Command::Data(identity)) => {
                Ok(self.external(identity))
            }
            (State::WaitingForCookieData { .. }, Command::Data(data)) => {
                Ok(self.cookie_response(data))
            }
            (_, command) => Ok(error(&format!("unexpected command {command}"))),
        }
    }

    fn rejected(&self) -> ServerStep {
        ServerStep::Send(line(&Command::Rejected(&self.modes.names())))
    }

    fn ok(&mut self) -> ServerStep {
        self.state = State::Authenticated;
        ServerStep::Send(line(&Command::Ok(&self.guid.to_string())))
    }

    fn reject(&mut self) -> ServerStep {
        self.state = State::WaitingForAuth;
        ServerStep::Reject(line(&Command::Rejected(&self.modes.names())))
    }

    /// Verify an `EXTERNAL` identity against the peer credentials. An empty
    /// identity means the credentials of the socket are used as is.
    fn external(&mut self, identity: &str) -> ServerStep {
        let Some(peer_uid) = self.peer_uid else {
            tracing::debug!("EXTERNAL without peer credentials");
            return self.reject();
        };

        if identity.is_empty() {
            return self.ok();
        }

        let uid = decode_hex_str(identity)
            .ok()
            .and_then(|uid| uid.parse::<u32>().ok());

        if uid == Some(peer_uid) {
            self.ok()
        } else {
            tracing::debug!(?uid, peer_uid, "EXTERNAL identity mismatch");
            self.reject()
        }
    }

    fn cookie_challenge(&mut self) -> Result<ServerStep> {
        let Some(keyring) = &self.keyring else {
            return Ok(self.rejected());
        };

        let cookie = keyring.fresh_cookie(COOKIE_CONTEXT)?;
        let server_challenge = random_challenge();

        let data = hex::encode(format!(
            "{COOKIE_CONTEXT} {} {server_challenge}",
            cookie.id
        ));

        self.state = State::WaitingForCookieData {
            server_challenge,
            secret: cookie.secret,
        };

        Ok(ServerStep::Send(line(&Command::Data(&data))))
    }

    fn cookie_response(&mut self, data: &str) -> ServerStep {
        let State::WaitingForCookieData {
            server_challenge,
            secret,
        } = &self.state
        else {
            return self.reject();
        };

        let Ok(response) = decode_hex_str(data) else {
            return self.reject();
        };

        let Some((client_challenge, digest)) = response.split_once(' ') else {
            return self.reject();
        };

        let expected = cookie_digest(server_challenge, client_challenge, secret);

        if client_challenge.is_empty() || !bool::from(digest.as_bytes().ct_eq(expected.as_bytes())) {
            tracing::debug!("DBUS_COOKIE_SHA1 digest mismatch");
            return self.reject();
        }

        self.ok()
    }
}

fn error(message: &str) -> ServerStep {
    ServerStep::Send(line(&Command::Error(message)))
}
