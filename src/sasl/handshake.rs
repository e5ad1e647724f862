use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::lossy_str::LossyStr;

use super::{line, ClientStep, Command, Guid, SaslClient, SaslServer, ServerStep, MAX_LINE_LENGTH};

/// Run the client side of authentication to completion.
///
/// Returns the GUID of the server, and any bytes received past the end of
/// the exchange which belong to the message stream.
pub(crate) async fn client_handshake<S>(
    stream: &mut S,
    client: SaslClient,
    timeout: Duration,
) -> Result<(Guid, Vec<u8>)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(timeout, client_inner(stream, client)).await {
        Ok(result) => result,
        Err(..) => Err(Error::authentication_failed("authentication timed out")),
    }
}

/// Run the server side of authentication to completion.
///
/// Returns any bytes received past the `BEGIN` line, which belong to the
/// message stream.
pub(crate) async fn server_handshake<S>(
    stream: &mut S,
    server: SaslServer,
    timeout: Duration,
) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(timeout, server_inner(stream, server)).await {
        Ok(result) => result,
        Err(..) => Err(Error::authentication_failed("authentication timed out")),
    }
}

async fn client_inner<S>(stream: &mut S, mut client: SaslClient) -> Result<(Guid, Vec<u8>)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = LineReader::new();

    let auth = client.start()?;
    let mut first = Vec::with_capacity(auth.len() + 1);
    first.push(0);
    first.extend_from_slice(auth.as_bytes());
    send(stream, &first).await?;

    loop {
        let received = reader.read_line(stream).await?;

        let Ok(command) = Command::parse(&received) else {
            return Err(Error::authentication_failed(format!(
                "malformed command {:?}",
                LossyStr::new(&received)
            )));
        };

        match client.step(&command)? {
            ClientStep::Send(line) => {
                send(stream, line.as_bytes()).await?;
            }
            ClientStep::Begin(guid) => {
                send(stream, line(&Command::Begin).as_bytes()).await?;
                tracing::debug!(%guid, "authenticated");
                return Ok((guid, reader.into_rest()));
            }
        }
    }
}

async fn server_inner<S>(stream: &mut S, mut server: SaslServer) -> Result<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = LineReader::new();

    if reader.read_byte(stream).await? != 0 {
        return Err(Error::authentication_failed("missing leading nul byte"));
    }

    loop {
        let received = reader.read_line(stream).await?;

        let Ok(command) = Command::parse(&received) else {
            send(stream, b"ERROR unknown command\r\n").await?;
            continue;
        };

        match server.step(&command)? {
            ServerStep::Send(line) => {
                send(stream, line.as_bytes()).await?;
            }
            ServerStep::Reject(line) => {
                send(stream, line.as_bytes()).await?;
                return Err(Error::authentication_failed("credentials rejected"));
            }
            ServerStep::Begin => {
                tracing::debug!("peer authenticated");
                return Ok(reader.into_rest());
            }
        }
    }
}

async fn send<S>(stream: &mut S, bytes: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    tracing::trace!(line = ?LossyStr::new(bytes), "sasl send");
    stream.write_all(bytes).await?;
    stream.flush().await?;
    Ok(())
}

/// Buffered reader of lines, which keeps whatever follows the last line.
struct LineReader {
    buf: Vec<u8>,
}

impl LineReader {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    async fn read_byte<S>(&mut self, stream: &mut S) -> Result<u8>
    where
        S: AsyncRead + Unpin,
    {
        if self.buf.is_empty() {
            self.fill(stream).await?;
        }

        Ok(self.buf.remove(0))
    }

    async fn read_line<S>(&mut self, stream: &mut S) -> Result<Vec<u8>>
    where
        S: AsyncRead + Unpin,
    {
        loop {
            if let Some(n) = self.buf.iter().position(|&b| b == b'\n') {
                let line = self.buf.drain(..=n).collect::<Vec<u8>>();
                tracing::trace!(line = ?LossyStr::new(&line), "sasl recv");
                return Ok(line);
            }

            if self.buf.len() > MAX_LINE_LENGTH {
                return Err(Error::authentication_failed("line too long"));
            }

            self.fill(stream).await?;
        }
    }

    async fn fill<S>(&mut self, stream: &mut S) -> Result<()>
    where
        S: AsyncRead + Unpin,
    {
        let mut chunk = [0; 4096];
        let n = stream.read(&mut chunk).await?;

        if n == 0 {
            return Err(Error::authentication_failed(
                "connection closed during authentication",
            ));
        }

        self.buf.extend_from_slice(&chunk[..n]);
        Ok(())
    }

    fn into_rest(self) -> Vec<u8> {
        self.buf
    }
}
