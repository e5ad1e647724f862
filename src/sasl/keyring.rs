use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::error::{Error, Result};

/// The cookie context used by the message bus.
pub(crate) const COOKIE_CONTEXT: &str = "org_freedesktop_general";

/// Cookies younger than this are reused instead of creating a new one.
const NEW_COOKIE_AGE: u64 = 5 * 60;

/// Cookies older than this are removed from the keyring.
const EXPIRE_COOKIE_AGE: u64 = 7 * 60;

/// Allowed clock skew for cookies dated in the future.
const MAX_TIME_TRAVEL: u64 = 5 * 60;

/// A directory of `DBUS_COOKIE_SHA1` cookie files.
///
/// Each context is a file in the directory holding one cookie per line in
/// the form `<id> <unix-time> <hex-cookie>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyring {
    dir: PathBuf,
}

impl Keyring {
    /// Construct a keyring stored in the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The keyring of the current user, in `$HOME/.dbus-keyrings`.
    pub fn user() -> Option<Self> {
        let home = env::var_os("HOME")?;
        Some(Self::new(Path::new(&home).join(".dbus-keyrings")))
    }

    /// The directory of the keyring.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up the cookie with the given id.
    pub(crate) fn lookup(&self, context: &str, id: u32) -> Result<Option<Cookie>> {
        let now = now();
        let cookies = self.load(context)?;
        Ok(cookies
            .into_iter()
            .find(|c| c.id == id && c.is_valid(now)))
    }

    /// Get a cookie which is fresh enough to hand out in a challenge,
    /// creating one if necessary.
    pub(crate) fn fresh_cookie(&self, context: &str) -> Result<Cookie> {
        let now = now();

        let mut cookies = self.load(context)?;
        let before = cookies.len();
        cookies.retain(|c| c.is_valid(now));

        if let Some(cookie) = cookies
            .iter()
            .filter(|c| now.saturating_sub(c.created) < NEW_COOKIE_AGE)
            .max_by_key(|c| c.created)
        {
            let cookie = cookie.clone();

            if cookies.len() != before {
                self.store(context, &cookies)?;
            }

            return Ok(cookie);
        }

        let id = cookies
            .iter()
            .map(|c| c.id)
            .max()
            .map_or(1, |id| id.wrapping_add(1).max(1));

        let mut secret = [0; 24];
        rand::thread_rng().fill_bytes(&mut secret);

        let cookie = Cookie {
            id,
            created: now,
            secret: hex::encode(secret).into(),
        };

        cookies.push(cookie.clone());
        self.store(context, &cookies)?;
        tracing::debug!(context, id, "created keyring cookie");
        Ok(cookie)
    }

    fn path(&self, context: &str) -> Result<PathBuf> {
        if context.is_empty()
            || context
                .bytes()
                .any(|b| matches!(b, b'/' | b'\\' | b'.') || b.is_ascii_whitespace())
        {
            return Err(Error::authentication_failed("invalid cookie context"));
        }

        Ok(self.dir.join(context))
    }

    fn load(&self, context: &str) -> Result<Vec<Cookie>> {
        let path = self.path(context)?;

        if !check_dir(&self.dir)? {
            return Ok(Vec::new());
        }

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut cookies = Vec::new();

        for line in contents.lines() {
            match Cookie::parse(line) {
                Some(cookie) => cookies.push(cookie),
                None if line.trim().is_empty() => {}
                None => {
                    tracing::warn!(?path, line, "ignoring malformed keyring line");
                }
            }
        }

        Ok(cookies)
    }

    fn store(&self, context: &str, cookies: &[Cookie]) -> Result<()> {
        let path = self.path(context)?;
        create_dir(&self.dir)?;
        check_dir(&self.dir)?;

        let mut contents = String::new();

        for c in cookies {
            contents.push_str(&format!("{} {} {}\n", c.id, c.created, c.secret));
        }

        let mut suffix = [0; 8];
        rand::thread_rng().fill_bytes(&mut suffix);
        let temp = self
            .dir
            .join(format!("{context}.{}.tmp", hex::encode(suffix)));

        if let Err(e) = write_private(&temp, contents.as_bytes()) {
            _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp, &path) {
            _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        Ok(())
    }
}

/// A single cookie in a keyring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Cookie {
    pub(crate) id: u32,
    pub(crate) created: u64,
    pub(crate) secret: Box<str>,
}

impl Cookie {
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let id = parts.next()?.parse().ok()?;
        let created = parts.next()?.parse().ok()?;
        let secret = parts.next()?;

        if parts.next().is_some() || !secret.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        Some(Self {
            id,
            created,
            secret: secret.into(),
        })
    }

    fn is_valid(&self, now: u64) -> bool {
        self.created <= now + MAX_TIME_TRAVEL && now.saturating_sub(self.created) < EXPIRE_COOKIE_AGE
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(unix)]
fn create_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    match fs::DirBuilder::new().recursive(true).mode(0o700).create(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn create_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Check that the keyring directory is only accessible by its owner.
///
/// Returns `false` if the directory doesn't exist.
#[cfg(unix)]
fn check_dir(dir: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = match fs::metadata(dir) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let mode = metadata.permissions().mode();

    if !metadata.is_dir() || mode & 0o077 != 0 {
        tracing::warn!(?dir, mode = format_args!("{mode:o}"), "refusing insecure keyring directory");
        return Err(Error::authentication_failed(
            "keyring directory is accessible by other users",
        ));
    }

    Ok(true)
}

#[cfg(not(unix))]
fn check_dir(dir: &Path) -> Result<bool> {
    Ok(dir.is_dir())
}

/// Create a new file which is only readable by its owner.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    use std::io::Write;

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
pub(crate) fn write_cookie(keyring: &Keyring, context: &str, cookie: &Cookie) -> Result<()> {
    let mut cookies = keyring.load(context)?;
    cookies.push(cookie.clone());
    keyring.store(context, &cookies)
}

#[cfg(test)]
pub(crate) fn unix_now() -> u64 {
    now()
}
