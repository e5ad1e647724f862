//! A D-Bus wire protocol engine for Tokio.
//!
//! This crate implements the parts needed to get correctly framed and
//! authenticated messages on and off the wire:
//!
//! * [`codec`] encodes and decodes whole [`Message`]s, with bodies written
//!   through [`BodyBuf`] and read through [`Body`].
//! * [`FrameAssembler`] turns arbitrarily chunked bytes into messages.
//! * [`sasl`] holds the authentication state machines for the `EXTERNAL` and
//!   `DBUS_COOKIE_SHA1` mechanisms.
//! * [`Connection`] drives a single authenticated transport over a Unix
//!   socket or TCP.
//! * [`Broker`] is an embedded message bus which routes messages between its
//!   peers by name.
//!
//! # Examples
//!
//! ```no_run
//! use tokio_dbus_wire::{Address, BrokerBuilder, ConnectionBuilder};
//!
//! # #[tokio::main] async fn main() -> tokio_dbus_wire::Result<()> {
//! let broker = BrokerBuilder::new(Address::unix_path("/tmp/bus")).bind().await?;
//! let address = broker.local_address().clone();
//! tokio::spawn(broker.run());
//!
//! let c = ConnectionBuilder::new().address(address).build().await?;
//! println!("connected as {:?}", c.unique_name());
//! # Ok(()) }
//! ```

#[macro_use]
mod macros;

#[doc(inline)]
pub use self::write::Write;
mod write;

#[doc(inline)]
pub use self::read::Read;
mod read;

#[doc(inline)]
pub use self::error::{Error, Result};
mod error;

#[doc(inline)]
pub use self::proto::{Endianness, Flags, MessageType};
pub mod proto;

pub mod buf;

#[doc(inline)]
pub use self::body::{Body, BodyBuf, Storable};
mod body;

pub mod codec;

#[doc(inline)]
pub use self::assembler::{FrameAssembler, Frames, Stage};
mod assembler;

pub mod sasl;

#[doc(inline)]
pub use self::address::{Address, AddressKind};
mod address;

#[doc(inline)]
pub use self::signature::{OwnedSignature, Signature, SignatureError};
mod signature;

#[doc(inline)]
pub use self::object_path::{ObjectPath, ObjectPathError, OwnedObjectPath};
mod object_path;

#[doc(inline)]
pub use self::frame::Frame;
mod frame;

#[doc(inline)]
pub use self::value::Value;
mod value;

#[doc(inline)]
pub use self::message::{Message, MessageKind, SerialCounter};
mod message;

pub mod org_freedesktop_dbus;

#[cfg(feature = "tokio")]
#[doc(inline)]
pub use self::transport::{CloseHandle, Listener, Transport};
#[cfg(feature = "tokio")]
mod transport;

#[cfg(feature = "tokio")]
#[doc(inline)]
pub use self::connection::{Connection, ConnectionBuilder};
#[cfg(feature = "tokio")]
mod connection;

#[cfg(feature = "tokio")]
#[doc(inline)]
pub use self::bus::{Broker, BrokerBuilder};
#[cfg(feature = "tokio")]
pub mod bus;

mod lossy_str;

mod utils;
