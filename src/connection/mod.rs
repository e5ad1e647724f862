//! Client connections and the I/O loop which drives every connection.


pub(crate) use self::io_loop::{Dispatch, IoLoop};
mod io_loop;

pub use self::builder::ConnectionBuilder;
mod builder;

pub use self::connection::Connection;
mod connection;
