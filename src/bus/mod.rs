//! An embedded message bus.
//!
//! The [`Broker`] accepts peers, authenticates them and routes messages
//! between them by bus name. It implements the parts of the
//! `org.freedesktop.DBus` interface which deal with names and match rules.

#[cfg(test)]
mod tests;

pub use self::match_rule::MatchRule;
mod match_rule;

pub use self::broker::{Broker, BrokerBuilder};
mod broker;

mod router;
