//! A protocol engine for speaking RESP3 (Redis Serialization Protocol, version 3)
//! to a Redis-compatible server over a single TCP connection.
//!
//! This crate covers exactly four things: encoding a [`Command`] onto the wire,
//! decoding a response into a [`Value`], discarding a response without
//! materializing it, and the [`Connection`] state machine that sequences
//! connect, the mandatory `HELLO 3` handshake, and write/read turns.
//!
//! It deliberately does not include connection pooling, pipelining, retries,
//! TLS, pub/sub, clustering, or any higher-level command wrappers — those are
//! the job of a layer built on top of this one.

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications
)]

mod codec;
mod command;
mod connection;
mod error;
mod url;
mod value;

pub use codec::{decode_response, discard_response, encode_command};
pub use command::{Command, IntoArg};
pub use connection::Connection;
pub use error::{
    CodecError, ConnectionError, RedisError, ResponseError, StateError, UnsupportedTag,
};
pub use value::Value;
