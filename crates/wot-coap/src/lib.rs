//! The `wot-coap` library crate provides a client binding which lets a
//! Web of Things consumer interact with things speaking the Constrained
//! Application Protocol (`CoAP`).
//!
//! An interaction is described by a protocol-agnostic form, defined in the
//! `wot-form` crate, and the binding derives from it the `CoAP` request
//! method, content-formats, blockwise preferences and subprotocol.
//!
//! Core functionalities of this crate include:
//!
//! - Reading and writing properties and invoking actions
//! - Observing properties and events through observe relations which can be
//!   aborted at any time
//! - Establishing pre-shared key security over `DTLS` when a form requires it
//! - Discovering Thing Descriptions directly, over unicast or within a
//!   time-bounded multicast window
//! - Enumerating the resources of devices through `CoRE Link-Format`
//!
//! The `CoAP` wire protocol is not implemented by this crate: retransmission,
//! deduplication, block re-assembly and the `DTLS` handshake are delegated to
//! an engine exposed through the [`transport::Transport`] trait.
//!
//! `wot-coap` leverages `tokio` as an asynchronous executor: every exchange
//! runs independently and owns its own transport client.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// The `CoAP` client binding.
pub mod client;
/// Client configuration.
pub mod config;
/// Payloads exchanged with things.
pub mod content;
/// `CoAP` content-formats and their media types.
pub mod content_format;
/// Discovery results.
pub mod discovery;
/// Error management.
pub mod error;
/// Pending exchanges.
pub mod exchange;
/// `CoRE Link-Format` parser.
pub mod link_format;
/// `CoAP` request methods, message types and response codes.
pub mod method;
/// `CoAP` parameters of a form.
pub mod parameters;
/// Pre-shared key security.
pub mod security;
/// Subscriptions to observable resources.
pub mod subscription;
/// The interface of the underlying `CoAP` engine.
pub mod transport;
