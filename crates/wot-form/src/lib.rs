//! The interaction model shared by a Web of Things consumer and its
//! protocol bindings.
//!
//! This crate provides APIs to:
//!
//! - Describe a form, which is the declarative description of how to perform
//!   a single interaction with a thing over one protocol binding.
//!   A form carries the target URI, the media types of the exchanged
//!   payloads, the operations it serves, and any protocol-specific term.
//! - Enumerate the operation types a consumer may perform on a thing, such as
//!   reading a property or invoking an action.
//! - Describe the security schemes declared by a thing and resolve the ones
//!   referenced by a form.
//!
//! A protocol binding only reads these structures: it never modifies a form.
//! Every structure is serializable, while deserialization can be disabled by
//! turning off the `deserialize` feature at compile time.
//!
//! This crate can be compiled for both `std` and `no_std` environments.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![no_std]

extern crate alloc;

/// Interaction forms.
pub mod form;
/// Operation types.
pub mod operation;
/// Security schemes and their definitions.
pub mod security;

#[cfg(test)]
#[cfg(feature = "deserialize")]
pub(crate) fn serialize<T: serde::Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

#[cfg(test)]
#[cfg(feature = "deserialize")]
pub(crate) fn deserialize<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}
