//! # Strata Remote
//!
//! Outbound calls to the remote partner service.
//!
//! Each resolvable operation is configured as a `"<METHOD>:<url>"`
//! endpoint template ([`EndpointTemplate`]); the [`RemoteCallExecutor`]
//! resolves the template, acquires a scoped bearer token through an
//! [`AccessTokenProvider`], optionally signs the payload with a
//! [`RequestSigner`], and classifies the response by status and content
//! type. An optional [`CallLedger`] records traffic for diagnostics.
//!
//! This crate knows nothing about entities or caching; it takes fully
//! specified calls and returns classified bodies or errors.

pub mod endpoint;
pub mod executor;
pub mod ledger;
pub mod signer;
pub mod token;

pub use endpoint::{EndpointTemplate, ResolvedEndpoint};
pub use executor::{extract_error_message, RemoteBody, RemoteCall, RemoteCallExecutor};
pub use ledger::{CallLedger, CallLogEntry};
pub use signer::{RequestSigner, SIGNATURE_FIELD, SIGNED_AT_FIELD};
pub use token::{AccessTokenProvider, StaticTokenProvider};
