//! `fns-rpc`: the remote call envelope that makes a cross-node function
//! call indistinguishable from a local one (spec.md §4.3).
//!
//! Layered directly over `fns-core`'s `Transport`/wire contracts; this
//! crate never references `fns-manager` so the dependency order stays
//! `fns-store` → `fns-barrier` → `fns-rpc` → `fns-manager`. The server
//! side calls back into whatever hosts it through the small
//! [`InboundHandler`] seam rather than depending on the endpoint manager
//! directly, which is what `fns-manager` implements.

pub mod client;
pub mod codec;
pub mod server;
pub mod signature;

pub use client::{call, RemoteCallRequest};
pub use codec::{Codec, JsonCodec};
pub use server::{InboundHandler, InternalHandler};
pub use signature::{sign, verify};
