//! Peer-to-peer transport for Paladin's stage coordination messages:
//! framing, reliable redelivery, and idempotent dispatch. Wire types are
//! generated from `proto/paladin.proto`.

pub mod client;
pub mod error;
pub mod idempotency;
pub mod publisher;
pub mod server;

pub mod proto {
    tonic::include_proto!("paladin");
}

pub use client::TransportClient;
pub use error::TransportError;
pub use idempotency::IdempotencyCache;
pub use publisher::{Publisher, PublisherBackoff};
pub use server::{EnvelopeHandler, TransportServer};
