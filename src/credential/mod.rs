//! Credential module
//!
//! Loads the private key a host is authenticated with.
//!
//! # Overview
//!
//! Keys are probed as RSA, Ed25519 and ECDSA, in that order; the first format
//! that parses wins. Both OpenSSH (`openssh-key-v1`) envelopes and legacy PEM
//! blocks are recognised. Passphrase-protected keys are not supported.

mod envelope;
mod loader;

pub use envelope::{KeyEnvelope, KeyFormat};
pub use loader::{Credential, CredentialLoader};
