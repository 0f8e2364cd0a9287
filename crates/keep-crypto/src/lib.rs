//! # keep-crypto
//!
//! The two cryptographic primitives the Keep wire protocol is built on:
//!
//! | Module | Algorithm | Use |
//! |--------|-----------|-----|
//! | `hashing` | MD5 | Content-addressed block identity |
//! | `signing` | HMAC-SHA1 | Time-bounded permission signatures |

pub mod errors;
pub mod hashing;
pub mod signing;

pub use errors::CryptoError;
pub use hashing::{digest, digest_from_hex, digest_hex, digest_to_hex, BlockHasher, Digest16};
pub use signing::{sign, verify, VerifyResult};
