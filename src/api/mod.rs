//! REST API module
//!
//! Exposes the multisig token workflow over HTTP. Amounts travel as decimal
//! coin strings, tokens as the base64 text produced by the codec.
//!
//! # Endpoints
//!
//! ## Tokens
//! - `POST /api/multisig/transactions` - Create an unsigned spend
//! - `POST /api/multisig/transactions/preview` - Coin selection only
//! - `POST /api/multisig/sign` - Add this node's signatures
//! - `POST /api/multisig/send` - Broadcast a fully signed token
//! - `POST /api/multisig/sign-and-send` - Sign, then broadcast if complete
//! - `POST /api/multisig/decode` - Show the content of a token
//!
//! ## Addresses
//! - `GET /api/multisig/{identifier}` - Resolve an address or account
//! - `GET /api/multisig/{identifier}/unspent` - List its unspent outputs
//!
//! Failures return `{ "error": ..., "kind": ... }` with a status derived from
//! the error kind.

pub mod handlers;
pub mod routes;

pub use handlers::ApiState;
pub use routes::create_router;
