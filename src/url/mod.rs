//! URL handling module for Sumi-Swarm
//!
//! Every URL that enters the shared store goes through this module first:
//! raw `href`/`src` values are resolved against the page they came from,
//! optionally restricted to the page's host, and canonicalized so that
//! semantically identical URLs produce the same store key.

mod normalize;
mod resolve;

pub use normalize::{canonicalize, canonicalize_str};
pub use resolve::resolve;
