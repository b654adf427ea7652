//! AppForge outbound gateway.
//!
//! Generated apps run sandboxed and may reach the network only through this
//! gateway. It refuses internal targets, budgets requests per client, and
//! relays bounded, non-binary responses as JSON.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** URL policy, rate limiting and HTTP transport live here.
//! The `server` crate sees only [`Gateway::proxy`] and [`GatewayError`].
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`policy`] | Block rules and URL validation |
//! | [`rate_limit`] | `ClientKey` and the fixed-window limiter |
//! | [`fetch`] | `Fetcher` port and the `reqwest` adapter |
//! | [`content`] | Binary-type filter and body decoding |
//! | [`service`] | The `Gateway` pipeline and its wire types |

pub mod content;
pub mod errors;
pub mod fetch;
pub mod policy;
pub mod rate_limit;
pub mod service;

pub use errors::GatewayError;
pub use fetch::{FetchRequest, FetchedResponse, Fetcher, ReqwestFetcher};
pub use policy::BlockRule;
pub use rate_limit::{ClientKey, FixedWindowLimiter, RateLimitConfig};
pub use service::{Gateway, GatewayConfig, ProxyMethod, ProxyRequest, ProxyResponse};
