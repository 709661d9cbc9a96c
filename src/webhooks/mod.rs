//! Webhook ingestion: signature verification, payload parsing, policy,
//! filtering, and the per-event handlers that turn deliveries into builds.

pub mod check_suite;
pub mod events;
pub mod filter;
pub mod handlers;
pub mod parser;
pub mod payload;
pub mod policy;
pub mod signature;

pub use events::GatewayEvent;
pub use filter::EmissionFilter;
pub use handlers::{GatewayOptions, HookError, HookHandler, HookResponse};
pub use parser::{ParseError, parse_webhook};
pub use payload::ForwardedPayload;
pub use policy::{AuthorAllowlist, DEFAULT_ALLOWED_AUTHORS};
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, verify_signature,
};
