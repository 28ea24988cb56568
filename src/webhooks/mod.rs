//! Inbound webhook handling: payload parsing and routing into the queue.

pub mod parser;
pub mod router;

pub use parser::{
    parse_webhook, DocketAlertPayload, FetchPayload, FilingDocument, FilingResult, ParseError,
    WebhookEvent, FETCH_SUCCESS,
};
pub use router::{RouteError, RouteOutcome, RouterOptions, WebhookRouter};
