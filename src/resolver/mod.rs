pub mod candidates;
pub mod endpoint;
pub mod transport;

pub use candidates::{validate_identifier, watch_page, CandidateRequest, Operation};
pub use endpoint::{EndpointResolver, Payload, ResolvedResponse};
pub use transport::{ContentKind, HttpResponse, HttpTransport, Transport, TransportError};
