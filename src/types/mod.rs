//! Public types for the Huginn API.

mod request;
mod response;

pub(crate) use request::canonical_context;
pub use request::{GenerationRequest, Priority, RequestType};
pub use response::{FinishReason, Response, Usage};
