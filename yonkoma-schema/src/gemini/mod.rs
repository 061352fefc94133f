mod error;
mod generate_content_request;
mod v1beta_response;

pub use error::{GeminiErrorBody, GeminiErrorObject};
pub use generate_content_request::{
    Content, GeminiGenerateContentRequest, GenerationConfig, InlineData, Part, SafetySetting,
};
pub use v1beta_response::{Candidate, GeminiResponseBody};
