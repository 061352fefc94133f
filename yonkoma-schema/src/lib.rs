pub mod gemini;

pub use gemini::{
    Candidate, Content, GeminiErrorBody, GeminiErrorObject, GeminiGenerateContentRequest,
    GeminiResponseBody, GenerationConfig, InlineData, Part, SafetySetting,
};
