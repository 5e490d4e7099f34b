mod openai;

pub use openai::{DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT, OpenAiClient, OpenAiConfig};
