mod clients;
mod schema;
mod structured;
mod traits;
mod types;

pub use clients::{DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT, OpenAiClient, OpenAiConfig};
pub use schema::{FieldKind, FieldSpec, Schema};
pub use structured::{Structured, StructuredClient, StructuredError, StructuredOptions};
pub use traits::TextGenerator;
pub use types::{Completion, ProviderError, Usage};
