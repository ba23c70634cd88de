pub mod analyst;
pub mod cache;
pub mod clock;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod repair;
pub mod retry;
pub mod validate;

pub use analyst::{Analyst, ModelSettings};
pub use cache::{fingerprint, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AnalysisError, JsonShape};
pub use provider::{classify_api_error, LlmError, LlmProvider, Message, Role};
pub use retry::{RetryController, RetryPolicy};
