//! Run orchestration.
//!
//! ```text
//!   ChatService ──create run──► RunDriver ──requires_action──► ToolDispatcher
//!        │                          │  ▲                             │
//!        │                          │  └──── submit outputs ◄────────┘
//!        ▼                          ▼
//!   Orchestrator              StatusReporter (narration per run id)
//! ```

mod chat;
mod context;
mod driver;

pub use chat::{ChatReply, ChatService, reply_text};
pub use context::Orchestrator;
pub use driver::{IMAGE_PLACEHOLDER, NO_RESPONSE, NO_TOOLS_AVAILABLE, RunDriver, failure_message};
