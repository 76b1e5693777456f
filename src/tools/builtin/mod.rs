//! Built-in tools that come with the agent.

mod fetch_podcast_details;
mod upload_to_ipfs;
mod verify_statement;

pub use fetch_podcast_details::FetchPodcastDetailsTool;
pub use upload_to_ipfs::UploadToIpfsTool;
pub use verify_statement::VerifyStatementTool;
