//! CLI command handling.
//!
//! Provides subcommands for:
//! - Serving the HTTP API (`serve`, the default)
//! - Sending one chat message and printing the reply (`chat`)
//! - Invoking a built-in tool directly (`tool`)
//! - Listing the built-in tools (`tools`)

mod commands;

pub use commands::{run_chat_command, run_tool_command, run_tools_command};

use clap::{ColorChoice, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "onchain-agent")]
#[command(about = "Tool-calling orchestrator for a hosted assistant")]
#[command(
    long_about = "Drives assistant runs, executes the tools they request and reports progress.\nExamples:\n  onchain-agent serve --port 3001\n  onchain-agent chat 'verify that ETH is proof of stake'"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the HTTP API (default if no subcommand given)
    #[command(
        about = "Serve the HTTP API",
        long_about = "Starts the HTTP API.\nExample: onchain-agent serve --port 3001"
    )]
    Serve {
        /// Port to listen on (overrides HTTP_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message and print the assistant's reply
    #[command(
        about = "Send one chat message",
        long_about = "Runs one chat turn, streaming progress to stderr.\nExample: onchain-agent chat 'hello' --thread thread_abc"
    )]
    Chat {
        /// The user message
        message: String,

        /// Continue an existing thread instead of starting a new one
        #[arg(short, long)]
        thread: Option<String>,
    },

    /// Invoke a built-in tool directly
    #[command(
        about = "Invoke a tool",
        long_about = "Runs one tool outside of any assistant run.\nExample: onchain-agent tool verify_statement --params '{\"statement\":\"...\"}'"
    )]
    Tool {
        /// Tool name
        name: String,

        /// JSON object of parameters
        #[arg(short, long, default_value = "{}")]
        params: String,
    },

    /// List the built-in tools
    Tools,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_optional_default() {
        let cli = Cli::try_parse_from(["onchain-agent"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["onchain-agent", "serve", "--port", "4000"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Serve { port: Some(4000) })));
    }

    #[test]
    fn tool_params_default_to_empty_object() {
        let cli = Cli::try_parse_from(["onchain-agent", "tool", "verify_statement"]).unwrap();
        match cli.command {
            Some(Command::Tool { name, params }) => {
                assert_eq!(name, "verify_statement");
                assert_eq!(params, "{}");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn chat_takes_thread() {
        let cli =
            Cli::try_parse_from(["onchain-agent", "chat", "gm", "--thread", "thread_1"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Chat { ref message, thread: Some(ref t) }) if message == "gm" && t == "thread_1"
        ));
    }
}
