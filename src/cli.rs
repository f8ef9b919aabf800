//! Command-line interface.

use std::path::PathBuf;

use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};

use crate::config::ConfigOverrides;

const ABOUT: &str = concat!(
    "Client for smee.io style webhook payload delivery services (v",
    env!("CARGO_PKG_VERSION"),
    ")"
);

const EXAMPLES: &str = "\
Examples:
 -Forwarding messages to a local server:
\thookrelay forward https://smee.io/xIgtwP3rRcQWPs5e http://localhost:8010/change_hook/github

 -Showing messages and saving them for later:
\thookrelay show https://smee.io/xIgtwP3rRcQWPs5e --save output.txt

 -Sending saved messages back to smee.io:
\thookrelay send https://smee.io/xIgtwP3rRcQWPs5e saved.txt

 -Sending saved messages to a local server:
\thookrelay send http://localhost:8010/change_hook/github saved.txt";

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "hookrelay", version, about = ABOUT, after_help = EXAMPLES)]
pub struct Cli {
    /// Enable verbose mode. Repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file. Defaults to `hookrelay.toml` when present.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Action to perform.
    #[command(subcommand)]
    pub command: Command,
}

/// Actions.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Display received messages.
    Show(ShowArgs),
    /// Forward messages to an HTTP server.
    Forward(ForwardArgs),
    /// Send saved messages from a file.
    Send(SendArgs),
}

/// Arguments for `show`.
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// URL of the webhook proxy service.
    #[arg(value_name = "SMEE")]
    pub source: String,

    /// Stream client options.
    #[command(flatten)]
    pub client: ClientArgs,
}

/// Arguments for `forward`.
#[derive(Debug, Args)]
pub struct ForwardArgs {
    /// URL of the webhook proxy service.
    #[arg(value_name = "SMEE")]
    pub source: String,

    /// Full URL (including protocol and path) of the target to send messages to.
    pub target: String,

    /// Stream client options.
    #[command(flatten)]
    pub client: ClientArgs,
}

/// Arguments for `send`.
#[derive(Debug, Args)]
pub struct SendArgs {
    /// URL the saved messages are POSTed to.
    #[arg(value_name = "SMEE")]
    pub source: String,

    /// Name of the file with the messages.
    pub filename: PathBuf,
}

/// Options shared by the streaming actions.
#[derive(Debug, Clone, Default, Args)]
pub struct ClientArgs {
    /// Name of the file to save messages.
    #[arg(long = "save", value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// Reconnect to server every N seconds; 0 disables. [default: 3600]
    #[arg(long, value_name = "N")]
    pub reconnect: Option<u64>,

    /// Number of reception workers. [default: 5]
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

impl ClientArgs {
    /// Configuration values given by these flags.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides { workers: self.workers, reconnect_interval_secs: self.reconnect }
    }
}

/// Exit status for invalid arguments or configuration.
pub const USAGE_EXIT_CODE: i32 = 2;

impl Cli {
    /// Parses the process arguments.
    ///
    /// Help and version requests print and exit 0. Any other parse error
    /// prints the full help followed by the error and exits 2.
    pub fn parse_or_exit() -> Self {
        match Self::try_parse() {
            Ok(cli) => cli,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.exit()
            },
            Err(e) => UsageFailure::from_error(&e).exit(),
        }
    }
}

/// Output for an argument error: full help on stdout, then the error on
/// stderr.
#[derive(Debug, Clone)]
pub struct UsageFailure {
    /// Rendered top-level help, examples included.
    pub help: String,
    /// Rendered parse error.
    pub error: String,
}

impl UsageFailure {
    /// Renders the help and `error` without printing anything.
    pub fn from_error(error: &clap::Error) -> Self {
        Self { help: Cli::command().render_help().to_string(), error: error.render().to_string() }
    }

    /// Prints both parts and exits with [`USAGE_EXIT_CODE`].
    pub fn exit(&self) -> ! {
        print!("{}", self.help);
        eprintln!("\n{}", self.error);
        std::process::exit(USAGE_EXIT_CODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_forward_with_options() {
        let cli = Cli::try_parse_from([
            "hookrelay",
            "-vv",
            "forward",
            "https://smee.io/abc",
            "http://localhost:8010/hook",
            "--save",
            "out.txt",
            "--reconnect",
            "60",
            "--workers",
            "2",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Forward(args) = cli.command else {
            panic!("expected forward");
        };
        assert_eq!(args.source, "https://smee.io/abc");
        assert_eq!(args.target, "http://localhost:8010/hook");
        assert_eq!(args.client.save, Some(PathBuf::from("out.txt")));
        assert_eq!(args.client.reconnect, Some(60));
        assert_eq!(args.client.workers, Some(2));
    }

    #[test]
    fn verbose_is_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from(["hookrelay", "show", "https://smee.io/abc", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.client.reconnect, None);
        assert_eq!(args.client.workers, None);
    }

    #[test]
    fn send_takes_no_client_options() {
        let cli = Cli::try_parse_from(["hookrelay", "send", "http://localhost/hook", "saved.txt"])
            .unwrap();
        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.filename, PathBuf::from("saved.txt"));

        let error = Cli::try_parse_from([
            "hookrelay",
            "send",
            "http://localhost/hook",
            "saved.txt",
            "--workers",
            "2",
        ])
        .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn missing_action_is_an_error() {
        assert!(Cli::try_parse_from(["hookrelay"]).is_err());

        let error =
            Cli::try_parse_from(["hookrelay", "forward", "https://smee.io/abc"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn non_numeric_workers_is_rejected() {
        let args = ["hookrelay", "show", "https://smee.io/abc", "--workers", "many"];
        let error = Cli::try_parse_from(args).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn usage_failure_renders_help_then_error() {
        let error =
            Cli::try_parse_from(["hookrelay", "forward", "https://smee.io/abc"]).unwrap_err();
        let failure = UsageFailure::from_error(&error);

        assert!(failure.help.contains("Usage: hookrelay"));
        assert!(failure.help.contains("Examples:"));
        assert!(failure.help.contains("forward"));
        assert!(failure.error.starts_with("error:"));
        assert!(failure.error.contains("<TARGET>"));
        assert!(!failure.help.contains("error:"));
    }
}
