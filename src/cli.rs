//! Command-line interface for assistant-bridge.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Path to the session store file.
    pub store: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Identity to answer as in one-shot mode.
    pub identity: Option<String>,
    /// Display name used in logs for one-shot mode.
    pub name: Option<String>,
    /// Message to answer once instead of serving HTTP.
    pub message: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Args {
    /// Whether the binary should answer one message and exit.
    pub fn is_one_shot(&self) -> bool {
        self.message.is_some()
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('s') | Long("store") => {
                result.store = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Short('i') | Long("identity") => {
                result.identity = Some(parser.value()?.parse()?);
            }
            Short('n') | Long("name") => {
                result.name = Some(parser.value()?.parse()?);
            }
            Short('m') | Long("message") => {
                result.message = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if result.message.is_some() && result.identity.is_none() {
        return Err(ArgsError::MissingValue("identity"));
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"assistant-bridge {version}
Maps messaging identities to persistent assistant threads and relays replies

USAGE:
    assistant-bridge [OPTIONS]
    assistant-bridge -i <IDENTITY> -m <MESSAGE> [OPTIONS]

OPTIONS:
    -H, --host <ADDR>         Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>         Port to listen on [default: 3000]
    -c, --config <FILE>       Path to configuration file (JSON)
    -s, --store <FILE>        Session store file [default: threads_db.json]
    -l, --log-level <LVL>     Log level (error, warn, info, debug, trace)
    -i, --identity <ID>       Identity to answer as (one-shot mode)
    -n, --name <NAME>         Display name for logs (one-shot mode)
    -m, --message <TEXT>      Answer this message once and exit
    -h, --help                Print help
    -V, --version             Print version

ENVIRONMENT VARIABLES:
    OPENAI_API_KEY              Assistant service API key (required)
    OPENAI_ASSISTANT_ID         Assistant to run (required)
    ASSISTANT_BRIDGE_BASE_URL   API root (overrides config)
    ASSISTANT_BRIDGE_STORE      Session store file (overrides config)
    ASSISTANT_BRIDGE_HOST       Host address (overrides config)
    ASSISTANT_BRIDGE_PORT       Port number (overrides config)
    ASSISTANT_BRIDGE_LOG_LEVEL  Log level (overrides config)
    RUST_LOG                    Alternative log level setting

EXAMPLES:
    # Serve the HTTP API on localhost:3000
    assistant-bridge

    # Answer one message from the command line
    assistant-bridge -i 15551234567 -n Alice -m "Where are the spare keys?"

    # Start with config file
    assistant-bridge -c /etc/assistant-bridge/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("assistant-bridge {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Option required by another option is absent.
    MissingValue(&'static str),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::MissingValue(name) => write!(f, "missing required option --{}", name),
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
