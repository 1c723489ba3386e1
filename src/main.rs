//! assistant-bridge binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use assistant_bridge::api::{serve, AppState};
use assistant_bridge::cli::{self, Args};
use assistant_bridge::config::Config;
use assistant_bridge::{logging, ConversationDriver, FileSessionStore, Identity, OpenAiAssistants};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    logging::init_with_filter(config.log_filter()).ok();

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("assistant-bridge v{}", env!("CARGO_PKG_VERSION"));

    let settings = config.assistant_settings()?;
    let service = Arc::new(OpenAiAssistants::with_options(
        &settings.api_key,
        &settings.base_url,
        settings.request_timeout,
    )?);

    let store = Arc::new(FileSessionStore::open(&config.store.path)?);
    info!("Session store at {}", store.path().display());

    let driver = ConversationDriver::new(
        service,
        store,
        config.driver_settings(&settings.assistant_id),
    );

    if let Some(message) = args.message.as_deref() {
        let identity = Identity::new(args.identity.clone().unwrap_or_default())?;
        let name = args.name.as_deref().unwrap_or("cli");
        let reply = driver.respond(message, &identity, name).await?;
        println!("{reply}");
        return Ok(());
    }

    serve(config.to_server_config()?, AppState::new(driver)).await?;
    Ok(())
}
