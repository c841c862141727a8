use std::process::ExitCode;
use std::sync::Arc;

use browserid_shim::widget::scripted::DEFAULT_ASSERTION;
use browserid_shim::{
    AssertionCoordinator, CoordinatorOptions, HttpBackend, IdentityWidget, Navigator, Outcome, PageFlow, RequestArgs,
    ScriptedWidget, ShimConfig, ShimError, Trigger, VerificationBackend,
};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "browserid-shim", about = "Drive a BrowserID login/logout against a site backend")]
struct Cli {
    /// Overrides `BROWSERID_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// URL of the page the flow runs on; checked for the failed-login flag.
    #[arg(long, env = "BROWSERID_PAGE_URL")]
    page_url: Option<String>,

    /// Assertion the scripted widget hands out.
    #[arg(long, env = "BROWSERID_ASSERTION", default_value = DEFAULT_ASSERTION)]
    assertion: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the backend's session info.
    Info,
    /// Log in with the scripted widget.
    Login {
        #[arg(long)]
        next: Option<String>,
        /// Extra widget request argument, `key=value`. Repeatable.
        #[arg(long = "arg", value_parser = parse_request_arg)]
        args: Vec<(String, String)>,
    },
    /// Log out through the widget, then the backend.
    Logout {
        #[arg(long)]
        next: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Shim(#[from] ShimError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("{0} did not navigate anywhere")]
    Stayed(&'static str),
}

struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&self, target: &str) {
        println!("redirect: {target}");
    }
}

fn parse_request_arg(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "browserid-shim failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ShimConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }

    let backend: Arc<dyn VerificationBackend> = Arc::new(HttpBackend::new(&config)?);
    let widget: Arc<dyn IdentityWidget> = Arc::new(ScriptedWidget::new(cli.assertion));
    let options = CoordinatorOptions::for_page(&config, cli.page_url.as_deref());
    let coordinator = AssertionCoordinator::new(backend, widget, options);

    let (trigger, label) = match cli.command {
        Command::Info => {
            let info = coordinator.info().await?;
            println!("{}", serde_json::to_string_pretty(info)?);
            return Ok(());
        }
        Command::Login { next, args } => {
            let request_args = (!args.is_empty()).then(|| {
                args.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect::<RequestArgs>()
            });
            (Trigger::Login { request_args, next }, "login")
        }
        Command::Logout { next } => (Trigger::Logout { next }, "logout"),
    };

    let flow = PageFlow::new(coordinator, Arc::new(PrintNavigator));
    flow.start().await?;

    let outcome = flow.handle(trigger).await;
    flow.shutdown();

    match outcome {
        Outcome::Navigated(_) => Ok(()),
        Outcome::Stayed => Err(CliError::Stayed(label)),
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
