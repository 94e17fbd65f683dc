use clap::Parser;
use noteai::app::Application;
use noteai::cli::Args;
use noteai::config::Settings;
use noteai::core::error::NoteaiError;
use noteai::{display, logging};
use tracing::error;

async fn run(args: Args) -> Result<(), NoteaiError> {
    let settings = Settings::load()?;
    let app = Application::new(args, settings)?;
    app.run().await
}

#[tokio::main]
async fn main() {
    let _log_guard = logging::init_logging();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!(error = %e, "Exiting with error");
        display::display_error(&e.to_string());
        std::process::exit(1);
    }
}
