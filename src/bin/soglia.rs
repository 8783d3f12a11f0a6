use anyhow::Result;
use soglia::cli::{actions, actions::Action, start, telemetry};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    // Start the program
    let action = start()?;

    // Handle the action
    let result = match action {
        Action::Server { .. } => actions::server::handle(action).await,
    };

    telemetry::shutdown_tracer();

    result
}
