use anyhow::Result;
use fieldpass::cli::{actions, actions::Action, start};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse arguments and initialize telemetry
    let action = start()?;

    // Handle the action
    match action {
        Action::Server(_) => actions::server::execute(action).await?,
    }

    Ok(())
}
