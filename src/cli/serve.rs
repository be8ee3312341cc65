use super::run::RunError;
use crate::config::load_or_default;
use crate::web::run_server;
use std::path::PathBuf;
use tracing::info;

pub async fn serve(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, _) = load_or_default(config_path.as_deref()).map_err(RunError::from)?;

    info!(listen = %config.web.listen, "Starting registration endpoint");
    run_server(&config.web)
        .await
        .map_err(|e| RunError::WebServer(e.to_string()))?;

    Ok(())
}
