use std::path::PathBuf;

use crate::cli::commands::ValidateArgs;
use crate::config::{self, Overrides};
use crate::errors::ReverieError;

pub async fn handle_validate(args: ValidateArgs) -> Result<(), ReverieError> {
    let path = PathBuf::from(&args.config);
    let file_config = config::parse_config(&path).await?;
    let settings = config::resolve(&file_config, &Overrides::default())?;
    println!("Configuration is valid: {}", args.config);
    println!(
        "  provider: {} ({})",
        settings.oracle.family,
        settings.oracle.model_or_default()
    );
    println!("  max cycles: {}", settings.max_cycles);
    println!("  exec timeout: {}s", settings.tools.exec_timeout.as_secs());
    if settings.oracle.api_key.is_empty() {
        println!("  warning: no API key found (set {})", settings.oracle.family.api_key_env());
    }
    Ok(())
}
