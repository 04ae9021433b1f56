use directories::ProjectDirs;
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, Registry};

/// Writes diagnostics to a log file under the user config directory. The UI
/// owns the terminal, so nothing may log to stdout/stderr.
pub fn init_logging() -> anyhow::Result<()> {
    if let Some(proj_dirs) = ProjectDirs::from("com", "confab", "confab") {
        let log_dir = proj_dirs.config_dir().join("logs");
        std::fs::create_dir_all(&log_dir)?;
        let file = File::create(log_dir.join("confab.log"))?;

        let file_layer = fmt::layer().with_writer(Arc::new(file)).with_ansi(false);

        Registry::default().with(file_layer).init();
    }

    Ok(())
}
