use crate::error::AppError;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Locate `<crate_dir>/config`, whether the process runs from the workspace
/// root or from inside the crate directory.
pub fn configuration_directory(base_path: &Path, crate_dir: &str) -> PathBuf {
    if base_path.ends_with(crate_dir) {
        base_path.join("config")
    } else {
        base_path.join(crate_dir).join("config")
    }
}

/// Load `base.yaml` from the crate's config directory, overlaid by
/// `APP_`-prefixed environment variables (`APP_SERVER__PORT=9000`).
pub fn load_configuration<T: DeserializeOwned>(crate_dir: &str) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let base_path = std::env::current_dir()?;
    let directory = configuration_directory(&base_path, crate_dir);

    let settings = config::Config::builder()
        .add_source(config::File::from(directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}
