use serde::de::DeserializeOwned;
use tracing::error;

/// Parse the process environment into a config struct. Missing or malformed
/// required values are a startup error, not something to limp along with.
pub fn get_app_config<T: DeserializeOwned>() -> T {
    match envy::from_env::<T>() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to parse config: {}", err);
            std::process::exit(1);
        }
    }
}
