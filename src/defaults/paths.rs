use std::{
    env,
    io::{Error, ErrorKind},
    path::PathBuf,
};

const DEFAULTS_FILE: &str = "defaults.toml";

/// Locates the bundled defaults resource for an application.
///
/// Follows the XDG Base Directory specification:
/// - First checks `XDG_CONFIG_HOME`
/// - Falls back to `$HOME/.config`
/// - Appends the application name to the base config directory
pub struct DefaultsPaths;

impl DefaultsPaths {
    /// Returns the configuration directory for `app`.
    ///
    /// # Errors
    /// Returns an error if neither `XDG_CONFIG_HOME` nor `HOME` is set.
    pub fn config_dir(app: &str) -> Result<PathBuf, Error> {
        resolve_config_dir(
            env::var("XDG_CONFIG_HOME").ok(),
            env::var("HOME").ok(),
            app,
        )
    }

    /// Returns the path of the defaults resource for `app`.
    ///
    /// The file is not required to exist.
    ///
    /// # Errors
    /// Returns an error if neither `XDG_CONFIG_HOME` nor `HOME` is set.
    pub fn defaults_file(app: &str) -> Result<PathBuf, Error> {
        Ok(Self::config_dir(app)?.join(DEFAULTS_FILE))
    }
}

fn resolve_config_dir(
    xdg_config_home: Option<String>,
    home: Option<String>,
    app: &str,
) -> Result<PathBuf, Error> {
    let config_home = xdg_config_home
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home.map(|home| PathBuf::from(home).join(".config")))
        .ok_or_else(|| {
            Error::new(
                ErrorKind::NotFound,
                "Neither XDG_CONFIG_HOME nor HOME environment variable found",
            )
        })?;

    Ok(config_home.join(app))
}
