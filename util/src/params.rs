//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable which, if set, overrides the directory parameter files are loaded from.
pub const PARAMS_DIR_ENV: &str = "GVF_PARAMS_DIR";

/// Default parameter directory, relative to the current working directory.
pub const DEFAULT_PARAMS_DIR: &str = "params";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot load the parmeter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the directory parameter files are loaded from.
///
/// This is the value of `GVF_PARAMS_DIR` if set, otherwise `./params`.
pub fn params_dir() -> PathBuf {
    match std::env::var_os(PARAMS_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(DEFAULT_PARAMS_DIR),
    }
}

/// Load a parameter file
///
/// Relative paths are resolved against [`params_dir`], absolute paths are used as given.
pub fn load<P, F>(param_file_path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>,
{
    let path = params_dir().join(param_file_path.as_ref());

    // Load the file into a string
    let params_str = match read_to_string(&path) {
        Ok(s) => s,
        Err(e) => return Err(LoadError::FileLoadError(path, e)),
    };

    from_str(params_str.as_str())
}

/// Parse parameters from a TOML string
pub fn from_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    struct Gains {
        k_p: f64,
        k_i: f64,
    }

    #[test]
    fn test_from_str() {
        let g: Gains = from_str("k_p = 1.5\nk_i = 0.0").unwrap();
        assert_eq!(g.k_p, 1.5);
        assert_eq!(g.k_i, 0.0);

        assert!(matches!(
            from_str::<Gains>("k_p = 1.5"),
            Err(LoadError::DeserialiseError(_))
        ));
    }

    #[test]
    fn test_load_missing() {
        assert!(matches!(
            load::<Gains, _>("/this/file/does/not/exist.toml"),
            Err(LoadError::FileLoadError(_, _))
        ));
    }
}
