//! Generic parameters functions
//!
//! Parameter files are TOML and live in the `params` directory under the
//! software root (see [`crate::host::get_dome_sw_root`]).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Serialize};
use std::fs::{read_to_string, write};
use std::path::PathBuf;
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (DOME_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

/// An error that occurs while saving a parameter file.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("The software root environment variable (DOME_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot serialise the parameters: {0}")]
    SerialiseError(toml::ser::Error),

    #[error("Cannot write the parameter file: {0}")]
    FileWriteError(std::io::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the "params" directory
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    let path = params_path(param_file_path).ok_or(LoadError::SwRootNotSet)?;

    let params_str = read_to_string(path).map_err(LoadError::FileLoadError)?;

    from_str(&params_str)
}

/// Parse parameters from a TOML string.
pub fn from_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}

/// Save a value into a parameter file, replacing any previous contents.
///
/// The file path is relative to the "params" directory. Used for state that
/// must survive restarts, like measured calibration constants.
pub fn save<P>(param_file_path: &str, params: &P) -> Result<(), SaveError>
where
    P: Serialize,
{
    let path = params_path(param_file_path).ok_or(SaveError::SwRootNotSet)?;

    let params_str = toml::to_string_pretty(params).map_err(SaveError::SerialiseError)?;

    write(path, params_str).map_err(SaveError::FileWriteError)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn params_path(param_file_path: &str) -> Option<PathBuf> {
    let mut path = crate::host::get_dome_sw_root().ok()?;
    path.push("params");
    path.push(param_file_path);
    Some(path)
}
