//! Stack file reading utilities.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SpecError, SpecResult};
use crate::models::{ScalingSpec, StackSpec};

/// A stack file together with the user data it references.
#[derive(Debug, Clone)]
pub struct StackDocument {
    pub path: PathBuf,
    pub spec: StackSpec,
    /// Raw user-data bytes; empty when none is configured
    pub user_data: Vec<u8>,
}

/// Reader for stack files.
pub struct SpecReader;

impl SpecReader {
    /// Read a stack file and its user data.
    pub fn load(path: impl AsRef<Path>) -> SpecResult<StackDocument> {
        let path = path.as_ref();
        let spec = Self::read_stack(path)?;
        let user_data = Self::read_user_data(path, &spec.scaling)?;
        Ok(StackDocument {
            path: path.to_path_buf(),
            spec,
            user_data,
        })
    }

    /// Read and parse a stack file.
    pub fn read_stack(path: impl AsRef<Path>) -> SpecResult<StackSpec> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SpecError::NotFound(path.to_path_buf()));
        }
        debug!("Reading stack from {:?}", path);

        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| SpecError::InvalidFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Parse a stack from a YAML string.
    pub fn parse_stack(content: &str) -> SpecResult<StackSpec> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Where the user-data script of a stack lives, relative paths being
    /// taken from the stack file's directory.
    pub fn user_data_path(stack_path: &Path, scaling: &ScalingSpec) -> Option<PathBuf> {
        let user_data = scaling.user_data.as_ref()?;
        if user_data.is_absolute() {
            return Some(user_data.clone());
        }
        let base = stack_path.parent().unwrap_or_else(|| Path::new("."));
        Some(base.join(user_data))
    }

    /// Read the user-data bytes, or nothing when none is configured.
    pub fn read_user_data(stack_path: &Path, scaling: &ScalingSpec) -> SpecResult<Vec<u8>> {
        let Some(path) = Self::user_data_path(stack_path, scaling) else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Err(SpecError::UserDataNotFound(path));
        }
        debug!("Reading user data from {:?}", path);
        Ok(fs::read(&path)?)
    }
}
