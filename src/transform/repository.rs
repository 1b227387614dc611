//! Coordinate-transform store.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use tracing::debug;

use crate::config::TransformConfig;
use crate::error::{CollaboratorErrorKind, ServerError};

/// Row-major homogeneous 4x4 matrix.
pub type Matrix4 = [f64; 16];

/// The identity matrix.
pub const IDENTITY: Matrix4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Name of a transform between two coordinate frames, written `FromToTo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformName {
    from: String,
    to: String,
}

impl TransformName {
    /// Create a name from its two frame names.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Result<Self, ServerError> {
        let name = Self {
            from: from.into(),
            to: to.into(),
        };
        if !is_frame_name(&name.from) || !is_frame_name(&name.to) {
            return Err(invalid_name(&name.to_string()));
        }
        Ok(name)
    }

    /// Parse `ProbeToTracker` style names.
    ///
    /// The split happens at the first `To` that has a non-empty frame on
    /// both sides, each starting with an uppercase letter.
    pub fn parse(name: &str) -> Result<Self, ServerError> {
        name.match_indices("To")
            .map(|(pos, _)| (&name[..pos], &name[pos + 2..]))
            .find(|(from, to)| is_frame_name(from) && is_frame_name(to))
            .map(|(from, to)| Self {
                from: from.to_string(),
                to: to.to_string(),
            })
            .ok_or_else(|| invalid_name(name))
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    /// The name of the opposite transform.
    pub fn inverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

impl fmt::Display for TransformName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}To{}", self.from, self.to)
    }
}

fn is_frame_name(part: &str) -> bool {
    part.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn invalid_name(name: &str) -> ServerError {
    ServerError::Collaborator {
        kind: CollaboratorErrorKind::InvalidTransformName {
            name: name.to_string(),
        },
    }
}

/// A stored transform and its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformEntry {
    pub matrix: Matrix4,
    /// Whether the transform is written back when the device set is saved.
    pub persistent: bool,
    /// Calibration error, if known.
    pub error: Option<f64>,
    /// Calibration date, if known.
    pub date: Option<String>,
}

impl TransformEntry {
    /// A non-persistent transform without calibration metadata.
    pub fn new(matrix: Matrix4) -> Self {
        Self {
            matrix,
            persistent: false,
            error: None,
            date: None,
        }
    }
}

/// Named transforms shared by all commands.
#[derive(Debug, Default)]
pub struct TransformRepository {
    transforms: RwLock<HashMap<TransformName, TransformEntry>>,
}

impl TransformRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository preloaded from configuration.
    pub fn from_config(configs: &[TransformConfig]) -> Result<Self, ServerError> {
        let repository = Self::new();
        for config in configs {
            let name = TransformName::parse(&config.name)?;
            let matrix = matrix_from_slice(&config.matrix).ok_or_else(|| ServerError::Config {
                message: format!("Transform '{}' needs 16 matrix values", config.name),
            })?;
            repository.set_transform(
                &name,
                TransformEntry {
                    matrix,
                    persistent: config.persistent,
                    error: config.error,
                    date: None,
                },
            )?;
        }
        Ok(repository)
    }

    /// Store or replace a transform.
    pub fn set_transform(
        &self,
        name: &TransformName,
        entry: TransformEntry,
    ) -> Result<(), ServerError> {
        let mut transforms = self.transforms.write().map_err(|e| unavailable(&e.to_string()))?;
        // A stored inverse would shadow the new value on lookup.
        transforms.remove(&name.inverse());
        transforms.insert(name.clone(), entry);
        debug!(transform = %name, "Transform updated");
        Ok(())
    }

    /// Look up a transform, inverting the opposite one if only that is stored.
    pub fn get_transform(&self, name: &TransformName) -> Result<TransformEntry, ServerError> {
        if name.from == name.to {
            return Ok(TransformEntry::new(IDENTITY));
        }

        let transforms = self.transforms.read().map_err(|e| unavailable(&e.to_string()))?;
        if let Some(entry) = transforms.get(name) {
            return Ok(entry.clone());
        }

        let inverse = transforms
            .get(&name.inverse())
            .ok_or_else(|| ServerError::Collaborator {
                kind: CollaboratorErrorKind::TransformNotFound {
                    name: name.to_string(),
                },
            })?;
        let matrix = invert(&inverse.matrix).ok_or_else(|| ServerError::Collaborator {
            kind: CollaboratorErrorKind::SingularTransform {
                name: name.inverse().to_string(),
            },
        })?;

        Ok(TransformEntry {
            matrix,
            ..inverse.clone()
        })
    }

    /// Names of the stored transforms, sorted.
    pub fn transform_names(&self) -> Result<Vec<String>, ServerError> {
        let transforms = self.transforms.read().map_err(|e| unavailable(&e.to_string()))?;
        let mut names: Vec<String> = transforms.keys().map(ToString::to_string).collect();
        names.sort();
        Ok(names)
    }
}

fn unavailable(message: &str) -> ServerError {
    ServerError::Collaborator {
        kind: CollaboratorErrorKind::Unavailable {
            message: format!("transform store lock poisoned: {}", message),
        },
    }
}

/// Build a matrix from exactly 16 row-major values.
pub fn matrix_from_slice(values: &[f64]) -> Option<Matrix4> {
    values.try_into().ok()
}

/// Invert a 4x4 matrix with Gauss-Jordan elimination.
///
/// Returns `None` for singular matrices.
pub fn invert(matrix: &Matrix4) -> Option<Matrix4> {
    let mut a = *matrix;
    let mut inv = IDENTITY;

    for col in 0..4 {
        let pivot = (col..4).max_by(|&x, &y| {
            a[x * 4 + col]
                .abs()
                .total_cmp(&a[y * 4 + col].abs())
        })?;
        if a[pivot * 4 + col].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..4 {
                a.swap(pivot * 4 + k, col * 4 + k);
                inv.swap(pivot * 4 + k, col * 4 + k);
            }
        }

        let p = a[col * 4 + col];
        for k in 0..4 {
            a[col * 4 + k] /= p;
            inv[col * 4 + k] /= p;
        }

        for row in 0..4 {
            if row == col {
                continue;
            }
            let factor = a[row * 4 + col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..4 {
                a[row * 4 + k] -= factor * a[col * 4 + k];
                inv[row * 4 + k] -= factor * inv[col * 4 + k];
            }
        }
    }

    Some(inv)
}
