//! Transform commands module.
//!
//! Read and update entries of the coordinate-transform store.

mod get;
mod update;

pub use get::GetTransformCommand;
pub use update::UpdateTransformCommand;

use crate::config_tree::ConfigElement;
use crate::error::ServerError;
use crate::transform::TransformName;

/// Read and parse the required `TransformName` attribute.
fn read_transform_name(config: &ConfigElement) -> Result<TransformName, ServerError> {
    let raw = config.required_attribute("TransformName")?;
    TransformName::parse(raw)
        .map_err(|e| ServerError::invalid_parameter("TransformName", e.to_string()))
}
