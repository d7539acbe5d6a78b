//! Turns a parameter list discovered at runtime into operator prompts.

use crate::mcp::capabilities::ParamDescriptor;
use crate::ui::operator::{Operator, OperatorError};
use std::collections::BTreeMap;

/// Raw operator answers keyed by parameter name.
pub type ArgumentMap = BTreeMap<String, String>;

pub fn prompt_for(param: &ParamDescriptor) -> String {
    if param.optional {
        format!("Enter a value for {} ({}, optional)", param.name, param.kind)
    } else {
        format!("Enter a value for {} ({})", param.name, param.kind)
    }
}

/// Asks once per parameter, in order. Answers are kept verbatim; the server
/// is the one to reject a value that does not fit the declared type.
pub async fn collect(
    operator: &dyn Operator,
    params: &[ParamDescriptor],
) -> Result<ArgumentMap, OperatorError> {
    let mut arguments = ArgumentMap::new();
    for param in params {
        let value = operator.input(&prompt_for(param)).await?;
        arguments.insert(param.name.clone(), value);
    }
    Ok(arguments)
}
