//! AE6MC model definitions.
//!
//! | Model | Outputs | Inputs |
//! |-------|---------|--------|
//! | AE6MC | 6       | 7      |

use ampctl_core::types::{AmplifierInfo, Dialect};

/// Static model definition for an AE6MC-family amplifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ae6mcModel {
    /// Human-readable model name.
    pub name: &'static str,
    /// Number of output zones.
    pub outputs: u8,
    /// Number of selectable inputs.
    pub inputs: u8,
}

impl Ae6mcModel {
    /// Describe this model running the given firmware dialect.
    pub fn info(&self, dialect: Dialect) -> AmplifierInfo {
        AmplifierInfo {
            model_name: self.name.to_string(),
            dialect,
            outputs: self.outputs,
            inputs: self.inputs,
        }
    }
}

/// The six-zone, seven-input AE6MC.
pub fn ae6mc() -> Ae6mcModel {
    Ae6mcModel {
        name: "AE6MC",
        outputs: 6,
        inputs: 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ae6mc_sizes() {
        let model = ae6mc();
        assert_eq!(model.outputs, 6);
        assert_eq!(model.inputs, 7);

        let info = model.info(Dialect::Legacy);
        assert_eq!(info.model_name, "AE6MC");
        assert_eq!(info.dialect, Dialect::Legacy);
        assert_eq!(info.outputs, 6);
    }
}
