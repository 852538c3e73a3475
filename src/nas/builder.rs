//! Stock model function for dense architectures

use super::action::ActionValue;
use crate::error::{KolosalError, Result};
use crate::network::{Activation, Sequential};

/// Builds a dense network from `(units, activation)` action pairs.
///
/// Each pair adds one hidden layer; a softmax layer over `num_classes`
/// always closes the network.
#[derive(Debug, Clone)]
pub struct DenseActionBuilder {
    pub input_dim: usize,
    pub num_classes: usize,
    pub seed: Option<u64>,
}

impl DenseActionBuilder {
    pub fn new(input_dim: usize, num_classes: usize) -> Self {
        Self {
            input_dim,
            num_classes,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Model function suitable for [`NetworkManager::get_rewards`](super::NetworkManager::get_rewards)
    pub fn build(&self, actions: &[ActionValue]) -> Result<Sequential> {
        if actions.len() % 2 != 0 {
            return Err(KolosalError::invalid_param(
                "actions",
                actions.len(),
                "expected (units, activation) pairs",
            ));
        }
        if self.num_classes < 2 {
            return Err(KolosalError::invalid_param(
                "num_classes",
                self.num_classes,
                "need at least two classes",
            ));
        }

        let mut model = Sequential::new(self.input_dim);
        if let Some(seed) = self.seed {
            model = model.with_seed(seed);
        }

        for pair in actions.chunks(2) {
            let units = match pair[0].as_int() {
                Some(u) if u > 0 => u as usize,
                _ => {
                    return Err(KolosalError::invalid_param(
                        "units",
                        &pair[0],
                        "must be a positive integer",
                    ))
                }
            };
            let activation: Activation = pair[1].to_string().parse()?;
            model = model.add(units, activation);
        }

        Ok(model.add(self.num_classes, Activation::Softmax))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nas::action::parse_actions;

    #[test]
    fn test_build_from_pairs() {
        let builder = DenseActionBuilder::new(4, 3).with_seed(1);
        let model = builder.build(&parse_actions("16,relu,8,tanh").unwrap()).unwrap();

        assert_eq!(model.layers().len(), 3);
        assert_eq!(model.layers()[0].units(), 16);
        assert_eq!(model.layers()[1].activation(), Activation::Tanh);
        assert_eq!(model.output_dim(), 3);
    }

    #[test]
    fn test_empty_actions_is_softmax_regression() {
        let model = DenseActionBuilder::new(4, 2).build(&[]).unwrap();
        assert_eq!(model.layers().len(), 1);
        assert_eq!(model.num_params(), 4 * 2 + 2);
    }

    #[test]
    fn test_odd_action_count() {
        let result = DenseActionBuilder::new(4, 2).build(&parse_actions("16,relu,8").unwrap());
        assert!(matches!(result, Err(KolosalError::InvalidParameter { .. })));
    }

    #[test]
    fn test_non_positive_units() {
        let result = DenseActionBuilder::new(4, 2).build(&parse_actions("0,relu").unwrap());
        assert!(matches!(result, Err(KolosalError::InvalidParameter { .. })));
    }

    #[test]
    fn test_unknown_activation() {
        let result = DenseActionBuilder::new(4, 2).build(&parse_actions("8,swish").unwrap());
        assert!(matches!(result, Err(KolosalError::InvalidParameter { .. })));
    }
}
