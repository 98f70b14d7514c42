use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::activation::ActivationFunction;
use crate::config::ModelConfig;
use crate::error::Result;
use crate::layers::{Conv2d, Dense, Dropout, Layer, MaxPool2d, Padding};
use crate::math::gabor::{gabor_bank, GaborParams};
use crate::network::network::Sequential;
use crate::optim::OptimizerSpec;

/// The two network layouts a model can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    /// Three same-padded conv/ReLU/pool blocks, randomly initialised.
    ThreeBlock,
    /// Two valid-padded conv/ReLU/pool blocks, the first seeded with a
    /// Gabor filter bank.
    Gabor,
}

impl Architecture {
    pub fn for_config(config: &ModelConfig) -> Architecture {
        if config.with_gabor { Architecture::Gabor } else { Architecture::ThreeBlock }
    }

    pub fn default_optimizer(&self) -> OptimizerSpec {
        match self {
            Architecture::ThreeBlock => OptimizerSpec::nesterov_sgd(),
            Architecture::Gabor => OptimizerSpec::adam(),
        }
    }
}

/// Builds the network described by `config` with `num_classes` outputs.
///
/// Fails if the image is too small for the requested kernel/pool sizes.
pub fn build_network(config: &ModelConfig, num_classes: usize) -> Result<Sequential> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let input_shape = [config.nb_channel, config.img_rows as usize, config.img_cols as usize];
    let mut net = Sequential::new(&input_shape, config.seed);
    let kernel = config.kernel_size.as_tuple();
    let pool = config.pool_size.as_tuple();
    let filters = config.nb_filters;
    let architecture = Architecture::for_config(config);

    match architecture {
        Architecture::ThreeBlock => {
            let mut channels = config.nb_channel;
            for _ in 0..3 {
                net.push(Layer::Conv2d(Conv2d::new(channels, filters, kernel, Padding::Same, &mut rng)))?;
                net.push(Layer::activation(ActivationFunction::Relu))?;
                net.push(Layer::MaxPool2d(MaxPool2d::new(pool)))?;
                channels = filters;
            }
            net.push(Layer::Dropout(Dropout::new(config.dropout)))?;
        }
        Architecture::Gabor => {
            let bank = gabor_bank(filters, config.nb_channel, kernel.0, kernel.1, GaborParams::default());
            net.push(Layer::Conv2d(Conv2d::with_kernels(bank, Padding::Valid)))?;
            net.push(Layer::activation(ActivationFunction::Relu))?;
            net.push(Layer::MaxPool2d(MaxPool2d::new(pool)))?;

            net.push(Layer::Conv2d(Conv2d::new(filters, filters, kernel, Padding::Valid, &mut rng)))?;
            net.push(Layer::activation(ActivationFunction::Relu))?;
            net.push(Layer::MaxPool2d(MaxPool2d::new(pool)))?;
            net.push(Layer::Dropout(Dropout::new(0.5)))?;
        }
    }

    net.push(Layer::flatten())?;
    let flat = net.output_shape()[0];
    net.push(Layer::Dense(Dense::new(flat, config.hidden_units, &mut rng)))?;
    net.push(Layer::activation(ActivationFunction::Relu))?;
    net.push(Layer::Dropout(Dropout::new(0.5)))?;
    net.push(Layer::Dense(Dense::new(config.hidden_units, num_classes, &mut rng)))?;
    net.push(Layer::activation(config.activation_function))?;

    debug!(
        ?architecture,
        parameters = net.parameter_count(),
        "built network for {} classes",
        num_classes
    );
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CnnError;
    use crate::math::tensor::Tensor;

    fn small_config(with_gabor: bool) -> ModelConfig {
        let mut config = ModelConfig::new("arch");
        config.img_rows = 16;
        config.img_cols = 16;
        config.nb_channel = 1;
        config.nb_filters = 4;
        config.hidden_units = 8;
        config.with_gabor = with_gabor;
        config
    }

    #[test]
    fn three_block_layout() {
        let net = build_network(&small_config(false), 3).unwrap();
        // 3 × (conv, relu, pool) + dropout + flatten + dense, relu, dropout, dense, act
        assert_eq!(net.layers.len(), 9 + 1 + 1 + 5);
        assert_eq!(net.output_shape(), &[3]);
        // 16 → 8 → 4 → 2, four filters
        let flatten_in = 4 * 2 * 2;
        match &net.layers[11] {
            Layer::Dense(d) => assert_eq!(d.input_size, flatten_in),
            other => panic!("expected dense, got {:?}", other.describe()),
        }
    }

    #[test]
    fn gabor_layout_seeds_first_kernel() {
        let config = small_config(true);
        let net = build_network(&config, 2).unwrap();
        match &net.layers[0] {
            Layer::Conv2d(conv) => {
                assert_eq!(conv.padding, Padding::Valid);
                let expected = crate::math::gabor::gabor_kernel(3, 3, GaborParams::default());
                assert_eq!(&conv.weights.data[0..9], expected.as_slice());
            }
            other => panic!("expected conv, got {:?}", other.describe()),
        }
        // 16 → 14 → 7 → 5 → 2
        match &net.layers[8] {
            Layer::Dense(d) => assert_eq!(d.input_size, 4 * 2 * 2),
            other => panic!("expected dense, got {:?}", other.describe()),
        }
    }

    #[test]
    fn output_is_a_distribution() {
        let mut net = build_network(&small_config(false), 2).unwrap();
        let out = net.predict(Tensor::zeros(&[1, 16, 16]));
        assert!((out.data.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn too_small_image_is_a_shape_error() {
        let mut config = small_config(false);
        config.img_rows = 4;
        config.img_cols = 4;
        assert!(matches!(build_network(&config, 2), Err(CnnError::Shape(_))));
    }

    #[test]
    fn same_seed_same_weights() {
        let a = build_network(&small_config(false), 2).unwrap();
        let b = build_network(&small_config(false), 2).unwrap();
        assert_eq!(a.export_weights(), b.export_weights());
    }

    #[test]
    fn default_optimizers() {
        assert!(matches!(Architecture::ThreeBlock.default_optimizer(), OptimizerSpec::Sgd { nesterov: true, .. }));
        assert!(matches!(Architecture::Gabor.default_optimizer(), OptimizerSpec::Adam { .. }));
    }
}
