use std::path::Path;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, VarBuilder};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{resolve_checkpoint, CheckpointFormat};
use crate::{Error, Result};

/// File read from the checkpoint directory to override the network shape.
pub const GENERATOR_CONFIG_FILE: &str = "generator.json";

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Channels of person and clothing stacked together.
    pub input_nc: usize,
    pub output_nc: usize,
    pub ngf: usize,
    pub num_blocks: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            input_nc: 6,
            output_nc: 3,
            ngf: 64,
            num_blocks: 6,
        }
    }
}

impl GeneratorConfig {
    /// Reads `generator.json` from `dir`, falling back to the defaults when
    /// the file is absent.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(GENERATOR_CONFIG_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|source| Error::Config { path, source })
    }
}

/// Anything that turns a (person, clothing) pair into a try-on image.
///
/// Inputs and output are `(1, 3, H, W)` tensors; the output lies in `[-1, 1]`.
pub trait TryOnModel: Send + Sync {
    fn run(&self, person: &Tensor, clothing: &Tensor) -> Result<Tensor>;

    fn device(&self) -> &Device;
}

pub trait Loader {
    type Model: TryOnModel;

    fn load(checkpoint: &Path, config: &GeneratorConfig, device: &Device) -> Result<Self::Model>
    where
        Self: Sized;
}

fn conv3x3(in_c: usize, out_c: usize, vb: VarBuilder) -> candle_core::Result<Conv2d> {
    let cfg = Conv2dConfig {
        padding: 1,
        ..Default::default()
    };
    candle_nn::conv2d(in_c, out_c, 3, cfg, vb)
}

struct ResBlock {
    conv1: Conv2d,
    conv2: Conv2d,
}

impl ResBlock {
    fn new(channels: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            conv1: conv3x3(channels, channels, vb.pp("conv1"))?,
            conv2: conv3x3(channels, channels, vb.pp("conv2"))?,
        })
    }
}

impl Module for ResBlock {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let ys = self.conv1.forward(xs)?.relu()?;
        let ys = self.conv2.forward(&ys)?;
        xs + ys
    }
}

pub struct Generator {
    device: Device,
    head: Conv2d,
    blocks: Vec<ResBlock>,
    tail: Conv2d,
}

impl Generator {
    pub fn new(config: &GeneratorConfig, vb: VarBuilder) -> Result<Self> {
        let device = vb.device().clone();
        let head = conv3x3(config.input_nc, config.ngf, vb.pp("head"))?;
        let blocks = (0..config.num_blocks)
            .map(|i| ResBlock::new(config.ngf, vb.pp("blocks").pp(i)))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let tail = conv3x3(config.ngf, config.output_nc, vb.pp("tail"))?;
        Ok(Self {
            device,
            head,
            blocks,
            tail,
        })
    }

    pub fn forward(&self, person: &Tensor, clothing: &Tensor) -> Result<Tensor> {
        let xs = Tensor::cat(&[person, clothing], 1)?;
        let mut xs = self.head.forward(&xs)?.relu()?;
        for block in &self.blocks {
            xs = block.forward(&xs)?;
        }
        let xs = self.tail.forward(&xs.relu()?)?;
        Ok(xs.tanh()?)
    }
}

impl TryOnModel for Generator {
    fn run(&self, person: &Tensor, clothing: &Tensor) -> Result<Tensor> {
        self.forward(person, clothing)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

pub struct GeneratorLoader;

impl Loader for GeneratorLoader {
    type Model = Generator;

    fn load(checkpoint: &Path, config: &GeneratorConfig, device: &Device) -> Result<Self::Model> {
        let (dir, name) = match (checkpoint.parent(), checkpoint.file_name()) {
            (Some(dir), Some(name)) => (dir, name.to_string_lossy()),
            _ => {
                return Err(Error::CheckpointNotFound {
                    path: checkpoint.to_path_buf(),
                })
            }
        };
        let path = resolve_checkpoint(dir, &name)?;

        let vb = match CheckpointFormat::from_path(&path) {
            Some(CheckpointFormat::SafeTensors) => unsafe {
                VarBuilder::from_mmaped_safetensors(&[&path], DType::F32, device)?
            },
            Some(CheckpointFormat::Pickle) => VarBuilder::from_pth(&path, DType::F32, device)?,
            None => return Err(Error::UnsupportedCheckpoint { path }),
        };

        tracing::info!(checkpoint = %path.display(), ?config, "loading generator");
        Generator::new(config, vb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;

    fn tiny() -> GeneratorConfig {
        GeneratorConfig {
            ngf: 4,
            num_blocks: 2,
            ..Default::default()
        }
    }

    #[test]
    fn forward_preserves_spatial_size() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let generator = Generator::new(&tiny(), vb).unwrap();

        let person = Tensor::zeros((1, 3, 12, 16), DType::F32, &device).unwrap();
        let clothing = Tensor::ones((1, 3, 12, 16), DType::F32, &device).unwrap();
        let out = generator.run(&person, &clothing).unwrap();
        assert_eq!(out.dims(), &[1, 3, 12, 16]);

        let values = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn loads_saved_safetensors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.safetensors");
        let device = Device::Cpu;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        Generator::new(&tiny(), vb).unwrap();
        varmap.save(&path).unwrap();

        let generator = GeneratorLoader::load(&path, &tiny(), &device).unwrap();
        assert!(generator.device().is_cpu());
    }

    #[test]
    fn missing_checkpoint_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.pkl");
        let err = GeneratorLoader::load(&path, &tiny(), &Device::Cpu)
            .err()
            .unwrap();
        assert!(matches!(err, Error::CheckpointNotFound { .. }));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.bin");
        std::fs::write(&path, b"weights").unwrap();
        let err = GeneratorLoader::load(&path, &tiny(), &Device::Cpu)
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnsupportedCheckpoint { .. }));
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            GeneratorConfig::from_dir(dir.path()).unwrap(),
            GeneratorConfig::default()
        );

        std::fs::write(
            dir.path().join(GENERATOR_CONFIG_FILE),
            r#"{"ngf": 8, "num_blocks": 1}"#,
        )
        .unwrap();
        let config = GeneratorConfig::from_dir(dir.path()).unwrap();
        assert_eq!(config.ngf, 8);
        assert_eq!(config.num_blocks, 1);
        assert_eq!(config.input_nc, 6);

        std::fs::write(dir.path().join(GENERATOR_CONFIG_FILE), "{").unwrap();
        assert!(matches!(
            GeneratorConfig::from_dir(dir.path()),
            Err(Error::Config { .. })
        ));
    }
}
