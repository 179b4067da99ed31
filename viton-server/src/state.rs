use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::Device;
use tokio::sync::OnceCell;
use viton_core::{
    resolve_checkpoint, GeneratorConfig, GeneratorLoader, Loader, Resolution, TryOnModel,
};

/// Process-wide generator, loaded at most once.
pub struct ModelSlot {
    checkpoint_dir: PathBuf,
    checkpoint: String,
    device: Device,
    model: OnceCell<Arc<dyn TryOnModel>>,
}

impl ModelSlot {
    pub fn new(checkpoint_dir: PathBuf, checkpoint: String, device: Device) -> Self {
        Self {
            checkpoint_dir,
            checkpoint,
            device,
            model: OnceCell::new(),
        }
    }

    /// A slot that already holds `model`.
    pub fn preloaded(
        checkpoint_dir: PathBuf,
        checkpoint: String,
        model: Arc<dyn TryOnModel>,
    ) -> Self {
        let device = model.device().clone();
        Self {
            checkpoint_dir,
            checkpoint,
            device,
            model: OnceCell::new_with(Some(model)),
        }
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    pub fn checkpoint(&self) -> &str {
        &self.checkpoint
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Returns the loaded model, loading it first if needed. Concurrent
    /// callers share a single load; a failed load leaves the slot empty.
    pub async fn get_or_load(&self) -> anyhow::Result<Arc<dyn TryOnModel>> {
        let model = self.model.get_or_try_init(|| self.load()).await?;
        Ok(model.clone())
    }

    async fn load(&self) -> anyhow::Result<Arc<dyn TryOnModel>> {
        let dir = self.checkpoint_dir.clone();
        let name = self.checkpoint.clone();
        let device = self.device.clone();
        let model =
            tokio::task::spawn_blocking(move || load_generator(&dir, &name, &device)).await??;
        Ok(model)
    }
}

fn load_generator(
    dir: &Path,
    name: &str,
    device: &Device,
) -> viton_core::Result<Arc<dyn TryOnModel>> {
    tracing::info!("Loading VITON-HD model...");
    let path = resolve_checkpoint(dir, name)?;
    let config = GeneratorConfig::from_dir(dir)?;
    let model: Arc<dyn TryOnModel> = Arc::new(GeneratorLoader::load(&path, &config, device)?);
    tracing::info!("Model loaded successfully!");
    Ok(model)
}

pub struct AppState {
    pub model: ModelSlot,
    pub resolution: Resolution,
}

impl AppState {
    pub fn new(model: ModelSlot, resolution: Resolution) -> Self {
        Self { model, resolution }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::{VarBuilder, VarMap};
    use viton_core::{Generator, GENERATOR_CONFIG_FILE};

    fn write_checkpoint(dir: &Path, name: &str) {
        let config = GeneratorConfig {
            ngf: 4,
            num_blocks: 1,
            ..Default::default()
        };
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        Generator::new(&config, vb).unwrap();
        varmap.save(dir.join(name)).unwrap();
        std::fs::write(
            dir.join(GENERATOR_CONFIG_FILE),
            serde_json::to_string(&config).unwrap(),
        )
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_callers_share_one_model() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), "gen.safetensors");
        let slot = ModelSlot::new(
            dir.path().to_path_buf(),
            "gen.safetensors".into(),
            Device::Cpu,
        );
        assert!(!slot.is_loaded());

        let (a, b, c, d) = tokio::join!(
            slot.get_or_load(),
            slot.get_or_load(),
            slot.get_or_load(),
            slot.get_or_load(),
        );
        let first = a.unwrap();
        for other in [b.unwrap(), c.unwrap(), d.unwrap()] {
            assert!(Arc::ptr_eq(&first, &other));
        }
        assert!(slot.is_loaded());

        let again = slot.get_or_load().await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[tokio::test]
    async fn failed_load_leaves_slot_empty() {
        let dir = tempfile::tempdir().unwrap();
        let slot = ModelSlot::new(dir.path().to_path_buf(), "gen.pkl".into(), Device::Cpu);

        let err = slot.get_or_load().await.err().unwrap();
        assert!(err.to_string().contains("Model checkpoint not found"));
        assert!(!slot.is_loaded());
    }
}
