use std::path::PathBuf;

use clap::Parser;
use viton_core::{checkpoint_dir, DeviceMap, Resolution, DEFAULT_CHECKPOINT};

// Define command line arguments
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "VITON try-on inference server")]
pub struct Args {
    /// Directory of the external model; checkpoints live in `<root>/checkpoints`
    #[arg(long, env = "VITON_HD_PATH", default_value = "./VITON-HD")]
    pub model_root: PathBuf,

    /// Checkpoint file loaded from the checkpoint directory
    #[arg(long, env = "VITON_CHECKPOINT", default_value = DEFAULT_CHECKPOINT)]
    pub checkpoint: String,

    /// Host address to bind the server to
    #[arg(long, env = "VITON_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the server to
    #[arg(long, env = "VITON_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Verbose logging
    #[arg(long, env = "VITON_DEBUG")]
    pub debug: bool,

    /// Use CPU instead of GPU
    #[arg(long, env = "VITON_CPU")]
    pub cpu: bool,

    /// Width every upload is resized to
    #[arg(
        long,
        env = "VITON_WIDTH",
        default_value_t = 1024,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub width: u32,

    /// Height every upload is resized to
    #[arg(
        long,
        env = "VITON_HEIGHT",
        default_value_t = 768,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub height: u32,

    /// Largest accepted request body
    #[arg(long, env = "VITON_MAX_UPLOAD_BYTES", default_value_t = 32 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl Args {
    pub fn checkpoint_dir(&self) -> PathBuf {
        checkpoint_dir(&self.model_root)
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    pub fn device_map(&self) -> DeviceMap {
        DeviceMap::from_cpu_flag(self.cpu)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
