use crate::config::default_sweep_orphans;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where records live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root holding the record list and the record folder.
    pub data_dir: PathBuf,
    /// Delete unreferenced audio files when the app starts.
    #[serde(default = "default_sweep_orphans")]
    pub sweep_orphans_on_startup: bool,
}
