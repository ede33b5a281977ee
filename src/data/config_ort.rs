//! Options for building the ONNX Runtime session.

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOrt {
    pub onnx_path: String,
    /// Path to the ONNX Runtime shared library. Empty uses the library the
    /// process can already find (`ORT_DYLIB_PATH` or the system search path).
    pub ort_lib_path: String,
    pub intra_threads: usize,
    /// Graph optimization level, 0 (disabled) to 3 (all).
    pub optimization_level: u8,
    pub num_dry_run: usize,
}

impl Default for ConfigOrt {
    fn default() -> Self {
        Self {
            onnx_path: String::new(),
            ort_lib_path: String::new(),
            intra_threads: 1,
            optimization_level: 3,
            num_dry_run: 1,
        }
    }
}

impl ConfigOrt {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_model(mut self, onnx_path: &str) -> Result<Self> {
        if onnx_path.is_empty() {
            anyhow::bail!("Model path must not be empty");
        }
        self.onnx_path = onnx_path.to_string();
        Ok(self)
    }

    pub fn with_ort_lib_path(mut self, ort_lib_path: &str) -> Self {
        self.ort_lib_path = ort_lib_path.to_string();
        self
    }

    pub fn with_intra_threads(mut self, n: usize) -> Self {
        self.intra_threads = n.max(1);
        self
    }

    pub fn with_optimization_level(mut self, level: u8) -> Self {
        self.optimization_level = level.min(3);
        self
    }

    pub fn with_dry_run(mut self, n: usize) -> Self {
        self.num_dry_run = n;
        self
    }
}
