//! Checkpoint output: the two weighting networks' parameters, written
//! once at training completion, plus the run configuration for
//! provenance.

use std::path::{Path, PathBuf};

use candle_nn::VarMap;
use lexi_core::LexiError;
use tracing::info;

use crate::trainer::TrainerConfig;

/// Fixed checkpoint filename under the run's output directory.
pub const CHECKPOINT_FILE: &str = "weighting_nets.safetensors";

/// Fixed run-configuration filename written next to the checkpoint.
pub const RUN_CONFIG_FILE: &str = "run_config.json";

/// Saves both weighting networks (one `VarMap`, `attr.*` and `obj.*`
/// prefixes) to the fixed path under `output_dir`, creating the directory
/// if needed, and records the run configuration beside it.
///
/// # Errors
///
/// Returns [`LexiError::Checkpoint`] if the directory cannot be created
/// or either file cannot be written.
pub fn save_checkpoint(
    var_map: &VarMap,
    config: &TrainerConfig,
    output_dir: &Path,
) -> Result<PathBuf, LexiError> {
    std::fs::create_dir_all(output_dir).map_err(|e| LexiError::Checkpoint {
        message: format!("cannot create output dir {}: {e}", output_dir.display()),
    })?;

    let path = output_dir.join(CHECKPOINT_FILE);
    var_map.save(&path).map_err(|e| LexiError::Checkpoint {
        message: format!("cannot save weighting networks to {}: {e}", path.display()),
    })?;

    let config_json =
        serde_json::to_string_pretty(config).map_err(|e| LexiError::Checkpoint {
            message: format!("cannot serialize run config: {e}"),
        })?;
    std::fs::write(output_dir.join(RUN_CONFIG_FILE), config_json).map_err(|e| {
        LexiError::Checkpoint {
            message: format!("cannot write run config: {e}"),
        }
    })?;

    info!(path = %path.display(), "checkpoint written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarBuilder;
    use lexi_gate::WeightNet;

    #[test]
    fn writes_checkpoint_and_run_config() {
        let dir = tempfile::tempdir().unwrap();
        let device = Device::Cpu;
        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, &device);
        let _attr = WeightNet::new(vb.pp("attr"), 8, 16).unwrap();
        let _obj = WeightNet::new(vb.pp("obj"), 8, 16).unwrap();

        let config = TrainerConfig::default();
        let path = save_checkpoint(&var_map, &config, dir.path()).unwrap();

        assert!(path.exists());
        assert!(dir.path().join(RUN_CONFIG_FILE).exists());

        // Both parameter sets land in the one file
        let loaded =
            candle_core::safetensors::load(&path, &Device::Cpu).unwrap();
        assert!(loaded.keys().any(|k| k.starts_with("attr.")));
        assert!(loaded.keys().any(|k| k.starts_with("obj.")));
    }

    #[test]
    fn unwritable_dir_is_checkpoint_error() {
        let var_map = VarMap::new();
        let config = TrainerConfig::default();
        let err = save_checkpoint(
            &var_map,
            &config,
            Path::new("/proc/no-such-dir/out"),
        );
        assert!(matches!(err, Err(LexiError::Checkpoint { .. })));
    }
}
