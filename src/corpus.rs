//! Model corpus processing
//!
//! Each model assertion in the corpus directory is built into a disk image
//! in its own scratch workdir, then verified. Models run one after another.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::Config;
use crate::error::MountckError;
use crate::exe::{CommandRunner, Invocation};
use crate::gadget::Gadget;
use crate::summary::RunSummary;
use crate::verify::{verify_image, ModelResult};

/// Model assertion files in `dir`, sorted by file name
pub fn discover_models(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, MountckError> {
    if !dir.is_dir() {
        return Err(MountckError::file_not_found(dir));
    }

    let mut models = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| MountckError::from(e).with_path(dir))? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(suffix));
        if matches && path.is_file() {
            models.push(path);
        }
    }
    models.sort();
    Ok(models)
}

pub fn build_command(config: &Config, workdir: &Path, model: &Path) -> Invocation {
    Invocation::new(&config.tools.builder)
        .arg("--channel")
        .arg(&config.channel)
        .arg("--workdir")
        .arg(workdir)
        .arg(model)
}

/// Name a model is reported under
pub fn model_name(model: &Path) -> String {
    model
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| model.display().to_string())
}

/// Build one model in a scratch workdir and verify the resulting image
pub fn verify_model(
    runner: &dyn CommandRunner,
    config: &Config,
    model: &Path,
) -> Result<ModelResult, MountckError> {
    let name = model_name(model);
    let workdir = tempfile::Builder::new()
        .prefix("mountck-")
        .tempdir_in(&config.mount_root)
        .map_err(|e| MountckError::from(e).with_path(&config.mount_root))?;

    info!("{}: building image in {}", name, workdir.path().display());
    let output = runner.run(&build_command(config, workdir.path(), model))?;
    if !output.success() {
        // the image files decide, not the builder's exit status
        warn!("{}: image builder {}", name, output.explain_exit());
    }

    let gadget = Gadget::load(&config.gadget_yaml_in(workdir.path()))?;
    let (volume_name, volume) = gadget.single_volume()?;
    info!("{}: verifying volume {}", name, volume_name);

    verify_image(
        runner,
        config,
        &name,
        volume,
        &config.disk_image_in(workdir.path()),
    )
}

/// Verify every model in `dir`, handing each result to `report` as soon as
/// it is known.
pub fn run_corpus(
    runner: &dyn CommandRunner,
    config: &Config,
    dir: &Path,
    report: &mut dyn FnMut(&ModelResult),
) -> Result<RunSummary, MountckError> {
    let models = discover_models(dir, &config.model_suffix)?;
    if models.is_empty() {
        warn!("No *{} files found in {}", config.model_suffix, dir.display());
    }

    let mut summary = RunSummary::new();
    for model in &models {
        let result = verify_model(runner, config, model)?;
        report(&result);
        summary.record(&result);
    }
    Ok(summary)
}
