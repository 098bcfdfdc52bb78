// src/config/options.rs

//! Final run options: CLI flags layered over the settings file layered over
//! built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::CliArgs;
use crate::config::loader::load_settings;
use crate::config::model::{LayoutSection, Settings, SgeSection};
use crate::errors::{BatchdagError, Result};
use crate::types::RunMode;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub outdir: PathBuf,
    pub cfg: PathBuf,
    pub local: PathBuf,
    pub mode: RunMode,
    pub threshold: usize,
    pub sge: SgeSection,
    pub layout: LayoutSection,
    /// `Some` when local units should sleep instead of running scripts.
    pub dry_run: Option<Duration>,
    /// The invocation, recorded in `run.sh`.
    pub argv: Vec<String>,
}

impl RunOptions {
    /// Resolve options from parsed flags.
    ///
    /// Returns `Ok(None)` when `--input` or `--outdir` is missing; the
    /// caller prints usage and exits successfully.
    pub fn resolve(args: &CliArgs, exe_dir: &Path, argv: Vec<String>) -> Result<Option<Self>> {
        let settings = match args.settings.as_deref() {
            Some(path) => load_settings(path)?,
            None => Settings::default(),
        };
        Self::merge(args, settings, exe_dir, argv)
    }

    pub fn merge(
        args: &CliArgs,
        settings: Settings,
        exe_dir: &Path,
        argv: Vec<String>,
    ) -> Result<Option<Self>> {
        let (Some(input), Some(outdir)) = (args.input.clone(), args.outdir.clone()) else {
            return Ok(None);
        };

        let threshold = args.threshold.unwrap_or(settings.run.threshold);
        if threshold == 0 {
            return Err(BatchdagError::ConfigError(
                "threshold must be at least 1".to_string(),
            ));
        }

        let mut sge = settings.sge;
        sge.cwd |= args.cwd;
        if args.project.is_some() {
            sge.project = args.project.clone();
        }
        if args.queue.is_some() {
            sge.queue = args.queue.clone();
        }

        Ok(Some(Self {
            input,
            outdir,
            cfg: args
                .cfg
                .clone()
                .unwrap_or_else(|| exe_dir.join("etc").join("allSteps.tsv")),
            local: args.local.clone().unwrap_or_else(|| exe_dir.to_path_buf()),
            mode: args.mode.unwrap_or(settings.run.mode),
            threshold,
            sge,
            layout: settings.layout,
            dry_run: args
                .dry_run
                .then(|| Duration::from_millis(settings.run.dry_run_sleep_ms)),
            argv,
        }))
    }
}

/// Directory holding the running executable.
pub fn exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CliArgs {
        CliArgs {
            input: Some(PathBuf::from("in.tsv")),
            outdir: Some(PathBuf::from("/out")),
            ..CliArgs::default()
        }
    }

    #[test]
    fn missing_input_or_outdir_yields_none() {
        let mut a = args();
        a.outdir = None;
        let opts = RunOptions::merge(&a, Settings::default(), Path::new("/opt/bd"), Vec::new()).unwrap();
        assert!(opts.is_none());
    }

    #[test]
    fn defaults_come_from_exe_dir_and_settings() {
        let opts = RunOptions::merge(&args(), Settings::default(), Path::new("/opt/bd"), Vec::new())
            .unwrap()
            .unwrap();
        assert_eq!(opts.cfg, PathBuf::from("/opt/bd/etc/allSteps.tsv"));
        assert_eq!(opts.local, PathBuf::from("/opt/bd"));
        assert_eq!(opts.mode, RunMode::Local);
        assert_eq!(opts.threshold, 12);
        assert!(opts.dry_run.is_none());
    }

    #[test]
    fn flags_override_settings() {
        let settings: Settings = toml::from_str(
            r#"
            [run]
            mode = "sge"
            threshold = 4
            dry_run_sleep_ms = 50

            [sge]
            queue = "a.q"
            "#,
        )
        .unwrap();

        let mut a = args();
        a.threshold = Some(2);
        a.queue = Some("b.q".to_string());
        a.dry_run = true;

        let opts = RunOptions::merge(&a, settings, Path::new("/opt/bd"), Vec::new())
            .unwrap()
            .unwrap();
        assert_eq!(opts.mode, RunMode::Sge);
        assert_eq!(opts.threshold, 2);
        assert_eq!(opts.sge.queue.as_deref(), Some("b.q"));
        assert_eq!(opts.dry_run, Some(Duration::from_millis(50)));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut a = args();
        a.threshold = Some(0);
        let err = RunOptions::merge(&a, Settings::default(), Path::new("/"), Vec::new()).unwrap_err();
        assert!(matches!(err, BatchdagError::ConfigError(_)));
    }
}
