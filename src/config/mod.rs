//! Render configuration
//!
//! Values are resolved in three layers, later layers winning:
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, or `latex2image.toml` in the working directory)
//! 3. CLI flags
//!
//! ```toml
//! cache_root = ".bookbuilder/images"
//! dpi = 300
//! compiler = "/usr/local/texlive/2024/bin/x86_64-linux/pdflatex"
//! compiler_timeout_seconds = 120
//! workers = 8
//! templates_dir = "templates"
//! image_base_url = "images"
//!
//! [rasterizer]
//! kind = "pdftoppm"
//! ```

mod defaults;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use latex2image_text::Fingerprint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::RenderCache;
use crate::driver::{Driver, ProcessBackend};
use crate::report::Reporter;
use crate::rewrite::image_src;
use crate::template::{TemplateError, TemplateSet};
use crate::toolchain::{resolve_compiler, Rasterizer, RasterizerKind};

pub use defaults::{
    DEFAULT_COMPILER_TIMEOUT_SECONDS, DEFAULT_IMAGE_BASE_URL, MAX_DPI, PROJECT_CONFIG_FILE,
};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("failed to parse config {path}: {error}")]
    Parse {
        path: PathBuf,
        #[source]
        error: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Validation(String),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Rasterizer selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RasterizerConfig {
    pub kind: RasterizerKind,
    /// Program to run instead of the kind's default (`convert` or `pdftoppm`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,
}

impl RasterizerConfig {
    pub fn rasterizer(&self) -> Rasterizer {
        Rasterizer::new(self.kind, self.program.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub cache_root: PathBuf,
    pub dpi: u32,
    /// Explicit compiler; skips `LATEX_PATH`/`PATH` discovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<PathBuf>,
    /// 0 disables the timeout
    pub compiler_timeout_seconds: u64,
    pub rasterizer: RasterizerConfig,
    pub workers: usize,
    /// Directory of `<kind>.tex` template overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,
    pub image_base_url: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cache_root: defaults::cache_root(),
            dpi: defaults::dpi(),
            compiler: None,
            compiler_timeout_seconds: defaults::compiler_timeout_seconds(),
            rasterizer: RasterizerConfig::default(),
            workers: defaults::workers(),
            templates_dir: None,
            image_base_url: defaults::image_base_url(),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub cache_root: Option<PathBuf>,
    pub dpi: Option<u32>,
    pub compiler: Option<PathBuf>,
    pub compiler_timeout_seconds: Option<u64>,
    pub rasterizer: Option<RasterizerKind>,
    pub workers: Option<usize>,
    pub templates_dir: Option<PathBuf>,
}

impl RenderConfig {
    /// Parse and validate TOML text. `origin` names the source in errors.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|error| ConfigError::Parse {
            path: origin.to_path_buf(),
            error,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let config = Self::from_toml_str(&text, path)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load `explicit` if given, else the project file in `dir` if present,
    /// else defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let project = dir.join(PROJECT_CONFIG_FILE);
        if project.is_file() {
            return Self::load(&project);
        }
        Ok(Self::default())
    }

    /// Apply CLI overrides and re-validate.
    pub fn apply(&mut self, overrides: &ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(ref cache_root) = overrides.cache_root {
            self.cache_root = cache_root.clone();
        }
        if let Some(dpi) = overrides.dpi {
            self.dpi = dpi;
        }
        if let Some(ref compiler) = overrides.compiler {
            self.compiler = Some(compiler.clone());
        }
        if let Some(seconds) = overrides.compiler_timeout_seconds {
            self.compiler_timeout_seconds = seconds;
        }
        if let Some(kind) = overrides.rasterizer {
            if kind != self.rasterizer.kind {
                self.rasterizer = RasterizerConfig { kind, program: None };
            }
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        if let Some(ref dir) = overrides.templates_dir {
            self.templates_dir = Some(dir.clone());
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dpi == 0 || self.dpi > MAX_DPI {
            return Err(ConfigError::Validation(format!(
                "dpi must be in 1..={MAX_DPI}, got {}",
                self.dpi
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Validation("workers must be at least 1".to_string()));
        }
        if self.cache_root.as_os_str().is_empty() {
            return Err(ConfigError::Validation("cache_root must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn compiler_timeout(&self) -> Option<Duration> {
        match self.compiler_timeout_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }

    /// Built-in templates plus any overrides from `templates_dir`.
    pub fn templates(&self) -> Result<TemplateSet, ConfigError> {
        match &self.templates_dir {
            Some(dir) => Ok(TemplateSet::load_dir(dir)?),
            None => Ok(TemplateSet::builtin()),
        }
    }

    /// URL an element should reference for a rendered fingerprint.
    pub fn image_src(&self, fingerprint: &Fingerprint) -> String {
        image_src(&self.image_base_url, &fingerprint.file_name("png"))
    }

    /// Backend running the real toolchain, with the compiler resolved now.
    pub fn process_backend(&self) -> ProcessBackend {
        ProcessBackend::new(resolve_compiler(self.compiler.clone()))
            .with_rasterizer(self.rasterizer.rasterizer())
            .with_timeout(self.compiler_timeout())
    }

    /// A render cache wired to the real toolchain.
    pub fn build_cache(
        &self,
        reporter: Arc<dyn Reporter>,
    ) -> Result<RenderCache<ProcessBackend>, ConfigError> {
        let driver = Driver::new(self.process_backend()).with_dpi(self.dpi);
        Ok(RenderCache::new(&self.cache_root, driver)
            .with_templates(self.templates()?)
            .with_reporter(reporter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.cache_root, PathBuf::from(".bookbuilder/images"));
        assert_eq!(config.dpi, 300);
        assert_eq!(config.compiler, None);
        assert_eq!(config.compiler_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.rasterizer.kind, RasterizerKind::Imagemagick);
        assert!(config.workers >= 1);
        assert_eq!(config.image_base_url, "images");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = RenderConfig::from_toml_str("dpi = 150\n", Path::new("x.toml")).unwrap();
        assert_eq!(config.dpi, 150);
        assert_eq!(config.cache_root, PathBuf::from(".bookbuilder/images"));
    }

    #[test]
    fn test_full_file() {
        let text = r#"
cache_root = "/srv/cache"
dpi = 600
compiler = "/opt/tex/bin/pdflatex"
compiler_timeout_seconds = 0
workers = 2
templates_dir = "tpl"
image_base_url = "/static/img"

[rasterizer]
kind = "pdftoppm"
program = "/usr/bin/pdftoppm"
"#;
        let config = RenderConfig::from_toml_str(text, Path::new("x.toml")).unwrap();
        assert_eq!(config.cache_root, PathBuf::from("/srv/cache"));
        assert_eq!(config.compiler_timeout(), None);
        assert_eq!(config.workers, 2);
        assert_eq!(
            config.rasterizer.rasterizer(),
            Rasterizer::new(RasterizerKind::Pdftoppm, Some(PathBuf::from("/usr/bin/pdftoppm")))
        );
    }

    #[test]
    fn test_image_src_uses_configured_base() {
        let fp = latex2image_text::fingerprint_str("x");
        let config = RenderConfig::default();
        assert_eq!(config.image_src(&fp), format!("images/{fp}.png"));

        let config =
            RenderConfig::from_toml_str("image_base_url = \"/static/img/\"\n", Path::new("x.toml"))
                .unwrap();
        assert_eq!(config.image_src(&fp), format!("/static/img/{fp}.png"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = RenderConfig::from_toml_str("dpii = 300\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == Path::new("bad.toml")));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        for text in ["dpi = 0", "dpi = 5000", "workers = 0", "cache_root = \"\""] {
            let err = RenderConfig::from_toml_str(text, Path::new("x.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{text}");
        }
    }

    #[test]
    fn test_overrides_win() {
        let mut config = RenderConfig::from_toml_str(
            "dpi = 150\n[rasterizer]\nkind = \"imagemagick\"\nprogram = \"/opt/magick\"\n",
            Path::new("x.toml"),
        )
        .unwrap();
        config
            .apply(&ConfigOverrides {
                dpi: Some(72),
                workers: Some(3),
                rasterizer: Some(RasterizerKind::Pdftoppm),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.dpi, 72);
        assert_eq!(config.workers, 3);
        assert_eq!(config.rasterizer.rasterizer().program, PathBuf::from("pdftoppm"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut config = RenderConfig::default();
        let result = config.apply(&ConfigOverrides {
            dpi: Some(0),
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_discover_prefers_explicit_then_project_file() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(
            RenderConfig::discover(None, temp_dir.path()).unwrap(),
            RenderConfig::default()
        );

        fs::write(temp_dir.path().join(PROJECT_CONFIG_FILE), "dpi = 200\n").unwrap();
        assert_eq!(RenderConfig::discover(None, temp_dir.path()).unwrap().dpi, 200);

        let explicit = temp_dir.path().join("other.toml");
        fs::write(&explicit, "dpi = 100\n").unwrap();
        assert_eq!(
            RenderConfig::discover(Some(&explicit), temp_dir.path()).unwrap().dpi,
            100
        );
    }

    #[test]
    fn test_missing_explicit_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        assert!(matches!(
            RenderConfig::discover(Some(&missing), temp_dir.path()),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_templates_dir_loaded() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("equation.tex"), "E __CODE__").unwrap();
        let config = RenderConfig {
            templates_dir: Some(temp_dir.path().to_path_buf()),
            ..RenderConfig::default()
        };
        let templates = config.templates().unwrap();
        assert_eq!(
            templates.get(latex2image_text::PictureKind::Equation),
            Some("E __CODE__")
        );
    }
}
