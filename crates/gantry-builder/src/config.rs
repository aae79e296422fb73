//! Build configuration.

use gantry_core::DIST_KEY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Static build configuration, usually read from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Job key naming the distribution.
    #[serde(default = "default_distribution_key")]
    pub distribution_key: String,
    /// Job keys forwarded as build arguments, in tag order.
    #[serde(default = "default_build_arg_keys")]
    pub build_arg_keys: Vec<String>,
    /// Build-arg key that selects the image identifier and build profile.
    #[serde(default = "default_identifier_key")]
    pub identifier_key: String,
    /// Project name used as the image name prefix.
    #[serde(default = "default_project")]
    pub project: String,
    /// Refuse to start more builds than this.
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    #[serde(default = "default_cache_repo")]
    pub default_cache_repo: Option<String>,
    #[serde(default = "default_branch")]
    pub default_branch: Option<String>,
    /// Docker-compatible CLI used for pull, build and push.
    #[serde(default = "default_engine_program")]
    pub engine_program: String,
    #[serde(default = "default_profiles")]
    pub profiles: Vec<BuildProfile>,
}

fn default_distribution_key() -> String {
    DIST_KEY.to_string()
}

fn default_build_arg_keys() -> Vec<String> {
    vec!["PYTHON".to_string(), "IMAGE_IDENTIFIER".to_string()]
}

fn default_identifier_key() -> String {
    "IMAGE_IDENTIFIER".to_string()
}

fn default_project() -> String {
    "rucio".to_string()
}

fn default_max_images() -> usize {
    20
}

fn default_cache_repo() -> Option<String> {
    Some("ghcr.io/rucio/rucio".to_string())
}

fn default_branch() -> Option<String> {
    Some("master".to_string())
}

fn default_engine_program() -> String {
    "docker".to_string()
}

fn default_profiles() -> Vec<BuildProfile> {
    vec![
        BuildProfile {
            identifier: "integration-test".to_string(),
            requires: BTreeMap::from([("PYTHON".to_string(), "3.6".to_string())]),
            dockerfile: "Dockerfile".to_string(),
            context: BuildContext::Dockerfiles,
        },
        BuildProfile {
            identifier: "autotest".to_string(),
            requires: BTreeMap::new(),
            dockerfile: "{dist}.Dockerfile".to_string(),
            context: BuildContext::Path(PathBuf::from(".")),
        },
    ]
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            distribution_key: default_distribution_key(),
            build_arg_keys: default_build_arg_keys(),
            identifier_key: default_identifier_key(),
            project: default_project(),
            max_images: default_max_images(),
            default_cache_repo: default_cache_repo(),
            default_branch: default_branch(),
            engine_program: default_engine_program(),
            profiles: default_profiles(),
        }
    }
}

impl BuildConfig {
    /// First profile accepting this identifier and build-arg set.
    pub fn profile_for(&self, identifier: &str, build_args: &[(String, String)]) -> Option<&BuildProfile> {
        self.profiles
            .iter()
            .find(|profile| profile.accepts(identifier, build_args))
    }
}

/// Maps an image identifier to the Dockerfile and context it builds from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProfile {
    pub identifier: String,
    /// Build arguments that must be present with exactly these values.
    #[serde(default)]
    pub requires: BTreeMap<String, String>,
    /// Dockerfile name inside the dockerfiles directory; `{dist}` is substituted.
    pub dockerfile: String,
    #[serde(default)]
    pub context: BuildContext,
}

impl BuildProfile {
    pub fn accepts(&self, identifier: &str, build_args: &[(String, String)]) -> bool {
        self.identifier == identifier
            && self.requires.iter().all(|(key, expected)| {
                build_args
                    .iter()
                    .any(|(arg, value)| arg == key && value == expected)
            })
    }

    /// Resolve the Dockerfile path and build context for a distribution.
    pub fn resolve(&self, dist: &str, dockerfiles_dir: &Path) -> (PathBuf, PathBuf) {
        let dockerfile = dockerfiles_dir.join(self.dockerfile.replace("{dist}", dist));
        let context = match &self.context {
            BuildContext::Dockerfiles => dockerfiles_dir.to_path_buf(),
            BuildContext::Path(path) => path.clone(),
        };
        (dockerfile, context)
    }
}

/// Where a profile's build context lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildContext {
    /// The directory holding the Dockerfiles.
    #[default]
    Dockerfiles,
    Path(PathBuf),
}

/// Per-run options, typically from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub dockerfiles_dir: PathBuf,
    pub no_cache: bool,
    pub cache_repo: Option<String>,
    pub push_cache: bool,
    pub branch: Option<String>,
    pub verbose: bool,
    pub use_podman: bool,
    pub engine_program: String,
}

impl BuildOptions {
    /// Whether the `USE_PODMAN` environment switch is on.
    pub fn podman_from_env() -> bool {
        std::env::var("USE_PODMAN").is_ok_and(|v| v == "1")
    }

    /// Flag that forces a fresh base image pull on no-cache builds.
    pub fn pull_flag(&self) -> &'static str {
        if self.use_podman {
            "--pull-always"
        } else {
            "--pull"
        }
    }
}
