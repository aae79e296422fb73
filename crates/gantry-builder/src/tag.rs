//! Canonical image tag naming.

const BRANCH_REF_PREFIX: &str = "refs/heads/";
const RELEASE_BRANCH_PREFIX: &str = "release-";

/// Names images as `[<repo>/]<project>-<identifier>:<dist>[-<args>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNamer {
    project: String,
}

impl TagNamer {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }

    /// Build the tag for one image.
    ///
    /// `build_args` are rendered in the given order as lower-cased
    /// `keyvalue` pairs. A `release-*` branch suffixes the identifier with
    /// its release name so release images never shadow master images.
    pub fn tag(
        &self,
        dist: &str,
        build_args: &[(String, String)],
        identifier: &str,
        branch: Option<&str>,
        cache_repo: Option<&str>,
    ) -> String {
        let args_suffix: String = build_args
            .iter()
            .map(|(key, value)| format!("-{}{}", key.to_lowercase(), value.to_lowercase()))
            .collect();

        let mut identifier = identifier.to_string();
        if let Some(release) = branch.and_then(release_name) {
            identifier.push('-');
            identifier.push_str(&release.to_lowercase());
        }

        let tag = format!(
            "{}-{}:{}{}",
            self.project,
            identifier,
            dist.to_lowercase(),
            args_suffix
        );

        match cache_repo.filter(|repo| !repo.is_empty()) {
            Some(repo) => format!("{}/{}", repo.to_lowercase(), tag),
            None => tag,
        }
    }
}

impl Default for TagNamer {
    fn default() -> Self {
        Self::new("rucio")
    }
}

/// The release name of a `release-*` branch, if it is one.
fn release_name(branch: &str) -> Option<&str> {
    let branch = branch.strip_prefix(BRANCH_REF_PREFIX).unwrap_or(branch);
    branch
        .strip_prefix(RELEASE_BRANCH_PREFIX)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_plain_tag() {
        let namer = TagNamer::default();
        let tag = namer.tag("CentOS7", &args(&[("PYTHON", "3.6")]), "autotest", None, None);

        assert_eq!(tag, "rucio-autotest:centos7-python3.6");
    }

    #[test]
    fn test_tag_with_repo_and_release_branch() {
        let namer = TagNamer::default();
        let tag = namer.tag(
            "alma9",
            &args(&[("PYTHON", "3.9")]),
            "autotest",
            Some("refs/heads/release-1.29-LTS"),
            Some("GHCR.io/Rucio/rucio"),
        );

        assert_eq!(tag, "ghcr.io/rucio/rucio/rucio-autotest-1.29-lts:alma9-python3.9");
    }

    #[test]
    fn test_non_release_branch_ignored() {
        let namer = TagNamer::default();
        let master = namer.tag("alma9", &[], "autotest", Some("master"), None);
        let feature = namer.tag("alma9", &[], "autotest", Some("refs/heads/feature-x"), None);

        assert_eq!(master, "rucio-autotest:alma9");
        assert_eq!(master, feature);
    }

    #[test]
    fn test_tag_is_deterministic_and_arg_sensitive() {
        let namer = TagNamer::new("proj");
        let first = namer.tag("alma9", &args(&[("PYTHON", "3.9"), ("DB", "pg")]), "it", None, Some("repo"));
        let second = namer.tag("alma9", &args(&[("PYTHON", "3.9"), ("DB", "pg")]), "it", None, Some("repo"));
        let changed = namer.tag("alma9", &args(&[("PYTHON", "3.10"), ("DB", "pg")]), "it", None, Some("repo"));

        assert_eq!(first, second);
        assert_ne!(first, changed);
        assert_eq!(first, "repo/proj-it:alma9-python3.9-dbpg");
    }

    #[test]
    fn test_empty_cache_repo_is_no_prefix() {
        let namer = TagNamer::default();
        assert_eq!(namer.tag("alma9", &[], "autotest", None, Some("")), "rucio-autotest:alma9");
    }
}
