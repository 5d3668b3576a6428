//! Manifest model and parser.
//!
//! The manifest is parsed into a `serde_yaml::Value` first and walked by hand:
//! Travis manifests freely mix scalars and lists (`python: 3.6` vs
//! `python: ["3.6", "3.7"]`), write versions as numbers, and rely on `<<`
//! merge keys, none of which a derived `Deserialize` handles well.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{ConfigWarning, WarnLevel};
use crate::env::{parse_assignments, EnvVars};
use crate::error::{CirunError, ParseError};
use crate::merge::{self, kind};
use crate::types::Phase;

pub const DEFAULT_STAGE: &str = "test";

const KNOWN_KEYS: &[&str] = &[
    "language",
    "dist",
    "os",
    "sudo",
    "cache",
    "python",
    "env",
    "before_install",
    "install",
    "script",
    "after_failure",
    "after_success",
    "jobs",
    "matrix",
    "stages",
    "notifications",
    "branches",
    "git",
    "services",
    "addons",
];

/// Travis phases that exist but are not part of the cirun lifecycle.
const UNSUPPORTED_PHASES: &[&str] = &["before_script", "after_script", "before_deploy", "deploy", "after_deploy"];

const JOB_KEYS: &[&str] = &["name", "stage", "python", "env"];
const JOB_IGNORED_KEYS: &[&str] = &["language", "dist", "os", "sudo", "if"];

// ---------------------------------------------------------------------------
// PhaseScripts
// ---------------------------------------------------------------------------

/// Shell commands per scripted phase. A phase absent from the map has no
/// commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseScripts(BTreeMap<Phase, Vec<String>>);

impl PhaseScripts {
    pub fn get(&self, phase: Phase) -> &[String] {
        self.0.get(&phase).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn set(&mut self, phase: Phase, commands: Vec<String>) {
        self.0.insert(phase, commands);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self` with every phase present in `overrides` replaced.
    pub fn overridden_by(&self, overrides: &PhaseScripts) -> PhaseScripts {
        let mut out = self.clone();
        for (phase, commands) in &overrides.0 {
            out.0.insert(*phase, commands.clone());
        }
        out
    }
}

// ---------------------------------------------------------------------------
// CacheSpec / EnvSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Directory strings as written; `$VAR` expansion happens per instance.
    pub directories: Vec<String>,
}

impl CacheSpec {
    pub fn is_enabled(&self) -> bool {
        !self.directories.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSpec {
    /// Applied to every instance.
    pub global: EnvVars,
    /// Each row is one value of the env axis.
    pub axis: Vec<EnvVars>,
}

// ---------------------------------------------------------------------------
// JobDescriptor
// ---------------------------------------------------------------------------

/// One fully resolved entry of the job list. Merge keys are already applied
/// and the runtime is always known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub stage: String,
    pub runtime: String,
    #[serde(default, skip_serializing_if = "EnvVars::is_empty")]
    pub env: EnvVars,
    /// Per-job phase overrides.
    #[serde(default, skip_serializing_if = "PhaseScripts::is_empty")]
    pub phases: PhaseScripts,
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<String>,
    #[serde(default)]
    pub cache: CacheSpec,
    /// The runtime axis, in manifest order.
    #[serde(default)]
    pub runtimes: Vec<String>,
    #[serde(default)]
    pub env: EnvSpec,
    #[serde(default)]
    pub phases: PhaseScripts,
    #[serde(default)]
    pub jobs: Vec<JobDescriptor>,
    #[serde(skip)]
    warnings: Vec<ConfigWarning>,
}

impl Manifest {
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(CirunError::ManifestNotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text)?)
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let root: Value = serde_yaml::from_str(text)?;
        let root = match root {
            Value::Mapping(m) => m,
            _ => return Err(ParseError::NotAMapping),
        };
        Parser::default().parse(&root)
    }

    /// Warnings gathered while parsing: keys cirun ignores, empty commands,
    /// versions written as numbers.
    pub fn lint(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// Language name used for the `TRAVIS_<LANGUAGE>_VERSION` variable.
    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or("python")
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Parser {
    warnings: Vec<ConfigWarning>,
}

impl Parser {
    fn warn(&mut self, message: String) {
        self.warnings.push(ConfigWarning {
            level: WarnLevel::Warning,
            message,
        });
    }

    fn parse(mut self, root: &Mapping) -> Result<Manifest, ParseError> {
        self.check_top_level_keys(root);

        let language = optional_string(root, "language")?;
        let dist = optional_string(root, "dist")?;
        let cache = self.parse_cache(root.get("cache"))?;
        let runtimes = match root.get("python") {
            Some(v) => self.runtime_list(v, "python")?,
            None => Vec::new(),
        };
        let env = parse_env_spec(root.get("env"))?;
        let phases = self.parse_phases(root, "")?;

        let jobs_value = match (root.get("jobs"), root.get("matrix")) {
            (Some(_), Some(_)) => {
                return Err(ParseError::InvalidField {
                    field: "jobs".to_string(),
                    reason: "'jobs' and 'matrix' are aliases; use only one".to_string(),
                })
            }
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        };
        let jobs = match jobs_value {
            Some(v) => self.parse_jobs(v, &runtimes)?,
            None => Vec::new(),
        };

        if jobs.is_empty() && runtimes.is_empty() {
            return Err(ParseError::EmptyMatrix);
        }
        if !jobs.is_empty() && !env.axis.is_empty() {
            self.warn("env axis is ignored when jobs are listed explicitly".to_string());
        }
        check_script_present(&phases, &jobs)?;
        check_duplicates(&jobs)?;

        Ok(Manifest {
            language,
            dist,
            cache,
            runtimes,
            env,
            phases,
            jobs,
            warnings: self.warnings,
        })
    }

    fn check_top_level_keys(&mut self, root: &Mapping) {
        for key in root.keys() {
            let Some(key) = key.as_str() else {
                self.warn(format!("non-string top-level key {key:?} ignored"));
                continue;
            };
            if KNOWN_KEYS.contains(&key) || key.starts_with('_') || key.starts_with("x-") {
                continue;
            }
            if UNSUPPORTED_PHASES.contains(&key) {
                self.warn(format!("phase '{key}' is not part of the cirun lifecycle and is not run"));
            } else {
                self.warn(format!("unknown top-level key '{key}' ignored"));
            }
        }
    }

    fn parse_cache(&mut self, value: Option<&Value>) -> Result<CacheSpec, ParseError> {
        let mut spec = CacheSpec::default();
        match value {
            None | Some(Value::Null) | Some(Value::Bool(false)) => {}
            Some(Value::String(kind)) => {
                self.warn(format!(
                    "cache kind '{kind}' has no local equivalent; list cache.directories instead"
                ));
            }
            Some(Value::Mapping(m)) => {
                for (k, v) in m {
                    match k.as_str() {
                        Some("directories") => {
                            for dir in string_list(v, "cache.directories")? {
                                if !spec.directories.contains(&dir) {
                                    spec.directories.push(dir);
                                }
                            }
                        }
                        Some(other) => self.warn(format!(
                            "cache kind '{other}' has no local equivalent; list cache.directories instead"
                        )),
                        None => self.warn(format!("non-string cache key {k:?} ignored")),
                    }
                }
            }
            Some(other) => {
                return Err(ParseError::InvalidField {
                    field: "cache".to_string(),
                    reason: format!("expected a mapping or false, found {}", kind(other)),
                })
            }
        }
        Ok(spec)
    }

    /// Versions are kept as written where YAML allows it. Numbers lose their
    /// source text (`3.10` parses as `3.1`), so they get a warning.
    fn runtime_list(&mut self, value: &Value, field: &str) -> Result<Vec<String>, ParseError> {
        let items: Vec<&Value> = match value {
            Value::Sequence(seq) => seq.iter().collect(),
            other => vec![other],
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if let Value::Number(n) = item {
                self.warn(format!(
                    "{field} version {n} is written as a number; quote it to keep it exact"
                ));
            }
            let version = scalar_string(item, field)?;
            if version.trim().is_empty() {
                return Err(ParseError::InvalidField {
                    field: field.to_string(),
                    reason: "empty runtime version".to_string(),
                });
            }
            out.push(version);
        }
        Ok(out)
    }

    /// Scripted phases on `map`. `prefix` names the owner in messages.
    fn parse_phases(&mut self, map: &Mapping, prefix: &str) -> Result<PhaseScripts, ParseError> {
        let mut scripts = PhaseScripts::default();
        for phase in Phase::scripted() {
            let Some(value) = map.get(phase.as_str()) else {
                continue;
            };
            let field = format!("{prefix}{}", phase.as_str());
            let commands = string_list(value, &field)?;
            for (i, cmd) in commands.iter().enumerate() {
                if cmd.trim().is_empty() {
                    self.warn(format!("{field} command {} is empty", i + 1));
                }
            }
            scripts.set(*phase, commands);
        }
        Ok(scripts)
    }

    fn parse_jobs(
        &mut self,
        value: &Value,
        runtimes: &[String],
    ) -> Result<Vec<JobDescriptor>, ParseError> {
        let entries: &[Value] = match value {
            Value::Sequence(seq) => seq,
            Value::Mapping(m) => {
                for key in m.keys().filter_map(Value::as_str) {
                    if key != "include" {
                        self.warn(format!("jobs.{key} is not supported and is ignored"));
                    }
                }
                match m.get("include") {
                    Some(Value::Sequence(seq)) => seq,
                    Some(other) => {
                        return Err(ParseError::InvalidField {
                            field: "jobs.include".to_string(),
                            reason: format!("expected a list, found {}", kind(other)),
                        })
                    }
                    None => &[],
                }
            }
            Value::Null => &[],
            other => {
                return Err(ParseError::InvalidField {
                    field: "jobs".to_string(),
                    reason: format!("expected a list, found {}", kind(other)),
                })
            }
        };

        let mut jobs = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let number = i + 1;
            let location = format!("job {number}");
            let Value::Mapping(raw) = entry else {
                return Err(ParseError::InvalidField {
                    field: location,
                    reason: format!("expected a mapping, found {}", kind(entry)),
                });
            };
            let resolved = merge::resolve(raw, &location)?;
            jobs.push(self.parse_job(&resolved, number, runtimes)?);
        }
        Ok(jobs)
    }

    fn parse_job(
        &mut self,
        map: &Mapping,
        number: usize,
        runtimes: &[String],
    ) -> Result<JobDescriptor, ParseError> {
        let prefix = format!("job {number}: ");
        for key in map.keys().filter_map(Value::as_str) {
            let known = JOB_KEYS.contains(&key) || Phase::from_manifest_key(key).is_some();
            if known {
                continue;
            }
            if JOB_IGNORED_KEYS.contains(&key) {
                self.warn(format!("{prefix}'{key}' has no effect on a local run"));
            } else {
                self.warn(format!("{prefix}unknown key '{key}' ignored"));
            }
        }

        let name = optional_string(map, "name")?;
        let stage = optional_string(map, "stage")?.unwrap_or_else(|| DEFAULT_STAGE.to_string());

        let runtime = match map.get("python") {
            Some(v) => {
                let mut versions = self.runtime_list(v, &format!("{prefix}python"))?;
                if versions.len() != 1 {
                    return Err(ParseError::InvalidField {
                        field: format!("job {number} python"),
                        reason: format!(
                            "a job runs exactly one runtime version, found {}",
                            versions.len()
                        ),
                    });
                }
                versions.remove(0)
            }
            None => runtimes
                .first()
                .cloned()
                .ok_or(ParseError::UnresolvedRuntime(number))?,
        };

        let mut env = EnvVars::new();
        if let Some(v) = map.get("env") {
            parse_env_value(v, &format!("job {number} env"), &mut env)?;
        }

        let phases = self.parse_phases(map, &prefix)?;

        Ok(JobDescriptor {
            name,
            stage,
            runtime,
            env,
            phases,
        })
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn check_script_present(phases: &PhaseScripts, jobs: &[JobDescriptor]) -> Result<(), ParseError> {
    let has_script = |p: &PhaseScripts| !p.get(Phase::Script).is_empty();
    if has_script(phases) {
        return Ok(());
    }
    let every_job_overrides = !jobs.is_empty() && jobs.iter().all(|j| has_script(&j.phases));
    if every_job_overrides {
        return Ok(());
    }
    Err(ParseError::MissingPhase(Phase::Script.as_str().to_string()))
}

fn check_duplicates(jobs: &[JobDescriptor]) -> Result<(), ParseError> {
    for (i, job) in jobs.iter().enumerate() {
        if let Some(first) = jobs[..i].iter().position(|earlier| earlier == job) {
            return Err(ParseError::DuplicateJob {
                first: first + 1,
                second: i + 1,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn scalar_string(value: &Value, field: &str) -> Result<String, ParseError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ParseError::InvalidField {
            field: field.to_string(),
            reason: format!("expected a string, found {}", kind(other)),
        }),
    }
}

fn optional_string(map: &Mapping, key: &str) -> Result<Option<String>, ParseError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => scalar_string(v, key).map(Some),
    }
}

/// A scalar or a list of scalars.
fn string_list(value: &Value, field: &str) -> Result<Vec<String>, ParseError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(seq) => seq
            .iter()
            .enumerate()
            .map(|(i, item)| scalar_string(item, &format!("{field}[{i}]")))
            .collect(),
        other => Ok(vec![scalar_string(other, field)?]),
    }
}

/// `env:` on a job: one assignment line, a list of lines, or a name → value
/// mapping.
fn parse_env_value(value: &Value, field: &str, vars: &mut EnvVars) -> Result<(), ParseError> {
    match value {
        Value::Mapping(m) => {
            for (k, v) in m {
                let name = scalar_string(k, field)?;
                vars.insert(name, scalar_string(v, field)?);
            }
            Ok(())
        }
        other => {
            for line in string_list(other, field)? {
                parse_assignments(&line, field, vars)?;
            }
            Ok(())
        }
    }
}

/// Top-level `env:`. A list is the env axis; a mapping splits into `global`
/// and `jobs` (or `matrix`); a single string is global.
fn parse_env_spec(value: Option<&Value>) -> Result<EnvSpec, ParseError> {
    let mut spec = EnvSpec::default();
    match value {
        None | Some(Value::Null) => {}
        Some(Value::String(line)) => parse_assignments(line, "env", &mut spec.global)?,
        Some(rows @ Value::Sequence(_)) => spec.axis = parse_axis(rows, "env")?,
        Some(Value::Mapping(m)) => {
            if let Some(global) = m.get("global") {
                parse_env_value(global, "env.global", &mut spec.global)?;
            }
            for key in ["jobs", "matrix"] {
                if let Some(rows) = m.get(key) {
                    spec.axis = parse_axis(rows, &format!("env.{key}"))?;
                }
            }
        }
        Some(other) => {
            return Err(ParseError::InvalidField {
                field: "env".to_string(),
                reason: format!("expected a list or mapping, found {}", kind(other)),
            })
        }
    }
    Ok(spec)
}

fn parse_axis(value: &Value, field: &str) -> Result<Vec<EnvVars>, ParseError> {
    let rows = match value {
        Value::Sequence(seq) => seq.as_slice(),
        other => std::slice::from_ref(other),
    };
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let mut vars = EnvVars::new();
            parse_env_value(row, &format!("{field}[{i}]"), &mut vars)?;
            Ok(vars)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TRAVIS: &str = r#"
language: python
dist: xenial
cache:
  directories:
    - $HOME/.cache/pip
    - $HOME/miniconda
python:
  - "3.6"
  - "3.7"
before_install:
  - echo installing conda
install:
  - echo install deps
script:
  - echo $PART
  - python -c "import lib"
after_failure:
  - cat log.txt
jobs:
  include:
    - &test
      stage: test
      python: "3.6"
      env: PART=unit
    - <<: *test
      python: "3.7"
    - <<: *test
      env: PART=lint
"#;

    #[test]
    fn parses_full_manifest() {
        let m = Manifest::parse(TRAVIS).unwrap();
        assert_eq!(m.language.as_deref(), Some("python"));
        assert_eq!(m.dist.as_deref(), Some("xenial"));
        assert_eq!(m.runtimes, ["3.6", "3.7"]);
        assert_eq!(m.cache.directories.len(), 2);
        assert_eq!(m.phases.get(Phase::Script).len(), 2);
        assert_eq!(m.phases.get(Phase::AfterFailure), ["cat log.txt"]);
        assert!(m.phases.get(Phase::AfterSuccess).is_empty());
        assert_eq!(m.jobs.len(), 3);
    }

    #[test]
    fn merged_jobs_keep_anchor_fields_except_overrides() {
        let m = Manifest::parse(TRAVIS).unwrap();
        let base = &m.jobs[0];
        let second = &m.jobs[1];
        let third = &m.jobs[2];

        assert_eq!(second.stage, base.stage);
        assert_eq!(second.env, base.env);
        assert_eq!(second.runtime, "3.7");

        assert_eq!(third.runtime, base.runtime);
        assert_eq!(third.env["PART"], "lint");
    }

    #[test]
    fn missing_script_is_an_error() {
        let err = Manifest::parse("python: ['3.6']\ninstall: [echo hi]\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingPhase(ref p) if p == "script"));
    }

    #[test]
    fn script_may_come_from_every_job() {
        let yaml = "python: '3.6'\njobs:\n  - script: echo a\n  - stage: lint\n    script: echo b\n";
        let m = Manifest::parse(yaml).unwrap();
        assert_eq!(m.jobs.len(), 2);
        assert_eq!(m.jobs[0].phases.get(Phase::Script), ["echo a"]);
    }

    #[test]
    fn script_missing_on_one_job_is_an_error() {
        let yaml = "python: '3.6'\njobs:\n  - script: echo a\n  - stage: lint\n";
        assert!(matches!(
            Manifest::parse(yaml).unwrap_err(),
            ParseError::MissingPhase(_)
        ));
    }

    #[test]
    fn unknown_alias_is_a_parse_error() {
        let yaml = "python: ['3.6']\nscript: [true]\njobs:\n  - <<: *nothing\n";
        assert!(matches!(
            Manifest::parse(yaml).unwrap_err(),
            ParseError::Yaml(_)
        ));
    }

    #[test]
    fn malformed_merge_is_rejected() {
        let yaml = "python: ['3.6']\nscript: [true]\njobs:\n  - <<: 3\n";
        assert!(matches!(
            Manifest::parse(yaml).unwrap_err(),
            ParseError::MalformedMerge { .. }
        ));
    }

    #[test]
    fn duplicate_job_is_rejected() {
        let yaml = "python: ['3.6']\nscript: [true]\njobs:\n  - &a\n    stage: test\n  - <<: *a\n";
        let err = Manifest::parse(yaml).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateJob { first: 1, second: 2 }));
    }

    #[test]
    fn job_without_runtime_and_no_axis_is_rejected() {
        let yaml = "script: [true]\njobs:\n  - stage: test\n";
        assert!(matches!(
            Manifest::parse(yaml).unwrap_err(),
            ParseError::UnresolvedRuntime(1)
        ));
    }

    #[test]
    fn job_without_runtime_takes_first_axis_value() {
        let yaml = "python: ['3.5', '3.6']\nscript: [true]\njobs:\n  - stage: lint\n";
        let m = Manifest::parse(yaml).unwrap();
        assert_eq!(m.jobs[0].runtime, "3.5");
        assert_eq!(m.jobs[0].stage, "lint");
    }

    #[test]
    fn job_with_two_runtimes_is_rejected() {
        let yaml = "script: [true]\njobs:\n  - python: ['3.5', '3.6']\n";
        assert!(matches!(
            Manifest::parse(yaml).unwrap_err(),
            ParseError::InvalidField { .. }
        ));
    }

    #[test]
    fn scalars_are_accepted_for_lists() {
        let m = Manifest::parse("python: '3.7'\nscript: pytest\n").unwrap();
        assert_eq!(m.runtimes, ["3.7"]);
        assert_eq!(m.phases.get(Phase::Script), ["pytest"]);
    }

    #[test]
    fn numeric_versions_are_accepted_with_warning() {
        let m = Manifest::parse("python: [3.6, 3.10]\nscript: [true]\n").unwrap();
        assert_eq!(m.runtimes, ["3.6", "3.1"]);
        assert_eq!(
            m.lint()
                .iter()
                .filter(|w| w.message.contains("written as a number"))
                .count(),
            2
        );
    }

    #[test]
    fn lint_reports_unknown_and_unsupported_keys() {
        let yaml = "python: '3.6'\nscript: [true]\nbefore_script: [echo]\nfrobnicate: 1\n_templates: {}\n";
        let m = Manifest::parse(yaml).unwrap();
        let messages: Vec<&str> = m.lint().iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|w| w.contains("before_script")));
        assert!(messages.iter().any(|w| w.contains("frobnicate")));
        assert!(!messages.iter().any(|w| w.contains("_templates")));
    }

    #[test]
    fn lint_reports_empty_command() {
        let m = Manifest::parse("python: '3.6'\nscript: ['true', '']\n").unwrap();
        assert!(m.lint().iter().any(|w| w.message.contains("script command 2 is empty")));
    }

    #[test]
    fn cache_false_disables_and_duplicates_collapse() {
        let m = Manifest::parse("python: '3.6'\nscript: [true]\ncache: false\n").unwrap();
        assert!(!m.cache.is_enabled());

        let yaml = "python: '3.6'\nscript: [true]\ncache:\n  pip: true\n  directories: [a, b, a]\n";
        let m = Manifest::parse(yaml).unwrap();
        assert_eq!(m.cache.directories, ["a", "b"]);
        assert!(m.lint().iter().any(|w| w.message.contains("'pip'")));
    }

    #[test]
    fn env_list_is_an_axis_and_mapping_splits() {
        let m = Manifest::parse("python: '3.6'\nscript: [true]\nenv:\n  - PART=1\n  - PART=2\n").unwrap();
        assert_eq!(m.env.axis.len(), 2);
        assert!(m.env.global.is_empty());

        let yaml = "python: '3.6'\nscript: [true]\nenv:\n  global: [CI=1]\n  jobs: [PART=a, PART=b]\n";
        let m = Manifest::parse(yaml).unwrap();
        assert_eq!(m.env.global["CI"], "1");
        assert_eq!(m.env.axis[1]["PART"], "b");
    }

    #[test]
    fn matrix_is_an_alias_for_jobs() {
        let yaml = "python: '3.6'\nscript: [true]\nmatrix:\n  include:\n    - stage: a\n    - stage: b\n";
        assert_eq!(Manifest::parse(yaml).unwrap().jobs.len(), 2);
    }

    #[test]
    fn root_must_be_mapping() {
        assert!(matches!(
            Manifest::parse("- a\n- b\n").unwrap_err(),
            ParseError::NotAMapping
        ));
    }

    #[test]
    fn empty_matrix_is_rejected() {
        assert!(matches!(
            Manifest::parse("script: [true]\n").unwrap_err(),
            ParseError::EmptyMatrix
        ));
    }

    #[test]
    fn load_missing_file() {
        let err = Manifest::load(Path::new("/nonexistent/.travis.yml")).unwrap_err();
        assert!(matches!(err, CirunError::ManifestNotFound(_)));
    }
}
