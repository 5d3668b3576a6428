//! Matrix expansion: Manifest → ordered list of runnable job instances.

use serde::{Deserialize, Serialize};

use crate::env::EnvVars;
use crate::manifest::{JobDescriptor, Manifest, PhaseScripts, DEFAULT_STAGE};

// ---------------------------------------------------------------------------
// JobInstance
// ---------------------------------------------------------------------------

/// One fully resolved, independently runnable unit of the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInstance {
    /// 1-based position in the expanded matrix. Stable under filtering.
    pub number: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub stage: String,
    pub runtime: String,
    /// Full environment added on top of the inherited process environment.
    pub env: EnvVars,
    /// Commands for every scripted phase, overrides already applied.
    pub phases: PhaseScripts,
    /// Cache directory strings, unexpanded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cache_dirs: Vec<String>,
}

impl JobInstance {
    /// Short human label: `#2 test (python 3.7) PART=lint`.
    pub fn label(&self, language: &str) -> String {
        let mut label = format!("#{} {}", self.number, self.name.as_deref().unwrap_or(&self.stage));
        label.push_str(&format!(" ({language} {})", self.runtime));
        for (k, v) in self.user_env() {
            label.push_str(&format!(" {k}={v}"));
        }
        label
    }

    /// Variables that came from the manifest or config, without the
    /// runner-provided `CIRUN*`/`TRAVIS_*` ones.
    pub fn user_env(&self) -> impl Iterator<Item = (&String, &String)> {
        self.env
            .iter()
            .filter(|(k, _)| !is_runner_var(k))
    }
}

fn is_runner_var(name: &str) -> bool {
    name == "CIRUN" || name.starts_with("CIRUN_") || name.starts_with("TRAVIS_")
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

pub fn expand(manifest: &Manifest) -> Vec<JobInstance> {
    expand_with_env(manifest, &EnvVars::new())
}

/// Expand the matrix. `base_env` (runner config variables) sits below every
/// manifest-defined variable.
///
/// Without a job list the matrix is runtime axis × env axis, runtime-major.
/// With a job list there is exactly one instance per descriptor.
pub fn expand_with_env(manifest: &Manifest, base_env: &EnvVars) -> Vec<JobInstance> {
    let descriptors: Vec<JobDescriptor> = if manifest.jobs.is_empty() {
        axis_descriptors(manifest)
    } else {
        manifest.jobs.clone()
    };

    let language = manifest.language_or_default();
    descriptors
        .into_iter()
        .enumerate()
        .map(|(i, job)| {
            let number = i + 1;
            let mut env = base_env.clone();
            env.extend(manifest.env.global.clone());
            env.extend(job.env);
            env.insert("CIRUN".to_string(), "true".to_string());
            env.insert("CIRUN_JOB_NUMBER".to_string(), number.to_string());
            env.insert("CIRUN_STAGE".to_string(), job.stage.clone());
            env.insert("CIRUN_RUNTIME_VERSION".to_string(), job.runtime.clone());
            env.insert(
                format!("TRAVIS_{}_VERSION", language.to_ascii_uppercase()),
                job.runtime.clone(),
            );

            JobInstance {
                number,
                name: job.name,
                stage: job.stage,
                runtime: job.runtime,
                env,
                phases: manifest.phases.overridden_by(&job.phases),
                cache_dirs: manifest.cache.directories.clone(),
            }
        })
        .collect()
}

fn axis_descriptors(manifest: &Manifest) -> Vec<JobDescriptor> {
    let rows: Vec<EnvVars> = if manifest.env.axis.is_empty() {
        vec![EnvVars::new()]
    } else {
        manifest.env.axis.clone()
    };
    manifest
        .runtimes
        .iter()
        .flat_map(|runtime| {
            rows.iter().map(move |row| JobDescriptor {
                name: None,
                stage: DEFAULT_STAGE.to_string(),
                runtime: runtime.clone(),
                env: row.clone(),
                phases: PhaseScripts::default(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Narrow an expanded matrix without renumbering. Empty criteria match all.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub stage: Option<String>,
    pub runtime: Option<String>,
    pub numbers: Vec<usize>,
}

impl Selection {
    pub fn matches(&self, instance: &JobInstance) -> bool {
        self.stage.as_deref().map_or(true, |s| s == instance.stage)
            && self.runtime.as_deref().map_or(true, |r| r == instance.runtime)
            && (self.numbers.is_empty() || self.numbers.contains(&instance.number))
    }

    pub fn apply(&self, instances: Vec<JobInstance>) -> Vec<JobInstance> {
        instances.into_iter().filter(|i| self.matches(i)).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    fn manifest(yaml: &str) -> Manifest {
        Manifest::parse(yaml).unwrap()
    }

    #[test]
    fn one_instance_per_axis_value_in_order() {
        let m = manifest("python: ['3.5', '3.6', '3.7']\nscript: [pytest]\n");
        let instances = expand(&m);
        assert_eq!(instances.len(), 3);
        let runtimes: Vec<&str> = instances.iter().map(|i| i.runtime.as_str()).collect();
        assert_eq!(runtimes, ["3.5", "3.6", "3.7"]);
        let numbers: Vec<usize> = instances.iter().map(|i| i.number).collect();
        assert_eq!(numbers, [1, 2, 3]);
        assert!(instances.iter().all(|i| i.stage == "test"));
    }

    #[test]
    fn env_axis_multiplies_runtime_major() {
        let m = manifest("python: ['3.6', '3.7']\nscript: [true]\nenv: [PART=a, PART=b]\n");
        let instances = expand(&m);
        let cells: Vec<(&str, &str)> = instances
            .iter()
            .map(|i| (i.runtime.as_str(), i.env["PART"].as_str()))
            .collect();
        assert_eq!(cells, [("3.6", "a"), ("3.6", "b"), ("3.7", "a"), ("3.7", "b")]);
    }

    #[test]
    fn job_list_gives_one_instance_per_descriptor() {
        let m = manifest(
            "python: ['3.6', '3.7']\nscript: [pytest]\njobs:\n  include:\n    - &t\n      stage: test\n      python: '3.6'\n    - <<: *t\n      python: '3.7'\n    - stage: lint\n      script: flake8\n",
        );
        let instances = expand(&m);
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[1].runtime, "3.7");
        assert_eq!(instances[2].runtime, "3.6");
        assert_eq!(instances[2].phases.get(Phase::Script), ["flake8"]);
        assert_eq!(instances[0].phases.get(Phase::Script), ["pytest"]);
    }

    #[test]
    fn env_layers_in_order() {
        let m = manifest(
            "python: '3.6'\nscript: [true]\nenv:\n  global: [A=global, B=global]\njobs:\n  - env: B=job\n",
        );
        let mut base = EnvVars::new();
        base.insert("A".to_string(), "config".to_string());
        base.insert("C".to_string(), "config".to_string());
        let inst = &expand_with_env(&m, &base)[0];
        assert_eq!(inst.env["A"], "global");
        assert_eq!(inst.env["B"], "job");
        assert_eq!(inst.env["C"], "config");
    }

    #[test]
    fn runner_variables_are_set() {
        let m = manifest("language: python\npython: ['3.6', '3.7']\nscript: [true]\n");
        let inst = &expand(&m)[1];
        assert_eq!(inst.env["CIRUN"], "true");
        assert_eq!(inst.env["CIRUN_JOB_NUMBER"], "2");
        assert_eq!(inst.env["CIRUN_RUNTIME_VERSION"], "3.7");
        assert_eq!(inst.env["TRAVIS_PYTHON_VERSION"], "3.7");
        assert_eq!(inst.user_env().count(), 0);
    }

    #[test]
    fn instances_carry_cache_dirs() {
        let m = manifest("python: '3.6'\nscript: [true]\ncache:\n  directories: [$HOME/.cache/pip]\n");
        assert_eq!(expand(&m)[0].cache_dirs, ["$HOME/.cache/pip"]);
    }

    #[test]
    fn label_includes_user_env() {
        let m = manifest("python: '3.6'\nscript: [true]\njobs:\n  - name: unit\n    env: PART=unit\n");
        assert_eq!(expand(&m)[0].label("python"), "#1 unit (python 3.6) PART=unit");
    }

    #[test]
    fn selection_filters_without_renumbering() {
        let m = manifest("python: ['3.5', '3.6', '3.7']\nscript: [true]\n");
        let sel = Selection {
            runtime: Some("3.6".to_string()),
            ..Selection::default()
        };
        let picked = sel.apply(expand(&m));
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].number, 2);

        let sel = Selection {
            numbers: vec![1, 3],
            ..Selection::default()
        };
        assert_eq!(sel.apply(expand(&m)).len(), 2);

        let sel = Selection {
            stage: Some("deploy".to_string()),
            ..Selection::default()
        };
        assert!(sel.apply(expand(&m)).is_empty());
    }
}
