use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::ffi::OsString;
use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Metadata recorded next to every written artifact.
#[derive(Clone, Debug)]
pub struct Payload {
    /// Effective configuration and run flags.
    pub params: Value,
    /// Dataset files the artifact was computed from.
    pub inputs: Vec<String>,
    /// Short run summary (counts).
    pub summary: Value,
}

impl Payload {
    pub fn new(params: Value) -> Self {
        Self {
            params,
            inputs: Vec::new(),
            summary: Value::Null,
        }
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = String>) -> Self {
        self.inputs = inputs.into_iter().collect();
        self
    }

    pub fn with_summary(mut self, summary: Value) -> Self {
        self.summary = summary;
        self
    }
}

/// Build block shared by sidecars and `diffh report`.
pub fn build_info() -> Value {
    json!({
        "code_rev": current_git_rev(),
        "version": diffh::VERSION,
    })
}

/// Write `<stem>.provenance.json` containing the git commit, callsite, params, and outputs.
///
/// Artifacts sharing a file stem (`run.csv`, `run.geojson`) share one sidecar,
/// named after the first of them.
#[track_caller]
pub fn write_sidecar<P: AsRef<Path>>(artifacts: &[P], payload: &Payload) -> Result<PathBuf> {
    let Some(first) = artifacts.first() else {
        anyhow::bail!("no artifacts to describe");
    };
    let provenance_path = provenance_path(first.as_ref());
    if let Some(parent) = provenance_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating provenance dir {}", parent.display()))?;
        }
    }

    let callsite = Location::caller();
    let doc = json!({
        "build": build_info(),
        "callsite": {
            "file": callsite.file(),
            "line": callsite.line()
        },
        "inputs": payload.inputs,
        "params": payload.params,
        "summary": payload.summary,
        "outputs": artifacts
            .iter()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
    });
    fs::write(&provenance_path, serde_json::to_vec_pretty(&doc)?)
        .with_context(|| format!("writing {}", provenance_path.display()))?;
    Ok(provenance_path)
}

fn provenance_path(artifact: &Path) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("artifact"));
    let mut name = stem;
    name.push(".provenance.json");
    artifact.with_file_name(name)
}

pub fn current_git_rev() -> String {
    if let Some(from_env) = option_env!("GIT_COMMIT") {
        if !from_env.is_empty() {
            return from_env.to_string();
        }
    }
    if let Ok(env_override) = std::env::var("GIT_COMMIT") {
        if !env_override.is_empty() {
            return env_override;
        }
    }
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
            } else {
                None
            }
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn provenance_path_rewrites_extension() {
        let base = Path::new("/tmp/output/run_grid.csv");
        let derived = provenance_path(base);
        assert_eq!(derived, Path::new("/tmp/output/run_grid.provenance.json"));
    }

    #[test]
    fn write_sidecar_records_inputs_and_params() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("run.csv");
        let geojson = dir.path().join("run.geojson");
        fs::write(&artifact, "id;x;y\n").unwrap();
        let payload = Payload::new(json!({"mode": "compare"}))
            .with_inputs(["points.csv".to_string()])
            .with_summary(json!({"rows": 1}));
        let prov_path = write_sidecar(&[&artifact, &geojson], &payload).unwrap();
        assert_eq!(prov_path, dir.path().join("run.provenance.json"));
        let parsed: Value = serde_json::from_slice(&fs::read(prov_path).unwrap()).unwrap();
        assert_eq!(parsed["outputs"][0], artifact.to_string_lossy().as_ref());
        assert_eq!(parsed["outputs"][1], geojson.to_string_lossy().as_ref());
        assert_eq!(parsed["inputs"][0], "points.csv");
        assert_eq!(parsed["params"]["mode"], "compare");
        assert_eq!(parsed["build"]["version"], diffh::VERSION);
    }

    #[test]
    fn nothing_to_describe_is_an_error() {
        let none: [&Path; 0] = [];
        assert!(write_sidecar(&none, &Payload::new(Value::Null)).is_err());
    }
}
