//! Recipe content: the YAML command documents the docker handler executes.
//!
//! Content is opaque everywhere else in the system; only this module gives
//! it structure. A document carries exactly one of `run`, `exec` or `rm`,
//! each a list of argument vectors.

use crate::error::{HandlerError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// The decoded command of a recipe document
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeCommand {
    /// `docker run -d <args>` per argument vector
    Run(Vec<Vec<String>>),

    /// Command executed inside an existing container on the target node
    Exec(Vec<Vec<String>>),

    /// Containers removed from the target node
    Rm(Vec<Vec<String>>),
}

#[derive(Debug, Deserialize)]
struct RawContent {
    #[serde(default)]
    run: Option<Vec<Vec<String>>>,

    #[serde(default)]
    exec: Option<Vec<Vec<String>>>,

    #[serde(default)]
    rm: Option<Vec<Vec<String>>>,
}

/// Decode and validate a recipe document
pub fn decode(content: &str) -> Result<RecipeCommand> {
    let raw: RawContent = serde_yaml::from_str(content)?;

    if raw.run.is_some() && raw.exec.is_some() {
        return Err(HandlerError::recipe("run and exec are mutually exclusive"));
    }
    let present =
        raw.run.is_some() as usize + raw.exec.is_some() as usize + raw.rm.is_some() as usize;
    if present != 1 {
        return Err(HandlerError::recipe(
            "exactly one of run, exec or rm must be present",
        ));
    }

    if let Some(commands) = raw.run {
        Ok(RecipeCommand::Run(commands))
    } else if let Some(commands) = raw.exec {
        Ok(RecipeCommand::Exec(commands))
    } else {
        Ok(RecipeCommand::Rm(raw.rm.unwrap_or_default()))
    }
}

/// Expand `$VAR` placeholders from the invocation params.
///
/// Longer names expand first so `$PORT` never clobbers `$PORTAL`.
pub fn expand(args: &[String], params: &BTreeMap<String, String>) -> Vec<String> {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

    args.iter()
        .map(|arg| {
            let mut expanded = arg.clone();
            for key in &keys {
                expanded = expanded.replace(&format!("${}", key), &params[*key]);
            }
            expanded
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_run_document() {
        let content = "run:\n  - - --name\n    - web\n    - nginx:latest\n";
        match decode(content).unwrap() {
            RecipeCommand::Run(commands) => {
                assert_eq!(commands, vec![vec!["--name", "web", "nginx:latest"]
                    .into_iter()
                    .map(String::from)
                    .collect::<Vec<_>>()]);
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_run_and_exec_is_a_hard_error() {
        let content = "run:\n  - - nginx\nexec:\n  - - ls\n";
        assert!(matches!(decode(content), Err(HandlerError::Recipe(_))));
    }

    #[test]
    fn test_empty_document_is_rejected() {
        assert!(decode("{}").is_err());
    }

    #[test]
    fn test_expand_params() {
        let params = BTreeMap::from([
            ("DATACENTER".to_string(), "p1".to_string()),
            ("SERVER_ADDRESS".to_string(), "10.0.0.1".to_string()),
        ]);
        let args = vec![
            "-datacenter=$DATACENTER".to_string(),
            "-retry-join=$SERVER_ADDRESS".to_string(),
        ];
        assert_eq!(
            expand(&args, &params),
            vec!["-datacenter=p1", "-retry-join=10.0.0.1"]
        );
    }

    #[test]
    fn test_expand_prefers_longer_names() {
        let params = BTreeMap::from([
            ("PORT".to_string(), "80".to_string()),
            ("PORT_ADMIN".to_string(), "9000".to_string()),
        ]);
        let args = vec!["$PORT_ADMIN:$PORT".to_string()];
        assert_eq!(expand(&args, &params), vec!["9000:80"]);
    }
}
