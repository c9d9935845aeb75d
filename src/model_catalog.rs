use log::{debug, warn};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Placeholder entry when `ollama list` exits with an error.
pub const MODEL_LIST_ERROR: &str = "Error fetching models";

const OLLAMA_EXECUTABLE: &str = "ollama";
const LIST_TIMEOUT_MS: u64 = 5000;

/// Installed models, discovered through the `ollama list` command.
///
/// Failures never propagate: the list degrades to a single descriptive
/// entry so a caller can still show something.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    executable: String,
    args: Vec<String>,
    timeout_ms: u64,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            executable: OLLAMA_EXECUTABLE.to_string(),
            args: vec!["list".to_string()],
            timeout_ms: LIST_TIMEOUT_MS,
        }
    }
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(executable: &str, args: &[&str], timeout_ms: u64) -> Self {
        Self {
            executable: executable.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            timeout_ms: timeout_ms.max(1),
        }
    }

    pub async fn list_models(&self) -> Vec<String> {
        debug!("Listing models with '{} {}'", self.executable, self.args.join(" "));

        let mut command = Command::new(&self.executable);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = Duration::from_millis(self.timeout_ms);
        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!("Failed to run '{}': {}", self.executable, err);
                return vec![format!("Error: {}", err)];
            }
            Err(_) => {
                warn!(
                    "'{}' timed out after {}ms",
                    self.executable, self.timeout_ms
                );
                return vec![format!("Error: timed out after {}ms", self.timeout_ms)];
            }
        };

        if !output.status.success() {
            warn!(
                "'{}' exited with {}: {}",
                self.executable,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return vec![MODEL_LIST_ERROR.to_string()];
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let models = parse_model_list(&stdout);
        debug!("Found {} installed models", models.len());
        models
    }
}

/// Model names from `ollama list` output: the first column of every row
/// after the header.
pub fn parse_model_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| name.to_string())
        .collect()
}

/// True when `entry` is one of the placeholders produced on failure.
pub fn is_error_entry(entry: &str) -> bool {
    entry == MODEL_LIST_ERROR || entry.starts_with("Error: ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_OUTPUT: &str = "\
NAME                              ID              SIZE      MODIFIED
sisaai/sisaai-llama3.1:latest     a1b2c3d4e5f6    4.9 GB    2 days ago
deepseek-r1:14b                   ea35dfe18182    9.0 GB    3 weeks ago

";

    #[test]
    fn parses_first_column_and_skips_header() {
        assert_eq!(
            parse_model_list(LIST_OUTPUT),
            vec![
                "sisaai/sisaai-llama3.1:latest".to_string(),
                "deepseek-r1:14b".to_string()
            ]
        );
    }

    #[test]
    fn header_only_output_is_empty() {
        assert!(parse_model_list("NAME ID SIZE MODIFIED\n").is_empty());
        assert!(parse_model_list("").is_empty());
    }

    #[test]
    fn recognizes_error_entries() {
        assert!(is_error_entry(MODEL_LIST_ERROR));
        assert!(is_error_entry("Error: No such file or directory (os error 2)"));
        assert!(!is_error_entry("llama3:latest"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn lists_models_from_command_output() {
        let catalog = ModelCatalog::with_command(
            "sh",
            &["-c", "printf 'NAME ID\\nllama3:latest abc\\nqwen2:7b def\\n'"],
            5000,
        );
        assert_eq!(
            catalog.list_models().await,
            vec!["llama3:latest".to_string(), "qwen2:7b".to_string()]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_degrades_to_placeholder() {
        let catalog = ModelCatalog::with_command("false", &[], 5000);
        assert_eq!(catalog.list_models().await, vec![MODEL_LIST_ERROR.to_string()]);
    }

    #[tokio::test]
    async fn missing_executable_degrades_to_error_entry() {
        let catalog = ModelCatalog::with_command("definitely-not-an-ollama-binary", &[], 5000);
        let models = catalog.list_models().await;
        assert_eq!(models.len(), 1);
        assert!(models[0].starts_with("Error: "));
        assert!(is_error_entry(&models[0]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let catalog = ModelCatalog::with_command("sleep", &["5"], 50);
        let models = catalog.list_models().await;
        assert_eq!(models, vec!["Error: timed out after 50ms".to_string()]);
    }
}
