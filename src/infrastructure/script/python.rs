//! External Python runner for `python` assertions

use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use super::ScriptSource;
use crate::domain::DomainError;

pub const DEFAULT_PYTHON_EXECUTABLE: &str = "python3";

/// Evaluates an inline snippet with `output` (str) and `context` (dict) bound.
/// One-liners are expressions, longer sources are function bodies.
const WRAPPER: &str = r#"
import json
import sys
import textwrap

source, output, context = sys.argv[1], sys.argv[2], json.loads(sys.argv[3])
if "\n" in source.strip():
    namespace = {}
    body = textwrap.indent(textwrap.dedent(source).strip(), "    ")
    exec("def __check(output, context):\n" + body, namespace)
    result = namespace["__check"](output, context)
else:
    result = eval(source.strip(), {"json": json}, {"output": output, "context": context})
if isinstance(result, (dict, list)):
    print(json.dumps(result))
else:
    print(result)
"#;

/// Runs Python snippets in a separate interpreter process
#[derive(Debug, Clone)]
pub struct PythonRunner {
    executable: String,
}

impl PythonRunner {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Run inline `source` or a `file://` script and parse what it printed.
    ///
    /// A script file runs as `python <path> <output> <context-json>`; inline
    /// code goes through a small wrapper. Arguments are separate argv
    /// entries, no shell involved.
    pub async fn run(&self, source: &str, output: &str, context: &Value) -> Result<Value, DomainError> {
        let mut command = Command::new(&self.executable);
        match ScriptSource::parse(source) {
            ScriptSource::File(path) => {
                debug!(executable = %self.executable, path = %path.display(), "Running python script");
                command.arg(path);
            }
            ScriptSource::Inline(code) => {
                debug!(executable = %self.executable, "Running python assertion");
                command.arg("-c").arg(WRAPPER).arg(code);
            }
        }

        let result = command
            .arg(output)
            .arg(context.to_string())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DomainError::script(format!("Failed to start '{}': {}", self.executable, e))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(DomainError::script(format!(
                "Python exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        parse_stdout(&String::from_utf8_lossy(&result.stdout))
    }
}

impl Default for PythonRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON_EXECUTABLE)
    }
}

/// Interpret the last printed line as `True`/`False`, a number or JSON
pub fn parse_stdout(stdout: &str) -> Result<Value, DomainError> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    match line {
        "True" | "true" => return Ok(Value::Bool(true)),
        "False" | "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    if let Ok(number) = line.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(number) {
            return Ok(Value::Number(number));
        }
    }

    serde_json::from_str(line).map_err(|_| {
        DomainError::script(format!(
            "Python assertion must print True, False, a number or JSON, got '{}'",
            line
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_stdout_shapes() {
        assert_eq!(parse_stdout("True\n").unwrap(), json!(true));
        assert_eq!(parse_stdout("debug line\nFalse\n").unwrap(), json!(false));
        assert_eq!(parse_stdout("0.25").unwrap(), json!(0.25));
        assert_eq!(
            parse_stdout(r#"{"pass": true, "score": 1, "reason": "ok"}"#).unwrap(),
            json!({"pass": true, "score": 1, "reason": "ok"})
        );
        assert!(parse_stdout("maybe").is_err());
        assert!(parse_stdout("").is_err());
    }

    async fn python_available() -> bool {
        Command::new(DEFAULT_PYTHON_EXECUTABLE)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_run_expression_and_body() {
        if !python_available().await {
            return;
        }
        let runner = PythonRunner::default();

        // Quotes and spaces survive because nothing goes through a shell
        let result = runner
            .run("'it\\'s' in output", "it's \"quoted\" text", &json!({"vars": {}}))
            .await
            .unwrap();
        assert_eq!(result, json!(true));

        let body = "words = output.split()\nreturn {'pass': len(words) == 3, 'score': len(words) / 4, 'reason': context['vars']['why']}";
        let result = runner
            .run(body, "one two three", &json!({"vars": {"why": "counted"}}))
            .await
            .unwrap();
        assert_eq!(result, json!({"pass": true, "score": 0.75, "reason": "counted"}));
    }

    #[tokio::test]
    async fn test_run_script_file_with_argv() {
        if !python_available().await {
            return;
        }
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        writeln!(file, "import json, sys").unwrap();
        writeln!(file, "output = sys.argv[1]").unwrap();
        writeln!(file, "context = json.loads(sys.argv[2])").unwrap();
        writeln!(file, "print('debugging', context['vars']['city'])").unwrap();
        writeln!(file, "print(context['vars']['city'] in output)").unwrap();
        let reference = format!("file://{}", file.path().display());

        let result = PythonRunner::default()
            .run(&reference, "Paris is nice", &json!({"vars": {"city": "Paris"}}))
            .await
            .unwrap();
        assert_eq!(result, json!(true));
    }

    #[tokio::test]
    async fn test_run_reports_python_errors() {
        if !python_available().await {
            return;
        }
        let runner = PythonRunner::default();

        let error = runner.run("1 / 0", "x", &json!({})).await.unwrap_err();
        assert!(error.to_string().contains("ZeroDivisionError"));
    }
}
