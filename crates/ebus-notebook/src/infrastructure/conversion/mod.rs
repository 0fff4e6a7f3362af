//! Conversion orchestrator: TypeSpec text in, ebusd CSV out.
//!
//! # How a conversion runs (for beginners)
//!
//! The converter is an external program that only works on files.  For each
//! request a [`ConversionJob`] creates two temporary files:
//!
//! - the input file, named after a fresh placeholder token so the converter
//!   derives a recognisable circuit name from it,
//! - an empty output file the converter overwrites.
//!
//! The configured command template gets both paths substituted and is started
//! through a [`ProcessRunner`].  Then we wait for whichever comes first: the
//! process exit or the cancellation token.  Once the job is dropped both files
//! are deleted, on every exit path.

use std::io::{self, Write};
use std::path::Path;

use ebus_core::conversion::{
    circuit_name, expand_command, generate_placeholder, prepare_input, rename_placeholder,
};
use ebus_core::ConversionConfig;
use tempfile::TempPath;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod runner;

pub use runner::{runner_for, ProcessHandle, ProcessRunner, TaskRunner, TerminalRunner};

/// Why a conversion produced no CSV.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("cancelled")]
    Cancelled,

    #[error("failed to start conversion command \"{command}\": {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Non-zero exit; `output` holds whatever the converter wrote.
    #[error("conversion exited with {}{}", exit_status(.code), output_context(.output))]
    Exited { code: Option<i32>, output: String },

    #[error("no output produced")]
    NoOutput,

    #[error("conversion file error: {0}")]
    Io(#[from] io::Error),

    #[error("could not rename generated circuit: {0}")]
    Rename(String),
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code".to_string(),
    }
}

fn output_context(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!("\ncommand output:\n{output}")
    }
}

/// One conversion request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionRequest<'a> {
    /// TypeSpec source text.
    pub input: &'a str,
    /// Directory the converter runs in; the input file is placed there too so
    /// relative imports resolve.
    pub working_dir: Option<&'a Path>,
    /// Name of the document the text came from, for the circuit name.
    pub file_name_hint: Option<&'a str>,
}

/// Temporary artifacts of one conversion.  Dropping it deletes both files.
#[derive(Debug)]
pub struct ConversionJob {
    placeholder: String,
    input_path: TempPath,
    output_path: TempPath,
}

impl ConversionJob {
    /// Writes the prepared input and reserves the output file.
    pub fn create(request: &ConversionRequest<'_>) -> io::Result<Self> {
        let placeholder = generate_placeholder();

        let mut builder = tempfile::Builder::new();
        builder.prefix(&placeholder).suffix(".tsp");
        let mut input_file = match request.working_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        input_file.write_all(prepare_input(request.input).as_bytes())?;
        input_file.flush()?;

        let output_path = tempfile::Builder::new()
            .prefix(&placeholder)
            .suffix(".csv")
            .tempfile()?
            .into_temp_path();

        Ok(Self {
            placeholder,
            input_path: input_file.into_temp_path(),
            output_path,
        })
    }

    /// The token the converter will put into circuit names.
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// The configured command with both paths substituted.
    pub fn command(&self, template: &str) -> String {
        expand_command(
            template,
            &self.input_path.to_string_lossy(),
            &self.output_path.to_string_lossy(),
        )
    }

    async fn read_output(&self) -> io::Result<String> {
        match tokio::fs::read_to_string(&self.output_path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }
}

/// Converts `request.input` to ebusd CSV.
///
/// Returns the trimmed output with the placeholder token replaced by the
/// circuit name derived from `request.file_name_hint`.
///
/// # Errors
///
/// - [`ConversionError::Cancelled`] when `cancel` fires; the process is
///   terminated first.
/// - [`ConversionError::Exited`] on a non-zero exit, with any partial output.
/// - [`ConversionError::NoOutput`] when a clean exit left the output empty.
pub async fn run_conversion(
    request: &ConversionRequest<'_>,
    config: &ConversionConfig,
    runner: &dyn ProcessRunner,
    cancel: &CancellationToken,
) -> Result<String, ConversionError> {
    if cancel.is_cancelled() {
        return Err(ConversionError::Cancelled);
    }

    let job = ConversionJob::create(request)?;
    let command = job.command(&config.command_template);
    info!("running conversion via {}: {command}", runner.name());

    let mut handle = runner
        .start(&command, request.working_dir)
        .await
        .map_err(|source| ConversionError::Spawn {
            command: command.clone(),
            source,
        })?;

    let exit = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        status = handle.wait() => Some(status),
    };
    let Some(status) = exit else {
        handle.terminate().await;
        info!("conversion cancelled");
        return Err(ConversionError::Cancelled);
    };
    let code = status?;

    let output = job.read_output().await?;
    let output = output.trim();
    if code != Some(0) {
        warn!("conversion failed with {}", exit_status(&code));
        return Err(ConversionError::Exited {
            code,
            output: output.to_string(),
        });
    }
    if output.is_empty() {
        return Err(ConversionError::NoOutput);
    }

    let name = circuit_name(request.file_name_hint);
    debug!("renaming {} to {name}", job.placeholder());
    rename_placeholder(output, job.placeholder(), &name)
        .map_err(|e| ConversionError::Rename(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// What the scripted converter does once started.
    #[derive(Clone)]
    enum Script {
        /// Writes `<input file stem>` + the suffix to the output, exits with `code`.
        Emit { suffix: String, code: i32 },
        /// Writes nothing, exits with `code`.
        Exit(i32),
        /// Never exits.
        Hang,
    }

    #[derive(Default)]
    struct Seen {
        commands: Vec<String>,
        inputs: Vec<String>,
        paths: Vec<PathBuf>,
        terminated: usize,
    }

    struct ScriptedRunner {
        script: Script,
        seen: Arc<Mutex<Seen>>,
    }

    impl ScriptedRunner {
        fn new(script: Script) -> Self {
            Self {
                script,
                seen: Arc::default(),
            }
        }
    }

    struct ScriptedHandle {
        code: Option<i32>,
        seen: Arc<Mutex<Seen>>,
    }

    #[async_trait]
    impl ProcessHandle for ScriptedHandle {
        async fn wait(&mut self) -> io::Result<Option<i32>> {
            match self.code {
                Some(code) => Ok(Some(code)),
                None => std::future::pending().await,
            }
        }

        async fn terminate(&mut self) {
            self.seen.lock().unwrap().terminated += 1;
        }
    }

    #[async_trait]
    impl ProcessRunner for ScriptedRunner {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn start(
            &self,
            command: &str,
            _cwd: Option<&Path>,
        ) -> io::Result<Box<dyn ProcessHandle>> {
            // Template used by the tests: "convert ${inFile} ${outFile}".
            let parts: Vec<&str> = command.split_whitespace().collect();
            let (in_file, out_file) = (PathBuf::from(parts[1]), PathBuf::from(parts[2]));
            {
                let mut seen = self.seen.lock().unwrap();
                seen.commands.push(command.to_string());
                seen.inputs.push(std::fs::read_to_string(&in_file)?);
                seen.paths.push(in_file.clone());
                seen.paths.push(out_file.clone());
            }
            let code = match &self.script {
                Script::Emit { suffix, code } => {
                    let stem = in_file.file_stem().unwrap().to_string_lossy().to_string();
                    std::fs::write(&out_file, format!("{stem}{suffix}"))?;
                    Some(*code)
                }
                Script::Exit(code) => Some(*code),
                Script::Hang => None,
            };
            Ok(Box::new(ScriptedHandle {
                code,
                seen: Arc::clone(&self.seen),
            }))
        }
    }

    fn config() -> ConversionConfig {
        ConversionConfig {
            command_template: "convert ${inFile} ${outFile}".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_placeholder_renamed_from_file_name_hint() {
        // Arrange
        let runner = ScriptedRunner::new(Script::Emit {
            suffix: ",circuit,name\n".into(),
            code: 0,
        });
        let request = ConversionRequest {
            input: "namespace kitchen {}",
            file_name_hint: Some("kitchen.tsp"),
            ..Default::default()
        };

        // Act
        let csv = run_conversion(&request, &config(), &runner, &CancellationToken::new())
            .await
            .unwrap();

        // Assert
        assert_eq!(csv, "Kitchen,circuit,name");
    }

    #[tokio::test]
    async fn test_default_circuit_name_without_hint() {
        let runner = ScriptedRunner::new(Script::Emit {
            suffix: ",x".into(),
            code: 0,
        });
        let request = ConversionRequest {
            input: "namespace a {}",
            ..Default::default()
        };

        let csv = run_conversion(&request, &config(), &runner, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(csv, "Main,x");
    }

    #[tokio::test]
    async fn test_input_file_gets_using_declaration() {
        let runner = ScriptedRunner::new(Script::Emit {
            suffix: ",x".into(),
            code: 0,
        });
        let request = ConversionRequest {
            input: "import \"@ebusd/ebus-typespec\";\nnamespace a {}",
            ..Default::default()
        };

        run_conversion(&request, &config(), &runner, &CancellationToken::new())
            .await
            .unwrap();

        let seen = runner.seen.lock().unwrap();
        assert_eq!(
            seen.inputs[0],
            "import \"@ebusd/ebus-typespec\";\nusing Ebus;\nnamespace a {}"
        );
        assert!(seen.commands[0].starts_with("convert "));
    }

    #[tokio::test]
    async fn test_nonzero_exit_includes_partial_output() {
        let runner = ScriptedRunner::new(Script::Emit {
            suffix: ",partial".into(),
            code: 2,
        });
        let request = ConversionRequest {
            input: "bad",
            ..Default::default()
        };

        let err = run_conversion(&request, &config(), &runner, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::Exited { code: Some(2), .. }));
        let text = err.to_string();
        assert!(text.starts_with("conversion exited with code 2"));
        assert!(text.contains(",partial"));
    }

    #[tokio::test]
    async fn test_clean_exit_without_output_is_no_output() {
        let runner = ScriptedRunner::new(Script::Exit(0));
        let request = ConversionRequest {
            input: "namespace a {}",
            ..Default::default()
        };

        let err = run_conversion(&request, &config(), &runner, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::NoOutput));
    }

    #[tokio::test]
    async fn test_cancel_terminates_and_cleans_up() {
        // Arrange
        let runner = ScriptedRunner::new(Script::Hang);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });
        let request = ConversionRequest {
            input: "namespace a {}",
            ..Default::default()
        };

        // Act
        let err = run_conversion(&request, &config(), &runner, &token)
            .await
            .unwrap_err();

        // Assert
        assert!(matches!(err, ConversionError::Cancelled));
        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.terminated, 1);
        assert!(seen.paths.iter().all(|p| !p.exists()), "artifacts removed");
    }

    #[tokio::test]
    async fn test_artifacts_removed_after_success() {
        let runner = ScriptedRunner::new(Script::Emit {
            suffix: ",x".into(),
            code: 0,
        });
        let request = ConversionRequest {
            input: "namespace a {}",
            ..Default::default()
        };

        run_conversion(&request, &config(), &runner, &CancellationToken::new())
            .await
            .unwrap();

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.paths.len(), 2);
        assert!(seen.paths.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_starts_nothing() {
        let runner = ScriptedRunner::new(Script::Exit(0));
        let token = CancellationToken::new();
        token.cancel();

        let err = run_conversion(&ConversionRequest::default(), &config(), &runner, &token)
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::Cancelled));
        assert!(runner.seen.lock().unwrap().commands.is_empty());
    }

    #[tokio::test]
    async fn test_input_file_placed_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new(Script::Emit {
            suffix: ",x".into(),
            code: 0,
        });
        let request = ConversionRequest {
            input: "namespace a {}",
            working_dir: Some(dir.path()),
            ..Default::default()
        };

        run_conversion(&request, &config(), &runner, &CancellationToken::new())
            .await
            .unwrap();

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.paths[0].parent(), Some(dir.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_shell_copy_round_trip() {
        // `cp` stands in for the converter: the output equals the prepared input.
        let config = ConversionConfig {
            command_template: "cp ${inFile} ${outFile}".into(),
            ..Default::default()
        };
        let request = ConversionRequest {
            input: "using Ebus;\nnamespace a {}\n",
            ..Default::default()
        };

        let out = run_conversion(
            &request,
            &config,
            runner_for(ebus_core::ShowOption::Task).as_ref(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(out, "using Ebus;\nnamespace a {}");
    }
}
