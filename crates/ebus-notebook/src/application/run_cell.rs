//! CellRunner: the notebook cell flow on top of conversion and sending.
//!
//! A cell is either TypeSpec source or free text:
//!
//! - **TypeSpec** is converted to ebusd CSV.  With an ebusd endpoint
//!   configured, the definitions matching the requested [`Target`] are then
//!   sent as test commands in the configured mode.
//! - **Text** is sent verbatim in Raw mode, one command per line; an empty
//!   cell sends `info`.
//!
//! The outcome is always a [`CellReport`]; errors are recorded in it rather
//! than returned, so the caller can show the CSV and partial transcript next
//! to the failure.  [`CellRunner::upload_definitions`] is the separate "upload
//! to ebusd" action offered for a successfully converted cell.

use std::path::Path;

use ebus_core::protocol::select::{select_lines, Target};
use ebus_core::{
    ConversionConfig, Endpoint, Mode, SelectionPolicy, SessionConfig, Transcript,
};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::send_to_ebusd::{build_batch, SendError, SendOutcome, SendToEbusdUseCase};
use crate::infrastructure::conversion::{run_conversion, ConversionError, ConversionRequest, ProcessRunner};
use crate::infrastructure::network::Connector;

/// Command sent for an empty text cell.
pub const EMPTY_CELL_COMMAND: &str = "info";

/// Reply ebusd gives for every accepted definition.
pub const UPLOAD_ACCEPTED: &str = "done";

/// Everything that can fail in the cell pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("ebusd host/port not configured")]
    NoEndpoint,

    #[error("ebusd rejected the upload: {}", .replies.join("; "))]
    UploadRejected { replies: Vec<String> },
}

/// Content of one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellSource {
    TypeSpec {
        text: String,
        /// Name of the notebook file, used for the circuit name.
        file_name: Option<String>,
    },
    Text(String),
}

/// Result of executing one cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CellReport {
    /// Conversion (if any) and send (if any) both succeeded.
    pub success: bool,
    /// Whether anything was sent to ebusd.
    pub executed: bool,
    /// Conversion output, for TypeSpec cells that converted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv: Option<String>,
    pub transcript: Transcript,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CellReport {
    fn fail(&mut self, err: impl Into<PipelineError>) {
        let err = err.into();
        warn!("cell failed: {err}");
        self.success = false;
        self.error = Some(err.to_string());
    }
}

/// Immutable settings for a [`CellRunner`].
#[derive(Debug, Clone, Default)]
pub struct CellSettings {
    /// `None` disables everything that talks to ebusd.
    pub endpoint: Option<Endpoint>,
    pub session: SessionConfig,
    pub conversion: ConversionConfig,
    pub selection: SelectionPolicy,
}

/// Runs cells and uploads definitions.
pub struct CellRunner<C: Connector> {
    sender: SendToEbusdUseCase<C>,
    process_runner: Box<dyn ProcessRunner>,
    settings: CellSettings,
}

impl<C: Connector> CellRunner<C> {
    pub fn new(
        sender: SendToEbusdUseCase<C>,
        process_runner: Box<dyn ProcessRunner>,
        settings: CellSettings,
    ) -> Self {
        Self {
            sender,
            process_runner,
            settings,
        }
    }

    pub fn settings(&self) -> &CellSettings {
        &self.settings
    }

    /// Converts `source` with the configured process runner.
    ///
    /// # Errors
    ///
    /// See [`ConversionError`].
    pub async fn convert(
        &self,
        text: &str,
        file_name: Option<&str>,
        working_dir: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<String, ConversionError> {
        let request = ConversionRequest {
            input: text,
            working_dir,
            file_name_hint: file_name,
        };
        run_conversion(
            &request,
            &self.settings.conversion,
            self.process_runner.as_ref(),
            cancel,
        )
        .await
    }

    /// Executes one cell and reports the outcome.
    pub async fn run_cell(
        &self,
        source: &CellSource,
        target: &Target,
        working_dir: Option<&Path>,
        cancel: &CancellationToken,
    ) -> CellReport {
        let mut report = CellReport {
            success: true,
            ..Default::default()
        };

        let (batch, session) = match source {
            CellSource::TypeSpec { text, file_name } => {
                let csv = match self
                    .convert(text, file_name.as_deref(), working_dir, cancel)
                    .await
                {
                    Ok(csv) => csv,
                    Err(e) => {
                        report.fail(e);
                        return report;
                    }
                };
                let session = self.settings.session.clone();
                let mut batch = build_batch(csv.lines(), &session.mode);
                if session.mode.filters_input() {
                    batch = select_lines(&batch, target, &self.settings.selection);
                }
                report.csv = Some(csv);
                (batch, session)
            }
            CellSource::Text(text) => {
                let text = if text.trim().is_empty() {
                    EMPTY_CELL_COMMAND
                } else {
                    text.as_str()
                };
                let session = self.settings.session.with_mode(Mode::Raw);
                (build_batch(text.lines(), &session.mode), session)
            }
        };

        let Some(endpoint) = &self.settings.endpoint else {
            info!("no ebusd endpoint configured, nothing sent");
            return report;
        };

        match self
            .sender
            .send_batch(batch, endpoint, &session, &mut report.transcript, Some(cancel))
            .await
        {
            Ok(SendOutcome::Completed { .. }) => report.executed = true,
            Ok(SendOutcome::NotExecuted) => {}
            Err(e) => {
                report.executed = !matches!(e, SendError::NoUsableInput);
                report.fail(e);
            }
        }
        report
    }

    /// Uploads converted definitions so ebusd uses them immediately.
    ///
    /// Returns the transcript of daemon replies.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::NoEndpoint`] without a configured endpoint.
    /// - [`PipelineError::UploadRejected`] when any reply differs from `done`.
    /// - [`PipelineError::Send`] for session failures.
    pub async fn upload_definitions(
        &self,
        csv: &str,
        cancel: &CancellationToken,
    ) -> Result<Transcript, PipelineError> {
        let endpoint = self
            .settings
            .endpoint
            .as_ref()
            .ok_or(PipelineError::NoEndpoint)?;
        let session = self.settings.session.with_mode(Mode::Upload);
        let mut transcript = Transcript::new();

        self.sender
            .filter_and_send(csv.lines(), endpoint, &session, &mut transcript, Some(cancel))
            .await?;

        let replies: Vec<String> = transcript
            .entries()
            .iter()
            .filter(|reply| reply.trim() != UPLOAD_ACCEPTED)
            .map(|reply| reply.trim().to_string())
            .collect();
        if !replies.is_empty() {
            return Err(PipelineError::UploadRejected { replies });
        }
        info!("uploaded {} definitions", transcript.len());
        Ok(transcript)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::conversion::ProcessHandle;
    use crate::infrastructure::network::mock::{MockConnector, MockTransport, TransportLog};
    use async_trait::async_trait;
    use std::io;

    /// Converter double: writes fixed CSV (with the input file stem as the
    /// circuit placeholder in place of `{stem}`) and exits with `code`.
    struct FixedRunner {
        csv: String,
        code: i32,
    }

    struct Exited(i32);

    #[async_trait]
    impl ProcessHandle for Exited {
        async fn wait(&mut self) -> io::Result<Option<i32>> {
            Ok(Some(self.0))
        }
        async fn terminate(&mut self) {}
    }

    #[async_trait]
    impl ProcessRunner for FixedRunner {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn start(
            &self,
            command: &str,
            _cwd: Option<&Path>,
        ) -> io::Result<Box<dyn ProcessHandle>> {
            let parts: Vec<&str> = command.split_whitespace().collect();
            let stem = Path::new(parts[1])
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            std::fs::write(parts[2], self.csv.replace("{stem}", &stem))?;
            Ok(Box::new(Exited(self.code)))
        }
    }

    const CSV: &str = "type,circuit,level,name,comment\n\
                       # generated\n\
                       r,{stem},,temp,flow\n\
                       r,{stem},,pressure,water\n";

    fn settings(endpoint: bool) -> CellSettings {
        CellSettings {
            endpoint: endpoint.then(|| Endpoint::new("127.0.0.1", 8888).unwrap()),
            conversion: ConversionConfig {
                command_template: "convert ${inFile} ${outFile}".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn runner_with(
        script: Vec<Vec<String>>,
        csv: &str,
        code: i32,
        endpoint: bool,
    ) -> (CellRunner<MockConnector>, TransportLog) {
        let transport = MockTransport::new(script);
        let log = transport.log();
        let runner = CellRunner::new(
            SendToEbusdUseCase::new(MockConnector::new(transport)),
            Box::new(FixedRunner {
                csv: csv.to_string(),
                code,
            }),
            settings(endpoint),
        );
        (runner, log)
    }

    fn typespec(name: &str) -> CellSource {
        CellSource::TypeSpec {
            text: "namespace kitchen {}".into(),
            file_name: Some(name.into()),
        }
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_typespec_cell_converts_and_queries() {
        // Arrange
        let (runner, log) = runner_with(
            vec![lines(&["21.5", ""]), lines(&["1.8", ""])],
            CSV,
            0,
            true,
        );

        // Act
        let report = runner
            .run_cell(&typespec("kitchen.tsp"), &Target::default(), None, &CancellationToken::new())
            .await;

        // Assert
        assert!(report.success, "{:?}", report.error);
        assert!(report.executed);
        let csv = report.csv.unwrap();
        assert!(csv.contains("r,Kitchen,,temp,flow"));
        assert_eq!(
            log.writes(),
            vec![
                r#"read -V -V -def -def -i "" "r,Kitchen,temp,flow""#,
                r#"read -V -V -def -def -i "" "r,Kitchen,pressure,water""#,
            ]
        );
        assert_eq!(report.transcript.len(), 4);
    }

    #[tokio::test]
    async fn test_target_selects_matching_model() {
        let (runner, log) = runner_with(vec![lines(&[""])], CSV, 0, true);
        let target = Target {
            namespace: None,
            model: Some("Pressure".into()),
        };

        let report = runner
            .run_cell(&typespec("kitchen.tsp"), &target, None, &CancellationToken::new())
            .await;

        assert!(report.success);
        assert_eq!(log.writes().len(), 1);
        assert!(log.writes()[0].contains("pressure"));
    }

    #[tokio::test]
    async fn test_typespec_without_endpoint_only_converts() {
        let (runner, log) = runner_with(vec![], CSV, 0, false);

        let report = runner
            .run_cell(&typespec("kitchen.tsp"), &Target::default(), None, &CancellationToken::new())
            .await;

        assert!(report.success);
        assert!(!report.executed);
        assert!(report.csv.is_some());
        assert!(log.writes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_conversion_fails_cell_without_sending() {
        let (runner, log) = runner_with(vec![], "{stem},broken", 1, true);

        let report = runner
            .run_cell(&typespec("kitchen.tsp"), &Target::default(), None, &CancellationToken::new())
            .await;

        assert!(!report.success);
        assert!(report.csv.is_none());
        assert!(report.error.unwrap().contains("exited with code 1"));
        assert!(log.writes().is_empty());
    }

    #[tokio::test]
    async fn test_csv_without_definitions_fails_unexecuted() {
        // Arrange: the converter emits only a header and a comment
        let (runner, log) = runner_with(vec![], "type,circuit,level,name\n# nothing\n", 0, true);

        // Act
        let report = runner
            .run_cell(&typespec("kitchen.tsp"), &Target::default(), None, &CancellationToken::new())
            .await;

        // Assert: the daemon was never contacted
        assert!(!report.success);
        assert!(!report.executed);
        assert_eq!(report.error.as_deref(), Some("no usable input"));
        assert_eq!(runner.sender.connector().attempts(), 0);
        assert!(log.writes().is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_cell_sends_info_raw() {
        let (runner, log) = runner_with(vec![lines(&["version: ebusd 23.2", ""])], "", 0, true);

        let report = runner
            .run_cell(&CellSource::Text("  ".into()), &Target::default(), None, &CancellationToken::new())
            .await;

        assert!(report.success);
        assert_eq!(log.writes(), vec!["info"]);
        assert_eq!(
            report.transcript.entries(),
            &["info", "version: ebusd 23.2"].map(String::from)
        );
    }

    #[tokio::test]
    async fn test_daemon_error_fails_cell_but_keeps_transcript() {
        let (runner, _log) = runner_with(
            vec![lines(&["ERR:element not found"])],
            "",
            0,
            true,
        );

        let report = runner
            .run_cell(
                &CellSource::Text("read -c bai nothing".into()),
                &Target::default(),
                None,
                &CancellationToken::new(),
            )
            .await;

        assert!(!report.success);
        assert!(report.executed);
        assert!(report.error.unwrap().contains("element not found"));
        assert_eq!(report.transcript.entries(), &["read -c bai nothing".to_string()]);
    }

    #[tokio::test]
    async fn test_report_serializes_without_empty_fields() {
        let report = CellReport {
            success: true,
            executed: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "executed": true, "transcript": []})
        );
    }

    #[tokio::test]
    async fn test_upload_all_done_succeeds() {
        let (runner, log) = runner_with(
            vec![lines(&["done", ""]), lines(&["done", ""])],
            "",
            0,
            true,
        );

        let transcript = runner
            .upload_definitions("type,circuit,name\nr,bai,temp\nr,bai,flow", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(transcript.len(), 2);
        assert_eq!(
            log.writes(),
            vec![r#"define -r "r,bai,temp""#, r#"define -r "r,bai,flow""#]
        );
    }

    #[tokio::test]
    async fn test_upload_collects_rejections() {
        let (runner, _log) = runner_with(
            vec![lines(&["done", ""]), lines(&["invalid field type", ""])],
            "",
            0,
            true,
        );

        let err = runner
            .upload_definitions("type,circuit,name\nr,bai,temp\nr,bai,flow", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::UploadRejected { ref replies } if replies == &["invalid field type".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_upload_requires_endpoint() {
        let (runner, _log) = runner_with(vec![], "", 0, false);
        let err = runner
            .upload_definitions("h\nr,bai,temp", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoEndpoint));
    }
}
