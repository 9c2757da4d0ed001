//! Spreadsheet automation bridge backend
//!
//! Spawns a helper process that owns the desktop application's automation
//! handle (for example a COM client for Excel) and talks to it over
//! newline-delimited JSON on stdin/stdout. Each request gets exactly one
//! response line:
//!
//! ```text
//! -> {"op":"set_value","cell":"B2","value":24137.5}
//! <- {"ok":true}
//! -> {"op":"get_value","cell":"B2"}
//! <- {"ok":true,"value":24137.5}
//! ```
//!
//! A helper that does not answer within `response_timeout_ms` is killed and
//! every later request fails immediately, so the writer thread never waits
//! on it indefinitely.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use crate::infrastructure::config::BridgeConfig;
use crate::sheet::{column_letters, Cell, CellRange, CellValue, Spreadsheet, Style};
use crate::{FeedError, Result};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    AddWorkbook { visible: bool },
    SetValue { cell: Cell, value: &'a CellValue },
    GetValue { cell: Cell },
    SetStyle { range: CellRange, style: &'a Style },
    Merge { range: CellRange },
    DefineName { name: &'a str, range: CellRange },
    SetColumnWidth { column: String, width: f64 },
    Autofit { columns: String },
    Save { path: Option<&'a str> },
    Quit,
}

#[derive(Debug, Deserialize)]
struct Response {
    ok: bool,
    #[serde(default)]
    value: Option<CellValue>,
    #[serde(default)]
    error: Option<String>,
}

/// Spreadsheet driven through an external automation helper
pub struct BridgeSheet {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    responses: Receiver<io::Result<String>>,
    config: BridgeConfig,
    closed: bool,
}

impl BridgeSheet {
    /// Start the helper process
    pub fn launch(config: &BridgeConfig) -> Result<Self> {
        tracing::info!(target: "sheet", command = %config.command, "Launching spreadsheet bridge");

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FeedError::Sheet("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FeedError::Sheet("bridge stdout unavailable".to_string()))?;

        let (sender, responses) = channel::unbounded();
        if let Err(e) = thread::Builder::new()
            .name("sheet-bridge-reader".to_string())
            .spawn(move || read_responses(stdout, sender))
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e.into());
        }

        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            responses,
            config: config.clone(),
            closed: false,
        })
    }

    /// Send one request and wait for its response line
    fn call(&mut self, request: &Request<'_>) -> Result<Option<CellValue>> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| FeedError::Sheet("bridge already closed".to_string()))?;

        serde_json::to_writer(&mut *stdin, request)?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;

        let timeout = Duration::from_millis(self.config.response_timeout_ms);
        let line = match self.responses.recv_timeout(timeout) {
            Ok(line) => line?,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(FeedError::Sheet("bridge closed its output".to_string()));
            }
            Err(RecvTimeoutError::Timeout) => {
                self.kill_unresponsive();
                return Err(FeedError::Sheet(format!(
                    "bridge did not respond within {}ms",
                    self.config.response_timeout_ms
                )));
            }
        };

        let response: Response = serde_json::from_str(line.trim_end())?;
        if response.ok {
            Ok(response.value)
        } else {
            Err(FeedError::Sheet(
                response.error.unwrap_or_else(|| "bridge reported failure".to_string()),
            ))
        }
    }

    /// Kill a helper that stopped answering; later calls fail fast
    fn kill_unresponsive(&mut self) {
        tracing::error!(target: "sheet", timeout_ms = self.config.response_timeout_ms, "Spreadsheet bridge unresponsive, killing it");
        self.stdin = None;
        if let Err(e) = self.child.kill() {
            tracing::warn!(target: "sheet", error = %e, "Failed to kill spreadsheet bridge");
        }
        let _ = self.child.wait();
    }

    /// Wait for the helper to exit, killing it after the quit timeout
    fn reap(&mut self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(self.config.quit_timeout_ms);
        loop {
            if let Some(status) = self.child.try_wait()? {
                tracing::debug!(target: "sheet", %status, "Spreadsheet bridge exited");
                return Ok(());
            }
            if Instant::now() >= deadline {
                tracing::warn!(target: "sheet", "Spreadsheet bridge did not exit, killing it");
                self.child.kill()?;
                self.child.wait()?;
                return Ok(());
            }
            thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Spreadsheet for BridgeSheet {
    fn add_workbook(&mut self) -> Result<()> {
        let visible = self.config.visible;
        self.call(&Request::AddWorkbook { visible }).map(drop)
    }

    fn set_value(&mut self, cell: Cell, value: CellValue) -> Result<()> {
        self.call(&Request::SetValue { cell, value: &value }).map(drop)
    }

    fn value(&mut self, cell: Cell) -> Result<CellValue> {
        Ok(self.call(&Request::GetValue { cell })?.unwrap_or_default())
    }

    fn set_style(&mut self, range: CellRange, style: &Style) -> Result<()> {
        self.call(&Request::SetStyle { range, style }).map(drop)
    }

    fn merge(&mut self, range: CellRange) -> Result<()> {
        self.call(&Request::Merge { range }).map(drop)
    }

    fn define_name(&mut self, name: &str, range: CellRange) -> Result<()> {
        self.call(&Request::DefineName { name, range }).map(drop)
    }

    fn set_column_width(&mut self, col: u32, width: f64) -> Result<()> {
        let column = column_letters(col);
        self.call(&Request::SetColumnWidth { column, width }).map(drop)
    }

    fn autofit(&mut self, first_col: u32, last_col: u32) -> Result<()> {
        let columns = format!("{}:{}", column_letters(first_col), column_letters(last_col));
        self.call(&Request::Autofit { columns }).map(drop)
    }

    fn save(&mut self) -> Result<()> {
        let path = self.config.save_path.clone();
        self.call(&Request::Save {
            path: path.as_deref(),
        })
        .map(drop)
    }

    fn quit(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let sent = self.call(&Request::Quit).map(drop);
        // Closing stdin lets a line-reading helper leave its loop
        self.stdin = None;
        let reaped = self.reap();
        sent.and(reaped)
    }
}

/// Forward each response line from the helper until it closes its output
fn read_responses(stdout: ChildStdout, sender: Sender<io::Result<String>>) {
    let mut reader = BufReader::new(stdout);
    loop {
        let mut line = String::with_capacity(256);
        match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {
                if sender.send(Ok(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = sender.send(Err(e));
                return;
            }
        }
    }
}

impl Drop for BridgeSheet {
    fn drop(&mut self) {
        if !self.closed {
            self.stdin = None;
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell_bridge(script: &str) -> BridgeConfig {
        BridgeConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            visible: false,
            save_path: None,
            quit_timeout_ms: 2_000,
            response_timeout_ms: 2_000,
        }
    }

    #[test]
    fn test_request_wire_format() {
        let value = CellValue::Number(24137.5);
        let json = serde_json::to_string(&Request::SetValue {
            cell: Cell::new(2, 2),
            value: &value,
        })
        .unwrap();
        assert_eq!(json, r#"{"op":"set_value","cell":"B2","value":24137.5}"#);

        let json = serde_json::to_string(&Request::Quit).unwrap();
        assert_eq!(json, r#"{"op":"quit"}"#);
    }

    #[test]
    fn test_round_trip_with_helper() {
        let config = shell_bridge(
            r#"while read line; do echo '{"ok":true,"value":42}'; done"#,
        );
        let mut sheet = BridgeSheet::launch(&config).unwrap();
        sheet.add_workbook().unwrap();
        sheet.set_value(Cell::new(1, 1), "NIFTY 50".into()).unwrap();
        assert_eq!(sheet.value(Cell::new(1, 1)).unwrap(), CellValue::Number(42.0));
        sheet.quit().unwrap();
        // Second quit is a no-op
        sheet.quit().unwrap();
    }

    #[test]
    fn test_helper_error_is_reported() {
        let config = shell_bridge(
            r#"while read line; do echo '{"ok":false,"error":"sheet is protected"}'; done"#,
        );
        let mut sheet = BridgeSheet::launch(&config).unwrap();
        let err = sheet.set_value(Cell::new(1, 1), 1.0.into()).unwrap_err();
        assert!(err.to_string().contains("sheet is protected"));
    }

    #[test]
    fn test_helper_exit_is_error() {
        let config = shell_bridge("exit 0");
        let mut sheet = BridgeSheet::launch(&config).unwrap();
        assert!(sheet.add_workbook().is_err());
    }

    #[test]
    fn test_unresponsive_helper_times_out_and_is_killed() {
        let mut config = shell_bridge("sleep 30");
        config.response_timeout_ms = 100;
        let mut sheet = BridgeSheet::launch(&config).unwrap();

        let started = Instant::now();
        let err = sheet.add_workbook().unwrap_err();
        assert!(err.to_string().contains("did not respond"));
        assert!(sheet.child.try_wait().unwrap().is_some());

        // Later requests and the close sequence fail fast
        assert!(sheet.set_value(Cell::new(1, 1), 1.0.into()).is_err());
        assert!(sheet.save().is_err());
        assert!(sheet.quit().is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_helper_fails_to_launch() {
        let mut config = shell_bridge("");
        config.command = "/nonexistent/spreadsheet-bridge".to_string();
        assert!(BridgeSheet::launch(&config).is_err());
    }
}
