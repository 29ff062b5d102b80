use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One line of command output, renderable in every [`OutputFormat`].
pub trait Record: Serialize {
    fn columns(&self) -> &'static [&'static str];
    fn row(&self) -> Vec<String>;
    /// Bytes written for `--format raw`.
    fn raw(&self) -> Vec<u8>;
}

pub fn emit<R: Record>(record: &R, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(record.columns().to_vec())
                .add_row(record.row());
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line = record
                .columns()
                .iter()
                .zip(record.row())
                .map(|(column, value)| format!("{}={value}", column.to_lowercase()))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
        }
        OutputFormat::Raw => print_raw(&record.raw()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

#[derive(Serialize)]
pub struct CallOutput {
    pub a: i32,
    pub b: i32,
    pub op: &'static str,
    pub result: i32,
    pub elapsed_us: u128,
}

impl Record for CallOutput {
    fn columns(&self) -> &'static [&'static str] {
        &["A", "OP", "B", "RESULT", "ELAPSED_US"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.a.to_string(),
            self.op.to_string(),
            self.b.to_string(),
            self.result.to_string(),
            self.elapsed_us.to_string(),
        ]
    }

    fn raw(&self) -> Vec<u8> {
        format!("{}\n", self.result).into_bytes()
    }
}

#[derive(Serialize)]
pub struct PingOutput {
    pub path: String,
    pub ok: bool,
    pub elapsed_us: u128,
}

impl Record for PingOutput {
    fn columns(&self) -> &'static [&'static str] {
        &["PATH", "OK", "ELAPSED_US"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            self.ok.to_string(),
            self.elapsed_us.to_string(),
        ]
    }

    fn raw(&self) -> Vec<u8> {
        b"ok\n".to_vec()
    }
}

#[derive(Serialize)]
pub struct NotifyOutput {
    pub seq: Option<u64>,
    pub header: String,
    pub size: usize,
    pub payload: String,
    pub timestamp: String,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl NotifyOutput {
    pub fn new(seq: Option<u64>, header: &[u8], body: &[u8]) -> Self {
        Self {
            seq,
            header: payload_preview(header),
            size: body.len(),
            payload: payload_preview(body),
            timestamp: now_unix_seconds(),
            body: body.to_vec(),
        }
    }
}

impl Record for NotifyOutput {
    fn columns(&self) -> &'static [&'static str] {
        &["SEQ", "HEADER", "SIZE", "PAYLOAD"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.seq.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            self.header.clone(),
            self.size.to_string(),
            self.payload.clone(),
        ]
    }

    fn raw(&self) -> Vec<u8> {
        self.body.clone()
    }
}

#[derive(Serialize)]
pub struct ServeSummary {
    pub path: String,
    pub requests: u64,
    pub notifications: u64,
}

impl Record for ServeSummary {
    fn columns(&self) -> &'static [&'static str] {
        &["PATH", "REQUESTS", "NOTIFICATIONS"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            self.requests.to_string(),
            self.notifications.to_string(),
        ]
    }

    fn raw(&self) -> Vec<u8> {
        format!("{} {}\n", self.requests, self.notifications).into_bytes()
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_marks_binary_payloads() {
        assert_eq!(payload_preview(b"tick"), "tick");
        assert_eq!(payload_preview(&[0, 1, 2, 3]), "<binary 4 bytes>");
    }

    #[test]
    fn call_output_serializes_result() {
        let out = CallOutput {
            a: 5,
            b: 7,
            op: "+",
            result: 12,
            elapsed_us: 80,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&out).unwrap()).unwrap();
        assert_eq!(json["result"], 12);
        assert_eq!(out.raw(), b"12\n");
        assert_eq!(out.columns().len(), out.row().len());
    }

    #[test]
    fn notify_output_hides_raw_body_from_json() {
        let out = NotifyOutput::new(Some(3), b"tick", &3u64.to_le_bytes());
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"seq\":3"));
        assert!(!json.contains("\"body\""));
        assert_eq!(out.raw(), 3u64.to_le_bytes().to_vec());
    }
}
