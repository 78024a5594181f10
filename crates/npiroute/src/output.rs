use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use npiroute_core::RunSummary;
use npiroute_frame::Frame;
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

#[derive(Serialize)]
struct FrameOutput<'a> {
    class: &'a str,
    cmd0: String,
    cmd1: String,
    data_size: usize,
    data: String,
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    let class = class_name(frame);
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                class,
                cmd0: format!("{:#04x}", frame.cmd0()),
                cmd1: format!("{:#04x}", frame.cmd1()),
                data_size: frame.data().len(),
                data: hex(frame.data()),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CLASS", "CMD0", "CMD1", "SIZE", "DATA"])
                .add_row(vec![
                    class.to_string(),
                    format!("{:#04x}", frame.cmd0()),
                    format!("{:#04x}", frame.cmd1()),
                    frame.data().len().to_string(),
                    hex(frame.data()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "class={} cmd0={:#04x} cmd1={:#04x} size={} data={}",
                class,
                frame.cmd0(),
                frame.cmd1(),
                frame.data().len(),
                hex(frame.data())
            );
        }
        OutputFormat::Raw => print_raw(frame.data()),
    }
}

pub fn print_summary(summary: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"])
                .add_row(vec!["passes".to_string(), summary.passes.to_string()])
                .add_row(vec!["released".to_string(), summary.released.to_string()]);
            for (name, value) in summary.stats.rows() {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("passes={} released={}", summary.passes, summary.released);
            for (name, value) in summary.stats.rows() {
                println!("  {name}={value}");
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn class_name(frame: &Frame) -> &'static str {
    frame.class().map(|class| class.as_str()).unwrap_or("UNKNOWN")
}

pub fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}
