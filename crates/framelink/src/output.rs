use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framelink_router::RouterStatsSnapshot;
use framelink_sinks::{ImageStats, MessageStats};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

/// Everything the demo observed, for one shot of output at the end.
#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub router: RouterSection,
    pub image: SinkSection,
    pub message: SinkSection,
    pub consumer: ConsumerSection,
}

#[derive(Debug, Serialize)]
pub struct RouterSection {
    pub bytes_rx: u64,
    pub frames_ok: u32,
    pub frames_dropped: u32,
    pub resync_count: u32,
}

#[derive(Debug, Serialize)]
pub struct SinkSection {
    pub frames_ok: u32,
    pub frames_drop: u32,
    pub frames_bad: u32,
}

#[derive(Debug, Serialize)]
pub struct ConsumerSection {
    pub messages_popped: u64,
    pub images_rendered: u64,
}

impl DemoReport {
    pub fn new(
        router: RouterStatsSnapshot,
        image: ImageStats,
        message: MessageStats,
        messages_popped: u64,
        images_rendered: u64,
    ) -> Self {
        Self {
            router: RouterSection {
                bytes_rx: router.bytes_rx,
                frames_ok: router.frames_ok,
                frames_dropped: router.frames_dropped,
                resync_count: router.resync_count,
            },
            image: SinkSection {
                frames_ok: image.frames_ok,
                frames_drop: image.frames_drop,
                frames_bad: image.frames_bad,
            },
            message: SinkSection {
                frames_ok: message.frames_ok,
                frames_drop: message.frames_drop,
                frames_bad: message.frames_bad,
            },
            consumer: ConsumerSection {
                messages_popped,
                images_rendered,
            },
        }
    }
}

pub fn print_report(report: &DemoReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SCOPE", "OK", "POLICY DROP", "REJECTED", "DETAIL"])
                .add_row(vec![
                    "router".to_string(),
                    report.router.frames_ok.to_string(),
                    "-".to_string(),
                    report.router.frames_dropped.to_string(),
                    format!(
                        "{} bytes rx, {} resyncs",
                        report.router.bytes_rx, report.router.resync_count
                    ),
                ])
                .add_row(vec![
                    "image sink".to_string(),
                    report.image.frames_ok.to_string(),
                    report.image.frames_drop.to_string(),
                    report.image.frames_bad.to_string(),
                    format!("{} rendered", report.consumer.images_rendered),
                ])
                .add_row(vec![
                    "message sink".to_string(),
                    report.message.frames_ok.to_string(),
                    report.message.frames_drop.to_string(),
                    report.message.frames_bad.to_string(),
                    format!("{} popped", report.consumer.messages_popped),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "router: ok={} dropped={} resyncs={} bytes={}",
                report.router.frames_ok,
                report.router.frames_dropped,
                report.router.resync_count,
                report.router.bytes_rx
            );
            println!(
                "image:  ok={} policy_drop={} rejected={} rendered={}",
                report.image.frames_ok,
                report.image.frames_drop,
                report.image.frames_bad,
                report.consumer.images_rendered
            );
            println!(
                "message: ok={} policy_drop={} rejected={} popped={}",
                report.message.frames_ok,
                report.message.frames_drop,
                report.message.frames_bad,
                report.consumer.messages_popped
            );
        }
    }
}
