use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framelink_transport::PostedPacket;
use framelink_wire::{is_internal, is_private, KIND_SET_STATE};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
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

/// What a decoded inner message is.
pub fn packet_kind(message: &Value) -> &'static str {
    if is_private(message) {
        return "mounted";
    }
    if !is_internal(message) {
        return "application";
    }
    match message.get("kind").and_then(Value::as_str) {
        Some(KIND_SET_STATE) => "set-state",
        _ => "internal",
    }
}

#[derive(Debug, Serialize)]
pub struct PacketView {
    pub kind: &'static str,
    pub from_id: Option<String>,
    pub message: Value,
}

pub fn print_packet(view: &PacketView, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(view),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "FROM", "MESSAGE"])
                .add_row(vec![
                    view.kind.to_string(),
                    sender_label(view.from_id.as_deref()),
                    view.message.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} from={} message={}",
                view.kind,
                sender_label(view.from_id.as_deref()),
                view.message
            );
        }
        OutputFormat::Raw => print_raw(view.message.to_string().as_bytes()),
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    kind: &'static str,
    from_id: Option<&'a str>,
    size: usize,
    wire: &'a str,
}

pub fn print_encoded(wire: &str, kind: &'static str, from_id: Option<&str>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            kind,
            from_id,
            size: wire.len(),
            wire,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "FROM", "SIZE", "WIRE"])
                .add_row(vec![
                    kind.to_string(),
                    sender_label(from_id),
                    wire.len().to_string(),
                    wire.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={kind} from={} size={} wire={wire}",
                sender_label(from_id),
                wire.len()
            );
        }
        OutputFormat::Raw => {
            print_raw(wire.as_bytes());
            println!();
        }
    }
}

/// Outcome of one simulated parent/child pair.
#[derive(Debug, Serialize)]
pub struct LinkReport {
    pub frame: String,
    pub handshake: String,
    pub queued: usize,
    pub delivered: usize,
    pub announcement_lost: bool,
}

#[derive(Serialize)]
struct TranscriptEntry {
    target: String,
    kind: &'static str,
    from_id: Option<String>,
    payload: String,
}

impl TranscriptEntry {
    fn from_packet(packet: &PostedPacket) -> Self {
        let decoded = framelink_wire::decode::<Value>(&packet.payload);
        Self {
            target: packet.target.to_string(),
            kind: decoded
                .as_ref()
                .map_or("foreign", |decoded| packet_kind(&decoded.message)),
            from_id: decoded.and_then(|decoded| decoded.from_id),
            payload: packet.payload.clone(),
        }
    }
}

#[derive(Serialize)]
struct SimulationOutput<'a> {
    links: &'a [LinkReport],
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript: Option<Vec<TranscriptEntry>>,
}

pub fn print_simulation(
    reports: &[LinkReport],
    transcript: Option<&[PostedPacket]>,
    format: OutputFormat,
) {
    let transcript: Option<Vec<TranscriptEntry>> =
        transcript.map(|packets| packets.iter().map(TranscriptEntry::from_packet).collect());

    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(&SimulationOutput {
            links: reports,
            transcript,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "HANDSHAKE", "QUEUED", "DELIVERED", "ANNOUNCEMENT"]);
            for report in reports {
                table.add_row(vec![
                    report.frame.clone(),
                    report.handshake.clone(),
                    report.queued.to_string(),
                    report.delivered.to_string(),
                    if report.announcement_lost { "lost" } else { "seen" }.to_string(),
                ]);
            }
            println!("{table}");

            if let Some(entries) = transcript {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["#", "TARGET", "KIND", "FROM", "PAYLOAD"]);
                for (index, entry) in entries.iter().enumerate() {
                    table.add_row(vec![
                        index.to_string(),
                        entry.target.clone(),
                        entry.kind.to_string(),
                        sender_label(entry.from_id.as_deref()),
                        entry.payload.clone(),
                    ]);
                }
                println!("{table}");
            }
        }
        OutputFormat::Pretty => {
            for report in reports {
                println!(
                    "frame={} handshake={} queued={} delivered={} announcement={}",
                    report.frame,
                    report.handshake,
                    report.queued,
                    report.delivered,
                    if report.announcement_lost { "lost" } else { "seen" }
                );
            }
            for (index, entry) in transcript.iter().flatten().enumerate() {
                println!(
                    "#{index} target={} kind={} from={} payload={}",
                    entry.target,
                    entry.kind,
                    sender_label(entry.from_id.as_deref()),
                    entry.payload
                );
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn sender_label(from_id: Option<&str>) -> String {
    from_id.unwrap_or("-").to_string()
}
