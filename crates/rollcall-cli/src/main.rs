use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use rollcall_core::{Identity, Outcome, PresenceRecord};
use rollcall_hw::{V4l2Source, VideoSource};
use serde::Deserialize;

#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    fn start_capture(&self, course: &str, section_id: &str) -> zbus::Result<String>;
    fn stop_capture(&self) -> zbus::Result<bool>;
    fn detect(&self) -> zbus::Result<String>;
    fn reset(&self) -> zbus::Result<()>;
    fn close_session(&self) -> zbus::Result<String>;
    fn list_present(&self) -> zbus::Result<String>;
    fn status(&self) -> zbus::Result<String>;
    fn roster(&self) -> zbus::Result<String>;
    fn register(&self, name: &str, id: &str, samples: u32) -> zbus::Result<String>;
    fn report(&self, course: &str) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start taking attendance for a course
    Start {
        /// Course code (e.g., "CS101")
        #[arg(short, long)]
        course: String,
        /// Course section id
        #[arg(short, long)]
        section: String,
    },
    /// Stop the camera
    Stop,
    /// Run one detection now
    Detect,
    /// Clear the attendance list
    Reset,
    /// Stop and archive the session for the dashboard
    Close,
    /// Show students marked present
    List,
    /// Show daemon status
    Status,
    /// List registered students
    Roster,
    /// Register a new student
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        id: String,
        /// Number of face images captured
        #[arg(long, default_value_t = rollcall_core::enrollment::RECOMMENDED_SAMPLES)]
        samples: u32,
    },
    /// Attendance dashboard for a course
    Report {
        /// Course code
        course: String,
    },
    /// Run camera diagnostics (bypasses the daemon)
    Test {
        /// Also try to open this device
        #[arg(short, long)]
        device: Option<String>,
    },
}

#[derive(Deserialize)]
struct DetectionReply {
    identity: Identity,
    outcome: Outcome,
}

fn local_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

async fn proxy() -> Result<AttendanceProxy<'static>> {
    let conn = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    AttendanceProxy::new(&conn)
        .await
        .context("rollcalld is not reachable")
}

fn print_present(records: &[PresenceRecord]) {
    if records.is_empty() {
        println!("No students marked present yet.");
        return;
    }
    println!("{} present", records.len());
    for r in records {
        println!(
            "  {:<8} {:<24} {}",
            r.identity.id,
            r.identity.name,
            local_time(&r.timestamp)
        );
    }
}

fn print_report(report: &serde_json::Value) {
    let title = report["title"].as_str().unwrap_or("");
    println!("{} {}", report["course"].as_str().unwrap_or("?"), title);
    println!(
        "  sessions: {}   average attendance: {}%",
        report["total_sessions"], report["average_percentage"]
    );
    if let Some(sessions) = report["sessions"].as_array() {
        for s in sessions {
            println!(
                "  {}  present {:>3}  absent {:>3}  {:>3}%",
                s["date"].as_str().unwrap_or("?"),
                s["present"],
                s["absent"],
                s["percentage"]
            );
        }
    }
    if let Some(students) = report["students"].as_array() {
        for s in students {
            println!(
                "  {:<8} {:<24} {:>3} sessions  {:>3}%",
                s["id"].as_str().unwrap_or("?"),
                s["name"].as_str().unwrap_or("?"),
                s["attended"],
                s["percentage"]
            );
        }
    }
}

fn run_diagnostics(device: Option<String>) {
    println!("Running camera diagnostics...");
    let devices = V4l2Source::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
    }
    for d in &devices {
        println!("  {}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
    }

    if let Some(path) = device {
        let mut source = V4l2Source::new(path);
        match source.acquire() {
            Ok(stream) => {
                let info = stream.info();
                println!("{}: opened at {}x{}", source.name(), info.width, info.height);
            }
            Err(e) => println!("{}: {e}", source.name()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Test { device } => {
            run_diagnostics(device);
            return Ok(());
        }
        other => other,
    };

    let attendance = proxy().await?;

    match command {
        Commands::Start { course, section } => {
            let reply = attendance.start_capture(&course, &section).await?;
            tracing::debug!(%reply, "start_capture reply");
            println!("Detection started for {course}/{section}");
        }
        Commands::Stop => {
            if attendance.stop_capture().await? {
                println!("Detection stopped");
            } else {
                println!("Detection was not running");
            }
        }
        Commands::Detect => {
            println!("Detecting...");
            let reply: DetectionReply = serde_json::from_str(&attendance.detect().await?)?;
            let name = reply.identity.name;
            match reply.outcome {
                Outcome::Accepted => println!("Attendance marked: {name} has been marked present"),
                Outcome::DuplicateRejected => {
                    println!("Duplicate detection: {name} has already been marked present")
                }
            }
        }
        Commands::Reset => {
            attendance.reset().await?;
            println!("The attendance list has been cleared");
        }
        Commands::Close => {
            let summary: serde_json::Value = serde_json::from_str(&attendance.close_session().await?)?;
            if summary.is_null() {
                println!("Nothing to archive: no course was selected");
            } else {
                println!(
                    "Session archived: {} present, {} absent ({}%)",
                    summary["present"], summary["absent"], summary["percentage"]
                );
            }
        }
        Commands::List => {
            let records: Vec<PresenceRecord> = serde_json::from_str(&attendance.list_present().await?)?;
            print_present(&records);
        }
        Commands::Status => {
            let status: serde_json::Value = serde_json::from_str(&attendance.status().await?)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Roster => {
            let students: Vec<Identity> = serde_json::from_str(&attendance.roster().await?)?;
            for s in students {
                println!("  {:<8} {}", s.id, s.name);
            }
        }
        Commands::Register { name, id, samples } => {
            let identity: Identity = serde_json::from_str(&attendance.register(&name, &id, samples).await?)?;
            println!("{} has been successfully registered ({})", identity.name, identity.id);
        }
        Commands::Report { course } => {
            let report: serde_json::Value = serde_json::from_str(&attendance.report(&course).await?)?;
            print_report(&report);
        }
        Commands::Test { .. } => unreachable!("handled before connecting"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_start_requires_course_and_section() {
        assert!(Cli::try_parse_from(["rollcall", "start", "--course", "CS101"]).is_err());
        let cli = Cli::try_parse_from(["rollcall", "start", "-c", "CS101", "-s", "A1"]).unwrap();
        assert!(matches!(cli.command, Commands::Start { course, section } if course == "CS101" && section == "A1"));
    }

    #[test]
    fn test_register_defaults_to_recommended_samples() {
        let cli = Cli::try_parse_from(["rollcall", "register", "-n", "Carol", "-i", "ST005"]).unwrap();
        assert!(matches!(cli.command, Commands::Register { samples: 5, .. }));
    }

    #[test]
    fn test_detection_reply_parses() {
        let json = r#"{"identity":{"id":"ST001","name":"John Doe"},"outcome":"duplicate_rejected","overlay":null,"timestamp":"2025-05-19T10:00:00Z"}"#;
        let reply: DetectionReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.identity.id, "ST001");
        assert_eq!(reply.outcome, Outcome::DuplicateRejected);
    }
}
