//! A host that performs nothing.

use crate::actions::HostActions;
use crate::error::{Result, SpeechError};
use crate::voice_command::{ActionKind, Params};
use chrono::Local;
use std::path::Path;
use tracing::info;

/// Logs each host action and answers with the confirmation a real host would
/// give. Used by the CLI and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunHost;

impl HostActions for DryRunHost {
    fn perform(&self, action: ActionKind, params: &Params) -> Result<String> {
        info!(%action, ?params, "dry run: host action not performed");
        let p = |key: &str| params.get(key).map_or("", String::as_str);

        let response = match action {
            ActionKind::OpenApp => format!("Opening {}.", p("app")),
            ActionKind::RunCommand => format!("Running {}.", p("cmd")),
            ActionKind::TypeText => format!("Typing {}.", p("text")),
            ActionKind::CheckBattery => "Battery information not available.".to_owned(),
            ActionKind::TakeScreenshot => format!(
                "Screenshot saved as screenshot_{}.png.",
                Local::now().format("%Y%m%d_%H%M%S")
            ),
            ActionKind::MuteVolume => "Volume toggled.".to_owned(),
            ActionKind::ShutdownPc => {
                "Shutting down your PC in 60 seconds. Say 'cancel shutdown' to abort.".to_owned()
            }
            ActionKind::RestartPc => {
                "Restarting your PC in 60 seconds. Say 'cancel shutdown' to abort.".to_owned()
            }
            ActionKind::CancelShutdown => "Shutdown or restart cancelled.".to_owned(),
            ActionKind::LockComputer => "Computer locked.".to_owned(),
            ActionKind::GetSystemInfo => "System information is not available.".to_owned(),
            ActionKind::SearchWeb => format!("Searching for {}.", p("query")),
            ActionKind::PlayYoutube => format!("Playing {} on YouTube.", p("query")),
            ActionKind::SearchWikipedia => format!("Looking up {}.", p("query")),
            ActionKind::OpenWebsite => format!("Opening {}.", p("url")),
            ActionKind::ScreenRecording => match p("action") {
                "start" => "Screen recording started.".to_owned(),
                _ => "Screen recording stopped and saved.".to_owned(),
            },
            ActionKind::DictateToFile => {
                format!("Starting dictation for {} seconds.", p("seconds"))
            }
            ActionKind::MonitorResources => format!(
                "Monitoring system resources for {} seconds with {}% threshold.",
                p("seconds"),
                p("threshold")
            ),
            ActionKind::OpenFolder => format!("Opening folder {}.", base_name(p("path"))),
            ActionKind::OpenFile => format!("Opening file {}.", base_name(p("path"))),
            other => {
                return Err(SpeechError::Action(format!("{other} is not a host action")));
            }
        };
        Ok(response)
    }
}

fn base_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}
