//! Record selection by command-name prefix and effective uid.

use crate::config::MetricsConfig;

/// `commands` match any observed name that starts with them. With both lists
/// given, a record passes when either matches, or both in AND mode. With
/// neither, everything passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub commands: Vec<String>,
    pub uids: Vec<u32>,
    pub uid_and_cmd: bool,
}

impl RecordFilter {
    pub fn from_config(config: &MetricsConfig) -> Self {
        Self {
            commands: config.commands.clone(),
            uids: config.uids.clone(),
            uid_and_cmd: config.uid_and_cmd,
        }
    }

    pub fn command_matches(&self, command: &str) -> bool {
        self.commands.iter().any(|c| command.starts_with(c.as_str()))
    }

    pub fn includes(&self, command: &str, euid: u32) -> bool {
        if self.commands.is_empty() && self.uids.is_empty() {
            return true;
        }
        let cmd = self.command_matches(command);
        let uid = self.uids.contains(&euid);
        if self.uid_and_cmd {
            // an empty list does not constrain
            (cmd || self.commands.is_empty()) && (uid || self.uids.is_empty())
        } else {
            cmd || uid
        }
    }
}
