//! M3U rendering of the merged playlist

use crate::models::OutputEntry;

/// Renders the header, the EXTINF/URL pairs and the optional update trailer
#[derive(Debug, Clone)]
pub struct PlaylistComposer {
    header: String,
    updated_at: Option<String>,
}

impl PlaylistComposer {
    pub fn new<S: Into<String>>(header: S) -> Self {
        Self {
            header: header.into(),
            updated_at: None,
        }
    }

    /// Append `# Updated: <timestamp>` after the last entry
    pub fn with_update_trailer<S: Into<String>>(mut self, timestamp: S) -> Self {
        self.updated_at = Some(timestamp.into());
        self
    }

    pub fn render(&self, entries: &[OutputEntry]) -> String {
        let mut lines = Vec::with_capacity(entries.len() * 2 + 3);
        lines.push(self.header.trim().to_string());

        for entry in entries {
            lines.push(render_extinf(entry));
            lines.push(entry.url.clone());
        }

        if let Some(timestamp) = &self.updated_at {
            lines.push(String::new());
            lines.push(format!("# Updated: {timestamp}"));
        }

        let mut output = lines.join("\n");
        output.push('\n');
        output
    }
}

fn render_extinf(entry: &OutputEntry) -> String {
    let mut line = format!("#EXTINF:{}", entry.duration);
    for (key, value) in &entry.attributes {
        line.push_str(&format!(" {key}=\"{value}\""));
    }
    line.push(',');
    line.push_str(&entry.name);
    line
}
