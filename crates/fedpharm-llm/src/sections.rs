//! Split markdown text into `### ` headed sections.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub items: Vec<String>,
}

/// Lines before the first heading are dropped; blank lines are skipped and
/// a leading `- ` bullet is stripped.
pub fn parse_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    for line in text.lines().map(str::trim) {
        if let Some(title) = line.strip_prefix("### ") {
            sections.push(Section { title: title.trim().to_string(), items: Vec::new() });
        } else if !line.is_empty() {
            if let Some(current) = sections.last_mut() {
                let item = line.strip_prefix("- ").unwrap_or(line);
                current.items.push(item.to_string());
            }
        }
    }
    sections
}
