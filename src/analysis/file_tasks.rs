//! Extraction of candidate file paths from a `file-tasks.md` task plan.

use regex::Regex;
use std::collections::BTreeSet;

/// Compiled extraction patterns for task-plan markdown.
pub struct FileTaskParser {
    backticked_item: Regex,
    bare_item: Regex,
    code_block: Regex,
    code_block_path: Regex,
    header: Regex,
    bold: Regex,
}

impl FileTaskParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // "- `path/to/file.py` - Description"
            backticked_item: Regex::new(r"-\s+`([^`]+)`\s*-")?,
            // "- path/to/file.py"
            bare_item: Regex::new(r"-\s+([^\s`]+\.[a-zA-Z0-9]+)")?,
            code_block: Regex::new(r"```[a-z]*\n([^`]+)```")?,
            code_block_path: Regex::new(r"([a-zA-Z0-9_\-./]+\.[a-zA-Z0-9]+)")?,
            // "### src/backend/service.py"
            header: Regex::new(r"(?m)^#{1,4}\s+([^\s`#]+\.[a-zA-Z0-9]+)")?,
            // "**src/api/routes.py**"
            bold: Regex::new(r"\*\*([^\s*]+\.[a-zA-Z0-9]+)\*\*")?,
        })
    }

    /// Returns the sorted, de-duplicated paths mentioned in the markdown.
    pub fn parse(&self, markdown: &str) -> Vec<String> {
        let mut found: BTreeSet<String> = BTreeSet::new();

        for re in [&self.backticked_item, &self.bare_item, &self.header, &self.bold] {
            for caps in re.captures_iter(markdown) {
                if let Some(m) = caps.get(1) {
                    found.insert(m.as_str().to_string());
                }
            }
        }

        for block in self.code_block.captures_iter(markdown) {
            let Some(body) = block.get(1) else { continue };
            for caps in self.code_block_path.captures_iter(body.as_str()) {
                let Some(m) = caps.get(1) else { continue };
                let candidate = m.as_str();
                // Dotted identifiers such as `app.client.fetch` are not paths.
                if candidate.contains('/') || candidate.matches('.').count() == 1 {
                    found.insert(candidate.to_string());
                }
            }
        }

        found
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| is_plausible_path(f))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn is_plausible_path(candidate: &str) -> bool {
    candidate.len() > 3 && candidate.contains('.') && !candidate.starts_with('.')
}

/// Parses task-plan markdown into a sorted list of unique file paths.
pub fn parse_file_tasks(markdown: &str) -> Result<Vec<String>, regex::Error> {
    Ok(FileTaskParser::new()?.parse(markdown))
}
