//! Prompt library for the generation backend
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/plate/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const MENU_RECOMMENDATION: &str = include_str!("../../../prompts/menu_recommendation.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Budget-constrained menu suggestions for one restaurant
    MenuRecommendation,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MenuRecommendation => "menu_recommendation",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::MenuRecommendation]
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::MenuRecommendation => defaults::MENU_RECOMMENDATION,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    pub task_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the whole prompt with template variables replaced
    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        render_template(&self.content, vars)
    }

    /// Render just the user section, or the whole prompt if it has none
    pub fn render_user(&self, vars: &HashMap<&str, String>) -> String {
        match self.user_section() {
            Some(user) => render_template(user, vars),
            None => self.render(vars),
        }
    }
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading it on first use
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        let prompt = match self.cache.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(load(self.override_dir.as_deref(), id)?),
        };
        Ok(prompt)
    }
}

fn load(override_dir: Option<&Path>, id: PromptId) -> Result<Prompt> {
    let override_file = override_dir
        .map(|dir| dir.join(format!("{}.md", id.as_str())))
        .filter(|path| path.exists());

    let Some(path) = override_file else {
        let (metadata, content) = parse_prompt(id.default_content())?;
        return Ok(Prompt {
            metadata,
            content,
            is_override: false,
        });
    };

    let raw = fs::read_to_string(&path)
        .map_err(|e| Error::InvalidData(format!("Failed to read prompt override: {}", e)))?;
    let (metadata, content) = parse_prompt(&raw)?;
    tracing::debug!(path = %path.display(), version = metadata.version, "Using prompt override");
    Ok(Prompt {
        metadata,
        content,
        is_override: true,
    })
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("plate").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    let rest = content.strip_prefix("---").ok_or_else(|| {
        Error::InvalidData("Prompt must start with YAML frontmatter (---)".into())
    })?;

    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];
    let end = after_header.find("\n# ").unwrap_or(after_header.len());
    Some(after_header[..end].trim())
}

/// Resolve conditional blocks, then substitute `{{var}}` placeholders
///
/// Conditionals go first so a substituted value can never open a block.
/// Substitution is a single left-to-right pass: inserted values are never
/// scanned again, and unknown placeholders are kept as written.
fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    let template = remove_unmatched_conditionals(template, vars);
    let mut result = String::with_capacity(template.len());
    let mut rest = template.as_str();

    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let known = after
            .find("}}")
            .and_then(|close| vars.get(&after[..close]).map(|value| (close, value)));
        match known {
            Some((close, value)) => {
                result.push_str(value);
                rest = &after[close + 2..];
            }
            None => {
                result.push_str("{{");
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

/// Keep `{{#if var}}...{{/if}}` bodies whose variable is non-empty, drop the rest
fn remove_unmatched_conditionals(content: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_end) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = &result[var_start..var_start + var_end];
        let block_start = var_start + var_end + 2;

        let Some(endif_pos) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let full_end = block_start + endif_pos + 7;

        let keep = vars.get(var_name).is_some_and(|v| !v.trim().is_empty());
        result = if keep {
            format!(
                "{}{}{}",
                &result[..if_start],
                &result[block_start..block_start + endif_pos],
                &result[full_end..]
            )
        } else {
            format!("{}{}", &result[..if_start], &result[full_end..])
        };
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 2
task_type: narrative
---

# System
Test system prompt.

# User
Test user prompt with {{variable}}.
"#;

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 2);
        assert_eq!(metadata.task_type, "narrative");
        assert!(body.starts_with("# System"));
    }

    #[test]
    fn test_parse_prompt_requires_frontmatter() {
        assert!(parse_prompt("# User\nhello").is_err());
        assert!(parse_prompt("---\nid: x\n# User").is_err());
    }

    #[test]
    fn test_extract_section() {
        let content = "# System\nSystem content here.\n\n# User\nUser content here.";
        assert_eq!(
            extract_section(content, "# System"),
            Some("System content here.")
        );
        assert_eq!(extract_section(content, "# User"), Some("User content here."));
        assert_eq!(extract_section(content, "# Missing"), None);
    }

    #[test]
    fn test_conditional_blocks() {
        let content = "Start{{#if dietary}}\nDietary: {{dietary}}{{/if}}\nEnd";

        let mut vars = HashMap::new();
        vars.insert("dietary", "vegan".to_string());
        assert_eq!(render_template(content, &vars), "Start\nDietary: vegan\nEnd");

        vars.insert("dietary", "  ".to_string());
        assert_eq!(render_template(content, &vars), "Start\nEnd");

        let empty: HashMap<&str, String> = HashMap::new();
        assert_eq!(render_template(content, &empty), "Start\nEnd");
    }

    #[test]
    fn test_substituted_value_cannot_open_block() {
        let content = "Notes: {{additional}}{{#if feedback}} FB{{/if}}";
        let mut vars = HashMap::new();
        vars.insert("additional", "{{#if x}}sneaky{{/if}}".to_string());
        let rendered = render_template(content, &vars);
        assert_eq!(rendered, "Notes: {{#if x}}sneaky{{/if}}");
    }

    #[test]
    fn test_substituted_value_is_not_expanded() {
        let content = "Tax {{tax_rate}}%. Notes: {{additional}} ({{unknown}})";
        let mut vars = HashMap::new();
        vars.insert("tax_rate", "9.5".to_string());
        vars.insert("restaurant", "Bestia".to_string());
        vars.insert(
            "additional",
            "literal {{tax_rate}} and {{restaurant}}".to_string(),
        );

        // Repeated renders must agree whatever order the map iterates in
        for _ in 0..8 {
            assert_eq!(
                render_template(content, &vars),
                "Tax 9.5%. Notes: literal {{tax_rate}} and {{restaurant}} ({{unknown}})"
            );
        }
    }

    #[test]
    fn test_embedded_prompts_parse() {
        let mut lib = PromptLibrary::embedded_only();
        for id in PromptId::all() {
            let prompt = lib.get(*id).unwrap();
            assert_eq!(prompt.metadata.id, id.as_str());
            assert!(!prompt.is_override);
            assert!(prompt.system_section().is_some());
            assert!(prompt.user_section().is_some());
        }
    }

    #[test]
    fn test_override_dir_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("menu_recommendation.md"),
            "---\nid: menu_recommendation\nversion: 9\ntask_type: narrative\n---\n# User\nCustom {{restaurant}}",
        )
        .unwrap();

        let mut lib = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        let prompt = lib.get(PromptId::MenuRecommendation).unwrap();
        assert!(prompt.is_override);
        assert_eq!(prompt.metadata.version, 9);

        let mut vars = HashMap::new();
        vars.insert("restaurant", "Bestia".to_string());
        assert_eq!(prompt.render_user(&vars), "Custom Bestia");
    }
}
