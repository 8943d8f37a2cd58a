//! Formatting of generated recommendations

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\d+(?:,\d{3})*(?:\.\d{2})?").expect("valid regex"))
}

fn total_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[\s*\-#]*(?:grand\s+)?total\b[^$\n]*\$(\d+(?:,\d{3})*(?:\.\d{2})?)")
            .expect("valid regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Part of the cost breakdown (subtotal, tax, tip, total)
    Breakdown,
    /// The grand total line
    Total,
    Bullet,
    Text,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedLine {
    pub kind: LineKind,
    pub text: String,
    /// Dollar amounts found on the line
    pub prices: Vec<f64>,
}

/// Generated text split into classified lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedRecommendation {
    pub lines: Vec<FormattedLine>,
    /// Grand total stated by the generator, if it gave one
    pub total: Option<f64>,
}

impl FormattedRecommendation {
    /// Render for a terminal, with dollar amounts wrapped in `marker`
    pub fn render(&self, marker: (&str, &str)) -> String {
        self.lines
            .iter()
            .map(|line| {
                let text = highlight_prices(&line.text, marker);
                match line.kind {
                    LineKind::Bullet => format!("  {}", text),
                    _ => text,
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Classify each line of generated text
pub fn format_recommendations(content: &str) -> FormattedRecommendation {
    let lines = content
        .lines()
        .map(|raw| {
            let text = raw.trim_end().to_string();
            let kind = classify(&text);
            let prices = price_re()
                .find_iter(&text)
                .filter_map(|m| parse_amount(&m.as_str()[1..]))
                .collect();
            FormattedLine { kind, text, prices }
        })
        .collect();

    FormattedRecommendation {
        lines,
        total: extract_total(content),
    }
}

fn classify(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    let lower = trimmed.to_lowercase();
    if total_re().is_match(trimmed) {
        LineKind::Total
    } else if lower.contains("cost breakdown")
        || lower.contains("subtotal")
        || lower.contains("sales tax")
        || lower.contains("tip (")
        || lower.contains("tip:")
    {
        LineKind::Breakdown
    } else if trimmed.starts_with("- ") || trimmed.starts_with("* ") || trimmed.starts_with('•') {
        LineKind::Bullet
    } else {
        LineKind::Text
    }
}

/// Wrap every dollar amount in the given markers
pub fn highlight_prices(line: &str, (open, close): (&str, &str)) -> String {
    price_re()
        .replace_all(line, |caps: &regex::Captures| {
            format!("{}{}{}", open, &caps[0], close)
        })
        .into_owned()
}

/// The last grand total stated in the text
pub fn extract_total(content: &str) -> Option<f64> {
    content
        .lines()
        .filter_map(|line| total_re().captures(line.trim()))
        .filter_map(|caps| parse_amount(&caps[1]))
        .last()
}

/// Warn when the stated total exceeds `ceiling`; returns the overrun
pub fn check_total(content: &str, ceiling: f64) -> Option<f64> {
    let total = extract_total(content)?;
    let overrun = total - ceiling;
    if overrun > 0.005 {
        warn!(total, ceiling, "Generated total exceeds the requested budget");
        Some(crate::planner::round_cents(overrun))
    } else {
        None
    }
}

fn parse_amount(text: &str) -> Option<f64> {
    text.replace(',', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MOCK_MENU;

    #[test]
    fn test_extract_total() {
        assert_eq!(extract_total(MOCK_MENU), Some(81.60));
        assert_eq!(extract_total("**Total with tax and tip:** $1,204.50"), Some(1204.50));
        assert_eq!(extract_total("Subtotal: $64.00"), None);
        assert_eq!(extract_total("no totals here"), None);
    }

    #[test]
    fn test_classification() {
        let formatted = format_recommendations(MOCK_MENU);
        let kind_of = |needle: &str| {
            formatted
                .lines
                .iter()
                .find(|l| l.text.contains(needle))
                .map(|l| l.kind)
        };

        assert_eq!(kind_of("**Appetizers**"), Some(LineKind::Text));
        assert_eq!(kind_of("Burrata"), Some(LineKind::Bullet));
        assert_eq!(kind_of("Subtotal"), Some(LineKind::Breakdown));
        assert_eq!(kind_of("Sales Tax"), Some(LineKind::Breakdown));
        assert_eq!(kind_of("Total: $81.60"), Some(LineKind::Total));
        assert_eq!(formatted.total, Some(81.60));
        assert!(formatted.lines.iter().any(|l| l.kind == LineKind::Blank));
    }

    #[test]
    fn test_prices_collected() {
        let formatted = format_recommendations("- Pizza $12 and wine $9.50");
        assert_eq!(formatted.lines[0].prices, vec![12.0, 9.5]);
    }

    #[test]
    fn test_highlight_prices() {
        assert_eq!(
            highlight_prices("Pasta - $24.00, bread $6", ("[", "]")),
            "Pasta - [$24.00], bread [$6]"
        );
    }

    #[test]
    fn test_check_total() {
        assert_eq!(check_total(MOCK_MENU, 100.0), None);
        assert_eq!(check_total(MOCK_MENU, 81.60), None);
        assert_eq!(check_total(MOCK_MENU, 80.0), Some(1.6));
        assert_eq!(check_total("no total", 10.0), None);
    }

    #[test]
    fn test_render_indents_bullets() {
        let rendered = format_recommendations("Intro\n- Item $5").render(("<", ">"));
        assert_eq!(rendered, "Intro\n  - Item <$5>");
    }
}
