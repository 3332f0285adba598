//! Click target resolution.
//!
//! A click is described by the ancestor chain of its target, innermost
//! element first. The nearest element carrying an explicit tracking label, or
//! failing that the nearest interactive element, names the event.

use serde::{Deserialize, Serialize};

/// Longest label taken from an element's text content.
const MAX_TEXT_LABEL_CHARS: usize = 60;

/// The parts of a DOM element relevant to click tracking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Lowercase tag name, e.g. "a", "button", "div"
    pub tag: String,
    /// Explicit tracking label (`data-track` attribute)
    pub track_label: Option<String>,
    /// ARIA role
    pub role: Option<String>,
    /// Visible text content
    pub text: Option<String>,
    /// Link target
    pub href: Option<String>,
}

impl ElementInfo {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn tracked(mut self, label: impl Into<String>) -> Self {
        self.track_label = Some(label.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    fn explicit_label(&self) -> Option<&str> {
        self.track_label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    fn is_interactive(&self) -> bool {
        matches!(
            self.tag.as_str(),
            "a" | "button" | "summary" | "select" | "input" | "textarea"
        ) || matches!(self.role.as_deref(), Some("button" | "link" | "tab" | "menuitem"))
    }

    /// Best label for this element when it has no explicit one.
    fn fallback_label(&self) -> String {
        let text = self
            .text
            .as_deref()
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty())
            .map(|t| t.chars().take(MAX_TEXT_LABEL_CHARS).collect::<String>());
        text.or_else(|| {
            self.href
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| self.tag.clone())
    }
}

/// A click described by the target's ancestor chain, target first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickTarget {
    pub chain: Vec<ElementInfo>,
}

impl ClickTarget {
    pub fn new(chain: Vec<ElementInfo>) -> Self {
        Self { chain }
    }

    /// Resolve the event label, or `None` if nothing in the chain is tracked
    /// or interactive.
    pub fn resolve_label(&self) -> Option<String> {
        self.chain.iter().find_map(|element| {
            if let Some(label) = element.explicit_label() {
                Some(label.to_string())
            } else if element.is_interactive() {
                Some(element.fallback_label())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_label_on_ancestor() {
        let click = ClickTarget::new(vec![
            ElementInfo::new("span").with_text("View"),
            ElementInfo::new("div").tracked("project-pos-system"),
            ElementInfo::new("section"),
        ]);
        assert_eq!(click.resolve_label().as_deref(), Some("project-pos-system"));
    }

    #[test]
    fn test_nearest_interactive_uses_text() {
        let click = ClickTarget::new(vec![
            ElementInfo::new("svg"),
            ElementInfo::new("BUTTON").with_text("  Download \n CV  "),
            ElementInfo::new("div").tracked("hero"),
        ]);
        assert_eq!(click.resolve_label().as_deref(), Some("Download CV"));
    }

    #[test]
    fn test_link_without_text_uses_href() {
        let click = ClickTarget::new(vec![
            ElementInfo::new("img"),
            ElementInfo::new("a").with_href("https://github.com/someone"),
        ]);
        assert_eq!(
            click.resolve_label().as_deref(),
            Some("https://github.com/someone")
        );
    }

    #[test]
    fn test_role_button_without_text_uses_tag() {
        let click = ClickTarget::new(vec![ElementInfo::new("div").with_role("button")]);
        assert_eq!(click.resolve_label().as_deref(), Some("div"));
    }

    #[test]
    fn test_untracked_click_is_ignored() {
        let click = ClickTarget::new(vec![
            ElementInfo::new("p").with_text("just text"),
            ElementInfo::new("body"),
        ]);
        assert_eq!(click.resolve_label(), None);
        assert_eq!(ClickTarget::default().resolve_label(), None);
    }

    #[test]
    fn test_long_text_is_truncated() {
        let click = ClickTarget::new(vec![ElementInfo::new("button").with_text("x".repeat(200))]);
        assert_eq!(click.resolve_label().map(|l| l.len()), Some(MAX_TEXT_LABEL_CHARS));
    }
}
