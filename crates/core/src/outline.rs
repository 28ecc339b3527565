//! Plain-text outline output.
//!
//! Renders slides as text blocks separated by a blank line: the title, then
//! one `- ` line per bullet, then optional notes for the image and table.

use crate::types::SlideRecord;

/// Formatter for the plain-text deck outline.
#[derive(Debug, Clone)]
pub struct OutlineFormatter {
    /// Whether to add `[image: ...]` and `[table: ...]` notes.
    show_attachments: bool,
}

impl Default for OutlineFormatter {
    fn default() -> Self {
        Self {
            show_attachments: true,
        }
    }
}

impl OutlineFormatter {
    /// Create a formatter that includes image and table notes.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attachments(mut self, show: bool) -> Self {
        self.show_attachments = show;
        self
    }

    /// Format slides into outline text.
    ///
    /// # Example output
    /// ```text
    /// AI in Healthcare
    /// - Earlier disease detection
    /// - Faster triage
    /// [image: images/img_1_FIG_1_radiology.png]
    ///
    /// Summary Table
    /// [table: 3 rows x 2 columns]
    /// ```
    pub fn format(&self, slides: &[SlideRecord]) -> String {
        slides
            .iter()
            .map(|slide| self.format_slide(slide))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Format and add a trailing newline when there is any output.
    pub fn format_with_newline(&self, slides: &[SlideRecord]) -> String {
        let formatted = self.format(slides);
        if formatted.is_empty() {
            formatted
        } else {
            format!("{}\n", formatted)
        }
    }

    fn format_slide(&self, slide: &SlideRecord) -> String {
        let mut lines = vec![slide.title.clone()];
        lines.extend(slide.bullets.iter().map(|b| format!("- {}", b)));

        if self.show_attachments {
            if let Some(path) = &slide.image_path {
                lines.push(format!("[image: {}]", path));
            }
            if let Some(rows) = &slide.table {
                let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
                lines.push(format!("[table: {} rows x {} columns]", rows.len(), columns));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_empty() {
        let formatter = OutlineFormatter::new();
        assert_eq!(formatter.format(&[]), "");
        assert_eq!(formatter.format_with_newline(&[]), "");
    }

    #[test]
    fn test_format_title_and_bullets() {
        let slides = vec![SlideRecord::new("Overview").with_bullets(["One", "Two"])];
        assert_eq!(OutlineFormatter::new().format(&slides), "Overview\n- One\n- Two");
    }

    #[test]
    fn test_slides_separated_by_blank_line() {
        let slides = vec![
            SlideRecord::new("A").with_bullets(["x"]),
            SlideRecord::new("B"),
        ];
        assert_eq!(OutlineFormatter::new().format(&slides), "A\n- x\n\nB");
    }

    #[test]
    fn test_attachment_notes() {
        let slide = SlideRecord {
            image_path: Some("images/img_1.png".into()),
            table: Some(vec![
                vec!["h1".into(), "h2".into()],
                vec!["a".into(), "b".into()],
            ]),
            ..SlideRecord::new("Data")
        };
        let out = OutlineFormatter::new().format(std::slice::from_ref(&slide));
        assert_eq!(out, "Data\n[image: images/img_1.png]\n[table: 2 rows x 2 columns]");

        let bare = OutlineFormatter::new().with_attachments(false).format(&[slide]);
        assert_eq!(bare, "Data");
    }

    #[test]
    fn test_format_with_trailing_newline() {
        let slides = vec![SlideRecord::new("Only")];
        assert!(OutlineFormatter::new().format_with_newline(&slides).ends_with("Only\n"));
    }
}
