// src/models/forum.rs

//! Forum posts as read from a conversation page.

/// Separator closing every rendered post block.
pub const POST_SEPARATOR_WIDTH: usize = 40;

/// A file linked from a forum post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Accessibility label, e.g. "Attachment lecture 3.pdf"
    pub label: String,

    /// Download URL
    pub url: String,
}

impl Attachment {
    /// Document id derived from the label: every word after the first, joined by `_`.
    pub fn id(&self) -> String {
        self.label
            .split_whitespace()
            .skip(1)
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// A single post of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub timestamp: String,

    /// Paragraphs followed by rich-text blocks, in page order
    pub body: Vec<String>,

    pub attachments: Vec<Attachment>,
}

impl Post {
    /// Render the transcript block for this post.
    ///
    /// ```text
    /// title<TAB>timestamp
    /// body
    /// attachment label lines
    /// ----…
    /// ```
    pub fn render(&self) -> String {
        let mut block = format!("{}\t{}\n{}\n", self.title, self.timestamp, self.body.join("\n"));
        for attachment in &self.attachments {
            block.push_str(&attachment.label);
            block.push('\n');
        }
        block.push_str(&"--".repeat(POST_SEPARATOR_WIDTH));
        block.push('\n');
        block
    }
}

/// What one forum pass added to a course.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ForumOutcome {
    /// Post ids appended to the transcript, in append order
    pub new_posts: Vec<String>,

    /// Attachment ids downloaded successfully
    pub new_docs: Vec<String>,

    /// Attachment ids whose download failed (retried next run)
    pub failed_docs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_id_from_label() {
        let a = Attachment {
            label: "Attachment Lab 3 handout.pdf".to_string(),
            url: "https://x/pluginfile.php/1".to_string(),
        };
        assert_eq!(a.id(), "Lab_3_handout.pdf");
    }

    #[test]
    fn test_render_block() {
        let post = Post {
            id: "77".to_string(),
            title: "Quiz moved".to_string(),
            timestamp: "Monday, 3 March".to_string(),
            body: vec!["The quiz is on Friday.".to_string(), "Bring ID.".to_string()],
            attachments: vec![Attachment {
                label: "Attachment seating.pdf".to_string(),
                url: "https://x/seating.pdf".to_string(),
            }],
        };
        let expected = format!(
            "Quiz moved\tMonday, 3 March\nThe quiz is on Friday.\nBring ID.\nAttachment seating.pdf\n{}\n",
            "-".repeat(80)
        );
        assert_eq!(post.render(), expected);
    }
}
