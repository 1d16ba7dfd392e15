//! Classification prompt composition.
//!
//! The prompt is a pure function of its inputs: identical title, URL,
//! taxonomy and snapshot always produce byte-identical text.

use std::fmt::Write;

use sha2::{Digest, Sha256};

use markfold_shared::{CategoryTree, ContentSnapshot};

/// Headings included in the page content block.
const MAX_PROMPT_HEADINGS: usize = 5;
/// Paragraphs included in the page content block.
const MAX_PROMPT_PARAGRAPHS: usize = 3;

const HEADER: &str = "You are an expert bookmark organizer. Your task is to classify a new \
bookmark into ONE of the following categories based on its title, its URL and, when \
available, an analysis of the page content. The categories are defined in a hierarchical \
JSON structure.

Your response MUST be the full path to the chosen category, like \"Grandparent/Parent/Child\". \
If no existing category fits, you may propose a new path in the same style. Do NOT add any \
other text, explanation, or markdown.";

const EXAMPLES: &str = "Example:
If the user wants to classify \"Spring Boot Official Documentation\", a good response would be \
\"Technology/Backend Frameworks\".
If the user wants to classify \"A Guide to Investment Banking\", a good response would be \
\"Finance & Business/Investing\".";

/// Build the system prompt for one classification request.
///
/// The "Page content analysis" block is present only for a snapshot without
/// an error.
pub fn compose_prompt(
    title: &str,
    url: &str,
    taxonomy: &CategoryTree,
    snapshot: Option<&ContentSnapshot>,
) -> String {
    let categories = serde_json::to_string_pretty(taxonomy).unwrap_or_else(|_| "{}".to_string());

    let mut prompt = String::with_capacity(HEADER.len() + categories.len() + 512);
    prompt.push_str(HEADER);
    prompt.push_str("\n\nBookmark:\n");
    let _ = writeln!(prompt, "Title: {title}");
    let _ = writeln!(prompt, "URL: {url}");

    prompt.push_str("\nAvailable Categories:\n");
    prompt.push_str(&categories);
    prompt.push('\n');

    if let Some(snapshot) = snapshot.filter(|s| s.is_usable()) {
        prompt.push('\n');
        push_content_block(&mut prompt, snapshot);
    }

    prompt.push('\n');
    prompt.push_str(EXAMPLES);
    prompt.push_str("\n\nNow, classify the following bookmark.\n");
    prompt
}

fn push_content_block(prompt: &mut String, snapshot: &ContentSnapshot) {
    prompt.push_str("Page content analysis:\n");
    let _ = writeln!(prompt, "- Page title: {}", snapshot.title);
    let _ = writeln!(prompt, "- Page URL: {}", snapshot.url);

    let meta = &snapshot.metadata;
    if !meta.description.is_empty() {
        let _ = writeln!(prompt, "- Description: {}", meta.description);
    }
    if !meta.keywords.is_empty() {
        let _ = writeln!(prompt, "- Keywords: {}", meta.keywords.join(", "));
    }

    if !snapshot.headings.is_empty() {
        prompt.push_str("- Headings:\n");
        for heading in snapshot.headings.iter().take(MAX_PROMPT_HEADINGS) {
            let _ = writeln!(prompt, "  - {heading}");
        }
    }

    if !snapshot.paragraphs.is_empty() {
        prompt.push_str("- Opening paragraphs:\n");
        for paragraph in snapshot.paragraphs.iter().take(MAX_PROMPT_PARAGRAPHS) {
            let _ = writeln!(prompt, "  > {paragraph}");
        }
    }
}

/// Hex SHA-256 of a prompt, for logging without the prompt text.
pub fn prompt_fingerprint(prompt: &str) -> String {
    format!("{:x}", Sha256::digest(prompt.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use markfold_shared::PageMetadata;

    fn taxonomy() -> CategoryTree {
        let mut tree = CategoryTree::new();
        tree.entry("Tech").entry("Backend");
        tree.entry("Finance");
        tree
    }

    fn snapshot() -> ContentSnapshot {
        ContentSnapshot {
            url: "https://docs.rs/tokio".into(),
            title: "tokio - Rust".into(),
            metadata: PageMetadata {
                description: "An async runtime".into(),
                keywords: vec!["async".into(), "runtime".into()],
                ..Default::default()
            },
            headings: (1..=7).map(|i| format!("H{i}")).collect(),
            paragraphs: (1..=5).map(|i| format!("P{i}")).collect(),
            text: "body".into(),
            error: None,
        }
    }

    #[test]
    fn identical_inputs_give_identical_prompts() {
        let s = snapshot();
        let a = compose_prompt("Tokio", "https://docs.rs/tokio", &taxonomy(), Some(&s));
        let b = compose_prompt("Tokio", "https://docs.rs/tokio", &taxonomy(), Some(&s));
        assert_eq!(a, b);
        assert_eq!(prompt_fingerprint(&a), prompt_fingerprint(&b));
    }

    #[test]
    fn includes_bookmark_and_pretty_taxonomy() {
        let prompt = compose_prompt("Tokio", "https://docs.rs/tokio", &taxonomy(), None);
        assert!(prompt.contains("Title: Tokio\n"));
        assert!(prompt.contains("URL: https://docs.rs/tokio\n"));
        assert!(prompt.contains(&serde_json::to_string_pretty(&taxonomy()).unwrap()));
        assert!(prompt.contains("Technology/Backend Frameworks"));
        assert!(prompt.contains("Finance & Business/Investing"));
        assert!(prompt.ends_with("Now, classify the following bookmark.\n"));
    }

    #[test]
    fn missing_snapshot_omits_content_block() {
        let prompt = compose_prompt("Tokio", "https://docs.rs/tokio", &taxonomy(), None);
        assert!(!prompt.contains("Page content analysis"));
    }

    #[test]
    fn error_snapshot_omits_content_block() {
        let failed =
            ContentSnapshot::failed("https://docs.rs/tokio", "tokio", "Failed to extract content");
        let prompt = compose_prompt("Tokio", "https://docs.rs/tokio", &taxonomy(), Some(&failed));
        assert!(!prompt.contains("Page content analysis"));
    }

    #[test]
    fn content_block_is_bounded_and_ordered() {
        let prompt = compose_prompt("Tokio", "https://docs.rs/tokio", &taxonomy(), Some(&snapshot()));
        assert!(prompt.contains("Page content analysis:\n"));
        assert!(prompt.contains("- Description: An async runtime\n"));
        assert!(prompt.contains("- Keywords: async, runtime\n"));
        assert!(prompt.contains("  - H5\n"));
        assert!(!prompt.contains("  - H6\n"));
        assert!(prompt.contains("  > P3\n"));
        assert!(!prompt.contains("  > P4\n"));
        assert!(prompt.find("  - H1").unwrap() < prompt.find("  - H2").unwrap());
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = prompt_fingerprint("");
        assert_eq!(
            fp,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
