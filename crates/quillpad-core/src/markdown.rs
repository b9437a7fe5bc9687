use crate::document::{Block, BlockDocument, BlockElement, BlockType, InlineNode, TextLeaf};
use serde_json::{json, Value};

const FENCE: &str = "```";
const DEFAULT_CODE_LANGUAGE: &str = "plaintext";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ListKind {
    Bulleted,
    Numbered,
    Todo,
}

impl ListKind {
    fn block_type(self) -> BlockType {
        match self {
            ListKind::Bulleted => BlockType::BulletedList,
            ListKind::Numbered => BlockType::NumberedList,
            ListKind::Todo => BlockType::TodoList,
        }
    }
}

#[derive(Default)]
struct Builder {
    document: BlockDocument,
    order: usize,
    list: Option<(ListKind, Vec<(String, Option<Value>)>)>,
}

impl Builder {
    fn push(&mut self, block: Block) {
        self.document.insert(block);
        self.order += 1;
    }

    fn push_text(&mut self, kind: BlockType, text: &str) {
        self.flush_list();
        let block = Block::text(kind, self.order, text);
        self.push(block);
    }

    fn push_list_item(&mut self, kind: ListKind, text: &str, props: Option<Value>) {
        if self.list.as_ref().map(|(current, _)| *current) != Some(kind) {
            self.flush_list();
            self.list = Some((kind, Vec::new()));
        }
        if let Some((_, items)) = self.list.as_mut() {
            items.push((text.to_string(), props));
        }
    }

    fn flush_list(&mut self) {
        if let Some((kind, items)) = self.list.take() {
            if !items.is_empty() {
                let block = Block::with_elements(kind.block_type(), self.order, items);
                self.push(block);
            }
        }
    }

    fn finish(mut self) -> BlockDocument {
        self.flush_list();
        if self.document.is_empty() {
            return BlockDocument::empty_paragraph();
        }
        self.document
    }
}

/// Converts Markdown text into a block document, one line at a time.
///
/// Inline formatting is carried through as plain text.
pub fn markdown_to_document(markdown: &str) -> BlockDocument {
    let lines: Vec<&str> = markdown.split('\n').collect();
    let mut builder = Builder::default();
    let mut ix = 0;

    while ix < lines.len() {
        let line = lines[ix].trim();
        ix += 1;

        if line.is_empty() {
            builder.flush_list();
            continue;
        }

        if let Some(text) = line.strip_prefix("# ") {
            builder.push_text(BlockType::HeadingOne, text);
        } else if let Some(text) = line.strip_prefix("## ") {
            builder.push_text(BlockType::HeadingTwo, text);
        } else if let Some(text) = line.strip_prefix("### ") {
            builder.push_text(BlockType::HeadingThree, text);
        } else if let Some(text) = line.strip_prefix("> ") {
            builder.push_text(BlockType::Blockquote, text);
        } else if let Some(info) = line.strip_prefix(FENCE) {
            builder.flush_list();
            let language = match info.trim() {
                "" => DEFAULT_CODE_LANGUAGE,
                language => language,
            };
            let mut code = Vec::new();
            while ix < lines.len() && !lines[ix].trim().starts_with(FENCE) {
                code.push(lines[ix].trim_end_matches('\r'));
                ix += 1;
            }
            // Skip the closing fence; an unterminated block runs to the end.
            ix += 1;
            let block = Block::with_elements(
                BlockType::Code,
                builder.order,
                vec![(code.join("\n"), Some(json!({ "language": language })))],
            );
            builder.push(block);
        } else if let Some((checked, text)) = parse_todo_item(line) {
            builder.push_list_item(ListKind::Todo, text, Some(json!({ "checked": checked })));
        } else if let Some(text) = parse_bullet_item(line) {
            builder.push_list_item(ListKind::Bulleted, text, None);
        } else if let Some(text) = parse_ordered_item(line) {
            builder.push_list_item(ListKind::Numbered, text, None);
        } else {
            builder.push_text(BlockType::Paragraph, line);
        }
    }

    builder.finish()
}

/// `- ` or `* ` followed by at least one whitespace character.
fn parse_bullet_item(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('-').or_else(|| line.strip_prefix('*'))?;
    let text = rest.trim_start();
    (text.len() < rest.len()).then_some(text)
}

fn parse_todo_item(line: &str) -> Option<(bool, &str)> {
    let rest = parse_bullet_item(line)?;
    let mut chars = rest.chars();
    if chars.next() != Some('[') {
        return None;
    }
    let checked = match chars.next()? {
        ' ' => false,
        'x' | 'X' => true,
        _ => return None,
    };
    if chars.next() != Some(']') {
        return None;
    }
    let after = chars.as_str();
    let text = after.trim_start();
    (text.len() < after.len()).then_some((checked, text))
}

fn parse_ordered_item(line: &str) -> Option<&str> {
    let digits = line.len() - line.trim_start_matches(|ch: char| ch.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix('.')?;
    let text = rest.trim_start();
    (text.len() < rest.len()).then_some(text)
}

/// Renders a block document as Markdown. Lossy: code languages are dropped
/// and unknown block types export their plain text.
pub fn document_to_markdown(document: &BlockDocument) -> String {
    let rendered: Vec<String> = document
        .blocks_in_order()
        .into_iter()
        .map(render_block)
        .collect();
    rendered.join("\n\n").trim().to_string()
}

fn render_block(block: &Block) -> String {
    match &block.kind {
        BlockType::HeadingOne => format!("# {}", render_elements(&block.value)),
        BlockType::HeadingTwo => format!("## {}", render_elements(&block.value)),
        BlockType::HeadingThree => format!("### {}", render_elements(&block.value)),
        BlockType::Blockquote => format!("> {}", render_elements(&block.value)),
        BlockType::Code => format!("{FENCE}\n{}\n{FENCE}", block.plain_text()),
        BlockType::BulletedList => block
            .value
            .iter()
            .map(|item| format!("- {}", render_inline(&item.children)))
            .collect::<Vec<_>>()
            .join("\n"),
        BlockType::NumberedList => block
            .value
            .iter()
            .enumerate()
            .map(|(ix, item)| format!("{}. {}", ix + 1, render_inline(&item.children)))
            .collect::<Vec<_>>()
            .join("\n"),
        BlockType::TodoList => block
            .value
            .iter()
            .map(|item| {
                let mark = if item.prop_bool("checked") { "x" } else { " " };
                format!("- [{mark}] {}", render_inline(&item.children))
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => render_elements(&block.value),
    }
}

fn render_elements(elements: &[BlockElement]) -> String {
    elements
        .iter()
        .map(|element| render_inline(&element.children))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_inline(nodes: &[InlineNode]) -> String {
    nodes.iter().map(render_node).collect()
}

fn render_node(node: &InlineNode) -> String {
    match node {
        InlineNode::Text(leaf) => render_leaf(leaf),
        InlineNode::Element(element) => {
            let label = render_inline(&element.children);
            let url = element
                .props
                .as_ref()
                .and_then(|props| props.get("url"))
                .and_then(Value::as_str);
            match url {
                Some(url) if element.kind == "link" => format!("[{label}]({url})"),
                _ => label,
            }
        }
    }
}

fn render_leaf(leaf: &TextLeaf) -> String {
    let mut text = leaf.text.clone();
    if text.is_empty() {
        return text;
    }
    // Wrapped innermost first: bold, italic, code, strike, underline.
    if leaf.bold {
        text = format!("**{text}**");
    }
    if leaf.italic {
        text = format!("*{text}*");
    }
    if leaf.code {
        text = format!("`{text}`");
    }
    if leaf.strike {
        text = format!("~~{text}~~");
    }
    if leaf.underline {
        text = format!("<u>{text}</u>");
    }
    text
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    pub text: String,
    /// 1-based line number.
    pub line: usize,
}

fn heading_level(line: &str) -> Option<usize> {
    let level = line.len() - line.trim_start_matches('#').len();
    let next = line[level..].chars().next()?;
    ((1..=6).contains(&level) && next.is_whitespace()).then_some(level)
}

pub fn extract_headings(markdown: &str) -> Vec<Heading> {
    markdown
        .split('\n')
        .enumerate()
        .filter_map(|(ix, line)| {
            let level = heading_level(line)?;
            Some(Heading {
                level,
                text: line[level..].trim().to_string(),
                line: ix + 1,
            })
        })
        .collect()
}

fn heading_anchor(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Nested bullet list of anchor links to every heading, or an empty string
/// when there are none.
pub fn generate_toc(markdown: &str) -> String {
    let headings = extract_headings(markdown);
    if headings.is_empty() {
        return String::new();
    }
    let entries: Vec<String> = headings
        .iter()
        .map(|heading| {
            format!(
                "{}- [{}](#{})",
                "  ".repeat(heading.level - 1),
                heading.text,
                heading_anchor(&heading.text)
            )
        })
        .collect();
    format!("## Contents\n\n{}", entries.join("\n"))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WordCount {
    pub characters: usize,
    pub words: usize,
    pub lines: usize,
}

fn is_cjk_ideograph(ch: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&ch)
}

/// Words are runs of ASCII letters plus individual CJK ideographs.
pub fn count_words(text: &str) -> WordCount {
    let mut words = 0;
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_ascii_alphabetic() {
            if !in_word {
                words += 1;
            }
            in_word = true;
            continue;
        }
        in_word = false;
        if is_cjk_ideograph(ch) {
            words += 1;
        }
    }
    WordCount {
        characters: text.chars().count(),
        words,
        lines: text.split('\n').count(),
    }
}
