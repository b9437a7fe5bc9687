use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockType {
    #[default]
    Paragraph,
    HeadingOne,
    HeadingTwo,
    HeadingThree,
    Blockquote,
    Code,
    BulletedList,
    NumberedList,
    TodoList,
    Link,
    /// Any editor block this crate has no special handling for, kept verbatim.
    Other(String),
}

impl BlockType {
    pub fn as_str(&self) -> &str {
        match self {
            BlockType::Paragraph => "Paragraph",
            BlockType::HeadingOne => "HeadingOne",
            BlockType::HeadingTwo => "HeadingTwo",
            BlockType::HeadingThree => "HeadingThree",
            BlockType::Blockquote => "Blockquote",
            BlockType::Code => "Code",
            BlockType::BulletedList => "BulletedList",
            BlockType::NumberedList => "NumberedList",
            BlockType::TodoList => "TodoList",
            BlockType::Link => "Link",
            BlockType::Other(name) => name,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self,
            BlockType::BulletedList | BlockType::NumberedList | BlockType::TodoList
        )
    }

    /// Element type written for blocks created by the importer: the block
    /// type lowercased, with a trailing `list` dropped for list blocks.
    pub fn element_type(&self) -> String {
        let lower = self.as_str().to_lowercase();
        match lower.strip_suffix("list") {
            Some(stem) if self.is_list() => stem.to_string(),
            _ => lower,
        }
    }
}

impl From<String> for BlockType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Paragraph" => BlockType::Paragraph,
            "HeadingOne" => BlockType::HeadingOne,
            "HeadingTwo" => BlockType::HeadingTwo,
            "HeadingThree" => BlockType::HeadingThree,
            "Blockquote" => BlockType::Blockquote,
            "Code" => BlockType::Code,
            "BulletedList" => BlockType::BulletedList,
            "NumberedList" => BlockType::NumberedList,
            "TodoList" => BlockType::TodoList,
            "Link" => BlockType::Link,
            _ => BlockType::Other(value),
        }
    }
}

impl From<BlockType> for String {
    fn from(value: BlockType) -> Self {
        match value {
            BlockType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub order: usize,
    #[serde(default)]
    pub depth: usize,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextLeaf {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strike: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TextLeaf {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InlineElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub children: Vec<InlineNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InlineNode {
    Element(InlineElement),
    Text(TextLeaf),
}

impl InlineNode {
    pub fn plain_text(&self) -> String {
        match self {
            InlineNode::Text(leaf) => leaf.text.clone(),
            InlineNode::Element(element) => element
                .children
                .iter()
                .map(InlineNode::plain_text)
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockElement {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub children: Vec<InlineNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Value>,
}

impl BlockElement {
    pub fn plain_text(&self) -> String {
        self.children.iter().map(InlineNode::plain_text).collect()
    }

    pub fn prop_bool(&self, key: &str) -> bool {
        self.props
            .as_ref()
            .and_then(|props| props.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.as_ref()?.get(key)?.as_str()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlockType,
    pub meta: BlockMeta,
    #[serde(default)]
    pub value: Vec<BlockElement>,
}

impl Block {
    pub fn new_id() -> String {
        format!("block-{}", Uuid::new_v4())
    }

    /// A block whose elements are built from `items`, one element per entry.
    pub fn with_elements(kind: BlockType, order: usize, items: Vec<(String, Option<Value>)>) -> Self {
        let id = Self::new_id();
        let element_type = kind.element_type();
        let value = items
            .into_iter()
            .enumerate()
            .map(|(ix, (text, props))| BlockElement {
                id: format!("{id}-{ix}"),
                kind: element_type.clone(),
                children: vec![InlineNode::Text(TextLeaf::plain(&text))],
                props,
            })
            .collect();
        Self {
            id,
            kind,
            meta: BlockMeta { order, depth: 0 },
            value,
        }
    }

    pub fn text(kind: BlockType, order: usize, text: &str) -> Self {
        Self::with_elements(kind, order, vec![(text.to_string(), None)])
    }

    pub fn plain_text(&self) -> String {
        self.value
            .iter()
            .map(BlockElement::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Per-note rich content: block id to block, displayed by `meta.order`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockDocument {
    blocks: BTreeMap<String, Block>,
}

impl BlockDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document holding a single empty paragraph, what the editor shows for
    /// a brand new note.
    pub fn empty_paragraph() -> Self {
        let mut document = Self::new();
        document.insert(Block::text(BlockType::Paragraph, 0, ""));
        document
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Parses stored note content, falling back to an empty paragraph when the
    /// content is blank, malformed, or holds no blocks.
    pub fn load_or_default(content: &str) -> Self {
        if content.trim().is_empty() {
            return Self::empty_paragraph();
        }
        match Self::parse(content) {
            Ok(document) if !document.is_empty() => document,
            Ok(_) => Self::empty_paragraph(),
            Err(err) => {
                tracing::warn!(error = %err, "note content is not a block document, using an empty one");
                Self::empty_paragraph()
            }
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn insert(&mut self, block: Block) {
        self.blocks.insert(block.id.clone(), block);
    }

    pub fn get(&self, block_id: &str) -> Option<&Block> {
        self.blocks.get(block_id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn next_order(&self) -> usize {
        self.blocks
            .values()
            .map(|block| block.meta.order + 1)
            .max()
            .unwrap_or(0)
    }

    /// Blocks sorted by `meta.order`; ties keep block-id order.
    pub fn blocks_in_order(&self) -> Vec<&Block> {
        let mut blocks: Vec<&Block> = self.blocks.values().collect();
        blocks.sort_by_key(|block| block.meta.order);
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_editor_json_with_marks_and_links() {
        let raw = json!({
            "b1": {
                "id": "b1",
                "type": "Paragraph",
                "meta": { "order": 1, "depth": 0 },
                "value": [{
                    "id": "e1",
                    "type": "paragraph",
                    "children": [
                        { "text": "bold", "bold": true },
                        { "id": "l1", "type": "link", "props": { "url": "https://x.dev" },
                          "children": [{ "text": "site" }] }
                    ]
                }]
            },
            "b0": {
                "id": "b0",
                "type": "Callout",
                "meta": { "order": 0, "depth": 0 },
                "value": [{ "id": "e0", "type": "callout", "children": [{ "text": "note", "highlight": "yellow" }] }]
            }
        })
        .to_string();

        let document = BlockDocument::parse(&raw).expect("parse");
        let ordered = document.blocks_in_order();
        assert_eq!(ordered[0].kind, BlockType::Other("Callout".to_string()));
        assert_eq!(ordered[1].plain_text(), "boldsite");

        let InlineNode::Text(leaf) = &ordered[1].value[0].children[0] else {
            panic!("expected text leaf");
        };
        assert!(leaf.bold);

        let reparsed = BlockDocument::parse(&document.to_json().expect("json")).expect("reparse");
        assert_eq!(reparsed, document);
        let callout: Value = serde_json::from_str(&document.to_json().expect("json")).expect("value");
        assert_eq!(callout["b0"]["type"], "Callout");
        assert_eq!(callout["b0"]["value"][0]["children"][0]["highlight"], "yellow");
    }

    #[test]
    fn load_or_default_recovers_from_legacy_content() {
        for content in ["", "   ", "# plain markdown", "{}"] {
            let document = BlockDocument::load_or_default(content);
            assert_eq!(document.len(), 1);
            let block = document.blocks_in_order()[0];
            assert_eq!(block.kind, BlockType::Paragraph);
            assert_eq!(block.plain_text(), "");
        }
    }

    #[test]
    fn element_type_drops_list_suffix() {
        assert_eq!(BlockType::TodoList.element_type(), "todo");
        assert_eq!(BlockType::BulletedList.element_type(), "bulleted");
        assert_eq!(BlockType::HeadingOne.element_type(), "headingone");
        assert_eq!(BlockType::Code.element_type(), "code");
    }

    #[test]
    fn next_order_follows_highest_block() {
        let mut document = BlockDocument::new();
        assert_eq!(document.next_order(), 0);
        document.insert(Block::text(BlockType::Paragraph, 4, "x"));
        assert_eq!(document.next_order(), 5);
    }
}
