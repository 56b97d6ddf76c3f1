//! SP-003: Markup node tree built from the YAML event stream.
//!
//! The stock deserializers resolve core tags eagerly and reject duplicate
//! keys, which would lose both the raw scalar text and the shorthand tags the
//! decoder needs. This module keeps every node exactly as written: kind, tag,
//! raw text, quoting style.

use std::collections::HashMap;
use thiserror::Error;
use yaml_rust2::parser::{Event, EventReceiver, Parser, Tag};
use yaml_rust2::scanner::{ScanError, TScalarStyle};

const CORE_SCHEMA: &str = "tag:yaml.org,2002:";

/// Nodes alias expansion may always add, regardless of input size.
const ALIAS_EXPANSION_FLOOR: usize = 100_000;
/// Additional alias-expanded nodes allowed per byte of input.
const ALIAS_EXPANSION_PER_BYTE: usize = 64;

/// Why markup could not be loaded into a node tree.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("document contains excessive aliasing ({expanded} nodes expanded, limit {limit})")]
    ExcessiveAliasing { expanded: usize, limit: usize },
}

/// Tag attached to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTag {
    /// `!!int`, `!!str`, ... (suffix only)
    Core(String),
    /// `!Ref`, `!Sub`, ... (suffix only)
    Local(String),
    /// The non-specific `!` tag.
    NonSpecific,
    /// Anything else, fully expanded.
    Other(String),
}

impl NodeTag {
    pub fn core(suffix: &str) -> Self {
        NodeTag::Core(suffix.to_string())
    }

    pub fn local(suffix: &str) -> Self {
        NodeTag::Local(suffix.to_string())
    }

    fn from_parser(tag: Tag) -> Self {
        let Tag { handle, suffix } = tag;
        match handle.as_str() {
            CORE_SCHEMA | "!!" => NodeTag::Core(suffix),
            "!" => NodeTag::Local(suffix),
            "" if suffix == "!" => NodeTag::NonSpecific,
            "" => match suffix.strip_prefix(CORE_SCHEMA) {
                Some(core) => NodeTag::Core(core.to_string()),
                None => match suffix.strip_prefix('!') {
                    Some(local) => NodeTag::Local(local.to_string()),
                    None => NodeTag::Other(suffix),
                },
            },
            _ => NodeTag::Other(format!("{}{}", handle, suffix)),
        }
    }
}

/// How a scalar was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    Quoted,
    Block,
}

impl From<TScalarStyle> for ScalarStyle {
    fn from(style: TScalarStyle) -> Self {
        match style {
            TScalarStyle::SingleQuoted | TScalarStyle::DoubleQuoted => ScalarStyle::Quoted,
            TScalarStyle::Literal | TScalarStyle::Folded => ScalarStyle::Block,
            _ => ScalarStyle::Plain,
        }
    }
}

/// Shape of a markup node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Document wrapper; holds the root node (empty for an empty document).
    Document(Vec<Node>),
    Scalar { text: String, style: ScalarStyle },
    Sequence(Vec<Node>),
    /// Key/value pairs in source order, duplicates included.
    Mapping(Vec<(Node, Node)>),
}

/// A markup node with its optional tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub tag: Option<NodeTag>,
    pub kind: NodeKind,
}

impl Node {
    /// An untagged plain scalar.
    pub fn plain(text: &str) -> Self {
        Self {
            tag: None,
            kind: NodeKind::Scalar {
                text: text.to_string(),
                style: ScalarStyle::Plain,
            },
        }
    }

    /// A plain scalar carrying an explicit tag.
    pub fn tagged(tag: NodeTag, text: &str) -> Self {
        Self {
            tag: Some(tag),
            ..Self::plain(text)
        }
    }

    pub fn document(root: Node) -> Self {
        Self {
            tag: None,
            kind: NodeKind::Document(vec![root]),
        }
    }

    pub fn sequence(items: Vec<Node>) -> Self {
        Self {
            tag: None,
            kind: NodeKind::Sequence(items),
        }
    }

    pub fn mapping(entries: Vec<(Node, Node)>) -> Self {
        Self {
            tag: None,
            kind: NodeKind::Mapping(entries),
        }
    }

    /// Number of nodes in this subtree, itself included.
    pub fn size(&self) -> usize {
        1 + match &self.kind {
            NodeKind::Scalar { .. } => 0,
            NodeKind::Document(items) | NodeKind::Sequence(items) => {
                items.iter().map(Node::size).sum()
            }
            NodeKind::Mapping(entries) => entries.iter().map(|(k, v)| k.size() + v.size()).sum(),
        }
    }

    /// Node kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Document(_) => "document",
            NodeKind::Scalar { .. } => "scalar",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Mapping(_) => "mapping",
        }
    }
}

enum Frame {
    Sequence {
        tag: Option<NodeTag>,
        anchor: usize,
        items: Vec<Node>,
    },
    Mapping {
        tag: Option<NodeTag>,
        anchor: usize,
        entries: Vec<(Node, Node)>,
        key: Option<Node>,
    },
}

/// Collects parser events into a node tree for the first document.
///
/// Aliases are expanded into copies of their anchored node; the total number
/// of copied nodes is capped at `alias_limit`.
struct TreeBuilder {
    stack: Vec<Frame>,
    /// Anchored nodes with their subtree sizes.
    anchors: HashMap<usize, (Node, usize)>,
    root: Option<Node>,
    documents: usize,
    expanded: usize,
    alias_limit: usize,
    failure: Option<LoadError>,
}

impl TreeBuilder {
    fn new(alias_limit: usize) -> Self {
        Self {
            stack: Vec::new(),
            anchors: HashMap::new(),
            root: None,
            documents: 0,
            expanded: 0,
            alias_limit,
            failure: None,
        }
    }

    fn finish(&mut self, node: Node, anchor: usize) {
        // anchor id 0 means "no anchor"
        if anchor > 0 {
            let size = node.size();
            self.anchors.insert(anchor, (node.clone(), size));
        }
        match self.stack.last_mut() {
            None => {
                if self.root.is_none() {
                    self.root = Some(node);
                }
            }
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping { entries, key, .. }) => match key.take() {
                None => *key = Some(node),
                Some(k) => entries.push((k, node)),
            },
        }
    }
}

impl EventReceiver for TreeBuilder {
    fn on_event(&mut self, ev: Event) {
        if self.failure.is_some() {
            return;
        }
        match ev {
            Event::Scalar(text, style, anchor, tag) => {
                let node = Node {
                    tag: tag.map(NodeTag::from_parser),
                    kind: NodeKind::Scalar {
                        text,
                        style: style.into(),
                    },
                };
                self.finish(node, anchor);
            }
            Event::SequenceStart(anchor, tag) => self.stack.push(Frame::Sequence {
                tag: tag.map(NodeTag::from_parser),
                anchor,
                items: Vec::new(),
            }),
            Event::MappingStart(anchor, tag) => self.stack.push(Frame::Mapping {
                tag: tag.map(NodeTag::from_parser),
                anchor,
                entries: Vec::new(),
                key: None,
            }),
            Event::SequenceEnd | Event::MappingEnd => {
                let (node, anchor) = match self.stack.pop() {
                    Some(Frame::Sequence { tag, anchor, items }) => (
                        Node {
                            tag,
                            kind: NodeKind::Sequence(items),
                        },
                        anchor,
                    ),
                    Some(Frame::Mapping {
                        tag,
                        anchor,
                        mut entries,
                        key,
                    }) => {
                        // a dangling key has no value node; pair it with null
                        if let Some(k) = key {
                            entries.push((k, Node::tagged(NodeTag::core("null"), "")));
                        }
                        (
                            Node {
                                tag,
                                kind: NodeKind::Mapping(entries),
                            },
                            anchor,
                        )
                    }
                    None => return,
                };
                self.finish(node, anchor);
            }
            Event::Alias(id) => {
                let node = match self.anchors.get(&id) {
                    Some((node, size)) => {
                        let expanded = self.expanded.saturating_add(*size);
                        if expanded > self.alias_limit {
                            self.failure = Some(LoadError::ExcessiveAliasing {
                                expanded,
                                limit: self.alias_limit,
                            });
                            return;
                        }
                        self.expanded = expanded;
                        node.clone()
                    }
                    None => Node::tagged(NodeTag::core("null"), ""),
                };
                self.finish(node, 0);
            }
            Event::DocumentEnd => self.documents += 1,
            _ => {}
        }
    }
}

/// Parse markup into a document node. Returns `Ok(None)` when the input holds
/// no document at all.
pub fn load(markup: &str) -> Result<Option<Node>, LoadError> {
    let limit = ALIAS_EXPANSION_FLOOR.max(markup.len().saturating_mul(ALIAS_EXPANSION_PER_BYTE));
    let mut builder = TreeBuilder::new(limit);
    let mut parser = Parser::new_from_str(markup);
    parser.load(&mut builder, false)?;
    if let Some(failure) = builder.failure {
        tracing::debug!(error = %failure, "markup rejected");
        return Err(failure);
    }
    tracing::trace!(
        documents = builder.documents,
        expanded = builder.expanded,
        "markup loaded"
    );
    Ok(builder.root.map(Node::document))
}
