//! Externally-owned flow definitions consumed by the layout pass.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::options::SankeyOptions;

/// Identifier of a node definition, unique within one layout pass.
///
/// Flow producers use either strings ("EUR") or plain integers, so both
/// deserialize transparently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefId {
    Text(String),
    Number(i64),
}

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefId::Text(text) => f.write_str(text),
            DefId::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for DefId {
    fn from(value: &str) -> Self {
        DefId::Text(value.to_string())
    }
}

impl From<i64> for DefId {
    fn from(value: i64) -> Self {
        DefId::Number(value)
    }
}

/// One node of the flow. Extra domain fields are carried through untouched
/// so embedding applications can round-trip their own metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: DefId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NodeDef {
    pub fn new(id: impl Into<DefId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_title(id: impl Into<DefId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            extra: serde_json::Map::new(),
        }
    }
}

/// One weighted directed edge of the flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDef {
    pub source: DefId,
    pub target: DefId,
    pub value: f32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EdgeDef {
    pub fn new(source: impl Into<DefId>, target: impl Into<DefId>, value: f32) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            value,
            extra: serde_json::Map::new(),
        }
    }
}

/// Complete chart definition: nodes, edges and layout options. One JSON
/// document of this shape fully describes a chart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SankeyDef {
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
    #[serde(default)]
    pub options: SankeyOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn def_id_accepts_strings_and_numbers() {
        let def: SankeyDef = serde_json::from_str(
            r#"{
                "nodes": [{"id": "EUR"}, {"id": 7, "title": "seven"}],
                "edges": [{"source": "EUR", "target": 7, "value": 12.5}]
            }"#,
        )
        .unwrap();

        assert_eq!(def.nodes[0].id, DefId::from("EUR"));
        assert_eq!(def.nodes[1].id, DefId::from(7));
        assert_eq!(def.nodes[1].title.as_deref(), Some("seven"));
        assert_eq!(def.edges[0].value, 12.5);
    }

    #[test]
    fn extra_fields_are_preserved() {
        let json = r#"{"id": "EUR", "approved": true, "paymentCount": 10}"#;
        let node: NodeDef = serde_json::from_str(json).unwrap();
        assert_eq!(node.extra["approved"], serde_json::json!(true));

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["paymentCount"], serde_json::json!(10));
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let def: SankeyDef = serde_json::from_str("{}").unwrap();
        assert!(def.nodes.is_empty());
        assert!(def.edges.is_empty());
    }
}
