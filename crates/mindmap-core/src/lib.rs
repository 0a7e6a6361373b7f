pub mod focus;
pub mod layout;
pub mod model;
pub mod sanitize;
pub mod tree;

use serde::{Deserialize, Serialize};

pub use focus::{compute_emphasis, compute_emphasis_at, EmphasisState, FocusController, Tier};
pub use layout::{layout, Layout, LayoutConfig, LayoutNode, LayoutOutcome, Viewport};
pub use model::{ArchiveEntry, MapNode, NodeIx, NodeKey};
pub use sanitize::{sanitize, sanitize_payload, MalformedPayload, Rejection, Sanitized};
pub use tree::TreeIndex;

pub const PROTOCOL_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedPayload,
    NotFound,
    BadRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum Msg {
    Hello {
        version: String,
    },

    // render target -> agent
    /// Raw, unvalidated output of the generation collaborator.
    Generated {
        file_name: String,
        payload: serde_json::Value,
    },
    Open {
        id: i64,
    },
    Resize {
        width: f64,
        height: f64,
    },
    /// "Node selected" notification; `None` clears focus.
    Select {
        node: Option<NodeKey>,
    },
    ListArchive,
    DeleteArchive {
        id: i64,
    },
    Ping,

    // agent -> render target
    MapLoaded {
        generation: u64,
        file_name: String,
        tree: MapNode,
    },
    Layout {
        generation: u64,
        layout: Layout,
    },
    LayoutPending {
        generation: u64,
    },
    Emphasis {
        generation: u64,
        emphasis: EmphasisState,
    },
    Archive {
        entries: Vec<ArchiveEntry>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
    Pong,
}

impl Msg {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "Hello",
            Self::Generated { .. } => "Generated",
            Self::Open { .. } => "Open",
            Self::Resize { .. } => "Resize",
            Self::Select { .. } => "Select",
            Self::ListArchive => "ListArchive",
            Self::DeleteArchive { .. } => "DeleteArchive",
            Self::Ping => "Ping",
            Self::MapLoaded { .. } => "MapLoaded",
            Self::Layout { .. } => "Layout",
            Self::LayoutPending { .. } => "LayoutPending",
            Self::Emphasis { .. } => "Emphasis",
            Self::Archive { .. } => "Archive",
            Self::Error { .. } => "Error",
            Self::Pong => "Pong",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_use_type_and_data_envelope() {
        let msg = Msg::Select {
            node: Some(NodeKey {
                generation: 3,
                index: 7,
            }),
        };
        let encoded = serde_json::to_value(&msg).expect("serialize");

        assert_eq!(
            encoded,
            json!({"type": "Select", "data": {"node": {"generation": 3, "index": 7}}})
        );
    }

    #[test]
    fn generated_payload_stays_raw() {
        let wire = json!({
            "type": "Generated",
            "data": {"fileName": "paper.pdf", "payload": {"title": 5}}
        });
        let decoded: Msg = serde_json::from_value(wire).expect("decode");

        assert_eq!(
            decoded,
            Msg::Generated {
                file_name: "paper.pdf".to_string(),
                payload: json!({"title": 5}),
            }
        );
    }

    #[test]
    fn unit_variants_round_trip() {
        let encoded = serde_json::to_string(&Msg::ListArchive).expect("serialize");
        let decoded: Msg = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, Msg::ListArchive);
    }

    fn chain(levels: usize) -> MapNode {
        let mut node = MapNode::leaf("leaf", "s");
        for i in 0..levels {
            node = MapNode::leaf(format!("n{i}"), "s").with_children(vec![node]);
        }
        node
    }

    #[test]
    fn deepest_accepted_tree_survives_every_frame() {
        let tree = chain(sanitize::MAX_DEPTH);
        let frames = [
            Msg::Archive {
                entries: vec![ArchiveEntry {
                    id: 1,
                    file_name: "deep.pdf".to_string(),
                    created_at: "2024-01-01T00:00:00.000Z".to_string(),
                    mind_map_data: tree.clone(),
                }],
            },
            Msg::MapLoaded {
                generation: 1,
                file_name: "deep.pdf".to_string(),
                tree: tree.clone(),
            },
            Msg::Generated {
                file_name: "deep.pdf".to_string(),
                payload: serde_json::to_value(&tree).expect("to value"),
            },
        ];

        for msg in frames {
            let bytes = serde_json::to_vec(&msg).expect("serialize");
            let decoded: Msg = serde_json::from_slice(&bytes).expect(msg.name());
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn error_kind_is_snake_case() {
        let encoded = serde_json::to_value(Msg::error(ErrorKind::MalformedPayload, "bad"))
            .expect("serialize");
        assert_eq!(encoded["data"]["kind"], "malformed_payload");
    }
}
