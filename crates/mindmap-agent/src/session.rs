use mindmap_core::{
    layout, sanitize_payload, ErrorKind, FocusController, LayoutConfig, LayoutOutcome, MapNode,
    Msg, NodeKey, Viewport, PROTOCOL_VERSION,
};

use crate::archive::{ArchiveStore, Clock};
use crate::storage::KvStore;

struct CurrentMap {
    generation: u64,
    tree: MapNode,
}

/// State held for one connected render target.
pub struct Session {
    layout_cfg: LayoutConfig,
    viewport: Option<Viewport>,
    current: Option<CurrentMap>,
    focus: FocusController,
    generation: u64,
}

impl Session {
    pub fn new(layout_cfg: LayoutConfig) -> Self {
        Self {
            layout_cfg,
            viewport: None,
            current: None,
            focus: FocusController::default(),
            generation: 0,
        }
    }

    pub fn handle<S: KvStore, C: Clock>(
        &mut self,
        msg: Msg,
        archive: &mut ArchiveStore<S, C>,
    ) -> Vec<Msg> {
        match msg {
            Msg::Hello { version } => {
                tracing::debug!(peer_version = %version, "hello");
                vec![Msg::Hello {
                    version: PROTOCOL_VERSION.to_string(),
                }]
            }
            Msg::Ping => vec![Msg::Pong],
            Msg::Generated { file_name, payload } => match sanitize_payload(&payload) {
                Ok(tree) => {
                    let entries = archive.save(&file_name, &tree);
                    let mut out = vec![Msg::Archive { entries }];
                    out.extend(self.load(file_name, tree));
                    out
                }
                Err(err) => vec![Msg::error(ErrorKind::MalformedPayload, err.to_string())],
            },
            Msg::Open { id } => match archive.get(id) {
                Some(entry) => self.load(entry.file_name, entry.mind_map_data),
                None => vec![Msg::error(
                    ErrorKind::NotFound,
                    format!("no archived map with id {id}"),
                )],
            },
            Msg::Resize { width, height } => {
                self.viewport = Some(Viewport::new(width, height));
                self.layout_msg().into_iter().collect()
            }
            Msg::Select { node } => self.select(node),
            Msg::ListArchive => vec![Msg::Archive {
                entries: archive.list(),
            }],
            Msg::DeleteArchive { id } => vec![Msg::Archive {
                entries: archive.delete(id),
            }],
            other => {
                tracing::warn!(msg = other.name(), "client sent an agent-side message");
                vec![Msg::error(
                    ErrorKind::BadRequest,
                    format!("{} is not a request", other.name()),
                )]
            }
        }
    }

    fn load(&mut self, file_name: String, tree: MapNode) -> Vec<Msg> {
        self.generation += 1;
        let generation = self.generation;
        self.focus.clear();
        tracing::info!(generation, file_name = %file_name, nodes = tree.node_count(), "map loaded");

        let emphasis = self.focus.emphasis(generation, &tree);
        self.current = Some(CurrentMap {
            generation,
            tree: tree.clone(),
        });

        let mut out = vec![Msg::MapLoaded {
            generation,
            file_name,
            tree,
        }];
        out.extend(self.layout_msg());
        out.push(Msg::Emphasis {
            generation,
            emphasis,
        });
        out
    }

    /// Layout for the current map, or nothing when no map is loaded.
    fn layout_msg(&self) -> Option<Msg> {
        let current = self.current.as_ref()?;
        let generation = current.generation;
        let outcome = match self.viewport {
            Some(viewport) => layout(&current.tree, viewport, &self.layout_cfg),
            None => LayoutOutcome::NotReady,
        };
        Some(match outcome {
            LayoutOutcome::Ready(layout) => Msg::Layout { generation, layout },
            LayoutOutcome::NotReady => Msg::LayoutPending { generation },
        })
    }

    fn select(&mut self, node: Option<NodeKey>) -> Vec<Msg> {
        let Some(current) = self.current.as_ref() else {
            return vec![Msg::error(ErrorKind::BadRequest, "no map loaded")];
        };
        let generation = current.generation;
        let emphasis = self.focus.select(node, generation, &current.tree);
        vec![Msg::Emphasis {
            generation,
            emphasis,
        }]
    }
}
