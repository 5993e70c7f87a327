//! Task model - the unit of work the scheduler routes to a resource.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::id::TaskId;
use crate::resource::ResourceHandle;

/// A task submitted to the scheduler.
///
/// Created by the submission layer, claimed by at most one selection pass
/// (which writes `assigned_resource` and possibly `hybrid`), then consumed
/// by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Unique identifier
    #[serde(default)]
    pub id: TaskId,

    /// What kind of work this is
    pub kind: TaskKind,

    /// Index type the task runs against
    pub index_kind: IndexKind,

    /// Requested result count per query
    pub topk: i64,

    /// Number of query vectors
    pub nq: u64,

    /// Free-form search parameters (e.g. `nprobe`)
    #[serde(default)]
    pub extra_params: ExtraParams,

    /// Resource chosen by the claiming pass
    #[serde(skip)]
    pub assigned_resource: Option<ResourceHandle>,

    /// Set when the task runs on CPU but may borrow a GPU for the coarse
    /// quantizer of a hybrid index. Executors without hybrid support ignore it.
    #[serde(skip)]
    pub hybrid: bool,
}

impl TaskDescriptor {
    /// Create a new task with no extra params.
    pub fn new(kind: TaskKind, index_kind: IndexKind, topk: i64, nq: u64) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            index_kind,
            topk,
            nq,
            extra_params: ExtraParams::default(),
            assigned_resource: None,
            hybrid: false,
        }
    }

    /// Create a new search task.
    pub fn search(index_kind: IndexKind, topk: i64, nq: u64) -> Self {
        Self::new(TaskKind::Search, index_kind, topk, nq)
    }

    /// Set an extra search parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_params.insert(key, value);
        self
    }

    /// Whether a pass has claimed this task.
    pub fn is_assigned(&self) -> bool {
        self.assigned_resource.is_some()
    }
}

/// Kind of scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Vector similarity search
    Search,
    /// Index construction
    BuildIndex,
    /// Entity deletion
    Delete,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Search => write!(f, "search"),
            TaskKind::BuildIndex => write!(f, "build_index"),
            TaskKind::Delete => write!(f, "delete"),
        }
    }
}

/// Vector index type a task targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Brute force
    Flat,
    /// Inverted file, raw vectors
    IvfFlat,
    /// Inverted file, 8-bit scalar quantization
    IvfSq8,
    /// IVF_SQ8 with the coarse quantizer on GPU and data on CPU
    IvfSq8h,
    /// Inverted file, product quantization
    IvfPq,
    /// Graph index
    Hnsw,
    /// Random projection trees
    Annoy,
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IndexKind::Flat => "FLAT",
            IndexKind::IvfFlat => "IVF_FLAT",
            IndexKind::IvfSq8 => "IVF_SQ8",
            IndexKind::IvfSq8h => "IVF_SQ8_HYBRID",
            IndexKind::IvfPq => "IVF_PQ",
            IndexKind::Hnsw => "HNSW",
            IndexKind::Annoy => "ANNOY",
        };
        f.write_str(name)
    }
}

/// Extra search parameters attached to a task, as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtraParams(Map<String, Value>);

impl ExtraParams {
    /// Look up a parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ExtraParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
