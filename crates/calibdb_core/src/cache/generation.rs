//! One immutable, validated snapshot of the directory tree.
//!
//! # Responsibility
//! - Build a fully linked tree from an unordered flat record list.
//! - Answer id, path and children lookups for one generation.
//!
//! # Invariants
//! - Parent/child links are id references resolved through the id index;
//!   nodes never own each other.
//! - A generation is only constructed whole: duplicate ids, duplicate
//!   paths, orphaned parents and unreachable nodes abort the build.
//! - `full_path` is derived from the parent chain during the build,
//!   never taken from records.

use crate::model::directory::{DbKey, Directory, ROOT_ID, ROOT_PATH};
use crate::repo::directory_repo::DirectoryRecord;
use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Structural defects that make a record set unusable as a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    /// Two records share one id, or a record claims the root id.
    DuplicateId(DbKey),
    /// Two directories resolve to the same full path.
    DuplicatePath(String),
    /// A record references a parent id with no matching record.
    OrphanedParent { id: DbKey, parent_id: DbKey },
    /// A record is not reachable from the root; its parent chain loops.
    Unreachable(DbKey),
}

impl Display for StructuralError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "duplicate directory id {id}"),
            Self::DuplicatePath(path) => write!(f, "duplicate directory path `{path}`"),
            Self::OrphanedParent { id, parent_id } => write!(
                f,
                "directory {id} references missing parent {parent_id}"
            ),
            Self::Unreachable(id) => {
                write!(f, "directory {id} is not reachable from the root")
            }
        }
    }
}

impl Error for StructuralError {}

/// One fully built, immutable directory tree snapshot.
#[derive(Debug)]
pub struct Generation {
    root: Arc<Directory>,
    by_id: HashMap<DbKey, Arc<Directory>>,
    by_path: HashMap<String, DbKey>,
    children: HashMap<DbKey, Vec<DbKey>>,
}

impl Generation {
    /// Builds and validates a generation from an unordered record list.
    ///
    /// Two passes plus a root walk: (1) index every record by id, order
    /// independent; (2) link children to parents, rejecting orphans;
    /// (3) walk from the root deriving paths, filling the path index and
    /// rejecting anything the walk cannot reach.
    pub fn build(records: Vec<DirectoryRecord>) -> Result<Self, StructuralError> {
        let mut staged: HashMap<DbKey, DirectoryRecord> = HashMap::with_capacity(records.len());
        for record in records {
            if record.id == ROOT_ID {
                return Err(StructuralError::DuplicateId(ROOT_ID));
            }
            let id = record.id;
            if staged.insert(id, record).is_some() {
                return Err(StructuralError::DuplicateId(id));
            }
        }

        let mut children: HashMap<DbKey, Vec<DbKey>> = HashMap::new();
        for record in staged.values() {
            if record.parent_id != ROOT_ID && !staged.contains_key(&record.parent_id) {
                return Err(StructuralError::OrphanedParent {
                    id: record.id,
                    parent_id: record.parent_id,
                });
            }
            children.entry(record.parent_id).or_default().push(record.id);
        }
        // Stable child order within one generation.
        for ids in children.values_mut() {
            ids.sort_unstable();
        }

        let root = Arc::new(Directory::root());
        let mut by_id: HashMap<DbKey, Arc<Directory>> = HashMap::with_capacity(staged.len());
        let mut by_path: HashMap<String, DbKey> = HashMap::with_capacity(staged.len());

        let mut queue: VecDeque<(DbKey, String)> = VecDeque::new();
        queue.push_back((ROOT_ID, ROOT_PATH.to_string()));
        while let Some((parent_id, parent_path)) = queue.pop_front() {
            let Some(child_ids) = children.get(&parent_id) else {
                continue;
            };
            for child_id in child_ids {
                // A staged entry always exists here: orphans were rejected
                // above and only staged ids enter the children lists.
                let Some(record) = staged.get(child_id) else {
                    continue;
                };
                let full_path = join_path(&parent_path, &record.name);
                if by_path.insert(full_path.clone(), record.id).is_some() {
                    return Err(StructuralError::DuplicatePath(full_path));
                }
                by_id.insert(
                    record.id,
                    Arc::new(Directory {
                        id: record.id,
                        parent_id: record.parent_id,
                        name: record.name.clone(),
                        full_path: full_path.clone(),
                        created_time: record.created_time,
                        modified_time: record.modified_time,
                        comment: record.comment.clone(),
                    }),
                );
                queue.push_back((record.id, full_path));
            }
        }

        if by_id.len() != staged.len() {
            let unreached = staged
                .keys()
                .filter(|id| !by_id.contains_key(id))
                .min()
                .copied()
                .unwrap_or(ROOT_ID);
            return Err(StructuralError::Unreachable(unreached));
        }

        Ok(Self {
            root,
            by_id,
            by_path,
            children,
        })
    }

    /// The synthetic root node of this generation.
    pub fn root(&self) -> Arc<Directory> {
        self.root.clone()
    }

    /// Exact id lookup; the root is not user data and resolves to `None`.
    pub fn get_by_id(&self, id: DbKey) -> Option<Arc<Directory>> {
        self.by_id.get(&id).cloned()
    }

    /// Exact full-path lookup; the root path resolves to `None`.
    pub fn get_by_path(&self, path: &str) -> Option<Arc<Directory>> {
        let id = self.by_path.get(path)?;
        self.by_id.get(id).cloned()
    }

    /// Children of one node, in the generation's stable order.
    pub fn children_of(&self, id: DbKey) -> Vec<Arc<Directory>> {
        let Some(child_ids) = self.children.get(&id) else {
            return Vec::new();
        };
        child_ids
            .iter()
            .filter_map(|child_id| self.by_id.get(child_id).cloned())
            .collect()
    }

    /// Every user directory of this generation, unordered.
    pub fn directories(&self) -> impl Iterator<Item = &Arc<Directory>> {
        self.by_id.values()
    }

    /// Number of user directories in this generation.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether this generation holds no user directories.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn join_path(parent_path: &str, name: &str) -> String {
    if parent_path == ROOT_PATH {
        format!("/{name}")
    } else {
        format!("{parent_path}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::{Generation, StructuralError};
    use crate::repo::directory_repo::DirectoryRecord;

    fn record(id: i64, parent_id: i64, name: &str) -> DirectoryRecord {
        DirectoryRecord {
            id,
            parent_id,
            name: name.to_string(),
            created_time: 0,
            modified_time: 0,
            comment: None,
        }
    }

    #[test]
    fn derives_paths_regardless_of_record_order() {
        let generation = Generation::build(vec![
            record(2, 1, "calib"),
            record(1, 0, "physics"),
        ])
        .expect("two linked records should build");

        let calib = generation
            .get_by_path("/physics/calib")
            .expect("child should be indexed by derived path");
        assert_eq!(calib.id, 2);
        assert_eq!(calib.parent_id, 1);
    }

    #[test]
    fn rejects_disconnected_cycle() {
        // 10 and 11 parent each other; both exist, so the link pass is
        // happy, but the root walk never reaches them.
        let err = Generation::build(vec![
            record(1, 0, "physics"),
            record(10, 11, "a"),
            record(11, 10, "b"),
        ])
        .expect_err("cycle must not build");
        assert_eq!(err, StructuralError::Unreachable(10));
    }

    #[test]
    fn rejects_record_claiming_root_id() {
        let err = Generation::build(vec![record(0, 0, "bogus")])
            .expect_err("root id is reserved");
        assert_eq!(err, StructuralError::DuplicateId(0));
    }
}
