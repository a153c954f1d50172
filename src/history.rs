use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Edge, Item, NodeId, Point};
use crate::store::{GraphStore, RemovedNode};

#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
    Node(RemovedNode),
    Edge { index: usize, edge: Edge },
}

/// One reversible mutation of a `GraphStore`.
///
/// Commands are recorded after the mutation already happened, so the stack
/// only ever calls `revert` first and `apply` for redo. Both refresh the
/// captured item from the store so state that changed outside the history
/// (node text) survives an undo/redo cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add { item: Item, index: Option<usize> },
    Move { node: NodeId, before: Point, after: Point },
    Remove(Removal),
}

impl Command {
    pub fn add(item: Item) -> Self {
        Command::Add { item, index: None }
    }

    fn apply(&mut self, store: &mut GraphStore) -> Result<Option<NodeId>> {
        match self {
            Command::Add { item, index } => {
                match item {
                    Item::Node(node) => store.insert_node(node.clone(), *index)?,
                    Item::Edge(edge) => store.insert_edge(edge.clone(), *index)?,
                }
                Ok(None)
            }
            Command::Move { node, after, .. } => {
                place(store, *node, *after)?;
                Ok(Some(*node))
            }
            Command::Remove(removal) => {
                *removal = match removal {
                    Removal::Node(removed) => Removal::Node(store.remove_node(removed.node.id())?),
                    Removal::Edge { edge, .. } => {
                        let (index, edge) = store.remove_edge(edge.id)?;
                        Removal::Edge { index, edge }
                    }
                };
                Ok(None)
            }
        }
    }

    fn revert(&mut self, store: &mut GraphStore) -> Result<Option<NodeId>> {
        match self {
            Command::Add { item, index } => {
                match item {
                    Item::Node(node) => {
                        let removed = store.remove_node(node.id())?;
                        if !removed.edges.is_empty() {
                            // Put the edges back; history must stay consistent.
                            let id = removed.node.id();
                            store.restore_node(removed)?;
                            return Err(Error::InvalidConnection {
                                reason: format!("node {id} still has edges attached"),
                            });
                        }
                        *index = Some(removed.index);
                        *node = removed.node;
                    }
                    Item::Edge(edge) => {
                        let (at, removed) = store.remove_edge(edge.id)?;
                        *index = Some(at);
                        *edge = removed;
                    }
                }
                Ok(None)
            }
            Command::Move { node, before, .. } => {
                place(store, *node, *before)?;
                Ok(Some(*node))
            }
            Command::Remove(removal) => {
                match removal.clone() {
                    Removal::Node(removed) => store.restore_node(removed)?,
                    Removal::Edge { index, edge } => store.insert_edge(edge, Some(index))?,
                }
                Ok(None)
            }
        }
    }
}

fn place(store: &mut GraphStore, node: NodeId, position: Point) -> Result<()> {
    let edges = store.move_node(node, position)?;
    store.reroute(&edges)
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Add { item: Item::Node(node), .. } => write!(f, "add node {}", node.id()),
            Command::Add { item: Item::Edge(edge), .. } => {
                write!(f, "connect {} -> {}", edge.start, edge.end)
            }
            Command::Move { node, .. } => write!(f, "move node {node}"),
            Command::Remove(Removal::Node(removed)) => write!(f, "delete node {}", removed.node.id()),
            Command::Remove(Removal::Edge { edge, .. }) => {
                write!(f, "delete edge {} -> {}", edge.start, edge.end)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub label: String,
    pub moved: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct CommandStack {
    commands: Vec<Command>,
    cursor: usize,
    limit: Option<usize>,
}

impl CommandStack {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            commands: Vec::new(),
            cursor: 0,
            limit,
        }
    }

    /// Records an already-performed mutation, discarding the redo tail.
    pub fn push(&mut self, command: Command) {
        debug!(command = %command, "push");
        self.commands.truncate(self.cursor);
        self.commands.push(command);
        if let Some(limit) = self.limit {
            if self.commands.len() > limit {
                let excess = self.commands.len() - limit;
                self.commands.drain(..excess);
            }
        }
        self.cursor = self.commands.len();
    }

    pub fn undo(&mut self, store: &mut GraphStore) -> Result<Option<Step>> {
        if self.cursor == 0 {
            return Ok(None);
        }
        let command = &mut self.commands[self.cursor - 1];
        let moved = command.revert(store)?;
        let label = command.to_string();
        self.cursor -= 1;
        debug!(command = %label, "undo");
        Ok(Some(Step { label, moved }))
    }

    pub fn redo(&mut self, store: &mut GraphStore) -> Result<Option<Step>> {
        let Some(command) = self.commands.get_mut(self.cursor) else {
            return Ok(None);
        };
        let moved = command.apply(store)?;
        let label = command.to_string();
        self.cursor += 1;
        debug!(command = %label, "redo");
        Ok(Some(Step { label, moved }))
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    pub fn undo_text(&self) -> Option<String> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.commands.get(i))
            .map(Command::to_string)
    }

    pub fn redo_text(&self) -> Option<String> {
        self.commands.get(self.cursor).map(Command::to_string)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }
}
