//! Structural export and import of subtrees.
//!
//! A subtree is exported as a nested mapping from child names to scalars or
//! further mappings. Unnamed children are keyed `*N` by their position; a
//! name that itself starts with `*` is written with one more `*` in front.
//! References and alias loops export as void.
//!
//! JSON has no NaN or infinity. `serde_json` writes such floats as `null`,
//! so they import back as void. MessagePack keeps them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tree::{NodeId, Prop, PropTxn, PropValue};

/// A detached copy of a subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Exported {
    Void,
    Int(i32),
    Float(f32),
    Str(String),
    Dir(IndexMap<String, Exported>),
}

impl Exported {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Look up a dotted path inside an exported directory.
    pub fn get(&self, path: &str) -> Option<&Exported> {
        path.split('.').try_fold(self, |node, name| match node {
            Exported::Dir(children) => children.get(name),
            _ => None,
        })
    }
}

impl PropTxn<'_> {
    /// Snapshot the subtree at `id`, following aliases.
    pub fn export(&self, id: NodeId) -> Exported {
        let mut path = Vec::new();
        self.export0(id, &mut path)
    }

    fn export0(&self, id: NodeId, path: &mut Vec<NodeId>) -> Exported {
        let id = self.follow(id);
        if path.contains(&id) {
            return Exported::Void;
        }
        match self.value(id) {
            None | Some(PropValue::Void) | Some(PropValue::Ref(_)) => Exported::Void,
            Some(PropValue::Int(v)) => Exported::Int(v),
            Some(PropValue::Float(v)) => Exported::Float(v),
            Some(PropValue::Str(s)) => Exported::Str(s.as_str().to_string()),
            Some(PropValue::Dir) => {
                path.push(id);
                let mut children = IndexMap::new();
                for (pos, child) in self.children(id).into_iter().enumerate() {
                    let key = match self.name(child) {
                        Some(name) if name.starts_with('*') => format!("*{name}"),
                        Some(name) => name.to_string(),
                        None => format!("*{pos}"),
                    };
                    children.insert(key, self.export0(child, path));
                }
                path.pop();
                Exported::Dir(children)
            }
        }
    }

    /// Write `value` into `id`, creating children as needed.
    pub fn import(&mut self, id: NodeId, value: &Exported) {
        match value {
            Exported::Void => self.set_void(id),
            Exported::Int(v) => self.set_int(id, *v),
            Exported::Float(v) => self.set_float(id, *v),
            Exported::Str(s) => self.set_str(id, s),
            Exported::Dir(children) => {
                let id = self.follow(id);
                if !self.make_dir(id) {
                    return;
                }
                for (key, child) in children {
                    if let Some(node) = self.create_child(id, child_name(key)) {
                        self.import(node, child);
                    }
                }
            }
        }
    }
}

/// Child name for an exported key; `None` for a positional `*N` key.
fn child_name(key: &str) -> Option<&str> {
    match key.strip_prefix('*') {
        Some(escaped) if escaped.starts_with('*') => Some(escaped),
        Some(n) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => None,
        _ => Some(key),
    }
}

impl Prop {
    pub fn export(&self) -> Exported {
        self.tree().with(|txn| txn.export(self.id()))
    }

    pub fn import(&self, value: &Exported) {
        self.tree().with(|txn| txn.import(self.id(), value));
    }
}
