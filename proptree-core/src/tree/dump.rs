//! Human-readable tree rendering, used by debug tooling.

use std::fmt::Write;

use super::arena::NodeId;
use super::engine::PropTxn;
use super::node::Payload;

impl PropTxn<'_> {
    /// Render the subtree below `id`, one node per line.
    ///
    /// Each line shows the name, the value, the number of value and canonical
    /// subscriptions, and the alias the node follows. Aliased subtrees are not
    /// descended.
    pub fn dump(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, id, 0);
        out
    }

    fn dump_into(&self, out: &mut String, id: NodeId, depth: usize) {
        let Some(node) = self.node(id) else {
            let _ = writeln!(out, "{:indent$}<zombie>", "", indent = depth * 2);
            return;
        };
        let name = node.name.as_deref().unwrap_or("<anon>");
        let value = match &node.payload {
            Payload::Void => "<void>".to_string(),
            Payload::Dir(dir) => format!("<dir {}>", dir.children.len()),
            Payload::Str(s) => format!("{s:?}"),
            Payload::Int { value, clamp: None } => value.to_string(),
            Payload::Int {
                value,
                clamp: Some((lo, hi)),
            } => format!("{value} [{lo}..{hi}]"),
            Payload::Float { value, clamp: None } => format!("{value:?}"),
            Payload::Float {
                value,
                clamp: Some((lo, hi)),
            } => format!("{value:?} [{lo:?}..{hi:?}]"),
            Payload::Ref(target) => format!("-> {}", self.dn(*target)),
        };
        let _ = write!(
            out,
            "{:indent$}{name} = {value}",
            "",
            indent = depth * 2
        );
        if !node.value_subs.is_empty() || !node.canonical_subs.is_empty() {
            let _ = write!(
                out,
                " (Vs:{} Cs:{})",
                node.value_subs.len(),
                node.canonical_subs.len()
            );
        }
        if let Some(originator) = node.originator {
            let _ = write!(out, " => {}", self.dn(originator));
        }
        out.push('\n');
        if node.originator.is_none() {
            for child in node.children() {
                self.dump_into(out, *child, depth + 1);
            }
        }
    }
}
