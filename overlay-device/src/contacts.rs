use std::collections::HashMap;

use overlay_core::NodeId;

/// Per-device alias map augmenting transcripts with friendly names (spec
/// §4.4). A node has at most one alias; an alias names at most one node.
#[derive(Debug, Default)]
pub struct ContactDirectory {
    alias_to_id: HashMap<String, NodeId>,
    id_to_alias: HashMap<NodeId, String>,
}

impl ContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `id`. Fails if `name` is already bound to a
    /// *different* identity. If `id` previously had a different alias, that
    /// alias is dropped — a node has at most one alias (spec §4.4).
    pub fn register(&mut self, name: impl Into<String>, id: NodeId) -> Result<(), ()> {
        let name = name.into();
        if let Some(existing) = self.alias_to_id.get(&name) {
            if *existing != id {
                return Err(());
            }
            return Ok(());
        }
        if let Some(old_alias) = self.id_to_alias.remove(&id) {
            self.alias_to_id.remove(&old_alias);
        }
        self.alias_to_id.insert(name.clone(), id);
        self.id_to_alias.insert(id, name);
        Ok(())
    }

    /// Resolves `text` as either a raw identity or a known alias.
    pub fn resolve(&self, text: &str) -> Option<NodeId> {
        text.parse().ok().or_else(|| self.alias_to_id.get(text).copied())
    }

    /// The friendly name to render for `id` in a transcript. `"You"` is
    /// always used for `self_id`, overriding any registered alias.
    pub fn name_for(&self, id: NodeId, self_id: NodeId) -> String {
        if id == self_id {
            return "You".to_string();
        }
        self.id_to_alias
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Unknown ({id})"))
    }

    /// Every `(alias, identity)` binding, for the `contacts.directory`
    /// observability event.
    pub fn snapshot(&self) -> Vec<(String, NodeId)> {
        self.alias_to_id.iter().map(|(name, id)| (name.clone(), *id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_resolves_alias() {
        let mut contacts = ContactDirectory::new();
        let id = NodeId::new();
        contacts.register("alice", id).unwrap();
        assert_eq!(contacts.resolve("alice"), Some(id));
    }

    #[test]
    fn rejects_alias_bound_to_another_identity() {
        let mut contacts = ContactDirectory::new();
        let a = NodeId::new();
        let b = NodeId::new();
        contacts.register("alice", a).unwrap();
        assert!(contacts.register("alice", b).is_err());
    }

    #[test]
    fn re_registering_same_binding_is_ok() {
        let mut contacts = ContactDirectory::new();
        let a = NodeId::new();
        contacts.register("alice", a).unwrap();
        assert!(contacts.register("alice", a).is_ok());
    }

    #[test]
    fn rebinding_moves_the_alias_off_the_old_identity() {
        let mut contacts = ContactDirectory::new();
        let a = NodeId::new();
        let b = NodeId::new();
        contacts.register("alice", a).unwrap();
        contacts.register("alice-2", a).unwrap();
        assert_eq!(contacts.resolve("alice"), None);
        assert_eq!(contacts.resolve("alice-2"), Some(a));
        let _ = b;
    }

    #[test]
    fn you_is_reserved_for_self() {
        let contacts = ContactDirectory::new();
        let me = NodeId::new();
        assert_eq!(contacts.name_for(me, me), "You");
    }

    #[test]
    fn unresolved_identity_renders_as_unknown() {
        let contacts = ContactDirectory::new();
        let stranger = NodeId::new();
        let me = NodeId::new();
        assert!(contacts.name_for(stranger, me).starts_with("Unknown ("));
    }
}
