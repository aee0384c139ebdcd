use std::collections::BTreeMap;

/// Input channels a tool can claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    PrimaryClick,
    PointerMove,
    SecondaryClick,
    CancelKey,
    VertexPick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// Proof that a handler is armed. Not `Clone`: the only way to disarm is
/// to hand it back through [`HandlerRegistration::dispose`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dropped registration stays armed until the registry is cleared"]
pub struct HandlerRegistration {
    id: HandlerId,
    kind: HandlerKind,
}

impl HandlerRegistration {
    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn dispose(self, registry: &mut HandlerRegistry) {
        registry.release(self.id);
    }
}

/// Which input handlers are currently armed. Input routing asks the registry
/// rather than the tools so a torn-down tool can never receive events.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    armed: BTreeMap<HandlerId, HandlerKind>,
    next_id: u64,
}

impl HandlerRegistry {
    pub fn register(&mut self, kind: HandlerKind) -> HandlerRegistration {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.armed.insert(id, kind);
        HandlerRegistration { id, kind }
    }

    fn release(&mut self, id: HandlerId) -> bool {
        self.armed.remove(&id).is_some()
    }

    pub fn is_armed(&self, kind: HandlerKind) -> bool {
        self.armed.values().any(|armed| *armed == kind)
    }

    pub fn is_registered(&self, registration: &HandlerRegistration) -> bool {
        self.armed.contains_key(&registration.id)
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispose_disarms_only_its_own_registration() {
        let mut registry = HandlerRegistry::default();
        let first = registry.register(HandlerKind::PrimaryClick);
        let second = registry.register(HandlerKind::PrimaryClick);

        first.dispose(&mut registry);
        assert!(registry.is_armed(HandlerKind::PrimaryClick));
        assert!(registry.is_registered(&second));

        second.dispose(&mut registry);
        assert!(!registry.is_armed(HandlerKind::PrimaryClick));
        assert_eq!(registry.armed_count(), 0);
    }
}
