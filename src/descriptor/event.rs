use std::sync::Arc;

use crate::{
    descriptor::{Member, MemberId, MemberInfo, MemberKind, MethodDescriptor},
    metadata::{members::EventRc, token::Token, typesystem::TypeRegistry},
};

/// An event of a type: subscription methods plus an optional raise method
pub struct EventDescriptor {
    info: MemberInfo,
    def: EventRc,
    add: Arc<MethodDescriptor>,
    remove: Arc<MethodDescriptor>,
    raise: Option<Arc<MethodDescriptor>>,
}

impl EventDescriptor {
    /// Creates the descriptor of `def`
    #[must_use]
    pub fn new(def: EventRc, owner_name: &str, types: &TypeRegistry) -> Self {
        let method = |method| Arc::new(MethodDescriptor::new(method, owner_name, types));

        EventDescriptor {
            info: MemberInfo::new(
                MemberId::new(def.declaring_type, def.token),
                &def.name,
                owner_name,
                &def.custom_attributes,
                def.add.access(),
                def.is_static(),
            ),
            add: method(def.add.clone()),
            remove: method(def.remove.clone()),
            raise: def.raise.clone().map(method),
            def,
        }
    }

    /// The raw event definition
    #[must_use]
    pub fn def(&self) -> &EventRc {
        &self.def
    }

    /// The delegate type of handlers
    #[must_use]
    pub fn handler_type(&self) -> Token {
        self.def.handler_type
    }

    /// The subscribe method
    #[must_use]
    pub fn add(&self) -> &Arc<MethodDescriptor> {
        &self.add
    }

    /// The unsubscribe method
    #[must_use]
    pub fn remove(&self) -> &Arc<MethodDescriptor> {
        &self.remove
    }

    /// The raise method, if the event exposes one
    #[must_use]
    pub fn raise(&self) -> Option<&Arc<MethodDescriptor>> {
        self.raise.as_ref()
    }
}

impl Member for EventDescriptor {
    fn info(&self) -> &MemberInfo {
        &self.info
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Event
    }
}

impl std::fmt::Debug for EventDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDescriptor")
            .field("id", &self.info.id)
            .field("name", &self.info.name)
            .field("handler_type", &self.def.handler_type)
            .finish_non_exhaustive()
    }
}

impl_member_identity!(EventDescriptor);
