//! Declarative show/hide bindings keyed on roles or permissions.
//!
//! A binding is evaluated once, when its element mounts. If the session
//! lacks what the binding asks for, the element is detached from its parent
//! and stays detached for the rest of that mount, whatever happens to the
//! session afterwards.

use thiserror::Error;

use crate::{Authorizer, Requirement};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    Any,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    Permission(Requirement),
    Role(Requirement),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("unknown binding kind '{0}' (expected 'permission' or 'role')")]
    UnknownKind(String),

    #[error("unknown binding modifier '{0}'")]
    UnknownModifier(String),
}

/// Something that can be pulled out of its parent in a render tree.
pub trait Detachable {
    fn detach_from_parent(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mounted {
    Visible,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityBinding {
    kind: BindingKind,
    mode: MatchMode,
}

impl VisibilityBinding {
    pub fn permission(value: impl Into<Requirement>) -> Self {
        Self {
            kind: BindingKind::Permission(value.into()),
            mode: MatchMode::Any,
        }
    }

    pub fn role(value: impl Into<Requirement>) -> Self {
        Self {
            kind: BindingKind::Role(value.into()),
            mode: MatchMode::Any,
        }
    }

    /// Require every listed value instead of any one of them.
    pub fn all(mut self) -> Self {
        self.mode = MatchMode::All;
        self
    }

    /// Build a binding from directive-style input, e.g.
    /// `parse("permission", &["all"], ["users.create", "users.edit"].into())`.
    pub fn parse(kind: &str, modifiers: &[&str], value: Requirement) -> Result<Self, BindingError> {
        let mut binding = match kind {
            "permission" => Self::permission(value),
            "role" => Self::role(value),
            other => return Err(BindingError::UnknownKind(other.to_string())),
        };
        for modifier in modifiers {
            match *modifier {
                "all" => binding.mode = MatchMode::All,
                "any" => binding.mode = MatchMode::Any,
                other => return Err(BindingError::UnknownModifier(other.to_string())),
            }
        }
        Ok(binding)
    }

    pub fn kind(&self) -> &BindingKind {
        &self.kind
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn is_satisfied(&self, session: &dyn Authorizer) -> bool {
        match (&self.kind, self.mode) {
            (BindingKind::Permission(Requirement::One(p)), _) => session.has_permission(p),
            (BindingKind::Permission(req), MatchMode::All) => session.has_all_permissions(&req.values()),
            (BindingKind::Permission(req), MatchMode::Any) => session.has_any_permission(&req.values()),
            (BindingKind::Role(Requirement::One(r)), _) => session.has_role(r),
            (BindingKind::Role(req), MatchMode::All) => req.values().iter().all(|r| session.has_role(r)),
            (BindingKind::Role(req), MatchMode::Any) => session.has_any_role(&req.values()),
        }
    }

    /// Decide visibility for a freshly mounted element.
    pub fn mount<E>(&self, element: &mut E, session: &dyn Authorizer) -> Mounted
    where
        E: Detachable + ?Sized,
    {
        if self.is_satisfied(session) {
            Mounted::Visible
        } else {
            element.detach_from_parent();
            Mounted::Removed
        }
    }
}
