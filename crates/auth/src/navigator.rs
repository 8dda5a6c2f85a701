use thiserror::Error;

use crate::guards::{GuardOutcome, GuardPipeline, NavigationTarget};
use crate::route::{Location, RouteTable, full_path, split_full_path};
use crate::Authorizer;

/// Redirect hops followed before a navigation is abandoned.
pub const DEFAULT_MAX_REDIRECTS: usize = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("no route matches '{0}'")]
    NotFound(String),

    #[error("no route named '{0}'")]
    UnknownRouteName(String),

    #[error("navigation to '{0}' exceeded {1} redirects")]
    TooManyRedirects(String, usize),
}

/// Owns the route table, the guard pipeline and the current location.
pub struct Navigator {
    table: RouteTable,
    guards: GuardPipeline,
    current: Option<Location>,
    max_redirects: usize,
}

impl Navigator {
    pub fn new(table: RouteTable, guards: GuardPipeline) -> Self {
        Self {
            table,
            guards,
            current: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn current(&self) -> Option<&Location> {
        self.current.as_ref()
    }

    /// Navigate to `full_path`, following guard redirects.
    ///
    /// The current location only changes once a target passes every guard.
    pub fn push(&mut self, full_path: &str, session: &dyn Authorizer) -> Result<&Location, NavigationError> {
        let (path, query) = split_full_path(full_path);
        self.navigate(NavigationTarget::Path { path, query }, session)
    }

    pub fn navigate(
        &mut self,
        target: NavigationTarget,
        session: &dyn Authorizer,
    ) -> Result<&Location, NavigationError> {
        let mut target = target;
        let mut hops = 0;

        loop {
            let to = self.resolve(&target)?;
            match self.guards.run(self.current.as_ref(), &to, session) {
                GuardOutcome::Proceed => {
                    tracing::debug!(to = %to.full_path, hops, "navigation committed");
                    return Ok(self.current.insert(to));
                }
                GuardOutcome::Redirect(next) => {
                    hops += 1;
                    if hops > self.max_redirects {
                        return Err(NavigationError::TooManyRedirects(to.full_path, self.max_redirects));
                    }
                    target = next;
                }
            }
        }
    }

    pub fn resolve(&self, target: &NavigationTarget) -> Result<Location, NavigationError> {
        let full = match target {
            NavigationTarget::Path { path, query } => full_path(path, query),
            NavigationTarget::Named(name) => self
                .table
                .path_for_name(name)
                .ok_or_else(|| NavigationError::UnknownRouteName(name.clone()))?,
        };
        self.table
            .resolve(&full)
            .ok_or(NavigationError::NotFound(full))
    }
}
