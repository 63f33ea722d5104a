//! GPU validation results that arrive after the call that caused them.
//!
//! wgpu reports shader and pipeline errors through error scopes whose result is a
//! future. Natively the future is resolved on the spot; in the browser it resolves
//! on a later turn of the event loop. A `PendingValidation` holds the outcome of
//! every scope opened while preparing one program, and the backend treats the
//! program as not ready until it has settled.

use std::future::Future;

use super::assets::{Asset, AssetSender, AssetState};
use crate::error::{EngineError, EngineResult};

/// What an error scope was guarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Creation of a shader module.
    Compile,
    /// Creation of a render pipeline.
    Link,
}

/// An error scope popped from the device, with the resource it guarded.
pub struct ErrorScope<F> {
    pub kind: ScopeKind,
    /// Shader id for `Compile`, program id for `Link`.
    pub id: String,
    /// Resolves to the validation error, if any.
    pub outcome: F,
}

/// The first scope that reported an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFailure {
    pub kind: ScopeKind,
    pub id: String,
    pub message: String,
}

impl From<ScopeFailure> for EngineError {
    fn from(failure: ScopeFailure) -> Self {
        match failure.kind {
            ScopeKind::Compile => EngineError::ShaderCompilation {
                id: failure.id,
                message: failure.message,
            },
            ScopeKind::Link => EngineError::ProgramLink {
                id: failure.id,
                message: failure.message,
            },
        }
    }
}

/// Awaits every scope in order and keeps the first failure.
pub async fn first_failure<F, E>(scopes: Vec<ErrorScope<F>>) -> Option<ScopeFailure>
where
    F: Future<Output = Option<E>>,
    E: std::fmt::Display,
{
    let mut failure = None;
    for scope in scopes {
        if let Some(error) = scope.outcome.await {
            failure.get_or_insert(ScopeFailure {
                kind: scope.kind,
                id: scope.id,
                message: error.to_string(),
            });
        }
    }
    failure
}

/// Validation outcome of one program, possibly still unknown.
#[derive(Debug, Clone)]
pub struct PendingValidation {
    program: String,
    outcome: Asset<Option<ScopeFailure>>,
}

impl PendingValidation {
    /// An unsettled validation of `program` and the sender that settles it.
    pub fn new(program: impl Into<String>) -> (Self, AssetSender<Option<ScopeFailure>>) {
        let (outcome, sender) = Asset::pending();
        (
            Self {
                program: program.into(),
                outcome,
            },
            sender,
        )
    }

    /// # Returns
    /// `Ok(false)` while unsettled, `Ok(true)` once every scope came back clean,
    /// and the compile or link error of the first failing scope otherwise.
    pub fn poll(&self) -> EngineResult<bool> {
        match self.outcome.state() {
            AssetState::Pending => Ok(false),
            AssetState::Ready => match self.outcome.get() {
                Some(Some(failure)) => Err(failure.clone().into()),
                _ => Ok(true),
            },
            AssetState::Failed => Err(EngineError::ProgramLink {
                id: self.program.clone(),
                message: self
                    .outcome
                    .error()
                    .unwrap_or("validation was abandoned")
                    .to_owned(),
            }),
        }
    }

    /// Shader whose compilation failed, once known.
    pub fn failed_shader(&self) -> Option<&str> {
        match self.outcome.get() {
            Some(Some(failure)) if failure.kind == ScopeKind::Compile => Some(&failure.id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::{ready, Ready};

    use super::*;

    fn scope(kind: ScopeKind, id: &str, error: Option<&str>) -> ErrorScope<Ready<Option<String>>> {
        ErrorScope {
            kind,
            id: id.to_owned(),
            outcome: ready(error.map(str::to_owned)),
        }
    }

    #[test]
    fn clean_scopes_report_nothing() {
        let scopes = vec![
            scope(ScopeKind::Compile, "chunk.vert", None),
            scope(ScopeKind::Link, "chunk", None),
        ];
        assert_eq!(pollster::block_on(first_failure(scopes)), None);
    }

    #[test]
    fn first_failing_scope_wins() {
        let scopes = vec![
            scope(ScopeKind::Compile, "chunk.vert", None),
            scope(ScopeKind::Compile, "chunk.frag", Some("unknown identifier")),
            scope(ScopeKind::Link, "chunk", Some("missing entry point")),
        ];
        let failure = pollster::block_on(first_failure(scopes)).unwrap();
        assert_eq!(failure.kind, ScopeKind::Compile);
        assert_eq!(failure.id, "chunk.frag");
        assert_eq!(failure.message, "unknown identifier");
    }

    #[test]
    fn program_is_not_ready_until_its_scopes_settle() {
        let (pending, sender) = PendingValidation::new("chunk");
        let shared = pending.clone();
        assert!(!pending.poll().unwrap());
        assert!(!pending.poll().unwrap());

        sender.complete(Ok(Some(ScopeFailure {
            kind: ScopeKind::Link,
            id: "chunk".to_owned(),
            message: "vertex output mismatch".to_owned(),
        })));
        assert!(matches!(
            shared.poll(),
            Err(EngineError::ProgramLink { id, message }) if id == "chunk" && message == "vertex output mismatch"
        ));
        assert_eq!(shared.failed_shader(), None);
    }

    #[test]
    fn late_compile_error_names_the_shader() {
        let (pending, sender) = PendingValidation::new("chunk");
        sender.complete(Ok(Some(ScopeFailure {
            kind: ScopeKind::Compile,
            id: "chunk.frag".to_owned(),
            message: "expected `;`".to_owned(),
        })));
        assert!(matches!(pending.poll(), Err(EngineError::ShaderCompilation { id, .. }) if id == "chunk.frag"));
        assert_eq!(pending.failed_shader(), Some("chunk.frag"));
    }

    #[test]
    fn clean_validation_is_ready() {
        let (pending, sender) = PendingValidation::new("chunk");
        sender.complete(Ok(None));
        assert!(pending.poll().unwrap());
    }
}
