use crate::application_port::{AccountError, PostError, RelationError};
use crate::domain_model::{MembershipOp, MembershipWrite};
use crate::domain_port::{CollectionPath, DocumentStore, Fields, StoreError};
use serde_json::Value;
use std::fmt;

/// One document write of a multi-document change. `fields: None` deletes.
#[derive(Debug, Clone)]
pub struct PlannedWrite {
    pub path: CollectionPath,
    pub document_id: String,
    pub fields: Option<Fields>,
}

impl PlannedWrite {
    pub fn set(path: CollectionPath, document_id: impl Into<String>, fields: Fields) -> Self {
        Self {
            path,
            document_id: document_id.into(),
            fields: Some(fields),
        }
    }

    pub fn delete(path: CollectionPath, document_id: impl Into<String>) -> Self {
        Self {
            path,
            document_id: document_id.into(),
            fields: None,
        }
    }
}

impl From<MembershipWrite> for PlannedWrite {
    fn from(write: MembershipWrite) -> Self {
        let path = CollectionPath::relation(&write.owner, write.kind);
        match write.op {
            MembershipOp::Insert => {
                let mut fields = Fields::new();
                fields.insert(
                    write.kind.id_field().to_owned(),
                    Value::String(write.other.to_string()),
                );
                PlannedWrite::set(path, write.other.to_string(), fields)
            }
            MembershipOp::Remove => PlannedWrite::delete(path, write.other.to_string()),
        }
    }
}

impl fmt::Display for PlannedWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.fields.is_some() { "set" } else { "delete" };
        write!(f, "{op} {}/{}", self.path, self.document_id)
    }
}

#[derive(Debug)]
pub enum PlanFailure {
    /// The first write failed; nothing was applied.
    Store(StoreError),
    /// Some writes were applied before one failed.
    Partial {
        applied: Vec<String>,
        failed: String,
        source: StoreError,
    },
}

/// Issue `writes` one at a time, each only after the previous succeeded.
pub async fn run_sequential(
    store: &dyn DocumentStore,
    writes: Vec<PlannedWrite>,
) -> Result<(), PlanFailure> {
    let mut applied = Vec::with_capacity(writes.len());

    for write in writes {
        let description = write.to_string();
        let result = match write.fields {
            Some(fields) => {
                store
                    .set_document(&write.path, &write.document_id, fields)
                    .await
            }
            None => store.delete_document(&write.path, &write.document_id).await,
        };

        if let Err(source) = result {
            if applied.is_empty() {
                return Err(PlanFailure::Store(source));
            }
            tracing::warn!(
                applied = applied.len(),
                failed = %description,
                error = %source,
                "write sequence stopped half-way"
            );
            return Err(PlanFailure::Partial {
                applied,
                failed: description,
                source,
            });
        }
        applied.push(description);
    }

    Ok(())
}

impl From<PlanFailure> for RelationError {
    fn from(failure: PlanFailure) -> Self {
        match failure {
            PlanFailure::Store(e) => RelationError::Store(e),
            PlanFailure::Partial {
                applied,
                failed,
                source,
            } => RelationError::PartialWrite {
                applied,
                failed,
                source,
            },
        }
    }
}

impl From<PlanFailure> for AccountError {
    fn from(failure: PlanFailure) -> Self {
        match failure {
            PlanFailure::Store(e) => AccountError::Store(e),
            PlanFailure::Partial {
                applied,
                failed,
                source,
            } => AccountError::PartialWrite {
                applied,
                failed,
                source,
            },
        }
    }
}

impl From<PlanFailure> for PostError {
    fn from(failure: PlanFailure) -> Self {
        match failure {
            PlanFailure::Store(e) => PostError::Store(e),
            PlanFailure::Partial {
                applied,
                failed,
                source,
            } => PostError::PartialWrite {
                applied,
                failed,
                source,
            },
        }
    }
}
