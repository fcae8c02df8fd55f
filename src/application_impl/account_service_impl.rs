use crate::application_impl::{run_sequential, PlannedWrite};
use crate::application_port::{AccountError, AccountService};
use crate::domain_model::{Profile, UserId};
use crate::domain_port::{
    CollectionPath, CollectionQuery, DocumentStore, Fields, StoreError, BLOCKED,
    FIELD_ID, FIELD_LAST_ACTIVITY, FIELD_ONLINE, FIELD_REMOVED, IAM_BLOCKED,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

pub struct RealAccountService {
    store: Arc<dyn DocumentStore>,
}

impl RealAccountService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn set_account(&self, profile: &Profile) -> Result<(), AccountError> {
        let mut profile = profile.clone();
        profile.last_activity = Some(Utc::now());
        let fields = profile.to_fields().map_err(|e| AccountError::Encode {
            id: profile.id.clone(),
            reason: e.to_string(),
        })?;

        self.store
            .set_document(&CollectionPath::users(), profile.id.as_str(), fields)
            .await?;
        Ok(())
    }

    async fn update_account(&self, account: &UserId, fields: Fields) -> Result<(), AccountError> {
        match self
            .store
            .update_document(&CollectionPath::users(), account.as_str(), fields)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(AccountError::NotFound(account.clone())),
            Err(e) => Err(AccountError::Store(e)),
        }
    }

    fn block_pair(account: &UserId, user: &UserId) -> Result<(CollectionPath, CollectionPath), AccountError> {
        if account == user {
            return Err(AccountError::InvalidAccount(format!(
                "{account} cannot block itself"
            )));
        }
        Ok((
            CollectionPath::user_collection(account, BLOCKED),
            CollectionPath::user_collection(user, IAM_BLOCKED),
        ))
    }

    async fn ids_in(&self, path: CollectionPath) -> Result<Vec<UserId>, AccountError> {
        let documents = self
            .store
            .list_documents(&path, &CollectionQuery::default())
            .await?;

        let ids = documents
            .into_iter()
            .filter_map(|document| {
                let id = document
                    .fields
                    .get(FIELD_ID)
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<UserId>().ok());
                if id.is_none() {
                    tracing::warn!(%path, document = %document.id, "skipping block entry without a valid id");
                }
                id
            })
            .collect();
        Ok(ids)
    }
}

fn id_fields(id: &UserId) -> Fields {
    let mut fields = Fields::new();
    fields.insert(FIELD_ID.to_owned(), Value::String(id.to_string()));
    fields
}

#[async_trait::async_trait]
impl AccountService for RealAccountService {
    async fn create_account(&self, profile: &Profile) -> Result<(), AccountError> {
        self.set_account(profile).await
    }

    async fn edit_account(&self, profile: &Profile) -> Result<(), AccountError> {
        self.set_account(profile).await
    }

    async fn remove_account(&self, account: &UserId) -> Result<(), AccountError> {
        let mut fields = Fields::new();
        fields.insert(FIELD_REMOVED.to_owned(), Value::Bool(true));
        self.update_account(account, fields).await
    }

    async fn recover_account(&self, account: &UserId) -> Result<(), AccountError> {
        let mut fields = Fields::new();
        fields.insert(FIELD_REMOVED.to_owned(), Value::Bool(false));
        self.update_account(account, fields).await
    }

    async fn set_online(&self, account: &UserId) -> Result<(), AccountError> {
        let mut fields = Fields::new();
        fields.insert(FIELD_ONLINE.to_owned(), Value::Bool(true));
        self.update_account(account, fields).await
    }

    async fn set_offline(&self, account: &UserId) -> Result<(), AccountError> {
        let mut fields = Fields::new();
        fields.insert(FIELD_ONLINE.to_owned(), Value::Bool(false));
        fields.insert(
            FIELD_LAST_ACTIVITY.to_owned(),
            Value::from(Utc::now().timestamp_millis()),
        );
        self.update_account(account, fields).await
    }

    async fn block_user(&self, account: &UserId, user: &UserId) -> Result<(), AccountError> {
        let (blocked, iam_blocked) = Self::block_pair(account, user)?;
        let writes = vec![
            PlannedWrite::set(blocked, user.as_str(), id_fields(user)),
            PlannedWrite::set(iam_blocked, account.as_str(), id_fields(account)),
        ];
        Ok(run_sequential(self.store.as_ref(), writes).await?)
    }

    async fn unblock_user(&self, account: &UserId, user: &UserId) -> Result<(), AccountError> {
        let (blocked, iam_blocked) = Self::block_pair(account, user)?;
        let writes = vec![
            PlannedWrite::delete(blocked, user.as_str()),
            PlannedWrite::delete(iam_blocked, account.as_str()),
        ];
        Ok(run_sequential(self.store.as_ref(), writes).await?)
    }

    async fn blocked_ids(&self, account: &UserId) -> Result<Vec<UserId>, AccountError> {
        self.ids_in(CollectionPath::user_collection(account, BLOCKED))
            .await
    }

    async fn iam_blocked_ids(&self, account: &UserId) -> Result<Vec<UserId>, AccountError> {
        self.ids_in(CollectionPath::user_collection(account, IAM_BLOCKED))
            .await
    }
}
