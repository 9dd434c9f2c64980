use uuid::Uuid;

use super::{list_limit, AccountingService};
use crate::dtos::accounts::CreateAccountRequest;
use crate::models::{Account, AccountFilter, AccountMemberResponse, AccountPatch, AccountUser, Principal};
use crate::services::authz::{Action, Scope};
use crate::services::error::ServiceError;

const DEFAULT_ACCOUNT_LIMIT: usize = 20;

impl AccountingService {
    /// Super-admins see every account, users the accounts they belong to
    /// (or, with `admin_only`, the ones they administer).
    pub async fn list_accounts(
        &self,
        principal: &Principal,
        admin_only: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Account>, ServiceError> {
        self.require(principal, Action::ListAccounts, Scope::Global).await?;

        let member = match principal.user_id() {
            Some(id) if admin_only => Some(id),
            Some(id) if !self.authz.is_super_admin(principal).await? => Some(id),
            _ => None,
        };
        let filter = AccountFilter {
            member,
            admin_only,
            limit: Some(list_limit(limit, DEFAULT_ACCOUNT_LIMIT)),
        };

        Ok(self.store.run(|s| s.list_accounts(filter)).await?)
    }

    pub async fn create_account(
        &self,
        principal: &Principal,
        req: CreateAccountRequest,
    ) -> Result<Account, ServiceError> {
        self.require(principal, Action::CreateAccount, Scope::Global).await?;

        let account = Account {
            principal_investigator: req.principal_investigator,
            faculty: req.faculty,
            department: req.department,
            ..Account::new(req.name, req.active)
        };
        let account = self.store.run(|s| s.insert_account(account)).await?;

        tracing::info!(actor = %principal.name, target = %account.name, "Account created");
        Ok(account)
    }

    pub async fn update_account(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: AccountPatch,
    ) -> Result<Account, ServiceError> {
        self.require(principal, Action::UpdateAccount, Scope::Account(id)).await?;
        if patch.is_empty() {
            return Err(ServiceError::Validation("Nothing to update".to_string()));
        }

        let account = self.store.run(|s| s.update_account(id, &patch)).await?;
        tracing::info!(actor = %principal.name, target = %account.name, "Account updated");
        Ok(account)
    }

    pub async fn list_account_users(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> Result<Vec<AccountMemberResponse>, ServiceError> {
        self.require(principal, Action::ReadAccountUsers, Scope::Account(id)).await?;

        let account = self.account(id).await?;
        let users = self.store.run(|s| s.list_account_users(account.id)).await?;
        Ok(users.into_iter().map(AccountMemberResponse::from).collect())
    }

    /// Conflict when the user already belongs to the account, whatever the
    /// admin flag.
    pub async fn add_account_user(
        &self,
        principal: &Principal,
        id: Uuid,
        dom_name: &str,
        admin: bool,
    ) -> Result<(), ServiceError> {
        self.require(principal, Action::ManageAccountUsers, Scope::Account(id)).await?;

        let account = self.account(id).await?;
        let user = self.user_by_dom_name(dom_name).await?;
        let row = AccountUser {
            account_id: account.id,
            user_id: user.id,
            admin,
        };
        self.store
            .run(|s| s.insert_account_user(row))
            .await
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::Conflict(_) => ServiceError::Conflict(format!(
                    "'{}' is already a user of account '{}'",
                    dom_name, account.name
                )),
                other => other,
            })?;

        tracing::info!(
            actor = %principal.name,
            target = %dom_name,
            account = %account.name,
            admin,
            "Account user added"
        );
        Ok(())
    }

    pub async fn remove_account_user(
        &self,
        principal: &Principal,
        id: Uuid,
        dom_name: &str,
    ) -> Result<(), ServiceError> {
        self.require(principal, Action::ManageAccountUsers, Scope::Account(id)).await?;

        let account = self.account(id).await?;
        let user = self.user_by_dom_name(dom_name).await?;
        self.store
            .run(|s| s.delete_account_user(account.id, user.id))
            .await?;

        tracing::info!(actor = %principal.name, target = %dom_name, account = %account.name, "Account user removed");
        Ok(())
    }

    async fn account(&self, id: Uuid) -> Result<Account, ServiceError> {
        self.store
            .run(|s| s.find_account(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound("account".to_string()))
    }
}
