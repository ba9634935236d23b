use dashmap::DashMap;

use crate::{
    config,
    model::{Account, User},
};

/// Read-only user and account lookups, shared by every request.
#[derive(Default)]
pub struct UserStore {
    accounts: DashMap<u64, Account>,
    users: DashMap<String, User>,
    /// auth key -> user email
    keys: DashMap<String, String>,
}

impl UserStore {
    pub fn from_config(cfg: &config::Auth) -> Self {
        let store = Self::default();
        for account in &cfg.accounts {
            store.accounts.insert(account.id, account.clone());
        }

        for entry in &cfg.users {
            let mut user = User::new(&entry.email, &entry.name);
            // unknown ids were rejected when the configuration was validated
            user.accounts = entry
                .accounts
                .iter()
                .filter_map(|id| store.account(*id))
                .collect();
            if let Some(key) = &entry.auth_key {
                store.keys.insert(key.clone(), entry.email.clone());
            }
            store.users.insert(entry.email.clone(), user);
        }

        log::info!(
            "loaded {} users and {} accounts",
            store.users.len(),
            store.accounts.len()
        );
        store
    }

    pub fn account(&self, id: u64) -> Option<Account> {
        self.accounts.get(&id).map(|a| a.value().clone())
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.users.get(email).map(|u| u.value().clone())
    }

    pub fn user_by_key(&self, key: &str) -> Option<User> {
        let email = self.keys.get(key)?;
        self.user_by_email(email.value())
    }
}
