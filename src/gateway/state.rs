use std::sync::Arc;

use crate::store::LedgerStore;
use crate::transfer::TransferService;
use crate::user_auth::UserAuthService;

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    /// Ledger store (health checks)
    pub store: Arc<dyn LedgerStore>,
    /// Registration, sign-in and token verification
    pub user_auth: Arc<UserAuthService>,
    /// Transfers, balances and directory queries
    pub transfers: Arc<TransferService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        user_auth: Arc<UserAuthService>,
        transfers: Arc<TransferService>,
    ) -> Self {
        Self {
            store,
            user_auth,
            transfers,
        }
    }
}
