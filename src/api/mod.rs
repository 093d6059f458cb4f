use crate::calendar::CalendarService;
use crate::ledger::{EmployeeLocks, LeaveLedger};
use crate::store::MySqlStore;

pub mod department;
pub mod event;
pub mod leave_request;
pub mod user;

/// Services shared by every handler.
pub struct AppState {
    pub ledger: LeaveLedger<MySqlStore>,
    pub calendar: CalendarService<MySqlStore>,
    pub store: MySqlStore,
}

impl AppState {
    pub fn new(store: MySqlStore, locks: EmployeeLocks) -> Self {
        Self {
            ledger: LeaveLedger::new(store.clone(), locks),
            calendar: CalendarService::new(store.clone()),
            store,
        }
    }
}
