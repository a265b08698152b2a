//! Finds accounts whose balance snapshot lags the ledger.

use crate::{
    config::BehindRule,
    error::LedgerResult,
    store::LedgerStore,
    types::{validate_cutoff, AccountId, AccountingMethod, Timestamp},
};
use std::collections::BTreeSet;

pub struct ReconciliationSelector<'a> {
    store: &'a LedgerStore,
    rule: BehindRule,
}

impl<'a> ReconciliationSelector<'a> {
    pub fn new(store: &'a LedgerStore, rule: BehindRule) -> Self {
        Self { store, rule }
    }

    /// Accounts with a snapshot that a transaction at or before `cutoff`
    /// has overtaken. Accounts without a snapshot are never included.
    pub fn find_behind(
        &self,
        cutoff: Timestamp,
        method: AccountingMethod,
    ) -> LedgerResult<BTreeSet<AccountId>> {
        let cutoff = validate_cutoff(cutoff)?;
        if !method.requires_running_balance() {
            return Ok(BTreeSet::new());
        }
        let ids = self.store.behind_accounts(cutoff, method, self.rule)?;
        Ok(ids.into_iter().collect())
    }

    /// Accounts with ledger activity but no snapshot yet.
    pub fn find_unreconciled(&self, method: AccountingMethod) -> LedgerResult<BTreeSet<AccountId>> {
        if !method.requires_running_balance() {
            return Ok(BTreeSet::new());
        }
        let ids = self.store.unreconciled_accounts(method)?;
        Ok(ids.into_iter().collect())
    }

    /// Union of both selections: the work list for one batch run.
    pub fn candidates(
        &self,
        cutoff: Timestamp,
        method: AccountingMethod,
    ) -> LedgerResult<BTreeSet<AccountId>> {
        let mut ids = self.find_behind(cutoff, method)?;
        ids.extend(self.find_unreconciled(method)?);
        Ok(ids)
    }
}
