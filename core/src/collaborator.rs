//! Interfaces the engine consumes from its collaborators.
//!
//! `LedgerStore` implements all three. The balance writer is generic over
//! them so tests can interpose on the conditional write.

use crate::{
    error::LedgerResult,
    store::{AccountRow, BalanceSnapshot, CasOutcome, LedgerStore, LedgerTransaction},
    types::{AccountStatus, AccountType, AccountingMethod, LedgerPosition, Timestamp},
};

/// Read side of the append-only ledger.
pub trait LedgerReader {
    /// Entries with position in `(from_exclusive, to_inclusive]`, ascending.
    fn transactions_for_account(
        &self,
        account_id: &str,
        from_exclusive: Option<LedgerPosition>,
        to_inclusive: Timestamp,
    ) -> LedgerResult<Vec<LedgerTransaction>>;
}

/// Account metadata owned by the account workflow.
pub trait AccountDirectory {
    fn account(&self, account_id: &str) -> LedgerResult<Option<AccountRow>>;
    fn accounting_method(&self, account_id: &str) -> LedgerResult<AccountingMethod>;
    fn account_status(&self, account_id: &str) -> LedgerResult<AccountStatus>;
}

/// Versioned storage for balance snapshots.
pub trait SnapshotStore {
    fn find_snapshot(
        &self,
        account_id: &str,
        account_type: AccountType,
    ) -> LedgerResult<Option<BalanceSnapshot>>;

    /// Conditional write; `expected_version` 0 means "no row yet".
    fn compare_and_swap(
        &self,
        snapshot: &BalanceSnapshot,
        expected_version: i64,
    ) -> LedgerResult<CasOutcome>;

    /// Unconditional upsert; returns the stored row.
    fn save(&self, snapshot: &BalanceSnapshot) -> LedgerResult<BalanceSnapshot>;
}

impl LedgerReader for LedgerStore {
    fn transactions_for_account(
        &self,
        account_id: &str,
        from_exclusive: Option<LedgerPosition>,
        to_inclusive: Timestamp,
    ) -> LedgerResult<Vec<LedgerTransaction>> {
        LedgerStore::transactions_for_account(self, account_id, from_exclusive, to_inclusive)
    }
}

impl AccountDirectory for LedgerStore {
    fn account(&self, account_id: &str) -> LedgerResult<Option<AccountRow>> {
        self.get_account(account_id)
    }

    fn accounting_method(&self, account_id: &str) -> LedgerResult<AccountingMethod> {
        self.account_accounting_method(account_id)
    }

    fn account_status(&self, account_id: &str) -> LedgerResult<AccountStatus> {
        self.account_status_of(account_id)
    }
}

impl SnapshotStore for LedgerStore {
    fn find_snapshot(
        &self,
        account_id: &str,
        account_type: AccountType,
    ) -> LedgerResult<Option<BalanceSnapshot>> {
        LedgerStore::find_snapshot(self, account_id, account_type)
    }

    fn compare_and_swap(
        &self,
        snapshot: &BalanceSnapshot,
        expected_version: i64,
    ) -> LedgerResult<CasOutcome> {
        self.compare_and_swap_snapshot(snapshot, expected_version)
    }

    fn save(&self, snapshot: &BalanceSnapshot) -> LedgerResult<BalanceSnapshot> {
        self.save_snapshot(snapshot)
    }
}
