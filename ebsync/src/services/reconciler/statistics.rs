//! Sync run statistics

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Counterparties returned by Elba
    pub counterparties_fetched: usize,
    /// Counterparties skipped for lack of an id
    pub counterparties_skipped: usize,
    pub companies_created: usize,
    pub companies_existing: usize,
    pub contacts_created: usize,
    pub contacts_existing: usize,
    /// Contact persons skipped for lack of an id
    pub contacts_skipped: usize,
}

impl SyncSummary {
    /// Records written to Bitrix24 during the run
    pub fn records_created(&self) -> usize {
        self.companies_created + self.contacts_created
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} counterparties ({} skipped): companies {} created, {} existing; contacts {} created, {} existing, {} skipped",
            self.counterparties_fetched,
            self.counterparties_skipped,
            self.companies_created,
            self.companies_existing,
            self.contacts_created,
            self.contacts_existing,
            self.contacts_skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_string() {
        let summary = SyncSummary {
            counterparties_fetched: 3,
            counterparties_skipped: 1,
            companies_created: 1,
            companies_existing: 1,
            contacts_created: 2,
            contacts_existing: 0,
            contacts_skipped: 1,
        };
        assert_eq!(summary.records_created(), 3);
        assert_eq!(
            summary.display_string(),
            "3 counterparties (1 skipped): companies 1 created, 1 existing; contacts 2 created, 0 existing, 1 skipped"
        );
    }
}
