//! Reconciliation engine
//!
//! Drives one sync run through its phases:
//! 1. Schema-ready: identity fields exist on companies and contacts
//! 2. Organization-resolved
//! 3. Counterparties-fetched (empty → done, nothing to do)
//! 4. Companies-reconciled: batch lookup by identity key, create the missing
//! 5. Contacts-reconciled, per counterparty, linked to the parent company
//! 6. Done: `SyncSummary`
//!
//! Idempotence comes from lookup-before-create against Bitrix24 on every run;
//! nothing is cached between runs. Records are never updated or deleted.

mod statistics;

pub use statistics::SyncSummary;

use ebsync_common::config::DestinationConfig;
use ebsync_common::{Error, Result};
use futures::StreamExt;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use super::field_mapper::{contact_identity_key, FieldMapper};
use crate::models::{ContactPerson, Counterparty};
use crate::progress::SyncProgress;
use crate::types::{DestinationCrm, EntityKind, SourceSystem};

/// Sequential Elba → Bitrix24 reconciliation
pub struct Reconciler<'a, S: ?Sized, D: ?Sized> {
    source: &'a S,
    destination: &'a D,
    config: &'a DestinationConfig,
    mapper: FieldMapper,
    show_progress: bool,
}

impl<'a, S, D> Reconciler<'a, S, D>
where
    S: SourceSystem + ?Sized,
    D: DestinationCrm + ?Sized,
{
    pub fn new(source: &'a S, destination: &'a D, config: &'a DestinationConfig) -> Self {
        Self {
            source,
            destination,
            config,
            mapper: FieldMapper::new(config),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Run the full reconciliation.
    ///
    /// # Errors
    /// - `Error::SchemaProvisioning` if identity fields cannot be ensured
    /// - `Error::Config` if no organization is found
    /// - Any lookup or creation failure (after retries)
    pub async fn run(&self) -> Result<SyncSummary> {
        let mut summary = SyncSummary::default();

        info!("Checking Bitrix24 user fields");
        self.ensure_schema().await?;

        info!("Resolving Elba organization");
        let organization_id = self.source.resolve_organization_id().await?;
        info!(organization_id = %organization_id, "Elba organization resolved");

        info!("Fetching counterparties from Elba");
        let counterparties: Vec<Counterparty> = self
            .source
            .list_counterparties(&organization_id)
            .collect()
            .await;
        summary.counterparties_fetched = counterparties.len();
        info!(count = counterparties.len(), "Counterparties fetched");
        if counterparties.is_empty() {
            return Ok(summary);
        }

        let company_keys: BTreeSet<String> = counterparties
            .iter()
            .filter_map(|cp| cp.identity_key().map(str::to_string))
            .collect();
        let mut existing_companies = self
            .destination
            .find_by_identity_keys(EntityKind::Company, &company_keys)
            .await?;
        info!(
            requested = company_keys.len(),
            existing = existing_companies.len(),
            "Existing companies looked up"
        );

        let progress = SyncProgress::new(counterparties.len(), self.show_progress);
        for cp in &counterparties {
            let result = self
                .reconcile_counterparty(&organization_id, cp, &mut existing_companies, &mut summary)
                .await;
            progress.inc();
            if let Err(e) = result {
                progress.finish();
                return Err(e);
            }
        }
        progress.finish();

        info!(summary = %summary.display_string(), "Sync complete");
        Ok(summary)
    }

    async fn ensure_schema(&self) -> Result<()> {
        let fields = [
            (EntityKind::Contact, &self.config.identity_field, &self.config.identity_label),
            (EntityKind::Company, &self.config.identity_field, &self.config.identity_label),
            (EntityKind::Company, &self.config.tax_id_field, &self.config.tax_id_label),
        ];

        for (kind, field, label) in fields {
            self.destination
                .ensure_identity_field(kind, field, label)
                .await
                .map_err(|e| {
                    Error::SchemaProvisioning(format!("{} field {}: {}", kind, field, e))
                })?;
        }
        Ok(())
    }

    async fn reconcile_counterparty(
        &self,
        organization_id: &str,
        cp: &Counterparty,
        existing_companies: &mut HashMap<String, String>,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        let Some(cp_id) = cp.identity_key() else {
            let skip = Error::MappingSkip(format!(
                "counterparty without id ({})",
                cp.display_name().unwrap_or("no name")
            ));
            warn!(error = %skip, "Skipping counterparty");
            summary.counterparties_skipped += 1;
            return Ok(());
        };

        let company_id = match existing_companies.get(cp_id) {
            Some(id) => {
                debug!(external_id = cp_id, destination_id = %id, "Company already exists");
                summary.companies_existing += 1;
                id.clone()
            }
            None => {
                let fields = self.mapper.company_fields(cp);
                let id = self
                    .destination
                    .create_record(EntityKind::Company, &fields)
                    .await?;
                existing_companies.insert(cp_id.to_string(), id.clone());
                info!(external_id = cp_id, destination_id = %id, "Created company");
                summary.companies_created += 1;
                id
            }
        };

        self.reconcile_contacts(organization_id, cp, cp_id, &company_id, summary)
            .await
    }

    async fn reconcile_contacts(
        &self,
        organization_id: &str,
        cp: &Counterparty,
        cp_id: &str,
        company_id: &str,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        let fetched: Vec<ContactPerson>;
        let persons: &[ContactPerson] = if cp.inline_contacts.is_empty() {
            fetched = self
                .source
                .list_contacts(organization_id, cp_id)
                .collect()
                .await;
            &fetched
        } else {
            &cp.inline_contacts
        };

        if persons.is_empty() {
            debug!(external_id = cp_id, "No contact persons");
            return Ok(());
        }

        let keys: BTreeSet<String> = persons
            .iter()
            .filter_map(|p| p.external_id.as_deref())
            .map(|person_id| contact_identity_key(cp_id, person_id))
            .collect();
        let mut existing_contacts = self
            .destination
            .find_by_identity_keys(EntityKind::Contact, &keys)
            .await?;

        for person in persons {
            let Some(person_id) = person.external_id.as_deref() else {
                let skip = Error::MappingSkip(format!("contact person without id under {}", cp_id));
                warn!(error = %skip, "Skipping contact person");
                summary.contacts_skipped += 1;
                continue;
            };

            let identity_key = contact_identity_key(cp_id, person_id);
            if let Some(id) = existing_contacts.get(&identity_key) {
                debug!(identity_key = %identity_key, destination_id = %id, "Contact already exists");
                summary.contacts_existing += 1;
                continue;
            }

            let mut fields = self.mapper.contact_fields(person, cp);
            fields.insert("COMPANY_ID", company_id);
            let id = self
                .destination
                .create_record(EntityKind::Contact, &fields)
                .await?;
            info!(identity_key = %identity_key, destination_id = %id, company_id, "Created contact");
            existing_contacts.insert(identity_key, id);
            summary.contacts_created += 1;
        }

        Ok(())
    }
}
