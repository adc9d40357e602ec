//! Loader sheet enriched with the registrations each objective is linked to.

use crate::error::SchemaError;
use crate::models::ColumnConfig;
use crate::table::Table;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationCounts {
    pub original_rows: usize,
    pub final_rows: usize,
    /// Output rows whose registration link is filled.
    pub with_registration: usize,
}

/// Left-join the create loader onto its registration links, then onto the
/// registration details. Loader rows without a link stay, with blank
/// registration columns; a loader row with several links is repeated.
pub fn enrich_loader(
    loader: &Table,
    links: &Table,
    registrations: &Table,
    columns: &ColumnConfig,
) -> Result<(Table, RegistrationCounts), SchemaError> {
    let linked = loader.left_join(&columns.loader_create_id, links, &columns.registration_join_objective)?;

    let mut wanted: Vec<&str> = vec![columns.registration_id.as_str()];
    wanted.extend(columns.registration_details.iter().map(String::as_str));
    let details = registrations.select(&wanted)?;

    // the link column may have picked up a suffix if the loader carries the same name
    let link_column = if linked.optional_column(&columns.registration_link_number).is_some() {
        columns.registration_link_number.clone()
    } else {
        format!("{}_y", columns.registration_link_number)
    };
    let enriched = linked.left_join(&link_column, &details, &columns.registration_id)?;

    let link_col = enriched.column(&link_column)?;
    let with_registration = (0..enriched.len())
        .filter(|&row| !enriched.cell(row, link_col).trim().is_empty())
        .count();

    let counts = RegistrationCounts {
        original_rows: loader.len(),
        final_rows: enriched.len(),
        with_registration,
    };
    info!(
        original = counts.original_rows,
        enriched = counts.final_rows,
        with_registration = counts.with_registration,
        "enriched loader with registrations"
    );
    Ok((enriched, counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::table;

    #[test]
    fn links_and_details_joined_onto_loader() {
        let loader = table(
            "RO Loader Create",
            &["external_id__v", "name__v"],
            &[&["X1", "RO one"], &["X2", "RO two"]],
        );
        let links = table(
            "Registration links",
            &["id", "regulatory_objective__rim", "registration_number"],
            &[&["L1", "X1", "R1"], &["L2", "X1", "R2"]],
        );
        let registrations = table(
            "Registrations",
            &["id", "registration_number__rim", "state__v", "maintain_registration__c", "ignored"],
            &[&["R1", "EU/1/01", "active", "Yes", "-"]],
        );

        let (enriched, counts) =
            enrich_loader(&loader, &links, &registrations, &ColumnConfig::default()).unwrap();

        assert_eq!(counts.original_rows, 2);
        assert_eq!(counts.final_rows, 3);
        assert_eq!(counts.with_registration, 2);
        assert!(enriched.optional_column("ignored").is_none());

        let number = enriched.column("registration_number__rim").unwrap();
        let state = enriched.column("state__v").unwrap();
        assert_eq!(enriched.cell(0, number), "EU/1/01");
        assert_eq!(enriched.cell(0, state), "active");
        // R2 has no registration record
        assert_eq!(enriched.cell(1, number), "");
        // X2 has no link at all
        assert_eq!(enriched.cell(2, 0), "X2");
        assert_eq!(enriched.cell(2, number), "");
    }

    #[test]
    fn missing_registration_detail_column_aborts() {
        let loader = table("RO Loader Create", &["external_id__v"], &[&["X1"]]);
        let links = table(
            "Registration links",
            &["regulatory_objective__rim", "registration_number"],
            &[&["X1", "R1"]],
        );
        let registrations = table("Registrations", &["id", "state__v"], &[&["R1", "active"]]);

        let err = enrich_loader(&loader, &links, &registrations, &ColumnConfig::default()).unwrap_err();
        assert_eq!(err.column, "registration_number__rim");
        assert_eq!(err.table, "Registrations");
    }
}
