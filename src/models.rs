use crate::matcher::Verdict;
use crate::window::MigrationWindow;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Banner rows above the header in each MVS extract.
    pub mvs_header_skip_rows: usize,
    pub migration_window: WindowConfig,
    pub inputs: InputPaths,
    pub outputs: OutputPaths,
    pub columns: ColumnConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    pub mvs_source_directory: String,
    /// Appended MVS extract; written by `append`, read by `compare`.
    pub mvs_appended: String,
    /// Full RIM regulatory objective export used for identifier comparison.
    pub rim_objectives: String,
    /// RIM extract with lifecycle dates; written by `extract`, read by `loaders` and `joins`.
    pub rim_migration_extract: String,
    pub loader_create: String,
    pub loader_update: String,
    pub products: String,
    pub registration_joins: String,
    pub loader_registration_links: String,
    pub registrations: String,
    pub drug_product_joins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    pub output_directory: String,
    pub append_quality_report: String,
    pub extract_summary: String,
    pub comparison: String,
    pub comparison_summary: String,
    pub product_comparison: String,
    pub loader_comparison: String,
    pub created_joins: String,
    pub updated_joins: String,
    pub loader_with_registrations: String,
}

/// Every column name the reconciliation reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub mvs_unique_id: String,
    pub mvs_out_of_scope: String,
    pub mvs_green_light: String,
    pub mvs_molecule: String,
    pub mvs_implementation_rules: String,
    pub mvs_validation_date: String,

    pub loader_create_id: String,
    pub loader_create_greenlight: String,
    pub loader_update_id: String,
    pub loader_update_greenlight: String,

    pub rim_external_id: String,
    pub rim_greenlight: String,
    pub rim_product_family: String,
    pub rim_greenlight_date: String,
    pub rim_additional_info: String,
    pub rim_record_id: String,
    pub rim_created_date: String,
    pub rim_modified_date: String,

    pub product_id: String,
    pub product_name: String,

    pub registration_join_objective: String,
    /// Registration id column of the loader's registration link table.
    pub registration_link_number: String,
    pub registration_id: String,
    /// Registration details carried onto the loader sheet.
    pub registration_details: Vec<String>,
    pub drug_join_objective: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub lock_retry: LockRetry,
}

/// What to do when an output file is held open by another program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockRetry {
    /// Ask the operator to close the file and press Enter, as often as needed.
    Prompt,
    /// Retry a fixed number of times, sleeping in between.
    Bounded { attempts: u32, delay_ms: u64 },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mvs_header_skip_rows: 1,
            migration_window: WindowConfig::default(),
            inputs: InputPaths::default(),
            outputs: OutputPaths::default(),
            columns: ColumnConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: "2025-09-10T00:00:00.000Z".to_string(),
            end: "2025-09-18T23:59:59.000Z".to_string(),
        }
    }
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            mvs_source_directory: "01 Source MVS".to_string(),
            mvs_appended: "01 - Append MVS.csv".to_string(),
            rim_objectives: "03 Target RIM/regulatory_objective__rim.csv".to_string(),
            rim_migration_extract: "02 - Filter RIM on migration data.csv".to_string(),
            loader_create: "02 Loader sheets/regulatory_objective__rim.csv".to_string(),
            loader_update: "02 Loader sheets/regulatory_objective_rim_update.csv".to_string(),
            products: "03 Target RIM/product__v.csv".to_string(),
            registration_joins: "03 Target RIM/registration_regulatory_objective__rim_data.csv".to_string(),
            loader_registration_links: "02 Loader sheets/registration_regulatory_objective__rim.csv".to_string(),
            registrations: "03 Target RIM/registration__rim.csv".to_string(),
            drug_product_joins: "03 Target RIM/regulatory_objective_drug_product__v_data.csv".to_string(),
        }
    }
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            output_directory: ".".to_string(),
            append_quality_report: "01 - Append MVS - Quality.txt".to_string(),
            extract_summary: "02 - Filter RIM on migration data - Summary.txt".to_string(),
            comparison: "03 - Compare Unique IDs and Green Light.csv".to_string(),
            comparison_summary: "03 - Compare Unique IDs and Green Light - Summary.txt".to_string(),
            product_comparison: "04 - Product Data comparison.csv".to_string(),
            loader_comparison: "05 - Compare RO loaders to RIM RO.csv".to_string(),
            created_joins: "06 - Analyse joins in RIM - Joins for created ROs.csv".to_string(),
            updated_joins: "06 - Analyse joins in RIM - Joins for updated ROs.csv".to_string(),
            loader_with_registrations: "08 - Create Loader with REG Info.csv".to_string(),
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            mvs_unique_id: "Unique ID".to_string(),
            mvs_out_of_scope: "Is the line Out Of Scope of the migration? = no active license or not owned by AGI anymore (divested)".to_string(),
            mvs_green_light: "Green light for change to be implemented at site- by REG\nYES/NO".to_string(),
            mvs_molecule: "Molecule".to_string(),
            mvs_implementation_rules: "Implementation Rules".to_string(),
            mvs_validation_date: "Validation date for Green light for change to be implemented at site- by REG".to_string(),
            loader_create_id: "external_id__v".to_string(),
            loader_create_greenlight: "greenlight_to_implement__c".to_string(),
            loader_update_id: "external_id__c".to_string(),
            loader_update_greenlight: "agi_greenlight_to_implement__c".to_string(),
            rim_external_id: "external_id__c".to_string(),
            // sic: the RIM field is misspelled
            rim_greenlight: "greenligh_to_implement__c".to_string(),
            rim_product_family: "product_family__v".to_string(),
            rim_greenlight_date: "date_of_greenlight__c".to_string(),
            rim_additional_info: "additional_implementation_info__c".to_string(),
            rim_record_id: "id".to_string(),
            rim_created_date: "created_date__v".to_string(),
            rim_modified_date: "modified_date__v".to_string(),
            product_id: "id".to_string(),
            product_name: "name__v".to_string(),
            registration_join_objective: "regulatory_objective__rim".to_string(),
            registration_link_number: "registration_number".to_string(),
            registration_id: "id".to_string(),
            registration_details: vec![
                "registration_number__rim".to_string(),
                "state__v".to_string(),
                "maintain_registration__c".to_string(),
            ],
            drug_join_objective: "regulatory_objective__v".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            lock_retry: LockRetry::Prompt,
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn window(&self) -> anyhow::Result<MigrationWindow> {
        MigrationWindow::parse(&self.migration_window.start, &self.migration_window.end)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        Path::new(&self.outputs.output_directory).join(file_name)
    }
}

/// One row of the identifier comparison report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationRecord {
    #[serde(rename = "MVS_Unique_ID")]
    pub unique_id: String,
    #[serde(rename = "Out_of_Scope")]
    pub out_of_scope: String,
    #[serde(rename = "Count_in_MVS")]
    pub count_in_mvs: usize,
    #[serde(rename = "Count_in_RO_Loader_Create")]
    pub count_in_loader_create: usize,
    #[serde(rename = "Count_in_RO_Loader_Update")]
    pub count_in_loader_update: usize,
    #[serde(rename = "Count_in_RIM")]
    pub count_in_rim: usize,
    #[serde(rename = "Found_in_RIM", serialize_with = "yes_no")]
    pub found_in_rim: bool,
    #[serde(rename = "Green_Light_MVS")]
    pub green_light_mvs: String,
    #[serde(rename = "MVS_Implementation_Rules")]
    pub implementation_rules: String,
    #[serde(rename = "MVS_Validation_Date")]
    pub validation_date: String,
    #[serde(rename = "Greenlight_RO_Loader_Create")]
    pub greenlight_loader_create: String,
    #[serde(rename = "Greenlight_RO_Loader_Update")]
    pub greenlight_loader_update: String,
    #[serde(rename = "Greenlight_RIM")]
    pub greenlight_rim: String,
    #[serde(rename = "RIM_Date_of_Greenlight")]
    pub rim_greenlight_date: String,
    #[serde(rename = "RIM_Additional_Implementation_Info")]
    pub rim_additional_info: String,
    #[serde(rename = "RIM_Record_ID")]
    pub rim_record_id: String,
    #[serde(rename = "MVS_Molecule")]
    pub molecule: String,
    #[serde(rename = "RIM_Product_Name")]
    pub rim_product_name: String,
    #[serde(rename = "Product_Match")]
    pub product_match: Verdict,
}

fn yes_no<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "Yes" } else { "No" })
}

/// Whether an MVS "Out of Scope" answer actually says the line is in scope.
pub fn is_in_scope(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return false;
    }

    const IN_SCOPE_PATTERNS: [&str; 5] = ["in scope", "inscope", "in-scope", "scope in", "scopein"];
    if IN_SCOPE_PATTERNS.iter().any(|p| value.contains(p)) {
        return true;
    }

    value.contains("scope") && value.contains("in") && !value.contains("out") && !value.contains("not")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_scope_variants() {
        assert!(is_in_scope("In Scope"));
        assert!(is_in_scope(" IN-SCOPE "));
        assert!(is_in_scope("Scope: in"));
        assert!(!is_in_scope("Out of scope"));
        assert!(!is_in_scope("scope not included"));
        assert!(!is_in_scope(""));
        assert!(!is_in_scope("yes"));
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.columns.mvs_green_light, config.columns.mvs_green_light);
        assert_eq!(parsed.export.lock_retry, LockRetry::Prompt);
        assert!(parsed.window().is_ok());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            mvs_header_skip_rows = 0

            [export.lock_retry.bounded]
            attempts = 3
            delay_ms = 10
            "#,
        )
        .unwrap();
        assert_eq!(parsed.mvs_header_skip_rows, 0);
        assert_eq!(parsed.columns.rim_external_id, "external_id__c");
        assert_eq!(
            parsed.export.lock_retry,
            LockRetry::Bounded {
                attempts: 3,
                delay_ms: 10
            }
        );
    }
}
