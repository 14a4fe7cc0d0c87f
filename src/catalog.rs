//! Dataset Catalog
//!
//! Static registry of the datasets the assistant can answer questions about.
//! Each entry names the backing file, a human description, and one note line
//! per column. Descriptors are built once at startup and never mutated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub description: String,
    /// Free text with one note line per column, matched by substring.
    pub column_notes: String,
}

impl DatasetDescriptor {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        description: impl Into<String>,
        column_notes: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            description: description.into(),
            column_notes: column_notes.into(),
        }
    }

    /// First note line mentioning the column name, if any.
    pub fn note_for_column(&self, column: &str) -> Option<&str> {
        self.column_notes
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && line.contains(column))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    datasets: Vec<DatasetDescriptor>,
}

impl Catalog {
    pub fn new(datasets: Vec<DatasetDescriptor>) -> Self {
        Self { datasets }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.datasets.iter()
    }

    pub fn get(&self, name: &str) -> Option<&DatasetDescriptor> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// The built-in water/sanitation regulator catalog: eight CSV extracts
    /// covering production, billing, finance, national indicators, and the
    /// JMP access/service ladders, all under `data_dir`.
    pub fn water_utility(data_dir: &Path) -> Self {
        let entry = |name: &str, file: &str, description: &str, column_notes: &str| {
            DatasetDescriptor::new(name, data_dir.join(file), description, column_notes)
        };

        Self::new(vec![
            entry(
                "production_daily",
                "production.csv",
                "Daily water production volumes and operating hours for multiple countries. \
                 Each row includes production_m3, service_hours, date, and the country.",
                r#"
- country: Country name (cameroon, uganda, malawi, lesotho)
- source: Water production source or facility name
- date_YYMMDD: Calendar date (YYYY/MM/DD)
- production_m3: Volume of water produced that day (m3)
- service_hours: Number of hours the production system operated that day
"#,
            ),
            entry(
                "billing_customers",
                "billing.csv",
                "Customer-level monthly billing and payment records across multiple countries. \
                 Includes billed consumption, payments, and monthly billing dates.",
                r#"
- country: Country name
- customer_id: Customer identifier
- date_MMYY: Billing month/year
- consumption_m3: Billed consumption (m3)
- billed: Amount billed
- paid: Amount paid
- source: Data source (may be empty)
- date_YYMMDD: Optional date field
"#,
            ),
            entry(
                "all_fin_service",
                "all_fin_service.csv",
                "City-level sanitation and water financial/service indicators across multiple \
                 countries. Includes sewer network length, complaints, revenue, staffing, and \
                 operational metrics.",
                r#"
- country: Country name
- city: City name
- date_MMYY: Month/year
- sewer_length: Length of sewer network (km)
- complaints, resolved: Complaint volumes and resolutions
- blocks: Number of sewer blockages
- sewer_billed, sewer_revenue: Billed amounts and revenue collected
- opex: Operating expenditure
- san_staff, w_staff: Sanitation and water staff counts
- propoor_popn: Population covered by pro-poor programs
"#,
            ),
            entry(
                "all_national",
                "all_national.csv",
                "National-level annual WASH budgets, staffing, water treatment plant data, and \
                 service provider indicators for multiple countries.",
                r#"
- country: Country name
- date_YY: Year
- budget_allocated, san_allocation, wat_allocation: WASH budget values
- staff_cost: Staff expenditure
- water_resources: Water resource expenditures
- trained_staff: Number of trained staff
- complaint_resolution: Complaints resolved (indicator)
- registered_wtps, inspected_wtps: Water treatment plants
- total_service_providers, licensed_service_providers: Provider counts
- asset_health: Asset condition indicator
- staff_training_budget: Training allocated budget
"#,
            ),
            entry(
                "s_access",
                "s_access.csv",
                "Sanitation access data by zone and year across multiple countries, following \
                 the JMP service ladder (safely managed, basic, limited, etc.).",
                r#"
- country: Country name
- zone: Administrative zone
- date_YY: Year
- safely_managed, basic, limited, unimproved, open_def: Population counts by sanitation service level
- *_pct: Percentage of population in each service level
- other_pct: Other/unspecified sanitation access
- popn_total: Total population
- households: Number of households
"#,
            ),
            entry(
                "s_service",
                "s_service.csv",
                "Sanitation service delivery by zone and month across multiple countries. \
                 Includes sewer connections, sludge collection, wastewater treatment, and reuse.",
                r#"
- country: Country name
- zone: Administrative zone
- date_MMYY: Month/year
- households: Number of households
- sewer_connections: Sewer connections
- public_toilets: Number of public toilets
- workforce, f_workforce: Total and female sanitation workforce
- ww_collected, ww_treated, ww_reused: Wastewater collected/treated/reused
- w_supplied: Water supplied (m3)
- hh_emptied: Households emptied
- fs_treated, fs_reused: Fecal sludge treated/reused
"#,
            ),
            entry(
                "water_access",
                "water_access.csv",
                "Water access levels by zone across multiple countries, including safely \
                 managed, basic, limited and unimproved service levels, plus households and \
                 population totals.",
                r#"
- country: Country name
- zone: Administrative zone
- safely_managed, basic, limited, unimproved, surface_water: Population by water service level
- *_pct: Percentage of population for each service level
- popn_total: Total population
- households: Number of households
- municipal_coverage: Municipal water supply coverage
"#,
            ),
            entry(
                "water_service",
                "water_service.csv",
                "Water service quality and supply indicators by zone and month across multiple \
                 countries. Includes quality tests (chlorine/E. coli), water supplied, \
                 consumption, and capacity.",
                r#"
- country: Country name
- zone: Administrative zone
- date_MMYY: Month/year
- tests_chlorine, tests_ecoli: Number of requested tests
- tests_conducted_chlorine, test_conducted_ecoli: Tests conducted
- test_passed_chlorine, tests_passed_ecoli: Tests that passed
- w_supplied: Water supplied (m3)
- total_consumption: Total water consumption (m3)
- metered: Metered consumption or metered connections
- ww_capacity: Wastewater treatment capacity
"#,
            ),
        ])
    }
}
