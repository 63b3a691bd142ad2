// src/core/organization.rs
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use tracing::{info, debug, warn};

use crate::error::{FinderResult, FinderError};

pub use crate::utils::text::normalize_name;

/// Data record for a single organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub ein: u64,
    pub organization_name: String,
    #[serde(default)]
    pub dba_name: String,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub total_participants: String,
    #[serde(default)]
    pub plan_count: u32,
    #[serde(default)]
    pub mail_us_address1: String,
    #[serde(default)]
    pub mail_us_address2: String,
    #[serde(default)]
    pub mail_us_city: String,
    #[serde(default)]
    pub mail_us_state: String,
    #[serde(default)]
    pub mail_us_zip: String,
    #[serde(default)]
    pub phone_num: u64,
    #[serde(default)]
    pub processed: bool,
}

impl Organization {
    pub fn new(ein: u64, organization_name: impl Into<String>) -> Self {
        Self {
            ein,
            organization_name: organization_name.into(),
            dba_name: String::new(),
            entity_type: String::new(),
            total_participants: String::new(),
            plan_count: 0,
            mail_us_address1: String::new(),
            mail_us_address2: String::new(),
            mail_us_city: String::new(),
            mail_us_state: String::new(),
            mail_us_zip: String::new(),
            phone_num: 0,
            processed: false,
        }
    }

    pub fn has_phone_number(&self) -> bool {
        self.phone_num != 0
    }
}

/// Load and batch process organizations from a CSV file
#[derive(Debug, Clone)]
pub struct OrganizationProcessor {
    csv_path: PathBuf,
    organizations: HashMap<u64, Organization>,
    queue: Vec<u64>,
    processed: HashSet<u64>,
    index: usize,
}

impl OrganizationProcessor {
    /// Load all organizations from a headered CSV file
    pub fn from_path(csv_path: impl AsRef<Path>) -> FinderResult<Self> {
        let csv_path = csv_path.as_ref().to_path_buf();
        info!("Loading organizations from {}", csv_path.display());

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&csv_path)
            .map_err(|e| FinderError::file(&csv_path, e))?;

        let mut processor = Self::from_organizations(Vec::new());
        processor.csv_path = csv_path;

        for row in reader.deserialize::<HashMap<String, String>>() {
            let row = row?;
            match Self::parse_row(&row) {
                Some(org) => processor.insert(org),
                None => warn!("Invalid EIN {:?}", row.get("ein")),
            }
        }

        info!("Loaded {} organizations", processor.organizations.len());
        Ok(processor)
    }

    /// Build a processor over already loaded organizations
    pub fn from_organizations(organizations: Vec<Organization>) -> Self {
        let mut processor = Self {
            csv_path: PathBuf::new(),
            organizations: HashMap::new(),
            queue: Vec::new(),
            processed: HashSet::new(),
            index: 0,
        };
        for org in organizations {
            processor.insert(org);
        }
        processor
    }

    fn insert(&mut self, org: Organization) {
        let ein = org.ein;
        if org.processed {
            self.processed.insert(ein);
        }
        if self.organizations.insert(ein, org).is_none() {
            self.queue.push(ein);
        } else {
            debug!("Duplicate EIN {} replaces earlier record", ein);
        }
    }

    fn parse_row(row: &HashMap<String, String>) -> Option<Organization> {
        let field = |name: &str| row.get(name).map(|v| v.trim().to_string()).unwrap_or_default();
        let number = |name: &str| -> u64 {
            let value = field(name);
            if value.is_empty() {
                return 0;
            }
            value.parse::<u64>().unwrap_or_else(|_| {
                warn!("Invalid {} value {:?}, using 0", name, value);
                0
            })
        };

        let ein = field("ein").parse::<u64>().ok()?;

        Some(Organization {
            ein,
            organization_name: field("organization_name"),
            dba_name: field("dba_name"),
            entity_type: field("entity_type"),
            total_participants: field("total_participants"),
            plan_count: u32::try_from(number("plan_count")).unwrap_or(u32::MAX),
            mail_us_address1: field("mail_us_address1"),
            mail_us_address2: field("mail_us_address2"),
            mail_us_city: field("mail_us_city"),
            mail_us_state: field("mail_us_state"),
            mail_us_zip: field("mail_us_zip"),
            phone_num: number("phone_num"),
            processed: false,
        })
    }

    /// Return the next batch of unprocessed organizations
    pub fn get_next_batch(&mut self, size: usize) -> Vec<Organization> {
        let mut batch = Vec::new();

        while batch.len() < size && self.index < self.queue.len() {
            let ein = self.queue[self.index];
            self.index += 1;
            if self.processed.contains(&ein) {
                continue;
            }
            if let Some(org) = self.organizations.get(&ein) {
                batch.push(org.clone());
            }
        }

        debug!("Returning batch of {} organizations", batch.len());
        batch
    }

    /// Mark an organization as processed
    pub fn mark_processed(&mut self, ein: u64) {
        if let Some(org) = self.organizations.get_mut(&ein) {
            org.processed = true;
            self.processed.insert(ein);
            debug!("Marked EIN {} as processed", ein);
        }
    }

    pub fn is_processed(&self, ein: u64) -> bool {
        self.processed.contains(&ein)
    }

    /// Start handing out batches from the beginning again
    pub fn reset_cursor(&mut self) {
        self.index = 0;
    }

    /// All organizations in file order
    pub fn organizations(&self) -> Vec<&Organization> {
        self.queue
            .iter()
            .filter_map(|ein| self.organizations.get(ein))
            .collect()
    }

    pub fn get(&self, ein: u64) -> Option<&Organization> {
        self.organizations.get(&ein)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
