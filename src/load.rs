//! Bulk loading of records into a [Dataset].

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::Dataset;
use crate::error::{ConstraintViolation, Error, Result};
use crate::schema::{Customer, Order, OrderItem, Product, Record};

/// What to do when a record is rejected during a bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPolicy {
    /// Stop at the first rejected record and return its violation.
    /// Records inserted before it stay in the dataset.
    #[default]
    Abort,
    /// Skip rejected records and report them all at the end.
    Skip,
}

/// Records to load, one list per entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadBatch {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
}

impl LoadBatch {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub inserted: usize,
    pub violations: Vec<ConstraintViolation>,
}

impl Dataset {
    /// Inserts a batch in dependency order: customers and products, then
    /// orders, then order items.
    ///
    /// # Errors
    /// Under [LoadPolicy::Abort], the first violation. Errors that are not
    /// integrity violations are always returned.
    pub fn load(&mut self, batch: LoadBatch, policy: LoadPolicy) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        self.load_all(batch.customers, policy, &mut report)?;
        self.load_all(batch.products, policy, &mut report)?;
        self.load_all(batch.orders, policy, &mut report)?;
        self.load_all(batch.order_items, policy, &mut report)?;
        info!(
            inserted = report.inserted,
            skipped = report.violations.len(),
            "load finished"
        );
        Ok(report)
    }

    fn load_all<R: Record>(
        &mut self,
        records: Vec<R>,
        policy: LoadPolicy,
        report: &mut LoadReport,
    ) -> Result<()> {
        for record in records {
            match self.insert(record) {
                Ok(()) => report.inserted += 1,
                Err(Error::Constraint(violation)) if policy == LoadPolicy::Skip => {
                    warn!(%violation, "record skipped");
                    report.violations.push(violation);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
