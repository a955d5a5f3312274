//! Catalogue of listable API resources

use clap::ValueEnum;
use serde::Serialize;

/// A listable collection exposed by the inventory API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Inventory,
    Batches,
    #[value(name = "serial-numbers", alias = "serial_numbers")]
    SerialNumbers,
    Dispatches,
    Loans,
    Shipments,
    Invoices,
    Subscriptions,
    Roles,
    Users,
    Reports,
}

impl Resource {
    #[cfg(test)]
    pub const ALL: [Resource; 11] = [
        Resource::Inventory,
        Resource::Batches,
        Resource::SerialNumbers,
        Resource::Dispatches,
        Resource::Loans,
        Resource::Shipments,
        Resource::Invoices,
        Resource::Subscriptions,
        Resource::Roles,
        Resource::Users,
        Resource::Reports,
    ];

    /// API path relative to the base URL
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Inventory => "/inventory",
            Resource::Batches => "/batches",
            Resource::SerialNumbers => "/serial-numbers",
            Resource::Dispatches => "/dispatches",
            Resource::Loans => "/loans",
            Resource::Shipments => "/shipments",
            Resource::Invoices => "/invoices",
            Resource::Subscriptions => "/subscriptions",
            Resource::Roles => "/roles",
            Resource::Users => "/users",
            Resource::Reports => "/reports",
        }
    }

    /// Leading segment of every cache key for this resource.
    ///
    /// Pattern invalidation by this prefix clears all pages and filters.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Resource::Inventory => "inventory",
            Resource::Batches => "batches",
            Resource::SerialNumbers => "serial_numbers",
            Resource::Dispatches => "dispatches",
            Resource::Loans => "loans",
            Resource::Shipments => "shipments",
            Resource::Invoices => "invoices",
            Resource::Subscriptions => "subscriptions",
            Resource::Roles => "roles",
            Resource::Users => "users",
            Resource::Reports => "reports",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key_prefix())
    }
}
