//! Per-domain catalogs.
//!
//! Each domain module declares its entity specs and returns its operations in
//! canonical (interface 1) form; [`Domain::catalog`] projects them into the
//! requested interface.

pub mod airline;
pub mod ecommerce;
pub mod finance;
pub mod fund;
pub mod hr;
pub mod incident;
pub mod smart_home;
pub mod wiki;

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::Catalog;
use crate::catalog::naming::Interface;
use crate::contract::{Effect, Operation, ParamSpec, ParamType};

/// Name of the tool that ends an episode in every domain.
pub const TRANSFER_TOOL: &str = "transfer_to_human_agents";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Airline,
    Ecommerce,
    Finance,
    HrPayroll,
    IncidentManagement,
    EnterpriseWiki,
    FundFinance,
    SmartHome,
}

impl Domain {
    pub const ALL: [Domain; 8] = [
        Domain::Airline,
        Domain::Ecommerce,
        Domain::Finance,
        Domain::HrPayroll,
        Domain::IncidentManagement,
        Domain::EnterpriseWiki,
        Domain::FundFinance,
        Domain::SmartHome,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Airline => "airline",
            Domain::Ecommerce => "ecommerce",
            Domain::Finance => "finance",
            Domain::HrPayroll => "hr_payroll",
            Domain::IncidentManagement => "incident_management",
            Domain::EnterpriseWiki => "enterprise_wiki",
            Domain::FundFinance => "fund_finance",
            Domain::SmartHome => "smart_home",
        }
    }

    /// Timestamp literal tools stamp unless the configuration overrides it.
    pub fn default_timestamp(self) -> &'static str {
        match self {
            Domain::HrPayroll => "2025-10-01T00:00:00",
            Domain::FundFinance => "2025-08-07T00:00:00Z",
            _ => "2025-01-01T00:00:00Z",
        }
    }

    /// Canonical operations, in catalog order.
    pub fn operations(self) -> Vec<Operation> {
        let mut operations = match self {
            Domain::Airline => airline::operations(),
            Domain::Ecommerce => ecommerce::operations(),
            Domain::Finance => finance::operations(),
            Domain::HrPayroll => hr::operations(),
            Domain::IncidentManagement => incident::operations(),
            Domain::EnterpriseWiki => wiki::operations(),
            Domain::FundFinance => fund::operations(),
            Domain::SmartHome => smart_home::operations(),
        };
        operations.push(transfer_to_human_agents());
        operations
    }

    /// Tool names that end the episode.
    pub fn terminate_tools(self) -> Vec<String> {
        vec![TRANSFER_TOOL.to_string()]
    }

    pub fn catalog(self, interface: Interface) -> Result<Catalog> {
        Catalog::build(self.operations(), interface)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = anyhow::Error;

    fn from_str(text: &str) -> Result<Self> {
        let normalized = text.trim().to_lowercase().replace('-', "_");
        match Domain::ALL
            .into_iter()
            .find(|domain| domain.as_str() == normalized)
        {
            Some(domain) => Ok(domain),
            None => {
                let known: Vec<&str> = Domain::ALL.iter().map(|domain| domain.as_str()).collect();
                bail!("unknown domain '{text}' (expected one of: {})", known.join(", "))
            }
        }
    }
}

fn transfer_to_human_agents() -> Operation {
    Operation::new(
        TRANSFER_TOOL,
        "Transfer the user to a human agent with a summary of the issue. Only use when the request cannot be handled with the available tools.",
        Effect::Read,
        |_, args| {
            let summary = args.str("summary")?;
            Ok(json!({ "status": "transferred", "summary": summary }))
        },
    )
    .param(ParamSpec::required(
        "summary",
        ParamType::String,
        "A summary of the user's issue",
    ))
    .fixed_name()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names() {
        assert_eq!("hr_payroll".parse::<Domain>().expect("hr"), Domain::HrPayroll);
        assert_eq!("Smart-Home".parse::<Domain>().expect("home"), Domain::SmartHome);
        let err = "retail".parse::<Domain>().expect_err("unknown");
        assert!(err.to_string().contains("unknown domain 'retail'"));
    }

    #[test]
    fn every_domain_ends_with_transfer() {
        for domain in Domain::ALL {
            let operations = domain.operations();
            let last = operations.last().expect("operations");
            assert_eq!(last.name, TRANSFER_TOOL, "{domain}");
        }
    }
}
