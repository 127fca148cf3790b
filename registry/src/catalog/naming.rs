//! Interface variants: one operation, five exposed names.
//!
//! The canonical name (interface 1) is `<verb>_<rest>`. Interfaces 2..5 swap
//! the verb for a synonym from [`VERBS`]. Every token appears in exactly one
//! row, so two distinct canonical names can never project to the same name.

use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::contract::Naming;

/// Verb synonyms, column `n - 1` belongs to interface `n`.
pub const VERBS: &[[&str; 5]] = &[
    ["create", "register", "establish", "setup", "initiate"],
    ["get", "fetch", "retrieve", "lookup", "obtain"],
    ["search", "find", "query", "discover", "filter"],
    ["list", "browse", "enumerate", "show", "view"],
    ["update", "modify", "edit", "amend", "revise"],
    ["delete", "purge", "erase", "destroy", "drop"],
    ["add", "attach", "link", "associate", "bind"],
    ["remove", "detach", "unlink", "dissociate", "unbind"],
    ["cancel", "void", "abort", "revoke", "withdraw"],
    ["approve", "authorize", "sanction", "endorse", "ratify"],
    ["reject", "decline", "deny", "refuse", "veto"],
    ["fulfill", "complete", "honor", "finalize", "settle"],
    ["ship", "dispatch", "send", "forward", "release"],
    ["deliver", "transmit", "convey", "render", "consign"],
    ["book", "reserve", "schedule", "arrange", "secure"],
    ["offboard", "terminate", "separate", "dismiss", "discharge"],
    ["assign", "allocate", "designate", "appoint", "delegate"],
    ["summarize", "report", "tally", "aggregate", "compile"],
    ["record", "log", "capture", "enter", "post"],
    ["manage", "handle", "process", "administer", "execute"],
];

/// One of the five renamed-but-equivalent catalog variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Interface(u8);

impl Interface {
    pub const ALL: [Interface; 5] = [
        Interface(1),
        Interface(2),
        Interface(3),
        Interface(4),
        Interface(5),
    ];

    pub fn new(number: u8) -> Result<Self> {
        if !(1..=5).contains(&number) {
            bail!("interface must be between 1 and 5 (got {number})");
        }
        Ok(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    fn column(self) -> usize {
        usize::from(self.0) - 1
    }
}

impl Default for Interface {
    fn default() -> Self {
        Interface(1)
    }
}

impl TryFrom<u8> for Interface {
    type Error = anyhow::Error;

    fn try_from(number: u8) -> Result<Self> {
        Interface::new(number)
    }
}

impl From<Interface> for u8 {
    fn from(interface: Interface) -> u8 {
        interface.0
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exposed name of `canonical` in `interface`, or `None` if its verb is not
/// in the table.
pub fn project(canonical: &str, naming: Naming, interface: Interface) -> Option<String> {
    if naming == Naming::Fixed {
        return Some(canonical.to_string());
    }
    let (verb, rest) = canonical.split_once('_')?;
    let row = VERBS.iter().find(|row| row[0] == verb)?;
    Some(format!("{}_{rest}", row[interface.column()]))
}
