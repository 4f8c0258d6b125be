//! Static per-provider capability tables.
//!
//! Every driver checks its table before doing anything else in an operation.
//! Operations missing from the table fail with [`Error::Unsupported`] and no
//! request is made.

use crate::error::{Error, Result};

/// Every operation exposed by the service traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    PullRequestFind,
    PullRequestList,
    PullRequestCreate,
    PullRequestClose,
    PullRequestReopen,
    PullRequestMerge,
    PullRequestListChanges,
    ContentFind,
    ContentCreate,
    ContentUpdate,
    ContentDelete,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::PullRequestFind,
        Operation::PullRequestList,
        Operation::PullRequestCreate,
        Operation::PullRequestClose,
        Operation::PullRequestReopen,
        Operation::PullRequestMerge,
        Operation::PullRequestListChanges,
        Operation::ContentFind,
        Operation::ContentCreate,
        Operation::ContentUpdate,
        Operation::ContentDelete,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::PullRequestFind => "pull_requests.find",
            Operation::PullRequestList => "pull_requests.list",
            Operation::PullRequestCreate => "pull_requests.create",
            Operation::PullRequestClose => "pull_requests.close",
            Operation::PullRequestReopen => "pull_requests.reopen",
            Operation::PullRequestMerge => "pull_requests.merge",
            Operation::PullRequestListChanges => "pull_requests.list_changes",
            Operation::ContentFind => "contents.find",
            Operation::ContentCreate => "contents.create",
            Operation::ContentUpdate => "contents.update",
            Operation::ContentDelete => "contents.delete",
        }
    }

    const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Immutable set of supported operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const fn none() -> Self {
        Capabilities(0)
    }

    pub const fn all() -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < Operation::ALL.len() {
            bits |= Operation::ALL[i].bit();
            i += 1;
        }
        Capabilities(bits)
    }

    pub const fn with(self, op: Operation) -> Self {
        Capabilities(self.0 | op.bit())
    }

    pub const fn without(self, op: Operation) -> Self {
        Capabilities(self.0 & !op.bit())
    }

    pub const fn supports(&self, op: Operation) -> bool {
        self.0 & op.bit() != 0
    }

    /// `Ok(())` when supported, otherwise the [`Error::Unsupported`] sentinel.
    pub fn check(&self, op: Operation) -> Result<()> {
        if self.supports(op) {
            Ok(())
        } else {
            tracing::debug!(operation = op.name(), "operation gated as unsupported");
            Err(Error::Unsupported)
        }
    }

    pub fn unsupported(&self) -> Vec<Operation> {
        Operation::ALL
            .iter()
            .copied()
            .filter(|op| !self.supports(*op))
            .collect()
    }
}

/// Providers with a driver in this workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gitea,
    Stash,
    GitLab,
}

const GITEA: Capabilities = Capabilities::all();

// Bitbucket Server has no file update or delete endpoint distinct from create.
const STASH: Capabilities = Capabilities::all()
    .without(Operation::ContentUpdate)
    .without(Operation::ContentDelete);

const GITLAB: Capabilities = Capabilities::all();

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Gitea, ProviderKind::Stash, ProviderKind::GitLab];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Gitea => "gitea",
            ProviderKind::Stash => "stash",
            ProviderKind::GitLab => "gitlab",
        }
    }

    pub const fn capabilities(&self) -> Capabilities {
        match self {
            ProviderKind::Gitea => GITEA,
            ProviderKind::Stash => STASH,
            ProviderKind::GitLab => GITLAB,
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gitea" => Ok(ProviderKind::Gitea),
            "stash" | "bitbucket-server" | "bitbucketserver" => Ok(ProviderKind::Stash),
            "gitlab" => Ok(ProviderKind::GitLab),
            other => Err(Error::Config(format!("Unknown provider: {}", other))),
        }
    }
}

/// Whether `provider` implements `operation`.
pub fn check(provider: ProviderKind, operation: Operation) -> bool {
    provider.capabilities().supports(operation)
}
