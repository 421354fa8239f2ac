//! Access permissions attached to stored secret values.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{ProgramId, UserId};

/// Who may read, change or compute on a stored value set.
///
/// Permissions are fixed when the values are stored; granting new access
/// means storing the values again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub owner: UserId,
    pub retrieve: BTreeSet<UserId>,
    pub update: BTreeSet<UserId>,
    pub delete: BTreeSet<UserId>,

    /// User id -> programs that user may run over these values.
    pub compute: BTreeMap<UserId, BTreeSet<ProgramId>>,
}

impl Permissions {
    /// Owner may retrieve, update and delete. No compute grants.
    pub fn default_for_user(owner: UserId) -> Self {
        let only_owner: BTreeSet<UserId> = [owner.clone()].into_iter().collect();
        Self {
            owner,
            retrieve: only_owner.clone(),
            update: only_owner.clone(),
            delete: only_owner,
            compute: BTreeMap::new(),
        }
    }

    /// Grant compute access to each user for the listed programs.
    pub fn add_compute_permissions(
        &mut self,
        grants: impl IntoIterator<Item = (UserId, BTreeSet<ProgramId>)>,
    ) {
        for (user, programs) in grants {
            self.compute.entry(user).or_default().extend(programs);
        }
    }

    /// Builder form of [`add_compute_permissions`](Self::add_compute_permissions)
    /// for a single user and program.
    pub fn with_compute(mut self, user: UserId, program: ProgramId) -> Self {
        self.compute.entry(user).or_default().insert(program);
        self
    }

    pub fn can_retrieve(&self, user: &UserId) -> bool {
        self.retrieve.contains(user)
    }

    pub fn can_compute(&self, user: &UserId, program: &ProgramId) -> bool {
        self.compute
            .get(user)
            .map_or(false, |programs| programs.contains(program))
    }
}
