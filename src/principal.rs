//! Identity & capability resolution.
//!
//! Authentication token issuance is out of scope (spec §1); this
//! module only defines the resolved shape every repository/engine call
//! receives and checks against.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
    Service,
}

/// A resource a principal may act on, scoped to a hierarchy node or a
/// whole platform. `All` is reserved for admins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    All,
    Platform(Uuid),
    Project(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub principal_id: Uuid,
    pub role: Role,
    pub permitted_resources: HashSet<Resource>,
}

impl Principal {
    pub fn admin(principal_id: Uuid) -> Self {
        let mut permitted = HashSet::new();
        permitted.insert(Resource::All);
        Self {
            principal_id,
            role: Role::Admin,
            permitted_resources: permitted,
        }
    }

    pub fn service(principal_id: Uuid) -> Self {
        let mut permitted = HashSet::new();
        permitted.insert(Resource::All);
        Self {
            principal_id,
            role: Role::Service,
            permitted_resources: permitted,
        }
    }

    pub fn user(principal_id: Uuid, permitted_resources: HashSet<Resource>) -> Self {
        Self {
            principal_id,
            role: Role::User,
            permitted_resources,
        }
    }

    /// Whether this principal may act on a given project.
    pub fn can_access_project(&self, project_id: Uuid) -> bool {
        matches!(self.role, Role::Admin | Role::Service)
            || self.permitted_resources.contains(&Resource::All)
            || self.permitted_resources.contains(&Resource::Project(project_id))
    }

    /// Whether this principal may act on a given platform (and by
    /// extension every project inside it).
    pub fn can_access_platform(&self, platform_id: Uuid) -> bool {
        matches!(self.role, Role::Admin | Role::Service)
            || self.permitted_resources.contains(&Resource::All)
            || self.permitted_resources.contains(&Resource::Platform(platform_id))
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}
