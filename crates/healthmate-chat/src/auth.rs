//! Capability checks for privileged screens.

use tracing::{debug, warn};

use healthmate_core::types::{Capability, Identity};

use crate::error::ChatError;

/// Decides whether an identity may use a capability.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, identity: Option<&Identity>, capability: Capability)
        -> Result<(), ChatError>;
}

/// Grants capabilities from the identity's role. Anonymous callers get none.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoleAuthorizer;

impl Authorizer for RoleAuthorizer {
    fn authorize(
        &self,
        identity: Option<&Identity>,
        capability: Capability,
    ) -> Result<(), ChatError> {
        match identity {
            Some(identity) if identity.role.grants(capability) => {
                debug!(uid = %identity.uid, %capability, "Capability granted");
                Ok(())
            }
            Some(identity) => {
                warn!(uid = %identity.uid, role = ?identity.role, %capability, "Capability denied");
                Err(ChatError::Unauthorized(capability))
            }
            None => {
                warn!(%capability, "Capability denied to anonymous caller");
                Err(ChatError::Unauthorized(capability))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthmate_core::types::Role;

    #[test]
    fn test_admin_is_granted() {
        let admin = Identity::new("u-1").with_role(Role::Admin);
        assert!(RoleAuthorizer
            .authorize(Some(&admin), Capability::ManageContent)
            .is_ok());
    }

    #[test]
    fn test_signed_in_member_is_denied() {
        let member = Identity::new("u-2");
        assert!(matches!(
            RoleAuthorizer.authorize(Some(&member), Capability::ManageContent),
            Err(ChatError::Unauthorized(Capability::ManageContent))
        ));
    }

    #[test]
    fn test_anonymous_is_denied() {
        assert!(RoleAuthorizer
            .authorize(None, Capability::ManageContent)
            .is_err());
    }
}
