//! Capability-based authorization
//!
//! Every lifecycle operation consults `authorize` with the caller, the
//! action, and (where ownership matters) the resource owner's user id.
//! Role checks live here and nowhere else, so the visibility rule is
//! enforced once and consistently across the HTTP and bot channels.

use crate::auth::Role;
use crate::types::{RegistrarError, Result};

/// Authenticated caller identity, as established by token verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: i64,
    pub role: Role,
}

impl Caller {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }
}

/// Operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Submit a new certificate request
    CreateCertificate,
    /// Read a single certificate (owner passed for the visibility rule)
    ViewCertificate,
    /// List the caller's own certificates
    ListOwnCertificates,
    /// List certificates awaiting triage
    ListPendingCertificates,
    /// List every certificate
    ListAllCertificates,
    /// Claim a pending certificate for handling
    AssignCertificate,
    /// Move a certificate through its lifecycle
    UpdateCertificateStatus,
    /// Per-status aggregate counts
    ViewStatistics,
    /// Attach a generated document to a certificate
    UploadFile,
    /// Download an attached document (owner passed for the visibility rule)
    DownloadFile,
    /// Remove an attached document (owner is the original uploader)
    DeleteFile,
    /// List registered users
    ListUsers,
}

/// Decide whether `caller` may perform `action`.
///
/// `resource_owner` carries the owning user id for ownership-scoped
/// actions: the certificate's student for view/download, the original
/// uploader for file deletion. Returns `Forbidden` on denial so callers
/// can propagate it directly.
pub fn authorize(caller: Caller, action: Action, resource_owner: Option<i64>) -> Result<()> {
    let allowed = match action {
        Action::CreateCertificate => caller.role == Role::Student,

        Action::ViewCertificate | Action::DownloadFile => {
            caller.role.is_handler() || resource_owner == Some(caller.id)
        }

        Action::ListOwnCertificates => true,

        Action::ListPendingCertificates
        | Action::ListAllCertificates
        | Action::AssignCertificate
        | Action::UpdateCertificateStatus
        | Action::UploadFile => caller.role.is_handler(),

        Action::DeleteFile => caller.role == Role::Admin || resource_owner == Some(caller.id),

        Action::ViewStatistics | Action::ListUsers => caller.role == Role::Admin,
    };

    if allowed {
        Ok(())
    } else {
        Err(RegistrarError::Forbidden(format!(
            "Role {} may not perform this operation",
            caller.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Caller {
        Caller::new(7, Role::Student)
    }

    fn staff() -> Caller {
        Caller::new(3, Role::Staff)
    }

    fn admin() -> Caller {
        Caller::new(1, Role::Admin)
    }

    #[test]
    fn test_create_is_student_only() {
        assert!(authorize(student(), Action::CreateCertificate, None).is_ok());
        assert!(authorize(staff(), Action::CreateCertificate, None).is_err());
        assert!(authorize(admin(), Action::CreateCertificate, None).is_err());
    }

    #[test]
    fn test_visibility_rule() {
        // Student sees own certificate regardless of status
        assert!(authorize(student(), Action::ViewCertificate, Some(7)).is_ok());
        // ...but never someone else's
        assert!(authorize(student(), Action::ViewCertificate, Some(8)).is_err());
        // Handlers see everything
        assert!(authorize(staff(), Action::ViewCertificate, Some(7)).is_ok());
        assert!(authorize(admin(), Action::ViewCertificate, Some(7)).is_ok());
    }

    #[test]
    fn test_lifecycle_mutations_require_handler() {
        for action in [
            Action::AssignCertificate,
            Action::UpdateCertificateStatus,
            Action::ListPendingCertificates,
            Action::ListAllCertificates,
            Action::UploadFile,
        ] {
            assert!(authorize(student(), action, None).is_err());
            assert!(authorize(staff(), action, None).is_ok());
            assert!(authorize(admin(), action, None).is_ok());
        }
    }

    #[test]
    fn test_statistics_admin_only() {
        assert!(authorize(staff(), Action::ViewStatistics, None).is_err());
        assert!(authorize(student(), Action::ViewStatistics, None).is_err());
        assert!(authorize(admin(), Action::ViewStatistics, None).is_ok());
    }

    #[test]
    fn test_file_deletion_admin_or_uploader() {
        // Uploader may remove their own upload
        assert!(authorize(staff(), Action::DeleteFile, Some(3)).is_ok());
        // Another staff member may not
        assert!(authorize(Caller::new(9, Role::Staff), Action::DeleteFile, Some(3)).is_err());
        // Admin always may
        assert!(authorize(admin(), Action::DeleteFile, Some(3)).is_ok());
    }
}
