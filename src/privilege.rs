//! Privilege drop (Unix only): relinquish root after binding the
//! listening socket on a privileged port.
//!
//! Grounded on the original C++ implementation's
//! `security/process.cpp`/`.hpp` `DropPrivileges(group, user)`
//! (`original_source/`): `setgid` then `setuid`, followed by an attempt
//! to switch *back* to uid/gid 0 as proof the drop actually stuck. The
//! original classifies the outcome into five states; this keeps that
//! taxonomy but resolves group/user names through `nix`'s passwd/group
//! lookups (`nix`'s `user` feature) rather than taking raw numeric IDs,
//! since `Config::drop_privileges_to` is configured by name.

use nix::unistd::{self, Gid, Group, Uid, User};

/// Outcome of a privilege-drop attempt, mirroring the original's
/// `PrivilegesStatus` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeStatus {
    /// Dropped, and verified non-reversible.
    Ok,
    /// Dropped the group, but the user switch proved reversible.
    SwitchableToSuperuser,
    /// The group switch itself proved reversible.
    SwitchableToSuperuserGroup,
    /// Could not switch to the requested group at all.
    UnableDropGroup,
    /// Could not switch to the requested user at all.
    UnableDropUser,
}

/// Drops to `group`/`user` by name. Must be called after the listening
/// socket is bound (binding a privileged port needs the privilege this
/// function gives up) and before serving any request.
pub fn drop_privileges(group: &str, user: &str) -> PrivilegeStatus {
    let gid = match Group::from_name(group) {
        Ok(Some(group)) => group.gid,
        _ => return PrivilegeStatus::UnableDropGroup,
    };
    if unistd::setgid(gid).is_err() {
        return PrivilegeStatus::UnableDropGroup;
    }

    let uid = match User::from_name(user) {
        Ok(Some(user)) => user.uid,
        _ => return PrivilegeStatus::UnableDropUser,
    };
    if unistd::setuid(uid).is_err() {
        return PrivilegeStatus::UnableDropUser;
    }

    // Verification pass: a successful drop must not be reversible.
    if unistd::setuid(Uid::from_raw(0)).is_ok() {
        return PrivilegeStatus::SwitchableToSuperuser;
    }
    if unistd::setgid(Gid::from_raw(0)).is_ok() {
        return PrivilegeStatus::SwitchableToSuperuserGroup;
    }

    PrivilegeStatus::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_group_is_reported_as_unable_to_drop() {
        assert_eq!(
            drop_privileges("no-such-group-originserve-test", "no-such-user-originserve-test"),
            PrivilegeStatus::UnableDropGroup
        );
    }
}
