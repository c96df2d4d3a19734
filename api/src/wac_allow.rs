//! The `WAC-Allow` response header.
//!
//! Tells clients which of `read`, `write`, `append` and `control` the
//! current agent and the public hold on the target, e.g.
//! `user="read write append",public="read"`.

use authz::{AccessMap, AccessMode, Authorizer, Credentials, ModeSet, PermissionSet, ResourceIdentifier};

pub const WAC_ALLOW: &str = "wac-allow";

const ADVERTISED: [AccessMode; 4] = [
    AccessMode::Read,
    AccessMode::Write,
    AccessMode::Append,
    AccessMode::Control,
];

/// Computes the header value for `target`.
pub async fn header_value(
    authorizer: &Authorizer,
    target: &ResourceIdentifier,
    credentials: &Credentials,
) -> String {
    let requested: AccessMap = [(target.clone(), ModeSet::from(ADVERTISED))].into_iter().collect();

    let public = authorizer
        .permissions(&Credentials::anonymous(), &requested)
        .await
        .get(target);
    let user = if credentials.is_authenticated() {
        authorizer.permissions(credentials, &requested).await.get(target)
    } else {
        public
    };

    format!("user=\"{}\",public=\"{}\"", modes(&user), modes(&public))
}

fn modes(set: &PermissionSet) -> String {
    ADVERTISED
        .iter()
        .filter(|mode| set.get(**mode).is_granted())
        .map(|mode| mode.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz::Grant;

    #[test]
    fn test_modes_lists_granted_only() {
        let set = PermissionSet::granting([AccessMode::Read, AccessMode::Append, AccessMode::Delete])
            .with(AccessMode::Write, Grant::Deny);
        assert_eq!(modes(&set), "read append");
        assert_eq!(modes(&PermissionSet::new()), "");
    }
}
