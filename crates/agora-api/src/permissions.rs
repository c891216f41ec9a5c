use std::str::FromStr;

use agora_db::Database;
use tracing::error;

use crate::error::ApiError;
use crate::session::Session;

pub const REASON_AUTH_REQUIRED: &str = "authentication required";
pub const REASON_UNKNOWN_RESOURCE: &str = "unknown resource type";
pub const REASON_CHECK_FAILED: &str = "permission check failed";

/// The resource kinds that carry an ownership-based access rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Post,
    Comment,
    Chat,
    Profile,
    File,
}

impl FromStr for ResourceKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(Self::Post),
            "comment" => Ok(Self::Comment),
            "chat" => Ok(Self::Chat),
            "profile" => Ok(Self::Profile),
            "file" => Ok(Self::File),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionResult {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl PermissionResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    /// The denial reason, or a generic fallback. Only meaningful on a
    /// denied result.
    pub fn reason_or_default(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| "not allowed to perform this operation".into())
    }
}

/// Decide whether the current session may operate on the given resource.
///
/// Read-only: the check never mutates storage. Unauthenticated callers are
/// denied before any storage lookup, and admins are allowed without one.
/// Storage faults are logged and surface as a generic denial.
pub fn check_permission(
    db: &Database,
    session: &Session,
    kind: ResourceKind,
    resource_id: &str,
) -> PermissionResult {
    let Some(user_id) = session.user_id() else {
        return PermissionResult::deny(REASON_AUTH_REQUIRED);
    };

    if session.is_admin() {
        return PermissionResult::allow();
    }

    let user_id = user_id.to_string();

    let outcome = match kind {
        ResourceKind::Post => check_post(db, &user_id, resource_id),
        ResourceKind::Comment => check_comment(db, &user_id, resource_id),
        ResourceKind::Chat => check_chat(db, &user_id, resource_id),
        ResourceKind::Profile => Ok(check_profile(&user_id, resource_id)),
        ResourceKind::File => check_file(db, &user_id, resource_id),
    };

    outcome.unwrap_or_else(|e| {
        error!("permission check error for {:?} {}: {:#}", kind, resource_id, e);
        PermissionResult::deny(REASON_CHECK_FAILED)
    })
}

/// As `check_permission`, but for a resource kind arriving as a string.
/// Unknown kinds are denied with a distinct reason.
pub fn check_named_permission(
    db: &Database,
    session: &Session,
    kind: &str,
    resource_id: &str,
) -> PermissionResult {
    match kind.parse::<ResourceKind>() {
        Ok(kind) => check_permission(db, session, kind, resource_id),
        Err(()) => PermissionResult::deny(REASON_UNKNOWN_RESOURCE),
    }
}

/// Map a denied result onto the response error space. Missing resources
/// surface as 404, missing sessions as 401, everything else as 403.
pub fn denial_error(result: &PermissionResult) -> ApiError {
    let reason = result.reason_or_default();
    if reason == REASON_AUTH_REQUIRED {
        ApiError::Unauthorized(reason)
    } else if reason.ends_with("not found") {
        ApiError::NotFound(reason)
    } else {
        ApiError::Forbidden(reason)
    }
}

fn check_post(db: &Database, user_id: &str, post_id: &str) -> anyhow::Result<PermissionResult> {
    let Some(owner) = db.get_post_owner(post_id)? else {
        return Ok(PermissionResult::deny("post not found"));
    };

    if owner == user_id {
        Ok(PermissionResult::allow())
    } else {
        Ok(PermissionResult::deny("not allowed to operate on this post"))
    }
}

fn check_comment(
    db: &Database,
    user_id: &str,
    comment_id: &str,
) -> anyhow::Result<PermissionResult> {
    let Some((comment_owner, post_owner)) = db.get_comment_owners(comment_id)? else {
        return Ok(PermissionResult::deny("comment not found"));
    };

    // The comment's author or the parent post's owner (moderation) may act.
    if comment_owner == user_id || post_owner == user_id {
        Ok(PermissionResult::allow())
    } else {
        Ok(PermissionResult::deny(
            "not allowed to operate on this comment",
        ))
    }
}

fn check_chat(db: &Database, user_id: &str, chat_id: &str) -> anyhow::Result<PermissionResult> {
    if db.is_chat_participant(user_id, chat_id)? {
        Ok(PermissionResult::allow())
    } else {
        Ok(PermissionResult::deny("not a participant in this chat"))
    }
}

fn check_profile(user_id: &str, profile_id: &str) -> PermissionResult {
    // Self-only; the admin override already short-circuited above.
    if user_id == profile_id {
        PermissionResult::allow()
    } else {
        PermissionResult::deny("not allowed to operate on another user's profile")
    }
}

fn check_file(db: &Database, user_id: &str, file_id: &str) -> anyhow::Result<PermissionResult> {
    let Some(owner) = db.get_file_owner(file_id)? else {
        return Ok(PermissionResult::deny("file not found"));
    };

    if owner == user_id {
        Ok(PermissionResult::allow())
    } else {
        Ok(PermissionResult::deny("not allowed to operate on this file"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Claims, Session};
    use agora_db::Database;
    use uuid::Uuid;

    struct Fixture {
        db: Database,
        alice: Uuid,
        bob: Uuid,
        carol: Uuid,
        admin: Uuid,
    }

    fn session_for(id: Uuid, role: &str) -> Session {
        Session::authenticated(Claims {
            sub: id,
            name: None,
            role: role.into(),
            exp: 0,
        })
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();
        let admin = Uuid::new_v4();

        for (id, name, email, role) in [
            (alice, "Alice", "a@example.com", "user"),
            (bob, "Bob", "b@example.com", "user"),
            (carol, "Carol", "c@example.com", "user"),
            (admin, "Root", "root@example.com", "admin"),
        ] {
            db.create_user(&id.to_string(), name, email, None, role)
                .unwrap();
        }

        db.insert_post("post-1", &alice.to_string(), "Title", "Body", true)
            .unwrap();
        db.insert_comment("comment-1", "post-1", &bob.to_string(), "Nice")
            .unwrap();
        db.create_chat_with_participants(
            "chat-1",
            None,
            &[alice.to_string(), bob.to_string()],
        )
        .unwrap();
        db.insert_file("file-1", &alice.to_string(), "notes.txt", "text/plain", 12)
            .unwrap();

        Fixture {
            db,
            alice,
            bob,
            carol,
            admin,
        }
    }

    #[test]
    fn post_allowed_only_for_owner() {
        let f = fixture();

        let owner = check_permission(
            &f.db,
            &session_for(f.alice, "user"),
            ResourceKind::Post,
            "post-1",
        );
        assert!(owner.allowed);

        let other = check_permission(
            &f.db,
            &session_for(f.bob, "user"),
            ResourceKind::Post,
            "post-1",
        );
        assert!(!other.allowed);
        assert_eq!(
            other.reason.as_deref(),
            Some("not allowed to operate on this post")
        );
    }

    #[test]
    fn missing_post_yields_not_found_reason() {
        let f = fixture();
        let result = check_permission(
            &f.db,
            &session_for(f.alice, "user"),
            ResourceKind::Post,
            "missing",
        );
        assert!(!result.allowed);
        assert_eq!(result.reason.as_deref(), Some("post not found"));
    }

    #[test]
    fn comment_allows_author_and_post_owner() {
        let f = fixture();

        // Bob wrote the comment; Alice owns the post it sits under.
        for user in [f.bob, f.alice] {
            let result = check_permission(
                &f.db,
                &session_for(user, "user"),
                ResourceKind::Comment,
                "comment-1",
            );
            assert!(result.allowed);
        }

        let outsider = check_permission(
            &f.db,
            &session_for(f.carol, "user"),
            ResourceKind::Comment,
            "comment-1",
        );
        assert!(!outsider.allowed);
    }

    #[test]
    fn chat_requires_participancy() {
        let f = fixture();

        assert!(
            check_permission(
                &f.db,
                &session_for(f.alice, "user"),
                ResourceKind::Chat,
                "chat-1"
            )
            .allowed
        );

        let outsider = check_permission(
            &f.db,
            &session_for(f.carol, "user"),
            ResourceKind::Chat,
            "chat-1",
        );
        assert!(!outsider.allowed);
        assert_eq!(
            outsider.reason.as_deref(),
            Some("not a participant in this chat")
        );
    }

    #[test]
    fn profile_is_self_only() {
        let f = fixture();
        let session = session_for(f.alice, "user");

        assert!(
            check_permission(&f.db, &session, ResourceKind::Profile, &f.alice.to_string())
                .allowed
        );
        assert!(
            !check_permission(&f.db, &session, ResourceKind::Profile, &f.bob.to_string())
                .allowed
        );
    }

    #[test]
    fn file_allowed_only_for_owner() {
        let f = fixture();

        assert!(
            check_permission(&f.db, &session_for(f.alice, "user"), ResourceKind::File, "file-1")
                .allowed
        );
        assert!(
            !check_permission(&f.db, &session_for(f.bob, "user"), ResourceKind::File, "file-1")
                .allowed
        );
        assert_eq!(
            check_permission(
                &f.db,
                &session_for(f.alice, "user"),
                ResourceKind::File,
                "missing"
            )
            .reason
            .as_deref(),
            Some("file not found")
        );
    }

    #[test]
    fn admin_short_circuits_every_kind() {
        let f = fixture();
        let session = session_for(f.admin, "admin");

        for (kind, id) in [
            (ResourceKind::Post, "post-1"),
            (ResourceKind::Comment, "comment-1"),
            (ResourceKind::Chat, "chat-1"),
            (ResourceKind::File, "file-1"),
            (ResourceKind::Profile, "someone-else"),
            // Even missing resources: admin never reaches the lookup.
            (ResourceKind::Post, "missing"),
        ] {
            assert!(check_permission(&f.db, &session, kind, id).allowed);
        }
    }

    #[test]
    fn unauthenticated_is_denied_without_storage_access() {
        let f = fixture();

        // Break the storage layer: any lookup would now error, so an
        // "authentication required" reason proves no lookup happened.
        f.db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE comments; DROP TABLE posts;")?;
            Ok(())
        })
        .unwrap();

        for kind in [
            ResourceKind::Post,
            ResourceKind::Comment,
            ResourceKind::Chat,
            ResourceKind::Profile,
            ResourceKind::File,
        ] {
            let result = check_permission(&f.db, &Session::anonymous(), kind, "post-1");
            assert!(!result.allowed);
            assert_eq!(result.reason.as_deref(), Some(REASON_AUTH_REQUIRED));
        }
    }

    #[test]
    fn storage_fault_surfaces_generic_reason() {
        let f = fixture();
        f.db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE comments; DROP TABLE posts;")?;
            Ok(())
        })
        .unwrap();

        let result = check_permission(
            &f.db,
            &session_for(f.alice, "user"),
            ResourceKind::Post,
            "post-1",
        );
        assert!(!result.allowed);
        assert_eq!(result.reason.as_deref(), Some(REASON_CHECK_FAILED));
    }

    #[test]
    fn unknown_kind_string_is_denied() {
        let f = fixture();
        let result = check_named_permission(
            &f.db,
            &session_for(f.alice, "user"),
            "spaceship",
            "post-1",
        );
        assert!(!result.allowed);
        assert_eq!(result.reason.as_deref(), Some(REASON_UNKNOWN_RESOURCE));

        assert!(
            check_named_permission(&f.db, &session_for(f.alice, "user"), "post", "post-1").allowed
        );
    }
}
