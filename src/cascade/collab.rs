

use super::graph::{FilterTemplate, GraphError, OwnershipGraph};


pub const USER: &str = "user";
pub const WORKSPACE: &str = "workspace";
pub const WORKSPACE_SETTING: &str = "workspace_setting";
pub const SPACE: &str = "space";
pub const LIST: &str = "list";
pub const CARD: &str = "card";
pub const CHECKLIST: &str = "checklist";
pub const COMMENT_CHAT: &str = "comment_chat";
pub const SPACE_CHAT: &str = "space_chat";
pub const SPACE_FILE: &str = "space_file";
pub const CALL: &str = "call";
pub const NOTIFICATION: &str = "notification";
pub const SUBSCRIPTION: &str = "subscription";
pub const USER_SESSION: &str = "user_session";


pub const USERS: &str = "users";
pub const WORKSPACES: &str = "workspaces";
pub const WORKSPACE_SETTINGS: &str = "workspacesettings";
pub const SPACES: &str = "spaces";
pub const LISTS: &str = "lists";
pub const CARDS: &str = "cards";
pub const CHECKLISTS: &str = "checklists";
pub const COMMENT_CHATS: &str = "commentchats";
pub const SPACE_CHATS: &str = "spacechats";
pub const SPACE_FILES: &str = "spacefiles";
pub const CALLS: &str = "calls";
pub const NOTIFICATIONS: &str = "notifications";
pub const SUBSCRIPTIONS: &str = "subscriptions";
pub const USER_SESSIONS: &str = "usersessions";


pub const SPACE_MEMBERS: &str = "members";
pub const TEAM_MEMBERS: &str = "teamMembers";
pub const WORKSPACE_REF: &str = "workSpaceRef";
pub const MANAGER_ROLE: &str = "manager";
pub const OWNER_ROLE: &str = "owner";


/// Ownership graph of the collaboration backend.
///
/// A user who manages a space takes the whole space down with them: lists,
/// cards and their checklists and comments, chat, files and calls. Cards,
/// checklists and comments also hang off the space through `spaceRef`, so a
/// record detached from its list still follows its space. Any other space
/// role, and every workspace role, only detaches the user. Settings,
/// notifications, subscriptions and sessions are keyed by the user directly.
pub fn collaboration_graph() -> Result<OwnershipGraph, GraphError> {
    OwnershipGraph::builder()
        .entity(USER, USERS)
        .entity(WORKSPACE, WORKSPACES)
        .entity(WORKSPACE_SETTING, WORKSPACE_SETTINGS)
        .entity(SPACE, SPACES)
        .entity(LIST, LISTS)
        .entity(CARD, CARDS)
        .entity(CHECKLIST, CHECKLISTS)
        .entity(COMMENT_CHAT, COMMENT_CHATS)
        .entity(SPACE_CHAT, SPACE_CHATS)
        .entity(SPACE_FILE, SPACE_FILES)
        .entity(CALL, CALLS)
        .entity(NOTIFICATION, NOTIFICATIONS)
        .entity(SUBSCRIPTION, SUBSCRIPTIONS)
        .entity(USER_SESSION, USER_SESSIONS)
        .owns(USER, SPACE, FilterTemplate::membership(SPACE_MEMBERS, Some(&[MANAGER_ROLE])))
        .member(USER, SPACE, FilterTemplate::membership(SPACE_MEMBERS, None))
        .member(USER, WORKSPACE, FilterTemplate::membership(TEAM_MEMBERS, None))
        .owns(USER, WORKSPACE_SETTING, FilterTemplate::field("user"))
        .owns(USER, NOTIFICATION, FilterTemplate::field("user"))
        .owns(USER, SUBSCRIPTION, FilterTemplate::field("user"))
        .owns(USER, USER_SESSION, FilterTemplate::field("user"))
        .owns(SPACE, LIST, FilterTemplate::field("spaceRef"))
        .owns(SPACE, SPACE_CHAT, FilterTemplate::field("to"))
        .owns(SPACE, SPACE_FILE, FilterTemplate::field("spaceRef"))
        .owns(SPACE, CALL, FilterTemplate::field("space"))
        .owns(SPACE, CARD, FilterTemplate::field("spaceRef"))
        .owns(SPACE, CHECKLIST, FilterTemplate::field("spaceRef"))
        .owns(SPACE, COMMENT_CHAT, FilterTemplate::field("spaceRef"))
        .owns(LIST, CARD, FilterTemplate::field("listRef"))
        .owns(CARD, CHECKLIST, FilterTemplate::field("cardRef"))
        .owns(CARD, COMMENT_CHAT, FilterTemplate::field("cardRef"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::graph::{EdgeKind, EntityType};

    #[test]
    fn test_collaboration_graph_is_valid() {
        let graph = collaboration_graph().unwrap();
        assert_eq!(graph.entities().count(), 14);

        let user = EntityType::new(USER);
        let aggregates: Vec<_> = graph
            .edges_from(&user)
            .filter(|edge| graph.is_aggregate_edge(edge))
            .map(|edge| edge.child.to_string())
            .collect();
        assert_eq!(aggregates, vec![SPACE.to_string()]);

        assert!(graph
            .edges_from(&EntityType::new(WORKSPACE))
            .next()
            .is_none());
        assert!(graph
            .edges()
            .iter()
            .filter(|edge| edge.child == EntityType::new(WORKSPACE))
            .all(|edge| edge.kind == EdgeKind::Member));
    }
}
