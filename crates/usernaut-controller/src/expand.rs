//! Transitive member expansion over the group DAG.
//!
//! Depth-first traversal carrying a path-local visited set: re-entering a
//! node already on the current path contributes nothing, so cycles
//! terminate, while the same node reached via distinct non-cyclic paths is
//! expanded each time. The result concatenates `members.users` across
//! visited nodes in first-seen depth-first order, deduplicated.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::group::Group;
use crate::store::{GroupStore, StoreResult};

/// Expand the full member set of `group`.
pub async fn expand_members(
    store: &dyn GroupStore,
    namespace: &str,
    group: &Group,
) -> StoreResult<Vec<String>> {
    let mut path = HashSet::new();
    let mut seen = HashSet::new();
    let mut users = Vec::new();
    visit(store, namespace, group.clone(), &mut path, &mut seen, &mut users).await?;
    Ok(users)
}

fn visit<'a>(
    store: &'a dyn GroupStore,
    namespace: &'a str,
    group: Group,
    path: &'a mut HashSet<String>,
    seen: &'a mut HashSet<String>,
    users: &'a mut Vec<String>,
) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + 'a>> {
    Box::pin(async move {
        let name = group.metadata.name.clone().unwrap_or_default();

        // A node already on the current path yields the empty subset.
        if !path.insert(name.clone()) {
            return Ok(());
        }

        for user in &group.spec.members.users {
            if seen.insert(user.clone()) {
                users.push(user.clone());
            }
        }

        for child_name in &group.spec.members.groups {
            match store.get(namespace, child_name).await? {
                Some(child) => {
                    visit(store, namespace, child, path, seen, users).await?;
                }
                None => {
                    warn!(namespace, group = %name, child = %child_name, "referenced child group not found");
                }
            }
        }

        path.remove(&name);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{make_group, InMemoryGroupStore};

    #[tokio::test]
    async fn test_direct_users_only() {
        let store = InMemoryGroupStore::default();
        let group = make_group("a", &["u1", "u2"], &[]);
        store.insert(group.clone()).await;

        let users = expand_members(&store, "default", &group).await.unwrap();
        assert_eq!(users, vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn test_union_with_children() {
        let store = InMemoryGroupStore::default();
        let parent = make_group("parent", &["u1"], &["left", "right"]);
        store.insert(parent.clone()).await;
        store.insert(make_group("left", &["u2"], &[])).await;
        store.insert(make_group("right", &["u3", "u4"], &[])).await;

        let users = expand_members(&store, "default", &parent).await.unwrap();
        assert_eq!(users, vec!["u1", "u2", "u3", "u4"]);
    }

    #[tokio::test]
    async fn test_dedup_first_seen_depth_first_order() {
        let store = InMemoryGroupStore::default();
        let parent = make_group("parent", &["u2"], &["left", "right"]);
        store.insert(parent.clone()).await;
        store.insert(make_group("left", &["u1", "u2"], &[])).await;
        store.insert(make_group("right", &["u1", "u3"], &[])).await;

        let users = expand_members(&store, "default", &parent).await.unwrap();
        assert_eq!(users, vec!["u2", "u1", "u3"]);
    }

    #[tokio::test]
    async fn test_two_node_cycle_terminates() {
        let store = InMemoryGroupStore::default();
        let a = make_group("a", &["x"], &["b"]);
        store.insert(a.clone()).await;
        store.insert(make_group("b", &["y"], &["a"])).await;

        let users = expand_members(&store, "default", &a).await.unwrap();
        assert_eq!(users, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_self_cycle_terminates() {
        let store = InMemoryGroupStore::default();
        let a = make_group("a", &["x"], &["a"]);
        store.insert(a.clone()).await;

        let users = expand_members(&store, "default", &a).await.unwrap();
        assert_eq!(users, vec!["x"]);
    }

    #[tokio::test]
    async fn test_diamond_visits_shared_node_via_both_paths() {
        // a -> b -> d, a -> c -> d: d is not on either path twice, so both
        // traversals enter it; dedup keeps its users single.
        let store = InMemoryGroupStore::default();
        let a = make_group("a", &[], &["b", "c"]);
        store.insert(a.clone()).await;
        store.insert(make_group("b", &["u1"], &["d"])).await;
        store.insert(make_group("c", &["u2"], &["d"])).await;
        store.insert(make_group("d", &["u3"], &[])).await;

        let users = expand_members(&store, "default", &a).await.unwrap();
        assert_eq!(users, vec!["u1", "u3", "u2"]);
    }

    #[tokio::test]
    async fn test_missing_child_is_skipped() {
        let store = InMemoryGroupStore::default();
        let a = make_group("a", &["x"], &["ghost"]);
        store.insert(a.clone()).await;

        let users = expand_members(&store, "default", &a).await.unwrap();
        assert_eq!(users, vec!["x"]);
    }

    #[tokio::test]
    async fn test_longer_cycle_unions_simple_paths() {
        // a -> b -> c -> a, every node carrying one user.
        let store = InMemoryGroupStore::default();
        let a = make_group("a", &["ua"], &["b"]);
        store.insert(a.clone()).await;
        store.insert(make_group("b", &["ub"], &["c"])).await;
        store.insert(make_group("c", &["uc"], &["a"])).await;

        let users = expand_members(&store, "default", &a).await.unwrap();
        assert_eq!(users, vec!["ua", "ub", "uc"]);
    }
}
