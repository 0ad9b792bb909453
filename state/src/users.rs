//! User lookup helpers

use botbrain_core::{BrainError, BrainResult, SharedUser, User, UserId, UserMap, UserOptions};
use parking_lot::{MappedRwLockWriteGuard, RwLock, RwLockWriteGuard};
use std::sync::Arc;
use tracing::debug;

use crate::brain::Brain;

impl Brain {
    /// The live users mapping.
    ///
    /// Changes made through the guard are changes to the brain. Calling any
    /// other brain method while holding it deadlocks.
    pub fn users(&self) -> MappedRwLockWriteGuard<'_, UserMap<SharedUser>> {
        RwLockWriteGuard::map(self.data.write(), |data| &mut data.users)
    }

    /// Get the user for `id`, creating it from `options` if unknown.
    ///
    /// If `options.room` is given and differs from the stored user's room,
    /// the stored user is replaced by a fresh one built from `options`.
    pub fn user_for_id(&self, id: impl Into<UserId>, options: UserOptions) -> SharedUser {
        let id = id.into();
        let mut data = self.data.write();

        if let Some(existing) = data.users.get(&id) {
            let room_changed = match options.room.as_deref() {
                Some(room) => existing.read().room() != Some(room),
                None => false,
            };
            if !room_changed {
                return Arc::clone(existing);
            }
            debug!("User {} changed room, replacing record", id);
        }

        let user = Arc::new(RwLock::new(User::new(id.clone(), options)));
        data.users.insert(id, Arc::clone(&user));
        user
    }

    /// Case-insensitive exact name match. With duplicate names the last
    /// user in enumeration order wins.
    pub fn user_for_name(&self, name: &str) -> BrainResult<Option<SharedUser>> {
        let wanted = name.to_lowercase();
        let data = self.data.read();

        let mut found = None;
        for user in data.users.values() {
            if folded_name(&user.read())? == wanted {
                found = Some(Arc::clone(user));
            }
        }
        Ok(found)
    }

    /// Users whose name starts with `fuzzy_name`, ignoring case, in
    /// enumeration order
    pub fn users_for_raw_fuzzy_name(&self, fuzzy_name: &str) -> BrainResult<Vec<SharedUser>> {
        let prefix = fuzzy_name.to_lowercase();
        let data = self.data.read();

        let mut matches = Vec::new();
        for user in data.users.values() {
            if folded_name(&user.read())?.starts_with(&prefix) {
                matches.push(Arc::clone(user));
            }
        }
        Ok(matches)
    }

    /// Like [`Brain::users_for_raw_fuzzy_name`], but an exact match returns
    /// only that user
    pub fn users_for_fuzzy_name(&self, fuzzy_name: &str) -> BrainResult<Vec<SharedUser>> {
        let matches = self.users_for_raw_fuzzy_name(fuzzy_name)?;
        let wanted = fuzzy_name.to_lowercase();

        let exact = matches
            .iter()
            .find(|user| user.read().name().map(str::to_lowercase).as_deref() == Some(wanted.as_str()));

        match exact {
            Some(user) => Ok(vec![Arc::clone(user)]),
            None => Ok(matches),
        }
    }
}

fn folded_name(user: &User) -> BrainResult<String> {
    user.name()
        .map(str::to_lowercase)
        .ok_or_else(|| BrainError::MissingUserName(user.id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::user_map;
    use botbrain_core::StoredData;

    fn names(users: &[SharedUser]) -> Vec<String> {
        users
            .iter()
            .map(|u| u.read().name().unwrap_or_default().to_string())
            .collect()
    }

    fn brain_with(names: &[&str]) -> Brain {
        let brain = Brain::default();
        for (i, name) in names.iter().enumerate() {
            brain.user_for_id(i as u64 + 1, UserOptions::new().name(*name));
        }
        brain
    }

    #[test]
    fn test_user_for_id_creates_once() {
        let brain = Brain::default();
        let first = brain.user_for_id("42", UserOptions::new().room("r1"));
        let second = brain.user_for_id("42", UserOptions::new().room("r1"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.read().name(), Some("42"));
        assert_eq!(brain.users().len(), 1);
    }

    #[test]
    fn test_user_for_id_without_room_keeps_user() {
        let brain = Brain::default();
        let first = brain.user_for_id("42", UserOptions::new().room("r1"));
        let second = brain.user_for_id("42", UserOptions::new());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_room_change_replaces_user() {
        let brain = Brain::default();
        let first = brain.user_for_id("42", UserOptions::new().room("r1"));
        first.write().set_field("karma", 10);

        let moved = brain.user_for_id("42", UserOptions::new().room("r2"));

        assert!(!Arc::ptr_eq(&first, &moved));
        assert_eq!(moved.read().room(), Some("r2"));
        assert_eq!(moved.read().field("karma"), None);

        let stored = brain.users().get("42").cloned().unwrap();
        assert!(Arc::ptr_eq(&stored, &moved));
    }

    #[test]
    fn test_numeric_ids_share_key() {
        let brain = Brain::default();
        let by_number = brain.user_for_id(7u64, UserOptions::new());
        let by_text = brain.user_for_id("7", UserOptions::new());
        assert!(Arc::ptr_eq(&by_number, &by_text));
    }

    #[test]
    fn test_users_guard_is_live() {
        let brain = brain_with(&["Ann"]);
        brain.users().remove("1");
        assert!(brain.user_for_name("ann").unwrap().is_none());
    }

    #[test]
    fn test_user_for_name_ignores_case() {
        let brain = brain_with(&["BOB", "Alice"]);
        let bob = brain.user_for_name("bob").unwrap().unwrap();
        assert_eq!(bob.read().name(), Some("BOB"));
        assert!(brain.user_for_name("carol").unwrap().is_none());
    }

    #[test]
    fn test_user_for_name_last_duplicate_wins() {
        let brain = brain_with(&["Sam", "sam"]);
        let sam = brain.user_for_name("SAM").unwrap().unwrap();
        assert_eq!(sam.read().id, UserId::from("2"));
    }

    #[test]
    fn test_raw_fuzzy_returns_all_prefix_matches_in_order() {
        let brain = brain_with(&["Alice", "Bob", "Al", "albert"]);
        let found = brain.users_for_raw_fuzzy_name("Al").unwrap();
        assert_eq!(names(&found), vec!["Alice", "Al", "albert"]);
    }

    #[test]
    fn test_fuzzy_prefers_exact_match() {
        let brain = brain_with(&["Alice", "Al", "Albert"]);
        let found = brain.users_for_fuzzy_name("al").unwrap();
        assert_eq!(names(&found), vec!["Al"]);
    }

    #[test]
    fn test_fuzzy_without_exact_returns_prefix_matches() {
        let brain = brain_with(&["Alice", "Albert", "Bob"]);
        let found = brain.users_for_fuzzy_name("Al").unwrap();
        assert_eq!(names(&found), vec!["Alice", "Albert"]);
        assert!(brain.users_for_fuzzy_name("zed").unwrap().is_empty());
    }

    #[test]
    fn test_nameless_user_faults_name_queries() {
        let brain = brain_with(&["Ann"]);
        let nameless: User = serde_json::from_str(r#"{"id": "9"}"#).unwrap();
        let mut users = brain.snapshot().users;
        users.insert(nameless.id.clone(), nameless);
        brain.merge_data(StoredData::default().with_users(users));

        assert!(matches!(
            brain.user_for_name("ann"),
            Err(BrainError::MissingUserName(id)) if id == "9"
        ));
        assert!(brain.users_for_raw_fuzzy_name("a").is_err());
        assert!(brain.users_for_fuzzy_name("a").is_err());
    }

    #[test]
    fn test_merged_users_are_queryable() {
        let brain = Brain::default();
        let users = user_map(vec![
            User::new(UserId::from("a"), UserOptions::new().name("Zoe")),
            User::new(UserId::from("b"), UserOptions::new().name("Zack")),
        ]);
        brain.merge_data(StoredData::default().with_users(users));

        let found = brain.users_for_raw_fuzzy_name("z").unwrap();
        assert_eq!(names(&found), vec!["Zoe", "Zack"]);
    }
}
