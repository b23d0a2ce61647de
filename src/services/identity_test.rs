use super::*;

fn temp_store_path() -> PathBuf {
    std::env::temp_dir().join(format!("vibeboard-identity-{}", uuid::Uuid::new_v4())).join("identity.json")
}

struct FailingStore;

impl LocalStore for FailingStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), LocalStoreError> {
        Err(std::io::Error::other("disk full").into())
    }

    fn remove(&self, _key: &str) -> Result<(), LocalStoreError> {
        Err(std::io::Error::other("disk full").into())
    }
}

// =============================================================================
// color_for
// =============================================================================

#[test]
fn color_is_deterministic_palette_entry() {
    assert_eq!(color_for(""), "#3B82F6");
    assert_eq!(color_for("a"), "#EC4899");
    assert_eq!(color_for("user-42"), "#06B6D4");
    assert_eq!(color_for("user-42"), color_for("user-42"));
}

#[test]
fn color_handles_negative_wrapped_hash() {
    assert_eq!(color_for("6f1c3e2a-9b4d-4e8f-a1b2-c3d4e5f60718"), "#EC4899");
}

// =============================================================================
// display names
// =============================================================================

#[test]
fn display_name_prefers_name_then_email_local_part() {
    let mut user = AuthenticatedUser {
        id: "u1".into(),
        name: Some("Grace".into()),
        email: Some("grace@example.com".into()),
    };
    assert_eq!(display_name_for(&user), "Grace");
    user.name = Some("   ".into());
    assert_eq!(display_name_for(&user), "grace");
    user.email = None;
    assert_eq!(display_name_for(&user), "Anonymous");
}

// =============================================================================
// resolve
// =============================================================================

#[test]
fn authenticated_identity_is_returned_verbatim() {
    let store = MemoryLocalStore::new();
    let user = AuthenticatedUser { id: "github|1".into(), name: Some("Linus".into()), email: None };
    let actor = resolve(Some(&user), &store);
    assert_eq!(actor.id, "github|1");
    assert_eq!(actor.display_name, "Linus");
    assert_eq!(actor.color, color_for("github|1"));
    assert_eq!(store.get(ANONYMOUS_ID_KEY), None);
}

#[test]
fn anonymous_id_is_generated_once_and_reused() {
    let store = MemoryLocalStore::new();
    let first = resolve(None, &store);
    let second = resolve(None, &store);
    assert_eq!(first, second);
    assert_eq!(first.display_name, "Anonymous");
    assert_eq!(store.get(ANONYMOUS_ID_KEY).as_deref(), Some(first.id.as_str()));
}

#[test]
fn anonymous_id_is_uuid_v4_shaped() {
    let id = generate_anonymous_id();
    let parsed = uuid::Uuid::parse_str(&id).expect("valid uuid");
    assert_eq!(parsed.get_version_num(), 4);
    assert_eq!(parsed.get_variant(), uuid::Variant::RFC4122);
    assert_eq!(id.len(), 36);
    assert_ne!(generate_anonymous_id(), id);
}

#[test]
fn authentication_clears_stored_anonymous_id() {
    let store = MemoryLocalStore::new();
    let anon = resolve(None, &store);
    let user = AuthenticatedUser { id: "u1".into(), ..AuthenticatedUser::default() };
    resolve(Some(&user), &store);
    assert_eq!(store.get(ANONYMOUS_ID_KEY), None);
    assert_ne!(resolve(None, &store).id, anon.id);
}

#[test]
fn failing_store_still_resolves() {
    let actor = resolve(None, &FailingStore);
    assert_eq!(actor.id.len(), 36);
    let user = AuthenticatedUser { id: "u1".into(), ..AuthenticatedUser::default() };
    assert_eq!(resolve(Some(&user), &FailingStore).id, "u1");
}

// =============================================================================
// FileLocalStore
// =============================================================================

#[test]
fn file_store_persists_across_instances() {
    let path = temp_store_path();
    let first = resolve(None, &FileLocalStore::new(&path));
    let second = resolve(None, &FileLocalStore::new(&path));
    assert_eq!(first.id, second.id);
    if let Some(dir) = path.parent() {
        std::fs::remove_dir_all(dir).expect("cleanup");
    }
}

#[test]
fn file_store_missing_file_reads_empty() {
    let store = FileLocalStore::new(temp_store_path());
    assert_eq!(store.get("anything"), None);
    store.remove("anything").expect("removing from a missing file is fine");
}

#[test]
fn file_store_corrupt_file_behaves_empty_for_reads() {
    let path = temp_store_path();
    let dir = path.parent().expect("parent").to_path_buf();
    std::fs::create_dir_all(&dir).expect("mkdir");
    std::fs::write(&path, "{not json").expect("write");
    let store = FileLocalStore::new(&path);
    assert_eq!(store.get(ANONYMOUS_ID_KEY), None);
    store.set(ANONYMOUS_ID_KEY, "abc").expect("set overwrites corrupt file");
    assert_eq!(store.get(ANONYMOUS_ID_KEY).as_deref(), Some("abc"));
    std::fs::remove_dir_all(dir).expect("cleanup");
}
