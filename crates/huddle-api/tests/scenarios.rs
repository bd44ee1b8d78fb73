use huddle_api::auth::create_account;
use huddle_api::files::FileUrls;
use huddle_api::messages::MessageQuery;
use huddle_api::session::Session;
use huddle_api::{
    ApiError, channels, conversations, members, messages, reactions, workspaces,
};
use huddle_db::Database;
use huddle_types::api::{CreateMessageRequest, ForwardMessageRequest};
use huddle_types::models::{OriginKind, Role};
use uuid::Uuid;

const HELLO: &str = r#"{"ops":[{"insert":"hello\n"}]}"#;

fn register(db: &Database, name: &str) -> Uuid {
    db.with_tx(|conn| {
        let mut s = Session::new(conn, None);
        let email = format!("{}@example.com", name.to_lowercase());
        create_account(&mut s, name, &email, "not-a-real-hash".into(), None).map(|u| u.id)
    })
    .unwrap()
}

fn act<T>(
    db: &Database,
    user: Uuid,
    f: impl FnOnce(&mut Session<'_>) -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    db.with_tx(|conn| {
        let mut s = Session::new(conn, Some(user));
        f(&mut s)
    })
}

fn read<T>(db: &Database, user: Option<Uuid>, f: impl FnOnce(&Session<'_>) -> Result<T, ApiError>) -> T {
    db.with_conn(|conn| f(&Session::new(conn, user))).unwrap()
}

fn urls() -> FileUrls {
    FileUrls::new("http://localhost:3000")
}

fn post(workspace_id: Uuid, channel_id: Option<Uuid>, parent: Option<Uuid>) -> CreateMessageRequest {
    CreateMessageRequest {
        body: HELLO.to_string(),
        workspace_id,
        channel_id,
        conversation_id: None,
        parent_message_id: parent,
        image: None,
    }
}

fn channel_query(channel_id: Uuid) -> MessageQuery {
    MessageQuery {
        channel_id: Some(channel_id),
        ..Default::default()
    }
}

struct Acme {
    db: Database,
    alice: Uuid,
    bob: Uuid,
    workspace: Uuid,
    general: Uuid,
}

/// Alice creates "Acme", Bob joins through the join code.
fn acme() -> Acme {
    let db = Database::open_in_memory().unwrap();
    let alice = register(&db, "Alice");
    let bob = register(&db, "Bob");

    let workspace = act(&db, alice, |s| workspaces::create(s, "Acme")).unwrap();
    let code = read(&db, Some(alice), |s| workspaces::get_by_id(s, workspace))
        .unwrap()
        .join_code;
    act(&db, bob, |s| workspaces::join(s, workspace, &code.to_uppercase())).unwrap();

    let general = read(&db, Some(alice), |s| channels::list(s, workspace))[0].id;
    Acme {
        db,
        alice,
        bob,
        workspace,
        general,
    }
}

fn member_id(acme: &Acme, user: Uuid) -> Uuid {
    read(&acme.db, Some(user), |s| members::current(s, acme.workspace))
        .unwrap()
        .id
}

#[test]
fn creating_a_workspace_seeds_admin_and_general() {
    let acme = acme();

    let admin = read(&acme.db, Some(acme.alice), |s| members::current(s, acme.workspace)).unwrap();
    assert_eq!(admin.role, Role::Admin);

    let joined = read(&acme.db, Some(acme.bob), |s| members::current(s, acme.workspace)).unwrap();
    assert_eq!(joined.role, Role::Member);
    assert_eq!(joined.name, "Bob");

    let names: Vec<String> = read(&acme.db, Some(acme.bob), |s| channels::list(s, acme.workspace))
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["general"]);
}

#[test]
fn joining_twice_is_rejected() {
    let acme = acme();
    let code = read(&acme.db, Some(acme.bob), |s| workspaces::get_by_id(s, acme.workspace))
        .unwrap()
        .join_code;

    let err = act(&acme.db, acme.bob, |s| workspaces::join(s, acme.workspace, &code)).unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[test]
fn rotated_join_code_invalidates_the_old_one() {
    let acme = acme();
    let carol = register(&acme.db, "Carol");
    let old = read(&acme.db, Some(acme.alice), |s| workspaces::get_by_id(s, acme.workspace))
        .unwrap()
        .join_code;

    let err = act(&acme.db, acme.bob, |s| workspaces::new_join_code(s, acme.workspace)).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    act(&acme.db, acme.alice, |s| workspaces::new_join_code(s, acme.workspace)).unwrap();

    let err = act(&acme.db, carol, |s| workspaces::join(s, acme.workspace, &old)).unwrap_err();
    assert_eq!(err.to_string(), "Invalid join code");
}

#[test]
fn message_thread_and_forward_scenario() {
    let acme = acme();
    let urls = urls();

    let hello = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), None))
    })
    .unwrap();

    let page = read(&acme.db, Some(acme.bob), |s| {
        messages::get(s, &urls, channel_query(acme.general))
    });
    assert!(page.is_done);
    assert_eq!(page.page.len(), 1);
    let first = &page.page[0];
    assert_eq!(first.id, hello);
    assert_eq!(first.user.id, acme.alice);
    assert!(first.reactions.is_empty());
    assert_eq!(first.thread.count, 0);

    // Thread reply without an explicit location.
    act(&acme.db, acme.bob, |s| {
        messages::create(s, post(acme.workspace, None, Some(hello)))
    })
    .unwrap();

    let page = read(&acme.db, Some(acme.bob), |s| {
        messages::get(s, &urls, channel_query(acme.general))
    });
    assert_eq!(page.page.len(), 1);
    assert_eq!(page.page[0].thread.count, 1);
    assert_eq!(page.page[0].thread.name.as_deref(), Some("Bob"));

    let thread = read(&acme.db, Some(acme.alice), |s| {
        messages::get(
            s,
            &urls,
            MessageQuery {
                parent_message_id: Some(hello),
                ..Default::default()
            },
        )
    });
    assert_eq!(thread.page.len(), 1);

    // Forward to Bob's DM.
    let alice_member = member_id(&acme, acme.alice);
    let bob_member = member_id(&acme, acme.bob);
    let forwarded = act(&acme.db, acme.alice, |s| {
        messages::forward(
            s,
            hello,
            ForwardMessageRequest {
                workspace_id: acme.workspace,
                original_author_member_id: alice_member,
                destination_channel_id: None,
                destination_member_id: Some(bob_member),
            },
        )
    })
    .unwrap();

    let conversation = act(&acme.db, acme.bob, |s| {
        conversations::create_or_get(s, acme.workspace, alice_member)
    })
    .unwrap();

    let view = read(&acme.db, Some(acme.bob), |s| messages::get_by_id(s, &urls, forwarded)).unwrap();
    assert_eq!(view.conversation_id, Some(conversation));
    assert_eq!(view.channel_id, None);
    let origin = view.forwarded_from.unwrap();
    assert_eq!(origin.origin_kind, OriginKind::Channel);
    assert_eq!(origin.origin_id, acme.general);
    assert_eq!(origin.origin_name, "general");
    assert_eq!(origin.author_member_id, alice_member);
    assert_eq!(origin.author_name, "Alice");
    assert_eq!(origin.body, HELLO);

    // A forwarded copy is terminal, whatever the destination.
    for (channel, member) in [(Some(acme.general), None), (None, Some(alice_member))] {
        let err = act(&acme.db, acme.bob, |s| {
            messages::forward(
                s,
                forwarded,
                ForwardMessageRequest {
                    workspace_id: acme.workspace,
                    original_author_member_id: alice_member,
                    destination_channel_id: channel,
                    destination_member_id: member,
                },
            )
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Can not forward a forwarded message");
    }

    let err = act(&acme.db, acme.alice, |s| messages::update(s, forwarded, HELLO)).unwrap_err();
    assert_eq!(err.to_string(), "Can not edit forwarded message");
}

#[test]
fn forward_needs_exactly_one_destination() {
    let acme = acme();
    let hello = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), None))
    })
    .unwrap();
    let alice_member = member_id(&acme, acme.alice);
    let bob_member = member_id(&acme, acme.bob);

    for (channel, member) in [(None, None), (Some(acme.general), Some(bob_member))] {
        let err = act(&acme.db, acme.alice, |s| {
            messages::forward(
                s,
                hello,
                ForwardMessageRequest {
                    workspace_id: acme.workspace,
                    original_author_member_id: alice_member,
                    destination_channel_id: channel,
                    destination_member_id: member,
                },
            )
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::Invalid(_)));
    }
}

#[test]
fn conversation_pair_is_unordered() {
    let acme = acme();
    let alice_member = member_id(&acme, acme.alice);
    let bob_member = member_id(&acme, acme.bob);

    let one = act(&acme.db, acme.alice, |s| {
        conversations::create_or_get(s, acme.workspace, bob_member)
    })
    .unwrap();
    let two = act(&acme.db, acme.bob, |s| {
        conversations::create_or_get(s, acme.workspace, alice_member)
    })
    .unwrap();
    assert_eq!(one, two);
}

#[test]
fn conversations_reject_members_of_other_workspaces() {
    let acme = acme();
    let dave = register(&acme.db, "Dave");
    let other = act(&acme.db, dave, |s| workspaces::create(s, "Other Co")).unwrap();
    let dave_member = read(&acme.db, Some(dave), |s| members::current(s, other))
        .unwrap()
        .id;

    let err = act(&acme.db, acme.alice, |s| {
        conversations::create_or_get(s, acme.workspace, dave_member)
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "Member not found");
}

#[test]
fn reaction_toggle_is_a_pair() {
    let acme = acme();
    let urls = urls();
    let hello = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), None))
    })
    .unwrap();

    let added = act(&acme.db, acme.bob, |s| reactions::toggle(s, hello, "👍")).unwrap();
    assert!(added.added);

    let view = read(&acme.db, Some(acme.alice), |s| messages::get_by_id(s, &urls, hello)).unwrap();
    assert_eq!(view.reactions.len(), 1);
    assert_eq!(view.reactions[0].count, 1);
    assert_eq!(view.reactions[0].member_ids, vec![member_id(&acme, acme.bob)]);

    let removed = act(&acme.db, acme.bob, |s| reactions::toggle(s, hello, "👍")).unwrap();
    assert!(!removed.added);
    assert_eq!(removed.id, added.id);

    let view = read(&acme.db, Some(acme.alice), |s| messages::get_by_id(s, &urls, hello)).unwrap();
    assert!(view.reactions.is_empty());
}

#[test]
fn only_the_author_edits_or_deletes() {
    let acme = acme();
    let hello = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), None))
    })
    .unwrap();

    let err = act(&acme.db, acme.bob, |s| messages::update(s, hello, HELLO)).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    let err = act(&acme.db, acme.bob, |s| messages::remove(s, hello)).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let edited = r#"{"ops":[{"insert":"hello, edited\n"}]}"#;
    act(&acme.db, acme.alice, |s| messages::update(s, hello, edited)).unwrap();
    let view = read(&acme.db, Some(acme.bob), |s| messages::get_by_id(s, &urls(), hello)).unwrap();
    assert_eq!(view.body, edited);
    assert!(view.updated_at.is_some());

    act(&acme.db, acme.alice, |s| messages::remove(s, hello)).unwrap();
    assert!(read(&acme.db, Some(acme.bob), |s| messages::get_by_id(s, &urls(), hello)).is_none());
}

#[test]
fn message_creation_validates_location() {
    let acme = acme();

    let err = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, None, Some(Uuid::new_v4())))
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "Parent message not found");

    let err = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, None, None))
    })
    .unwrap_err();
    assert!(matches!(err, ApiError::Invalid(_)));

    let err = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, Some(Uuid::new_v4()), None))
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "Channel not found");

    let mut plain = post(acme.workspace, Some(acme.general), None);
    plain.body = "hello".to_string();
    let err = act(&acme.db, acme.alice, |s| messages::create(s, plain)).unwrap_err();
    assert!(matches!(err, ApiError::Invalid(_)));
}

#[test]
fn member_removal_rules() {
    let acme = acme();
    let alice_member = member_id(&acme, acme.alice);
    let bob_member = member_id(&acme, acme.bob);

    let err = act(&acme.db, acme.alice, |s| members::remove(s, alice_member)).unwrap_err();
    assert_eq!(err.to_string(), "Can not remove self if self is an admin");

    let err = act(&acme.db, acme.bob, |s| members::remove(s, alice_member)).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    act(&acme.db, acme.alice, |s| members::update(s, bob_member, Role::Admin)).unwrap();
    let err = act(&acme.db, acme.alice, |s| members::remove(s, bob_member)).unwrap_err();
    assert_eq!(err.to_string(), "Admin can not be removed");
}

#[test]
fn last_admin_can_not_be_demoted() {
    let acme = acme();
    let alice_member = member_id(&acme, acme.alice);

    let err = act(&acme.db, acme.alice, |s| members::update(s, alice_member, Role::Member))
        .unwrap_err();
    assert!(matches!(err, ApiError::Invalid(_)));
}

#[test]
fn removing_a_member_cascades() {
    let acme = acme();
    let urls = urls();
    let carol = register(&acme.db, "Carol");
    let code = read(&acme.db, Some(acme.alice), |s| workspaces::get_by_id(s, acme.workspace))
        .unwrap()
        .join_code;
    act(&acme.db, carol, |s| workspaces::join(s, acme.workspace, &code)).unwrap();

    let alice_member = member_id(&acme, acme.alice);
    let carol_member = member_id(&acme, carol);

    let hello = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), None))
    })
    .unwrap();
    let carols = act(&acme.db, carol, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), None))
    })
    .unwrap();
    act(&acme.db, carol, |s| reactions::toggle(s, hello, "🎉")).unwrap();
    act(&acme.db, acme.alice, |s| reactions::toggle(s, carols, "👍")).unwrap();
    let dm = act(&acme.db, carol, |s| {
        conversations::create_or_get(s, acme.workspace, alice_member)
    })
    .unwrap();

    let err = act(&acme.db, acme.bob, |s| members::remove(s, carol_member)).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    act(&acme.db, acme.alice, |s| members::remove(s, carol_member)).unwrap();

    let page = read(&acme.db, Some(acme.alice), |s| {
        messages::get(s, &urls, channel_query(acme.general))
    });
    assert_eq!(page.page.len(), 1);
    assert_eq!(page.page[0].id, hello);
    assert!(page.page[0].reactions.is_empty());

    let orphans: i64 = acme
        .db
        .with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM reactions WHERE member_id = ?1 OR message_id = ?2",
                [carol_member, carols],
                |r| r.get(0),
            )
            .map_err(anyhow::Error::from)
        })
        .unwrap();
    assert_eq!(orphans, 0);

    let conversation_left: i64 = acme
        .db
        .with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM conversations WHERE id = ?1", [dm], |r| {
                r.get(0)
            })
            .map_err(anyhow::Error::from)
        })
        .unwrap();
    assert_eq!(conversation_left, 0);
    assert!(read(&acme.db, Some(carol), |s| members::current(s, acme.workspace)).is_none());
}

#[test]
fn non_admin_members_may_leave() {
    let acme = acme();
    let bob_member = member_id(&acme, acme.bob);

    act(&acme.db, acme.bob, |s| members::remove(s, bob_member)).unwrap();
    assert!(read(&acme.db, Some(acme.bob), |s| workspaces::get_by_id(s, acme.workspace)).is_none());
}

#[test]
fn removing_a_channel_cascades_to_messages_and_replies() {
    let acme = acme();
    let random = act(&acme.db, acme.alice, |s| channels::create(s, acme.workspace, "Random Stuff"))
        .unwrap();
    let channel = read(&acme.db, Some(acme.bob), |s| channels::get_by_id(s, random)).unwrap();
    assert_eq!(channel.name, "random-stuff");

    let root = act(&acme.db, acme.bob, |s| {
        messages::create(s, post(acme.workspace, Some(random), None))
    })
    .unwrap();
    let reply = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, None, Some(root)))
    })
    .unwrap();
    act(&acme.db, acme.alice, |s| reactions::toggle(s, reply, "👀")).unwrap();

    let err = act(&acme.db, acme.bob, |s| channels::remove(s, random)).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    act(&acme.db, acme.alice, |s| channels::remove(s, random)).unwrap();

    let remaining: i64 = acme
        .db
        .with_conn(|conn| {
            conn.query_row(
                "SELECT (SELECT COUNT(*) FROM messages WHERE id IN (?1, ?2))
                      + (SELECT COUNT(*) FROM reactions WHERE message_id = ?2)",
                [root, reply],
                |r| r.get(0),
            )
            .map_err(anyhow::Error::from)
        })
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn removing_a_workspace_removes_everything_scoped_to_it() {
    let acme = acme();
    let bob_member = member_id(&acme, acme.bob);
    let hello = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), None))
    })
    .unwrap();
    act(&acme.db, acme.bob, |s| reactions::toggle(s, hello, "👍")).unwrap();
    act(&acme.db, acme.alice, |s| {
        conversations::create_or_get(s, acme.workspace, bob_member)
    })
    .unwrap();

    let err = act(&acme.db, acme.bob, |s| workspaces::remove(s, acme.workspace)).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    act(&acme.db, acme.alice, |s| workspaces::remove(s, acme.workspace)).unwrap();

    for table in ["members", "channels", "conversations", "messages", "reactions"] {
        let count: i64 = acme
            .db
            .with_conn(|conn| {
                conn.query_row(
                    &format!("SELECT COUNT(*) FROM {table} WHERE workspace_id = ?1"),
                    [acme.workspace],
                    |r| r.get(0),
                )
                .map_err(anyhow::Error::from)
            })
            .unwrap();
        assert_eq!(count, 0, "{table} still holds rows");
    }
    assert!(read(&acme.db, Some(acme.alice), |s| workspaces::list(s)).is_empty());
}

#[test]
fn queries_degrade_while_mutations_fail() {
    let acme = acme();
    let urls = urls();
    let eve = register(&acme.db, "Eve");

    act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), None))
    })
    .unwrap();

    // Outsider: empty or null, never an error.
    let page = read(&acme.db, Some(eve), |s| messages::get(s, &urls, channel_query(acme.general)));
    assert!(page.page.is_empty());
    assert!(page.is_done);
    assert!(read(&acme.db, Some(eve), |s| channels::list(s, acme.workspace)).is_empty());
    assert!(read(&acme.db, Some(eve), |s| members::get_all(s, acme.workspace)).is_empty());
    assert!(read(&acme.db, None, |s| workspaces::get_by_id(s, acme.workspace)).is_none());

    let info = read(&acme.db, Some(eve), |s| workspaces::get_info(s, acme.workspace)).unwrap();
    assert_eq!(info.name, "Acme");
    assert!(!info.is_member);

    let err = act(&acme.db, eve, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), None))
    })
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = acme
        .db
        .with_tx(|conn| {
            let mut s = Session::new(conn, None);
            workspaces::create(&mut s, "Anonymous")
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated));
}

#[test]
fn dm_messages_are_private_to_participants() {
    let acme = acme();
    let urls = urls();
    let carol = register(&acme.db, "Carol");
    let code = read(&acme.db, Some(acme.alice), |s| workspaces::get_by_id(s, acme.workspace))
        .unwrap()
        .join_code;
    act(&acme.db, carol, |s| workspaces::join(s, acme.workspace, &code)).unwrap();

    let bob_member = member_id(&acme, acme.bob);
    let dm = act(&acme.db, acme.alice, |s| {
        conversations::create_or_get(s, acme.workspace, bob_member)
    })
    .unwrap();

    let mut request = post(acme.workspace, None, None);
    request.conversation_id = Some(dm);
    let root = act(&acme.db, acme.alice, |s| messages::create(s, request)).unwrap();

    // A reply in a DM inherits the conversation from its parent.
    let reply = act(&acme.db, acme.bob, |s| {
        messages::create(s, post(acme.workspace, None, Some(root)))
    })
    .unwrap();
    let reply_view = read(&acme.db, Some(acme.bob), |s| messages::get_by_id(s, &urls, reply)).unwrap();
    assert_eq!(reply_view.conversation_id, Some(dm));

    let dm_query = || MessageQuery {
        conversation_id: Some(dm),
        ..Default::default()
    };
    assert_eq!(read(&acme.db, Some(acme.bob), |s| messages::get(s, &urls, dm_query())).page.len(), 1);
    assert!(read(&acme.db, Some(carol), |s| messages::get(s, &urls, dm_query())).page.is_empty());
    assert!(read(&acme.db, Some(carol), |s| messages::get_by_id(s, &urls, root)).is_none());

    let err = act(&acme.db, carol, |s| reactions::toggle(s, root, "👍")).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[test]
fn channel_pages_resume_from_the_cursor() {
    let acme = acme();
    let urls = urls();
    for _ in 0..25 {
        act(&acme.db, acme.alice, |s| {
            messages::create(s, post(acme.workspace, Some(acme.general), None))
        })
        .unwrap();
    }

    let first = read(&acme.db, Some(acme.bob), |s| {
        messages::get(s, &urls, channel_query(acme.general))
    });
    assert_eq!(first.page.len(), 20);
    assert!(!first.is_done);

    let second = read(&acme.db, Some(acme.bob), |s| {
        messages::get(
            s,
            &urls,
            MessageQuery {
                channel_id: Some(acme.general),
                cursor: first.continue_cursor.clone(),
                ..Default::default()
            },
        )
    });
    assert_eq!(second.page.len(), 5);
    assert!(second.is_done);
    assert!(second.continue_cursor.is_none());

    let mut seen: Vec<Uuid> = first.page.iter().chain(&second.page).map(|m| m.id).collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 25);
}

#[test]
fn search_matches_members_and_channels() {
    let acme = acme();
    act(&acme.db, acme.alice, |s| channels::create(s, acme.workspace, "bobsleigh")).unwrap();

    let results = read(&acme.db, Some(acme.alice), |s| members::search(s, acme.workspace, "BOB"));
    assert_eq!(results.members.len(), 1);
    assert_eq!(results.members[0].name, "Bob");
    assert_eq!(results.channels.len(), 1);
    assert_eq!(results.channels[0].name, "bobsleigh");

    let outsider = register(&acme.db, "Mallory");
    let hidden = read(&acme.db, Some(outsider), |s| members::search(s, acme.workspace, "bob"));
    assert!(hidden.members.is_empty() && hidden.channels.is_empty());
}

/// Registers `name` and joins Acme with the current join code.
fn join_acme(acme: &Acme, name: &str) -> Uuid {
    let user = register(&acme.db, name);
    let code = read(&acme.db, Some(acme.alice), |s| workspaces::get_by_id(s, acme.workspace))
        .unwrap()
        .join_code;
    act(&acme.db, user, |s| workspaces::join(s, acme.workspace, &code)).unwrap();
    user
}

/// Alice opens the Alice/Bob DM and posts into it.
fn alice_dm_message(acme: &Acme) -> (Uuid, Uuid) {
    let bob_member = member_id(acme, acme.bob);
    let dm = act(&acme.db, acme.alice, |s| {
        conversations::create_or_get(s, acme.workspace, bob_member)
    })
    .unwrap();
    let mut request = post(acme.workspace, None, None);
    request.conversation_id = Some(dm);
    let message = act(&acme.db, acme.alice, |s| messages::create(s, request)).unwrap();
    (dm, message)
}

#[test]
fn replies_stay_in_their_parent_location() {
    let acme = acme();
    let urls = urls();
    let carol = join_acme(&acme, "Carol");
    let (dm, root) = alice_dm_message(&acme);

    // Naming a channel does not get an outsider past the DM.
    let err = act(&acme.db, carol, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), Some(root)))
    })
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = act(&acme.db, carol, |s| {
        messages::create(s, post(acme.workspace, None, Some(root)))
    })
    .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    // Participants can not move a reply out of the DM either.
    let err = act(&acme.db, acme.bob, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), Some(root)))
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "A reply must be in the same location as its parent");

    let mut explicit = post(acme.workspace, None, Some(root));
    explicit.conversation_id = Some(dm);
    act(&acme.db, acme.bob, |s| messages::create(s, explicit)).unwrap();

    let view = read(&acme.db, Some(acme.alice), |s| messages::get_by_id(s, &urls, root)).unwrap();
    assert_eq!(view.thread.count, 1);
    assert_eq!(view.thread.name.as_deref(), Some("Bob"));

    // Channel threads: another channel is rejected, the parent's own is fine.
    let random = act(&acme.db, acme.alice, |s| channels::create(s, acme.workspace, "random"))
        .unwrap();
    let hello = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), None))
    })
    .unwrap();
    let err = act(&acme.db, carol, |s| {
        messages::create(s, post(acme.workspace, Some(random), Some(hello)))
    })
    .unwrap_err();
    assert!(matches!(err, ApiError::Invalid(_)));
    let reply = act(&acme.db, carol, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), Some(hello)))
    })
    .unwrap();

    let err = act(&acme.db, acme.bob, |s| {
        messages::create(s, post(acme.workspace, None, Some(reply)))
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "Can not reply to a thread reply");
}

#[test]
fn forwarding_to_a_channel_keeps_the_snapshot() {
    let acme = acme();
    let urls = urls();
    let alice_member = member_id(&acme, acme.alice);
    let bob_member = member_id(&acme, acme.bob);
    let random = act(&acme.db, acme.alice, |s| channels::create(s, acme.workspace, "random"))
        .unwrap();
    let hello = act(&acme.db, acme.alice, |s| {
        messages::create(s, post(acme.workspace, Some(acme.general), None))
    })
    .unwrap();

    let forwarded = act(&acme.db, acme.bob, |s| {
        messages::forward(
            s,
            hello,
            ForwardMessageRequest {
                workspace_id: acme.workspace,
                original_author_member_id: alice_member,
                destination_channel_id: Some(random),
                destination_member_id: None,
            },
        )
    })
    .unwrap();

    let view = read(&acme.db, Some(acme.alice), |s| messages::get_by_id(s, &urls, forwarded)).unwrap();
    assert_eq!(view.channel_id, Some(random));
    assert_eq!(view.conversation_id, None);
    assert_eq!(view.parent_message_id, None);
    assert_eq!(view.member.id, bob_member);
    assert_eq!(view.body, HELLO);

    let origin = view.forwarded_from.unwrap();
    assert_eq!(origin.message_id, hello);
    assert_eq!(origin.author_member_id, alice_member);
    assert_eq!(origin.author_name, "Alice");
    assert_eq!(origin.body, HELLO);
    assert_eq!(origin.image, None);
    assert_eq!(origin.origin_kind, OriginKind::Channel);
    assert_eq!(origin.origin_id, acme.general);
    assert_eq!(origin.origin_name, "general");
    assert_eq!(origin.updated_at, None);

    let listing = read(&acme.db, Some(acme.bob), |s| {
        messages::get(s, &urls, channel_query(random))
    });
    assert_eq!(listing.page.len(), 1);
    assert_eq!(listing.page[0].id, forwarded);
}

#[test]
fn forwarding_a_dm_message_names_the_other_participant() {
    let acme = acme();
    let urls = urls();
    let carol = join_acme(&acme, "Carol");
    let alice_member = member_id(&acme, acme.alice);
    let (dm, root) = alice_dm_message(&acme);

    let forward_to_general = |user: Uuid| {
        act(&acme.db, user, |s| {
            messages::forward(
                s,
                root,
                ForwardMessageRequest {
                    workspace_id: acme.workspace,
                    original_author_member_id: alice_member,
                    destination_channel_id: Some(acme.general),
                    destination_member_id: None,
                },
            )
        })
    };

    let err = forward_to_general(carol).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    for user in [acme.alice, acme.bob] {
        let forwarded = forward_to_general(user).unwrap();
        let view =
            read(&acme.db, Some(carol), |s| messages::get_by_id(s, &urls, forwarded)).unwrap();
        assert_eq!(view.channel_id, Some(acme.general));
        assert_eq!(view.conversation_id, None);

        let origin = view.forwarded_from.unwrap();
        assert_eq!(origin.message_id, root);
        assert_eq!(origin.author_member_id, alice_member);
        assert_eq!(origin.author_name, "Alice");
        assert_eq!(origin.body, HELLO);
        assert_eq!(origin.origin_kind, OriginKind::Conversation);
        assert_eq!(origin.origin_id, dm);
        assert_eq!(origin.origin_name, "Bob");
    }
}
