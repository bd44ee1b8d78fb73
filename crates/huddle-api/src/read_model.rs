//! Message read model. Everything here is a pure projection from stored
//! rows to the API shape; the storage lookups live in `messages`.

use std::collections::HashMap;

use huddle_db::models::{MemberRow, MessageRow, ReactionRow, UserRow};
use huddle_db::to_datetime;
use huddle_types::api::{ForwardedView, MessageView, ReactionGroup, ThreadSummary};
use uuid::Uuid;

/// Group reactions by value. Groups appear in the order their first reaction
/// was stored; each carries the number of reactions and the distinct members
/// behind them.
pub fn group_reactions(reactions: &[ReactionRow]) -> Vec<ReactionGroup> {
    let mut groups: Vec<ReactionGroup> = Vec::new();

    for reaction in reactions {
        match groups.iter_mut().find(|g| g.value == reaction.value) {
            Some(group) => {
                group.count += 1;
                if !group.member_ids.contains(&reaction.member_id) {
                    group.member_ids.push(reaction.member_id);
                }
            }
            None => groups.push(ReactionGroup {
                value: reaction.value.clone(),
                count: 1,
                member_ids: vec![reaction.member_id],
            }),
        }
    }

    groups
}

/// Thread summary from the reply count, the newest reply, and that reply's
/// author. Any missing piece yields the empty sentinel.
pub fn thread_summary(
    count: usize,
    last_reply: Option<&MessageRow>,
    last_author: Option<&MemberRow>,
) -> ThreadSummary {
    match (count, last_reply, last_author) {
        (0, _, _) => ThreadSummary::default(),
        (count, Some(reply), Some(author)) => ThreadSummary {
            count,
            timestamp: Some(to_datetime(reply.created_at)),
            name: Some(author.name.clone()),
            image: author.image.clone(),
        },
        _ => ThreadSummary::default(),
    }
}

/// Join a message with its author, reactions and thread summary. Returns
/// `None` when the author member or user is gone: such a message does not
/// exist for display purposes.
pub fn assemble(
    message: MessageRow,
    member: Option<MemberRow>,
    user: Option<UserRow>,
    reactions: &[ReactionRow],
    thread: ThreadSummary,
    image_urls: &HashMap<Uuid, String>,
) -> Option<MessageView> {
    let member = member?;
    let user = user?;

    let url = |id: Option<Uuid>| id.and_then(|id| image_urls.get(&id).cloned());

    let forwarded_from = message.forwarded_from.map(|snapshot| {
        let image = url(snapshot.image);
        ForwardedView::from_snapshot(snapshot, image)
    });

    Some(MessageView {
        id: message.id,
        body: message.body,
        image: url(message.image),
        workspace_id: message.workspace_id,
        channel_id: message.channel_id,
        conversation_id: message.conversation_id,
        parent_message_id: message.parent_message_id,
        member: member.into(),
        user: user.into(),
        reactions: group_reactions(reactions),
        thread,
        forwarded_from,
        created_at: to_datetime(message.created_at),
        updated_at: message.updated_at.map(to_datetime),
    })
}
