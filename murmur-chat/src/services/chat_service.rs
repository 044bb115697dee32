use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use murmur_shared::errors::{AppError, AppResult, ErrorCode};
use murmur_shared::types::pagination::{Paginated, PaginationParams};

use crate::events::publisher;
use crate::models::{Chat, Membership, Message, NewChat};
use crate::socket::Notifier;
use crate::store::{validate_text, ChatRecords, DeliveryTracker, MembershipLedger, MessageStore, Store};

#[derive(Debug, Serialize)]
pub struct ChatSummary {
    #[serde(flatten)]
    pub chat: Chat,
    pub last_message: Option<Message>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ChatDetail {
    #[serde(flatten)]
    pub chat: Chat,
    pub members: Vec<Membership>,
}

#[derive(Debug, Clone)]
pub struct CreateChat {
    pub creator_id: Uuid,
    pub name: Option<String>,
    pub participant_ids: Vec<Uuid>,
    pub is_private: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTarget {
    /// An existing chat the sender belongs to.
    Chat(Uuid),
    /// A user; opens a fresh private chat with them.
    Direct(Uuid),
}

/// Chat aggregator: every call that touches more than one component runs in a
/// single store transaction, and live events go out only after commit.
pub struct ChatService<S: Store> {
    store: S,
    notifier: Arc<dyn Notifier>,
}

impl<S: Store> ChatService<S> {
    pub fn new(store: S, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn list_chats_for_user(&self, user_id: Uuid) -> AppResult<Vec<ChatSummary>> {
        let result = self.store.read(|conn| {
            let chat_ids = conn.list_chat_ids_for_user(user_id)?;
            if chat_ids.is_empty() {
                return Ok(Vec::new());
            }

            conn.find_chats(&chat_ids)?
                .into_iter()
                .map(|chat| -> AppResult<ChatSummary> {
                    let last_message = conn.last_message(chat.id)?;
                    let unread_count = conn.unread_count(chat.id, user_id)?;
                    Ok(ChatSummary { chat, last_message, unread_count })
                })
                .collect()
        });

        degrade(result, Vec::new(), "list_chats_for_user")
    }

    pub fn get_chat_detail(&self, chat_id: Uuid, user_id: Uuid) -> AppResult<ChatDetail> {
        self.store.read(|conn| {
            let chat = conn.find_chat(chat_id)?.ok_or_else(chat_not_found)?;
            let members = conn.list_members(chat_id)?;
            if !members.iter().any(|m| m.participant_id == user_id) {
                return Err(not_a_member());
            }
            Ok(ChatDetail { chat, members })
        })
    }

    pub fn create_chat(&self, req: CreateChat) -> AppResult<Chat> {
        if !req.participant_ids.contains(&req.creator_id) {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "the creator must be one of the participants",
            ));
        }
        if req.is_private && req.participant_ids.len() != 2 {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "a private chat has exactly two participants",
            ));
        }

        let new_chat = if req.is_private {
            NewChat::private()
        } else {
            NewChat::group(req.name.clone(), req.creator_id)
        };

        let chat = self.store.transaction(|conn| {
            let chat = conn.insert_chat(&new_chat)?;
            conn.create_memberships(chat.id, &req.participant_ids)?;
            Ok(chat)
        })?;

        metrics::counter!("chat_chats_created_total").increment(1);
        tracing::info!(chat_id = %chat.id, creator_id = %req.creator_id, members = req.participant_ids.len(), "chat created");

        publisher::publish_chat_created(self.notifier.as_ref(), &chat, req.creator_id, &req.participant_ids);
        Ok(chat)
    }

    pub fn rename_chat(&self, chat_id: Uuid, user_id: Uuid, name: Option<String>) -> AppResult<Chat> {
        let (chat, members) = self.store.transaction(|conn| {
            let chat = conn.find_chat(chat_id)?.ok_or_else(chat_not_found)?;
            if !conn.is_member(chat_id, user_id)? {
                return Err(not_a_member());
            }
            if chat.is_private {
                return Err(AppError::new(
                    ErrorCode::PrivateChatImmutable,
                    "private chats cannot be renamed",
                ));
            }

            let chat = conn
                .set_chat_name(chat_id, name.as_deref(), chrono::Utc::now())?
                .ok_or_else(chat_not_found)?;
            let members = conn.available_member_ids(chat_id)?;
            Ok((chat, members))
        })?;

        publisher::publish_chat_renamed(self.notifier.as_ref(), &chat, user_id, &members);
        Ok(chat)
    }

    /// Returns the number of memberships flipped: 1 on success, 0 when the user
    /// was not a member, had already left, or the store is unreachable.
    pub fn remove_participant(&self, chat_id: Uuid, user_id: Uuid) -> AppResult<usize> {
        let result = self.store.transaction(|conn| {
            let affected = conn.set_availability(chat_id, user_id, false)?;
            let remaining = if affected > 0 {
                conn.available_member_ids(chat_id)?
            } else {
                Vec::new()
            };
            Ok((affected, remaining))
        });

        let (affected, remaining) = degrade(result, (0, Vec::new()), "remove_participant")?;
        if affected > 0 {
            tracing::info!(chat_id = %chat_id, user_id = %user_id, "participant left chat");
            publisher::publish_participant_left(self.notifier.as_ref(), chat_id, user_id, &remaining);
        }
        Ok(affected)
    }

    pub fn send_message(&self, sender_id: Uuid, target: MessageTarget, text: &str) -> AppResult<Message> {
        validate_text(text)?;

        let (message, created_chat, members) = self.store.transaction(|conn| {
            let (chat_id, created_chat) = match target {
                MessageTarget::Chat(chat_id) => {
                    conn.find_chat(chat_id)?.ok_or_else(chat_not_found)?;
                    if !conn.is_available_member(chat_id, sender_id)? {
                        return Err(not_a_member());
                    }
                    (chat_id, None)
                }
                MessageTarget::Direct(dest_id) => {
                    let chat = conn.insert_chat(&NewChat::private())?;
                    conn.create_memberships(chat.id, &[sender_id, dest_id])?;
                    (chat.id, Some(chat))
                }
            };

            let message = conn.append(chat_id, sender_id, text)?;
            let members = conn.available_member_ids(chat_id)?;
            conn.create_records_for_message(&message, &members)?;
            conn.touch_chat(chat_id, message.dt_created)?;
            Ok((message, created_chat, members))
        })?;

        metrics::counter!("chat_messages_sent_total").increment(1);
        tracing::debug!(
            message_id = %message.id,
            chat_id = %message.chat_id,
            recipients = members.len(),
            "message sent"
        );

        if let Some(chat) = &created_chat {
            publisher::publish_chat_created(self.notifier.as_ref(), chat, sender_id, &members);
        }
        publisher::publish_message_created(self.notifier.as_ref(), &message, &members);
        Ok(message)
    }

    pub fn edit_message(&self, message_id: Uuid, author_id: Uuid, text: &str) -> AppResult<Message> {
        let (message, members) = self.store.transaction(|conn| {
            let message = conn
                .edit(message_id, author_id, text)?
                .ok_or_else(message_not_found)?;
            let members = conn.available_member_ids(message.chat_id)?;
            Ok((message, members))
        })?;

        publisher::publish_message_updated(self.notifier.as_ref(), &message, &members);
        Ok(message)
    }

    /// 0 when the message is missing, already deleted, or not authored by `author_id`.
    pub fn delete_message(&self, message_id: Uuid, author_id: Uuid) -> AppResult<usize> {
        let (affected, notice) = self.store.transaction(|conn| {
            let affected = conn.soft_delete(message_id, author_id)?;
            if affected == 0 {
                return Ok((0, None));
            }
            let notice = match conn.find_message(message_id)? {
                Some(message) => Some((message.chat_id, conn.available_member_ids(message.chat_id)?)),
                None => None,
            };
            Ok((affected, notice))
        })?;

        if let Some((chat_id, members)) = notice {
            publisher::publish_message_deleted(self.notifier.as_ref(), chat_id, message_id, author_id, &members);
        }
        Ok(affected)
    }

    pub fn list_chat_messages(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        page: &PaginationParams,
    ) -> AppResult<Paginated<Message>> {
        page.validate()?;

        let result = self.store.read(|conn| {
            conn.find_chat(chat_id)?.ok_or_else(chat_not_found)?;
            if !conn.is_member(chat_id, user_id)? {
                return Err(not_a_member());
            }
            let (items, total) = conn.list_by_chat(chat_id, page)?;
            Ok(Paginated::new(items, total, page))
        });

        degrade(result, Paginated::empty(page), "list_chat_messages")
    }

    /// Marks the caller's records read, up to and including `up_to` when given.
    pub fn mark_read(&self, chat_id: Uuid, user_id: Uuid, up_to: Option<Uuid>) -> AppResult<usize> {
        self.store.transaction(|conn| {
            conn.find_chat(chat_id)?.ok_or_else(chat_not_found)?;
            if !conn.is_member(chat_id, user_id)? {
                return Err(not_a_member());
            }

            let target = match up_to {
                Some(message_id) => Some(
                    conn.find_message(message_id)?
                        .filter(|m| m.chat_id == chat_id)
                        .ok_or_else(message_not_found)?,
                ),
                None => None,
            };

            conn.mark_read(chat_id, user_id, target.as_ref())
        })
    }

    /// Unread messages across every chat the user is still in.
    pub fn total_unread(&self, user_id: Uuid) -> AppResult<i64> {
        let result = self.store.read(|conn| {
            let mut total = 0;
            for chat_id in conn.list_chat_ids_for_user(user_id)? {
                total += conn.unread_count(chat_id, user_id)?;
            }
            Ok(total)
        });

        degrade(result, 0, "total_unread")
    }
}

fn degrade<T>(result: AppResult<T>, neutral: T, operation: &'static str) -> AppResult<T> {
    match result {
        Err(err) if err.is_transient() => {
            tracing::warn!(error = %err, operation, "store unavailable, returning empty result");
            Ok(neutral)
        }
        other => other,
    }
}

fn chat_not_found() -> AppError {
    AppError::new(ErrorCode::ChatNotFound, "chat not found")
}

fn message_not_found() -> AppError {
    AppError::new(ErrorCode::MessageNotFound, "message not found")
}

fn not_a_member() -> AppError {
    AppError::new(ErrorCode::NotChatMember, "you are not a member of this chat")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::ConnectionManager;
    use crate::store::MemoryStore;

    struct Fixture {
        service: ChatService<MemoryStore>,
        store: MemoryStore,
        connections: Arc<ConnectionManager>,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let connections = Arc::new(ConnectionManager::new());
        let service = ChatService::new(store.clone(), connections.clone());
        Fixture { service, store, connections }
    }

    fn users<const N: usize>() -> [Uuid; N] {
        std::array::from_fn(|_| Uuid::now_v7())
    }

    fn group(f: &Fixture, members: &[Uuid]) -> Chat {
        f.service
            .create_chat(CreateChat {
                creator_id: members[0],
                name: Some("crew".into()),
                participant_ids: members.to_vec(),
                is_private: false,
            })
            .unwrap()
    }

    fn records(f: &Fixture, message_id: Uuid) -> Vec<crate::models::DeliveryRecord> {
        f.store.read(|conn| conn.records_for_message(message_id)).unwrap()
    }

    #[test]
    fn send_creates_one_record_per_available_member() {
        let f = fixture();
        let [a, b, c] = users();
        let chat = group(&f, &[a, b, c]);

        let msg = f.service.send_message(a, MessageTarget::Chat(chat.id), "hi all").unwrap();
        let recs = records(&f, msg.id);

        assert_eq!(recs.len(), 3);
        for rec in &recs {
            assert_eq!(rec.chat_id, chat.id);
            assert_eq!(rec.is_read, rec.participant_id == a);
        }
    }

    #[test]
    fn departed_members_get_no_new_records() {
        let f = fixture();
        let [a, b, c] = users();
        let chat = group(&f, &[a, b, c]);

        assert_eq!(f.service.remove_participant(chat.id, c).unwrap(), 1);
        let msg = f.service.send_message(a, MessageTarget::Chat(chat.id), "without c").unwrap();

        let recs = records(&f, msg.id);
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.participant_id != c));
    }

    #[test]
    fn unread_counts_stay_within_bounds() {
        let f = fixture();
        let [a, b] = users();
        let chat = group(&f, &[a, b]);

        for text in ["one", "two", "three"] {
            f.service.send_message(a, MessageTarget::Chat(chat.id), text).unwrap();
        }
        f.service.send_message(b, MessageTarget::Chat(chat.id), "reply").unwrap();

        let for_b = f.service.list_chats_for_user(b).unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].unread_count, 3);
        assert_eq!(for_b[0].last_message.as_ref().unwrap().text, "reply");

        let for_a = f.service.list_chats_for_user(a).unwrap();
        assert_eq!(for_a[0].unread_count, 1);
        assert_eq!(f.service.total_unread(b).unwrap(), 3);
    }

    #[test]
    fn direct_message_opens_private_chat() {
        let f = fixture();
        let [a, b] = users();

        let msg = f.service.send_message(a, MessageTarget::Direct(b), "hey").unwrap();
        let detail = f.service.get_chat_detail(msg.chat_id, b).unwrap();

        assert!(detail.chat.is_private);
        assert!(detail.chat.admin_id.is_none());
        assert!(detail.chat.name.is_none());
        assert_eq!(detail.members.len(), 2);
        assert!(detail.members.iter().all(|m| m.is_available));
        assert_eq!(records(&f, msg.id).len(), 2);
    }

    #[test]
    fn repeated_direct_messages_open_separate_chats() {
        let f = fixture();
        let [a, b] = users();

        let first = f.service.send_message(a, MessageTarget::Direct(b), "one").unwrap();
        let second = f.service.send_message(a, MessageTarget::Direct(b), "two").unwrap();

        assert_ne!(first.chat_id, second.chat_id);
        assert_eq!(f.service.list_chats_for_user(b).unwrap().len(), 2);
    }

    #[test]
    fn failed_direct_message_rolls_back_everything() {
        let f = fixture();
        let [a] = users();

        let err = f.service.send_message(a, MessageTarget::Direct(a), "me").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
        assert!(f.service.list_chats_for_user(a).unwrap().is_empty());
    }

    #[test]
    fn duplicate_participants_abort_creation() {
        let f = fixture();
        let [a, b] = users();

        let err = f
            .service
            .create_chat(CreateChat {
                creator_id: a,
                name: None,
                participant_ids: vec![a, b, b],
                is_private: false,
            })
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(f.service.list_chats_for_user(a).unwrap().is_empty());
    }

    #[test]
    fn group_creator_becomes_admin() {
        let f = fixture();
        let [a, b] = users();
        let chat = group(&f, &[a, b]);

        assert_eq!(chat.admin_id, Some(a));
        assert!(!chat.is_private);
        assert_eq!(f.service.get_chat_detail(chat.id, a).unwrap().members.len(), 2);
    }

    #[test]
    fn private_chat_needs_two_participants() {
        let f = fixture();
        let [a, b, c] = users();
        let err = f
            .service
            .create_chat(CreateChat {
                creator_id: a,
                name: None,
                participant_ids: vec![a, b, c],
                is_private: true,
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn explicit_private_chat_has_no_admin() {
        let f = fixture();
        let [a, b] = users();
        let chat = f
            .service
            .create_chat(CreateChat {
                creator_id: a,
                name: None,
                participant_ids: vec![a, b],
                is_private: true,
            })
            .unwrap();

        assert!(chat.is_private);
        assert_eq!(chat.admin_id, None);
        assert_eq!(f.service.get_chat_detail(chat.id, b).unwrap().members.len(), 2);
        assert_eq!(f.service.list_chats_for_user(a).unwrap().len(), 1);
    }

    #[test]
    fn out_of_range_page_is_a_validation_error() {
        let f = fixture();
        let [a, b] = users();
        let chat = group(&f, &[a, b]);

        let err = f
            .service
            .list_chat_messages(chat.id, a, &PaginationParams::new(u64::MAX, 100))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn outsiders_cannot_post_or_read() {
        let f = fixture();
        let [a, b, outsider] = users();
        let chat = group(&f, &[a, b]);

        let err = f.service.send_message(outsider, MessageTarget::Chat(chat.id), "let me in").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotChatMember);

        let err = f.service.get_chat_detail(chat.id, outsider).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotChatMember);

        let err = f.service.get_chat_detail(Uuid::now_v7(), outsider).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ChatNotFound);

        let err = f
            .service
            .list_chat_messages(chat.id, outsider, &PaginationParams::default())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotChatMember);
    }

    #[test]
    fn departed_member_cannot_send_but_keeps_history() {
        let f = fixture();
        let [a, b] = users();
        let chat = group(&f, &[a, b]);
        f.service.send_message(a, MessageTarget::Chat(chat.id), "before").unwrap();

        f.service.remove_participant(chat.id, b).unwrap();

        let err = f.service.send_message(b, MessageTarget::Chat(chat.id), "after").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotChatMember);
        let page = f
            .service
            .list_chat_messages(chat.id, b, &PaginationParams::default())
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(f.service.list_chats_for_user(b).unwrap().is_empty());
    }

    #[test]
    fn remove_participant_is_idempotent() {
        let f = fixture();
        let [a, b] = users();
        let chat = group(&f, &[a, b]);

        assert_eq!(f.service.remove_participant(chat.id, b).unwrap(), 1);
        assert_eq!(f.service.remove_participant(chat.id, b).unwrap(), 0);
        assert_eq!(f.service.remove_participant(chat.id, Uuid::now_v7()).unwrap(), 0);
    }

    #[test]
    fn only_the_author_can_edit() {
        let f = fixture();
        let [a, b] = users();
        let chat = group(&f, &[a, b]);
        let msg = f.service.send_message(a, MessageTarget::Chat(chat.id), "original").unwrap();

        let err = f.service.edit_message(msg.id, b, "forged").unwrap_err();
        assert_eq!(err.code(), ErrorCode::MessageNotFound);

        let page = f
            .service
            .list_chat_messages(chat.id, a, &PaginationParams::default())
            .unwrap();
        assert_eq!(page.items[0].text, "original");

        let edited = f.service.edit_message(msg.id, a, "revised").unwrap();
        assert_eq!(edited.text, "revised");
        assert!(edited.dt_updated.is_some());
    }

    #[test]
    fn deleted_messages_disappear_from_views() {
        let f = fixture();
        let [a, b] = users();
        let chat = group(&f, &[a, b]);
        let keep = f.service.send_message(a, MessageTarget::Chat(chat.id), "keep").unwrap();
        let gone = f.service.send_message(a, MessageTarget::Chat(chat.id), "gone").unwrap();

        assert_eq!(f.service.delete_message(gone.id, b).unwrap(), 0);
        assert_eq!(f.service.delete_message(gone.id, a).unwrap(), 1);
        assert_eq!(f.service.delete_message(gone.id, a).unwrap(), 0);

        let page = f
            .service
            .list_chat_messages(chat.id, b, &PaginationParams::default())
            .unwrap();
        assert_eq!(page.items.iter().map(|m| m.id).collect::<Vec<_>>(), vec![keep.id]);

        let summary = &f.service.list_chats_for_user(b).unwrap()[0];
        assert_eq!(summary.unread_count, 1);
        assert_eq!(summary.last_message.as_ref().unwrap().id, keep.id);
    }

    #[test]
    fn messages_page_in_send_order() {
        let f = fixture();
        let [a, b] = users();
        let chat = group(&f, &[a, b]);
        let sent: Vec<Uuid> = (0..7)
            .map(|i| {
                let author = if i % 2 == 0 { a } else { b };
                f.service
                    .send_message(author, MessageTarget::Chat(chat.id), &format!("m{i}"))
                    .unwrap()
                    .id
            })
            .collect();

        let first = f.service.list_chat_messages(chat.id, a, &PaginationParams::new(1, 3)).unwrap();
        let last = f.service.list_chat_messages(chat.id, a, &PaginationParams::new(3, 3)).unwrap();

        assert_eq!(first.total, 7);
        assert_eq!(first.pages, 3);
        assert_eq!(first.items.iter().map(|m| m.id).collect::<Vec<_>>(), sent[..3].to_vec());
        assert_eq!(last.items.iter().map(|m| m.id).collect::<Vec<_>>(), sent[6..].to_vec());
    }

    #[test]
    fn chat_list_follows_last_activity() {
        let f = fixture();
        let [a, b] = users();
        let older = group(&f, &[a, b]);
        let newer = group(&f, &[a, b]);

        f.service.send_message(a, MessageTarget::Chat(older.id), "bump").unwrap();

        let ids: Vec<Uuid> = f.service.list_chats_for_user(a).unwrap().iter().map(|s| s.chat.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[test]
    fn mark_read_clears_unread_up_to_target() {
        let f = fixture();
        let [a, b] = users();
        let chat = group(&f, &[a, b]);
        let first = f.service.send_message(a, MessageTarget::Chat(chat.id), "one").unwrap();
        f.service.send_message(a, MessageTarget::Chat(chat.id), "two").unwrap();

        assert_eq!(f.service.mark_read(chat.id, b, Some(first.id)).unwrap(), 1);
        assert_eq!(f.service.list_chats_for_user(b).unwrap()[0].unread_count, 1);
        assert_eq!(f.service.mark_read(chat.id, b, None).unwrap(), 1);
        assert_eq!(f.service.list_chats_for_user(b).unwrap()[0].unread_count, 0);

        let err = f.service.mark_read(chat.id, b, Some(Uuid::now_v7())).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MessageNotFound);
    }

    #[test]
    fn rename_updates_groups_only() {
        let f = fixture();
        let [a, b] = users();
        let chat = group(&f, &[a, b]);

        let renamed = f.service.rename_chat(chat.id, b, Some("new name".into())).unwrap();
        assert_eq!(renamed.name.as_deref(), Some("new name"));
        assert!(renamed.dt_updated >= chat.dt_updated);

        let direct = f.service.send_message(a, MessageTarget::Direct(b), "hi").unwrap();
        let err = f.service.rename_chat(direct.chat_id, a, Some("nope".into())).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PrivateChatImmutable);
    }

    #[test]
    fn store_outage_degrades_reads_and_surfaces_writes() {
        let f = fixture();
        let [a, b] = users();
        let chat = group(&f, &[a, b]);

        f.store.set_offline(true);
        assert!(f.service.list_chats_for_user(a).unwrap().is_empty());
        assert_eq!(f.service.remove_participant(chat.id, b).unwrap(), 0);
        assert_eq!(
            f.service
                .list_chat_messages(chat.id, a, &PaginationParams::default())
                .unwrap()
                .total,
            0
        );

        let err = f.service.send_message(a, MessageTarget::Chat(chat.id), "lost?").unwrap_err();
        assert!(err.is_transient());

        f.store.set_offline(false);
        assert_eq!(f.service.list_chats_for_user(b).unwrap().len(), 1);
    }

    #[test]
    fn members_receive_live_events_after_commit() {
        let f = fixture();
        let [a, b] = users();
        let mut inbox = f.connections.accept(b);
        let mut own = f.connections.accept(a);

        let msg = f.service.send_message(a, MessageTarget::Direct(b), "ping").unwrap();

        let created = inbox.receiver.try_recv().unwrap();
        assert_eq!(created["event_type"], "chat.created");
        let delivered = inbox.receiver.try_recv().unwrap();
        assert_eq!(delivered["event_type"], "message.created");
        assert_eq!(delivered["data"]["id"], msg.id.to_string());
        assert!(own.receiver.try_recv().is_err());

        f.service.send_message(a, MessageTarget::Direct(a), "rolled back").unwrap_err();
        assert!(inbox.receiver.try_recv().is_err());
    }
}
