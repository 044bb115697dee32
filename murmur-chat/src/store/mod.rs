//! Storage seam for the chat core.
//!
//! A [`Store`] hands out a connection either for plain reads or inside one atomic
//! transaction. The connection implements the four component interfaces below;
//! the provided methods on each trait carry the domain rules, backends only
//! implement the row primitives.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use murmur_shared::errors::{AppError, AppResult, ErrorCode};
use murmur_shared::types::pagination::PaginationParams;

use crate::models::{Chat, DeliveryRecord, Membership, Message, NewChat, NewMembership, NewMessage};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

pub trait Store: Clone + Send + Sync + 'static {
    type Conn: StoreConn;

    /// Runs `f` against a connection outside any explicit transaction.
    fn read<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut Self::Conn) -> AppResult<T>;

    /// Runs `f` in a single transaction: committed on `Ok`, rolled back on `Err`.
    fn transaction<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut Self::Conn) -> AppResult<T>;
}

pub trait StoreConn: ChatRecords + MembershipLedger + MessageStore + DeliveryTracker {}

impl<C> StoreConn for C where C: ChatRecords + MembershipLedger + MessageStore + DeliveryTracker {}

// --- Chats ---

pub trait ChatRecords {
    fn insert_chat(&mut self, chat: &NewChat) -> AppResult<Chat>;

    fn find_chat(&mut self, chat_id: Uuid) -> AppResult<Option<Chat>>;

    /// Ordered by `(dt_updated, id)` ascending.
    fn find_chats(&mut self, chat_ids: &[Uuid]) -> AppResult<Vec<Chat>>;

    fn touch_chat(&mut self, chat_id: Uuid, at: DateTime<Utc>) -> AppResult<usize>;

    fn set_chat_name(&mut self, chat_id: Uuid, name: Option<&str>, at: DateTime<Utc>) -> AppResult<Option<Chat>>;
}

// --- Membership Ledger ---

pub trait MembershipLedger {
    /// Chats where the user still holds an available membership.
    fn list_chat_ids_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<Uuid>>;

    fn find_membership(&mut self, chat_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>>;

    /// Every membership of the chat, available or not, ordered by participant id.
    fn list_members(&mut self, chat_id: Uuid) -> AppResult<Vec<Membership>>;

    /// Flips availability only when it differs; the count is 0 when the row is
    /// missing or already in the requested state.
    fn set_availability(&mut self, chat_id: Uuid, user_id: Uuid, available: bool) -> AppResult<usize>;

    /// Plain insert. An existing `(chat_id, participant_id)` row is a conflict.
    fn insert_memberships(&mut self, rows: &[NewMembership]) -> AppResult<Vec<Membership>>;

    /// Membership regardless of availability (users who left still count).
    fn is_member(&mut self, chat_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        Ok(self.find_membership(chat_id, user_id)?.is_some())
    }

    fn is_available_member(&mut self, chat_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .find_membership(chat_id, user_id)?
            .is_some_and(|m| m.is_available))
    }

    fn available_member_ids(&mut self, chat_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .list_members(chat_id)?
            .into_iter()
            .filter(|m| m.is_available)
            .map(|m| m.participant_id)
            .collect())
    }

    /// Participants must be non-empty and unique; a duplicate is an integrity
    /// error and aborts the surrounding transaction.
    fn create_memberships(&mut self, chat_id: Uuid, participant_ids: &[Uuid]) -> AppResult<Vec<Membership>> {
        if participant_ids.is_empty() {
            return Err(AppError::new(
                ErrorCode::ParticipantsRequired,
                "a chat needs at least one participant",
            ));
        }

        let mut rows: Vec<NewMembership> = Vec::with_capacity(participant_ids.len());
        for &participant_id in participant_ids {
            if rows.iter().any(|r| r.participant_id == participant_id) {
                return Err(AppError::conflict(format!(
                    "participant {participant_id} listed twice for chat {chat_id}"
                )));
            }
            rows.push(NewMembership { chat_id, participant_id });
        }

        self.insert_memberships(&rows)
    }
}

// --- Message Store ---

pub trait MessageStore {
    fn insert_message(&mut self, message: &NewMessage) -> AppResult<Message>;

    fn find_message(&mut self, message_id: Uuid) -> AppResult<Option<Message>>;

    /// Rewrites text of an available message owned by `author_id`.
    fn update_text(
        &mut self,
        message_id: Uuid,
        author_id: Uuid,
        text: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>>;

    fn mark_unavailable(&mut self, message_id: Uuid, author_id: Uuid) -> AppResult<usize>;

    /// Available messages ordered by `(dt_created, id)`, plus the total count.
    fn page_by_chat(&mut self, chat_id: Uuid, offset: u64, limit: u64) -> AppResult<(Vec<Message>, u64)>;

    /// Appends a message to `chat_id`.
    ///
    /// The author's membership is NOT checked here: callers must have verified
    /// inside the same transaction that `author_id` is an available member.
    fn append(&mut self, chat_id: Uuid, author_id: Uuid, text: &str) -> AppResult<Message> {
        validate_text(text)?;
        let new_message = NewMessage {
            id: Uuid::now_v7(),
            chat_id,
            author_id,
            text: text.to_string(),
            dt_created: Utc::now(),
        };
        self.insert_message(&new_message)
    }

    /// `None` when nothing matched: missing, deleted, or not authored by `author_id`.
    fn edit(&mut self, message_id: Uuid, author_id: Uuid, new_text: &str) -> AppResult<Option<Message>> {
        validate_text(new_text)?;
        self.update_text(message_id, author_id, new_text, Utc::now())
    }

    /// 0 covers both "missing" and "not yours"; the two are deliberately indistinguishable.
    fn soft_delete(&mut self, message_id: Uuid, author_id: Uuid) -> AppResult<usize> {
        self.mark_unavailable(message_id, author_id)
    }

    fn list_by_chat(&mut self, chat_id: Uuid, page: &PaginationParams) -> AppResult<(Vec<Message>, u64)> {
        self.page_by_chat(chat_id, page.offset(), page.limit())
    }
}

pub fn validate_text(text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "message text must not be empty"));
    }
    Ok(())
}

// --- Delivery Tracker ---

pub trait DeliveryTracker {
    fn insert_delivery_records(&mut self, rows: &[DeliveryRecord]) -> AppResult<usize>;

    fn records_for_message(&mut self, message_id: Uuid) -> AppResult<Vec<DeliveryRecord>>;

    /// Unread records of `user_id` in the chat, counting available messages only.
    fn unread_count(&mut self, chat_id: Uuid, user_id: Uuid) -> AppResult<i64>;

    /// Newest available message by `(dt_created, id)`.
    fn last_message(&mut self, chat_id: Uuid) -> AppResult<Option<Message>>;

    /// Marks the user's unread records as read, limited to messages at or before
    /// `until` in chat order when given.
    fn mark_read_until(
        &mut self,
        chat_id: Uuid,
        user_id: Uuid,
        until: Option<(DateTime<Utc>, Uuid)>,
    ) -> AppResult<usize>;

    /// One record per member; only the author's starts out read.
    fn create_records_for_message(
        &mut self,
        message: &Message,
        member_ids: &[Uuid],
    ) -> AppResult<Vec<DeliveryRecord>> {
        if member_ids.is_empty() {
            return Err(AppError::internal(format!(
                "message {} has no recipients in chat {}",
                message.id, message.chat_id
            )));
        }

        let rows: Vec<DeliveryRecord> = member_ids
            .iter()
            .map(|&participant_id| DeliveryRecord {
                message_id: message.id,
                chat_id: message.chat_id,
                participant_id,
                is_read: participant_id == message.author_id,
            })
            .collect();

        self.insert_delivery_records(&rows)?;
        Ok(rows)
    }

    fn mark_read(&mut self, chat_id: Uuid, user_id: Uuid, up_to: Option<&Message>) -> AppResult<usize> {
        self.mark_read_until(chat_id, user_id, up_to.map(Message::order_key))
    }
}
