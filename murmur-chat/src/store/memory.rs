use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use murmur_shared::errors::{AppError, AppResult};

use super::{ChatRecords, DeliveryTracker, MembershipLedger, MessageStore, Store};
use crate::models::{Chat, DeliveryRecord, Membership, Message, NewChat, NewMembership, NewMessage};

#[derive(Debug, Clone, Default)]
pub struct Tables {
    chats: HashMap<Uuid, Chat>,
    memberships: BTreeMap<(Uuid, Uuid), Membership>,
    messages: HashMap<Uuid, Message>,
    deliveries: BTreeMap<(Uuid, Uuid), DeliveryRecord>,
}

/// Working copy handed to store callbacks. Transactions publish it back only on success.
#[derive(Debug)]
pub struct MemoryConn {
    tables: Tables,
}

/// Process-local backend for development and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `ServiceUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Tables>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::unavailable("memory store offline"));
        }
        // Tables are only replaced wholesale after a successful callback.
        Ok(self.tables.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Store for MemoryStore {
    type Conn = MemoryConn;

    fn read<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut MemoryConn) -> AppResult<T>,
    {
        let mut lease = Lease::take(self.lock()?);
        f(&mut lease.conn)
    }

    fn transaction<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut MemoryConn) -> AppResult<T>,
    {
        let mut guard = self.lock()?;
        let mut conn = MemoryConn { tables: guard.clone() };
        let out = f(&mut conn)?;
        *guard = conn.tables;
        Ok(out)
    }
}

/// Moves the live tables into a connection for the duration of a read and
/// puts them back on drop, so reads never copy the dataset.
struct Lease<'a> {
    guard: MutexGuard<'a, Tables>,
    conn: MemoryConn,
}

impl<'a> Lease<'a> {
    fn take(mut guard: MutexGuard<'a, Tables>) -> Self {
        let tables = std::mem::take(&mut *guard);
        Self { guard, conn: MemoryConn { tables } }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        std::mem::swap(&mut *self.guard, &mut self.conn.tables);
    }
}

impl ChatRecords for MemoryConn {
    fn insert_chat(&mut self, chat: &NewChat) -> AppResult<Chat> {
        if self.tables.chats.contains_key(&chat.id) {
            return Err(AppError::conflict(format!("chat {} already exists", chat.id)));
        }
        let chat = Chat::from(chat.clone());
        self.tables.chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    fn find_chat(&mut self, chat_id: Uuid) -> AppResult<Option<Chat>> {
        Ok(self.tables.chats.get(&chat_id).cloned())
    }

    fn find_chats(&mut self, chat_ids: &[Uuid]) -> AppResult<Vec<Chat>> {
        let mut rows: Vec<Chat> = chat_ids
            .iter()
            .filter_map(|id| self.tables.chats.get(id).cloned())
            .collect();
        rows.sort_by_key(|c| (c.dt_updated, c.id));
        rows.dedup_by_key(|c| c.id);
        Ok(rows)
    }

    fn touch_chat(&mut self, chat_id: Uuid, at: DateTime<Utc>) -> AppResult<usize> {
        match self.tables.chats.get_mut(&chat_id) {
            Some(chat) => {
                chat.dt_updated = at;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn set_chat_name(&mut self, chat_id: Uuid, name: Option<&str>, at: DateTime<Utc>) -> AppResult<Option<Chat>> {
        Ok(self.tables.chats.get_mut(&chat_id).map(|chat| {
            chat.name = name.map(str::to_string);
            chat.dt_updated = at;
            chat.clone()
        }))
    }
}

impl MembershipLedger for MemoryConn {
    fn list_chat_ids_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .tables
            .memberships
            .values()
            .filter(|m| m.participant_id == user_id && m.is_available)
            .map(|m| m.chat_id)
            .collect())
    }

    fn find_membership(&mut self, chat_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>> {
        Ok(self.tables.memberships.get(&(chat_id, user_id)).cloned())
    }

    fn list_members(&mut self, chat_id: Uuid) -> AppResult<Vec<Membership>> {
        Ok(self
            .tables
            .memberships
            .values()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect())
    }

    fn set_availability(&mut self, chat_id: Uuid, user_id: Uuid, available: bool) -> AppResult<usize> {
        match self.tables.memberships.get_mut(&(chat_id, user_id)) {
            Some(m) if m.is_available != available => {
                m.is_available = available;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn insert_memberships(&mut self, rows: &[NewMembership]) -> AppResult<Vec<Membership>> {
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let key = (row.chat_id, row.participant_id);
            if !self.tables.chats.contains_key(&row.chat_id) {
                return Err(AppError::conflict(format!("chat {} does not exist", row.chat_id)));
            }
            if self.tables.memberships.contains_key(&key) {
                return Err(AppError::conflict(format!(
                    "participant {} already belongs to chat {}",
                    row.participant_id, row.chat_id
                )));
            }
            let membership = Membership::from(row.clone());
            self.tables.memberships.insert(key, membership.clone());
            inserted.push(membership);
        }
        Ok(inserted)
    }
}

impl MessageStore for MemoryConn {
    fn insert_message(&mut self, message: &NewMessage) -> AppResult<Message> {
        if !self.tables.chats.contains_key(&message.chat_id) {
            return Err(AppError::conflict(format!("chat {} does not exist", message.chat_id)));
        }
        if self.tables.messages.contains_key(&message.id) {
            return Err(AppError::conflict(format!("message {} already exists", message.id)));
        }
        let message = Message::from(message.clone());
        self.tables.messages.insert(message.id, message.clone());
        Ok(message)
    }

    fn find_message(&mut self, message_id: Uuid) -> AppResult<Option<Message>> {
        Ok(self.tables.messages.get(&message_id).cloned())
    }

    fn update_text(
        &mut self,
        message_id: Uuid,
        author_id: Uuid,
        text: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>> {
        Ok(self
            .tables
            .messages
            .get_mut(&message_id)
            .filter(|m| m.author_id == author_id && m.is_available)
            .map(|m| {
                m.text = text.to_string();
                m.dt_updated = Some(at);
                m.clone()
            }))
    }

    fn mark_unavailable(&mut self, message_id: Uuid, author_id: Uuid) -> AppResult<usize> {
        match self.tables.messages.get_mut(&message_id) {
            Some(m) if m.author_id == author_id && m.is_available => {
                m.is_available = false;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn page_by_chat(&mut self, chat_id: Uuid, offset: u64, limit: u64) -> AppResult<(Vec<Message>, u64)> {
        let mut rows: Vec<&Message> = self
            .tables
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id && m.is_available)
            .collect();
        rows.sort_by_key(|m| m.order_key());

        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }
}

impl DeliveryTracker for MemoryConn {
    fn insert_delivery_records(&mut self, rows: &[DeliveryRecord]) -> AppResult<usize> {
        for row in rows {
            let key = (row.message_id, row.participant_id);
            if !self.tables.messages.contains_key(&row.message_id) {
                return Err(AppError::conflict(format!("message {} does not exist", row.message_id)));
            }
            if self.tables.deliveries.contains_key(&key) {
                return Err(AppError::conflict(format!(
                    "delivery record for {} on message {} already exists",
                    row.participant_id, row.message_id
                )));
            }
            self.tables.deliveries.insert(key, row.clone());
        }
        Ok(rows.len())
    }

    fn records_for_message(&mut self, message_id: Uuid) -> AppResult<Vec<DeliveryRecord>> {
        Ok(self
            .tables
            .deliveries
            .values()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect())
    }

    fn unread_count(&mut self, chat_id: Uuid, user_id: Uuid) -> AppResult<i64> {
        let messages = &self.tables.messages;
        let count = self
            .tables
            .deliveries
            .values()
            .filter(|r| r.chat_id == chat_id && r.participant_id == user_id && !r.is_read)
            .filter(|r| messages.get(&r.message_id).is_some_and(|m| m.is_available))
            .count();
        Ok(count as i64)
    }

    fn last_message(&mut self, chat_id: Uuid) -> AppResult<Option<Message>> {
        Ok(self
            .tables
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id && m.is_available)
            .max_by_key(|m| m.order_key())
            .cloned())
    }

    fn mark_read_until(
        &mut self,
        chat_id: Uuid,
        user_id: Uuid,
        until: Option<(DateTime<Utc>, Uuid)>,
    ) -> AppResult<usize> {
        let messages = &self.tables.messages;
        let mut affected = 0;
        for record in self.tables.deliveries.values_mut() {
            if record.chat_id != chat_id || record.participant_id != user_id || record.is_read {
                continue;
            }
            let covered = match until {
                None => true,
                Some(limit) => messages
                    .get(&record.message_id)
                    .is_some_and(|m| m.order_key() <= limit),
            };
            if covered {
                record.is_read = true;
                affected += 1;
            }
        }
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_shared::errors::ErrorCode;

    fn seeded_chat(conn: &mut MemoryConn, members: &[Uuid]) -> Chat {
        let chat = conn.insert_chat(&NewChat::group(None, members[0])).unwrap();
        conn.create_memberships(chat.id, members).unwrap();
        chat
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        let err = store
            .transaction(|conn| {
                let chat = conn.insert_chat(&NewChat::private())?;
                conn.create_memberships(chat.id, &[a, b, a])
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);

        let chats = store.read(|conn| conn.list_chat_ids_for_user(a)).unwrap();
        assert!(chats.is_empty());
        assert!(store.read(|conn| Ok(conn.tables.chats.is_empty())).unwrap());
    }

    #[test]
    fn reads_hand_back_the_live_tables() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let chat = store.transaction(|conn| Ok(seeded_chat(conn, &[a, b]))).unwrap();

        let err = store
            .read(|conn| -> AppResult<()> {
                assert_eq!(conn.tables.chats.len(), 1);
                Err(AppError::not_found("nothing here"))
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        assert_eq!(store.read(|conn| conn.list_chat_ids_for_user(b)).unwrap(), vec![chat.id]);
        assert_eq!(store.lock().unwrap().chats.len(), 1);
    }

    #[test]
    fn offline_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let err = store.read(|conn| conn.list_chat_ids_for_user(Uuid::now_v7())).unwrap_err();
        assert!(err.is_transient());

        store.set_offline(false);
        assert!(store.read(|conn| conn.list_chat_ids_for_user(Uuid::now_v7())).is_ok());
    }

    #[test]
    fn availability_flip_is_idempotent() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        store
            .transaction(|conn| {
                let chat = seeded_chat(conn, &[a, b]);
                assert_eq!(conn.set_availability(chat.id, b, false)?, 1);
                assert_eq!(conn.set_availability(chat.id, b, false)?, 0);
                assert_eq!(conn.set_availability(chat.id, Uuid::now_v7(), false)?, 0);
                assert!(conn.is_member(chat.id, b)?);
                assert!(!conn.is_available_member(chat.id, b)?);
                assert_eq!(conn.available_member_ids(chat.id)?, vec![a]);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn empty_participants_are_rejected() {
        let store = MemoryStore::new();
        let err = store
            .transaction(|conn| {
                let chat = conn.insert_chat(&NewChat::private())?;
                conn.create_memberships(chat.id, &[])
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParticipantsRequired);
    }

    #[test]
    fn blank_text_is_rejected() {
        let store = MemoryStore::new();
        let a = Uuid::now_v7();
        let err = store
            .transaction(|conn| {
                let chat = seeded_chat(conn, &[a]);
                conn.append(chat.id, a, "   \n")
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn edit_and_delete_require_authorship() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        store
            .transaction(|conn| {
                let chat = seeded_chat(conn, &[a, b]);
                let msg = conn.append(chat.id, a, "hello")?;

                assert!(conn.edit(msg.id, b, "hijack")?.is_none());
                assert_eq!(conn.find_message(msg.id)?.unwrap().text, "hello");

                let edited = conn.edit(msg.id, a, "hello there")?.unwrap();
                assert_eq!(edited.text, "hello there");
                assert!(edited.dt_updated.is_some());

                assert_eq!(conn.soft_delete(msg.id, b)?, 0);
                assert_eq!(conn.soft_delete(msg.id, a)?, 1);
                assert_eq!(conn.soft_delete(msg.id, a)?, 0);
                assert!(conn.edit(msg.id, a, "too late")?.is_none());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn unread_and_mark_read_follow_chat_order() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        store
            .transaction(|conn| {
                let chat = seeded_chat(conn, &[a, b]);
                let mut sent = Vec::new();
                for text in ["one", "two", "three"] {
                    let msg = conn.append(chat.id, a, text)?;
                    conn.create_records_for_message(&msg, &[a, b])?;
                    sent.push(msg);
                }

                assert_eq!(conn.unread_count(chat.id, a)?, 0);
                assert_eq!(conn.unread_count(chat.id, b)?, 3);

                assert_eq!(conn.soft_delete(sent[2].id, a)?, 1);
                assert_eq!(conn.unread_count(chat.id, b)?, 2);
                assert_eq!(conn.last_message(chat.id)?.unwrap().id, sent[1].id);

                assert_eq!(conn.mark_read(chat.id, b, Some(&sent[0]))?, 1);
                assert_eq!(conn.unread_count(chat.id, b)?, 1);
                assert_eq!(conn.mark_read(chat.id, b, None)?, 2);
                assert_eq!(conn.mark_read(chat.id, b, None)?, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn message_pages_are_chronological() {
        let store = MemoryStore::new();
        let a = Uuid::now_v7();
        store
            .transaction(|conn| {
                let chat = seeded_chat(conn, &[a]);
                let ids: Vec<Uuid> = (0..5)
                    .map(|i| conn.append(chat.id, a, &format!("m{i}")).map(|m| m.id))
                    .collect::<AppResult<_>>()?;

                let (page, total) = conn.page_by_chat(chat.id, 2, 2)?;
                assert_eq!(total, 5);
                assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), ids[2..4].to_vec());
                Ok(())
            })
            .unwrap();
    }
}
