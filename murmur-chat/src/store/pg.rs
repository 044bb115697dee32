use chrono::{DateTime, Utc};
use diesel::dsl::{InnerJoin, IntoBoxed, Select};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use murmur_shared::clients::db::DbPool;
use murmur_shared::errors::{AppError, AppResult, ErrorCode};

use super::{ChatRecords, DeliveryTracker, MembershipLedger, MessageStore, Store};
use crate::models::{Chat, DeliveryRecord, Membership, Message, NewChat, NewMembership, NewMessage};
use crate::schema::{chats, delivery_records, memberships, messages};

/// Postgres backend over the shared r2d2 pool. Calls block; run them off the
/// async executor.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl Store for PgStore {
    type Conn = PgConnection;

    fn read<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut PgConnection) -> AppResult<T>,
    {
        let mut conn = self.pool.get()?;
        f(&mut conn)
    }

    fn transaction<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut PgConnection) -> AppResult<T>,
    {
        let mut pooled = self.pool.get()?;
        let conn: &mut PgConnection = &mut pooled;
        conn.transaction(f)
    }
}

impl ChatRecords for PgConnection {
    fn insert_chat(&mut self, chat: &NewChat) -> AppResult<Chat> {
        let chat = diesel::insert_into(chats::table)
            .values(chat)
            .get_result::<Chat>(self)?;
        Ok(chat)
    }

    fn find_chat(&mut self, chat_id: Uuid) -> AppResult<Option<Chat>> {
        let chat = chats::table
            .find(chat_id)
            .first::<Chat>(self)
            .optional()?;
        Ok(chat)
    }

    fn find_chats(&mut self, chat_ids: &[Uuid]) -> AppResult<Vec<Chat>> {
        let rows = chats::table
            .filter(chats::id.eq_any(chat_ids))
            .order((chats::dt_updated.asc(), chats::id.asc()))
            .load::<Chat>(self)?;
        Ok(rows)
    }

    fn touch_chat(&mut self, chat_id: Uuid, at: DateTime<Utc>) -> AppResult<usize> {
        let affected = diesel::update(chats::table.find(chat_id))
            .set(chats::dt_updated.eq(at))
            .execute(self)?;
        Ok(affected)
    }

    fn set_chat_name(&mut self, chat_id: Uuid, name: Option<&str>, at: DateTime<Utc>) -> AppResult<Option<Chat>> {
        let chat = diesel::update(chats::table.find(chat_id))
            .set((chats::name.eq(name), chats::dt_updated.eq(at)))
            .get_result::<Chat>(self)
            .optional()?;
        Ok(chat)
    }
}

impl MembershipLedger for PgConnection {
    fn list_chat_ids_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = memberships::table
            .filter(memberships::participant_id.eq(user_id))
            .filter(memberships::is_available.eq(true))
            .select(memberships::chat_id)
            .load::<Uuid>(self)?;
        Ok(ids)
    }

    fn find_membership(&mut self, chat_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>> {
        let membership = memberships::table
            .find((chat_id, user_id))
            .first::<Membership>(self)
            .optional()?;
        Ok(membership)
    }

    fn list_members(&mut self, chat_id: Uuid) -> AppResult<Vec<Membership>> {
        let rows = memberships::table
            .filter(memberships::chat_id.eq(chat_id))
            .order(memberships::participant_id.asc())
            .load::<Membership>(self)?;
        Ok(rows)
    }

    fn set_availability(&mut self, chat_id: Uuid, user_id: Uuid, available: bool) -> AppResult<usize> {
        let affected = diesel::update(
            memberships::table
                .filter(memberships::chat_id.eq(chat_id))
                .filter(memberships::participant_id.eq(user_id))
                .filter(memberships::is_available.ne(available)),
        )
        .set(memberships::is_available.eq(available))
        .execute(self)?;
        Ok(affected)
    }

    fn insert_memberships(&mut self, rows: &[NewMembership]) -> AppResult<Vec<Membership>> {
        let inserted = diesel::insert_into(memberships::table)
            .values(rows)
            .get_results::<Membership>(self)?;
        Ok(inserted)
    }
}

impl MessageStore for PgConnection {
    fn insert_message(&mut self, message: &NewMessage) -> AppResult<Message> {
        let message = diesel::insert_into(messages::table)
            .values(message)
            .get_result::<Message>(self)?;
        Ok(message)
    }

    fn find_message(&mut self, message_id: Uuid) -> AppResult<Option<Message>> {
        let message = messages::table
            .find(message_id)
            .first::<Message>(self)
            .optional()?;
        Ok(message)
    }

    fn update_text(
        &mut self,
        message_id: Uuid,
        author_id: Uuid,
        text: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>> {
        let message = diesel::update(
            messages::table
                .filter(messages::id.eq(message_id))
                .filter(messages::author_id.eq(author_id))
                .filter(messages::is_available.eq(true)),
        )
        .set((messages::text.eq(text), messages::dt_updated.eq(Some(at))))
        .get_result::<Message>(self)
        .optional()?;
        Ok(message)
    }

    fn mark_unavailable(&mut self, message_id: Uuid, author_id: Uuid) -> AppResult<usize> {
        let affected = diesel::update(
            messages::table
                .filter(messages::id.eq(message_id))
                .filter(messages::author_id.eq(author_id))
                .filter(messages::is_available.eq(true)),
        )
        .set(messages::is_available.eq(false))
        .execute(self)?;
        Ok(affected)
    }

    fn page_by_chat(&mut self, chat_id: Uuid, offset: u64, limit: u64) -> AppResult<(Vec<Message>, u64)> {
        let total: i64 = messages::table
            .filter(messages::chat_id.eq(chat_id))
            .filter(messages::is_available.eq(true))
            .count()
            .get_result(self)?;

        let items = messages::table
            .filter(messages::chat_id.eq(chat_id))
            .filter(messages::is_available.eq(true))
            .order((messages::dt_created.asc(), messages::id.asc()))
            .offset(sql_bound(offset, "offset")?)
            .limit(sql_bound(limit, "limit")?)
            .load::<Message>(self)?;

        Ok((items, u64::try_from(total).unwrap_or_default()))
    }
}

impl DeliveryTracker for PgConnection {
    fn insert_delivery_records(&mut self, rows: &[DeliveryRecord]) -> AppResult<usize> {
        let inserted = diesel::insert_into(delivery_records::table)
            .values(rows)
            .execute(self)?;
        Ok(inserted)
    }

    fn records_for_message(&mut self, message_id: Uuid) -> AppResult<Vec<DeliveryRecord>> {
        let rows = delivery_records::table
            .filter(delivery_records::message_id.eq(message_id))
            .order(delivery_records::participant_id.asc())
            .load::<DeliveryRecord>(self)?;
        Ok(rows)
    }

    fn unread_count(&mut self, chat_id: Uuid, user_id: Uuid) -> AppResult<i64> {
        let count = unread_records(chat_id, user_id)
            .count()
            .get_result::<i64>(self)?;
        Ok(count)
    }

    fn last_message(&mut self, chat_id: Uuid) -> AppResult<Option<Message>> {
        let message = messages::table
            .filter(messages::chat_id.eq(chat_id))
            .filter(messages::is_available.eq(true))
            .order((messages::dt_created.desc(), messages::id.desc()))
            .first::<Message>(self)
            .optional()?;
        Ok(message)
    }

    fn mark_read_until(
        &mut self,
        chat_id: Uuid,
        user_id: Uuid,
        until: Option<(DateTime<Utc>, Uuid)>,
    ) -> AppResult<usize> {
        let unread = delivery_records::table
            .filter(delivery_records::chat_id.eq(chat_id))
            .filter(delivery_records::participant_id.eq(user_id))
            .filter(delivery_records::is_read.eq(false));

        let affected = match until {
            None => diesel::update(unread)
                .set(delivery_records::is_read.eq(true))
                .execute(self)?,
            Some((at, last_id)) => {
                let covered = message_ids_up_to(chat_id, at, last_id);
                diesel::update(unread.filter(delivery_records::message_id.eq_any(covered)))
                    .set(delivery_records::is_read.eq(true))
                    .execute(self)?
            }
        };
        Ok(affected)
    }
}

type UnreadRecords = IntoBoxed<'static, InnerJoin<delivery_records::table, messages::table>, Pg>;
type MessageIds = IntoBoxed<'static, Select<messages::table, messages::id>, Pg>;

/// The user's unread records whose message is still available.
fn unread_records(chat_id: Uuid, user_id: Uuid) -> UnreadRecords {
    delivery_records::table
        .inner_join(messages::table)
        .into_boxed()
        .filter(delivery_records::chat_id.eq(chat_id))
        .filter(delivery_records::participant_id.eq(user_id))
        .filter(delivery_records::is_read.eq(false))
        .filter(messages::is_available.eq(true))
}

/// Ids of messages in the chat ordered at or before `(at, last_id)`.
fn message_ids_up_to(chat_id: Uuid, at: DateTime<Utc>, last_id: Uuid) -> MessageIds {
    messages::table
        .select(messages::id)
        .into_boxed()
        .filter(messages::chat_id.eq(chat_id))
        .filter(
            messages::dt_created
                .lt(at)
                .or(messages::dt_created.eq(at).and(messages::id.le(last_id))),
        )
}

fn sql_bound(value: u64, what: &str) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|_| AppError::new(ErrorCode::ValidationError, format!("{what} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unread_count_joins_available_messages() {
        let query = unread_records(Uuid::now_v7(), Uuid::now_v7()).count();
        let sql = diesel::debug_query::<Pg, _>(&query).to_string();

        assert!(sql.contains(r#"INNER JOIN "messages" ON"#));
        assert!(sql.contains(r#""delivery_records"."is_read" = $"#));
        assert!(sql.contains(r#""messages"."is_available" = $"#));
        assert!(sql.contains("COUNT(*)"));
    }

    #[test]
    fn mark_read_window_compares_time_then_id() {
        let query = message_ids_up_to(Uuid::now_v7(), Utc::now(), Uuid::now_v7());
        let sql = diesel::debug_query::<Pg, _>(&query).to_string();

        assert!(sql.starts_with(r#"SELECT "messages"."id" FROM "messages""#));
        assert!(sql.contains(r#""messages"."chat_id" = $"#));
        assert!(sql.contains(r#"("messages"."dt_created" < $"#));
        assert!(sql.contains(r#"OR ("messages"."dt_created" = $"#));
        assert!(sql.contains(r#"AND "messages"."id" <= $"#));
    }

    #[test]
    fn offsets_beyond_i64_are_rejected() {
        assert_eq!(sql_bound(42, "offset").unwrap(), 42);
        let err = sql_bound(u64::MAX, "offset").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
