use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{chats, delivery_records, memberships, messages};

// --- Chat ---

#[derive(Debug, Queryable, Serialize, Clone, PartialEq)]
#[diesel(table_name = chats)]
pub struct Chat {
    pub id: Uuid,
    pub name: Option<String>,
    pub admin_id: Option<Uuid>,
    pub is_private: bool,
    pub dt_created: DateTime<Utc>,
    pub dt_updated: DateTime<Utc>,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = chats)]
pub struct NewChat {
    pub id: Uuid,
    pub name: Option<String>,
    pub admin_id: Option<Uuid>,
    pub is_private: bool,
    pub dt_created: DateTime<Utc>,
    pub dt_updated: DateTime<Utc>,
}

impl NewChat {
    /// A two-party conversation: no name, no admin.
    pub fn private() -> Self {
        Self::build(None, None, true)
    }

    pub fn group(name: Option<String>, admin_id: Uuid) -> Self {
        Self::build(name, Some(admin_id), false)
    }

    fn build(name: Option<String>, admin_id: Option<Uuid>, is_private: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name,
            admin_id,
            is_private,
            dt_created: now,
            dt_updated: now,
        }
    }
}

impl From<NewChat> for Chat {
    fn from(new: NewChat) -> Self {
        Self {
            id: new.id,
            name: new.name,
            admin_id: new.admin_id,
            is_private: new.is_private,
            dt_created: new.dt_created,
            dt_updated: new.dt_updated,
        }
    }
}

// --- Membership ---

#[derive(Debug, Queryable, Serialize, Clone, PartialEq)]
#[diesel(table_name = memberships)]
pub struct Membership {
    pub chat_id: Uuid,
    pub participant_id: Uuid,
    pub is_available: bool,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = memberships)]
pub struct NewMembership {
    pub chat_id: Uuid,
    pub participant_id: Uuid,
}

impl From<NewMembership> for Membership {
    fn from(new: NewMembership) -> Self {
        Self {
            chat_id: new.chat_id,
            participant_id: new.participant_id,
            is_available: true,
        }
    }
}

// --- Message ---

#[derive(Debug, Queryable, Serialize, Clone, PartialEq)]
#[diesel(table_name = messages)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub is_available: bool,
    pub dt_created: DateTime<Utc>,
    pub dt_updated: Option<DateTime<Utc>>,
}

impl Message {
    /// Position in the chat timeline; messages sort by this key.
    pub fn order_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.dt_created, self.id)
    }
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub dt_created: DateTime<Utc>,
}

impl From<NewMessage> for Message {
    fn from(new: NewMessage) -> Self {
        Self {
            id: new.id,
            chat_id: new.chat_id,
            author_id: new.author_id,
            text: new.text,
            is_available: true,
            dt_created: new.dt_created,
            dt_updated: None,
        }
    }
}

// --- DeliveryRecord ---

#[derive(Debug, Queryable, Insertable, Serialize, Clone, PartialEq)]
#[diesel(table_name = delivery_records)]
pub struct DeliveryRecord {
    pub message_id: Uuid,
    pub chat_id: Uuid,
    pub participant_id: Uuid,
    pub is_read: bool,
}
