use serde::Serialize;
use uuid::Uuid;

use murmur_shared::types::event::{event_types, Event};

use crate::models::{Chat, Message};
use crate::socket::Notifier;

#[derive(Debug, Serialize)]
pub struct ParticipantLeft {
    pub chat_id: Uuid,
    pub participant_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MessageDeleted {
    pub chat_id: Uuid,
    pub message_id: Uuid,
}

/// Pushes one event to every recipient except the actor. Delivery is
/// best-effort; offline recipients are skipped.
pub fn publish<T: Serialize>(
    notifier: &dyn Notifier,
    event_type: &'static str,
    actor_id: Uuid,
    recipients: &[Uuid],
    data: T,
) -> usize {
    let event = Event::new(event_type, data).with_user(actor_id);
    let payload = match serde_json::to_value(&event) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, event_type, "failed to serialize live event");
            return 0;
        }
    };

    let delivered = recipients
        .iter()
        .filter(|&&recipient| recipient != actor_id)
        .filter(|&&recipient| notifier.notify(recipient, &payload))
        .count();

    tracing::debug!(event_type, recipients = recipients.len(), delivered, "live event published");
    delivered
}

pub fn publish_chat_created(notifier: &dyn Notifier, chat: &Chat, actor_id: Uuid, members: &[Uuid]) {
    publish(notifier, event_types::CHAT_CREATED, actor_id, members, chat);
}

pub fn publish_chat_renamed(notifier: &dyn Notifier, chat: &Chat, actor_id: Uuid, members: &[Uuid]) {
    publish(notifier, event_types::CHAT_RENAMED, actor_id, members, chat);
}

pub fn publish_participant_left(notifier: &dyn Notifier, chat_id: Uuid, participant_id: Uuid, members: &[Uuid]) {
    publish(
        notifier,
        event_types::PARTICIPANT_LEFT,
        participant_id,
        members,
        ParticipantLeft { chat_id, participant_id },
    );
}

pub fn publish_message_created(notifier: &dyn Notifier, message: &Message, members: &[Uuid]) {
    publish(notifier, event_types::MESSAGE_CREATED, message.author_id, members, message);
}

pub fn publish_message_updated(notifier: &dyn Notifier, message: &Message, members: &[Uuid]) {
    publish(notifier, event_types::MESSAGE_UPDATED, message.author_id, members, message);
}

pub fn publish_message_deleted(
    notifier: &dyn Notifier,
    chat_id: Uuid,
    message_id: Uuid,
    actor_id: Uuid,
    members: &[Uuid],
) {
    publish(
        notifier,
        event_types::MESSAGE_DELETED,
        actor_id,
        members,
        MessageDeleted { chat_id, message_id },
    );
}
