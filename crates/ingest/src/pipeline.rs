//! The reaction ingestion pipeline.
//!
//! One inbound add/remove event drives one pipeline run: log the raw event,
//! make sure a message record exists (placeholder-first so nothing is lost),
//! backfill full context when it is still a placeholder, re-derive every
//! counter from the upstream authoritative reaction list, and apply the
//! acting user's given-stats delta. Runs for different deliveries race
//! freely; correctness comes from idempotent re-sync, not ordering.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use vibes_core::domain::{
    GivenTarget, MessageContext, NewReactionEvent, PlaceholderMessage, ReactionEventKind,
    TrackedMessage, UserStats, UNKNOWN_CHANNEL_NAME,
};
use vibes_core::reactions;
use vibes_db::repositories::{
    MessageRepository, OptOutRepository, ReactionEventRepository, RepositoryError,
    UserStatsRepository,
};
use vibes_slack::api::{MessageSnapshot, SlackApiError, UserProfile};
use vibes_slack::events::ReactionEvent;
use vibes_slack::gateway::SlackGateway;

use crate::counts::derive_counts;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

enum BackfillOutcome {
    Filled,
    /// Resolved author is opted out; the record stays a placeholder and the
    /// rest of the event's processing is abandoned.
    AuthorOptedOut,
    /// Upstream fetch failed or the message is not visible; retried on the
    /// next event for this message, not on a timer.
    Skipped,
}

pub struct ReactionPipeline {
    messages: Arc<dyn MessageRepository>,
    user_stats: Arc<dyn UserStatsRepository>,
    events: Arc<dyn ReactionEventRepository>,
    opt_outs: Arc<dyn OptOutRepository>,
    gateway: Arc<dyn SlackGateway>,
}

impl ReactionPipeline {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        user_stats: Arc<dyn UserStatsRepository>,
        events: Arc<dyn ReactionEventRepository>,
        opt_outs: Arc<dyn OptOutRepository>,
        gateway: Arc<dyn SlackGateway>,
    ) -> Self {
        Self { messages, user_stats, events, opt_outs, gateway }
    }

    /// Process one verified reaction event. The caller has already checked
    /// the webhook signature.
    pub async fn process(&self, event: &ReactionEvent) -> Result<(), PipelineError> {
        self.log_event(event).await;

        let message = self.ensure_record(event).await?;

        if !reactions::is_tracked(&event.reaction) {
            debug!(
                reaction = %event.reaction,
                message_ts = %event.message_ts,
                "untracked reaction; message counters untouched"
            );
            self.update_given_stats(event).await?;
            return Ok(());
        }

        if message.has_known_author() && self.opt_outs.contains(&message.author_id).await? {
            debug!(message_ts = %event.message_ts, "author opted out; skipping");
            return Ok(());
        }

        if message.is_placeholder {
            if let BackfillOutcome::AuthorOptedOut = self.backfill(&message).await? {
                return Ok(());
            }
        }

        self.resync_counts(event).await?;
        self.update_given_stats(event).await?;
        Ok(())
    }

    /// Append the raw delivery to the audit log. Duplicates are recorded as
    /// they arrive; a log failure never blocks the rest of the pipeline.
    async fn log_event(&self, event: &ReactionEvent) {
        let record = NewReactionEvent {
            message_ts: event.message_ts.clone(),
            channel_id: event.channel_id.clone(),
            user_id: event.user_id.clone(),
            reaction_name: event.reaction.clone(),
            kind: event.kind,
        };
        if let Err(error) = self.events.append(&record).await {
            warn!(
                message_ts = %event.message_ts,
                channel = %event.channel_id,
                %error,
                "failed to append reaction event to audit log"
            );
        }
    }

    /// Look up the tracked message, inserting a placeholder when this is the
    /// first event for it. Losing the insert race to a concurrent delivery
    /// is expected and swallowed.
    async fn ensure_record(&self, event: &ReactionEvent) -> Result<TrackedMessage, PipelineError> {
        if let Some(message) = self.messages.find_by_ts(&event.message_ts).await? {
            return Ok(message);
        }

        let placeholder = PlaceholderMessage {
            message_ts: event.message_ts.clone(),
            channel_id: event.channel_id.clone(),
            thread_ts: event.thread_ts.clone(),
        };

        if !self.messages.insert_placeholder(&placeholder).await? {
            debug!(message_ts = %event.message_ts, "placeholder insert lost a concurrent race");
        }

        match self.messages.find_by_ts(&event.message_ts).await? {
            Some(message) => Ok(message),
            // The row exists after the insert either way; this is a local
            // view for the remainder of this run.
            None => Ok(TrackedMessage::placeholder(&placeholder, Utc::now())),
        }
    }

    async fn backfill(&self, message: &TrackedMessage) -> Result<BackfillOutcome, PipelineError> {
        let resolved = if message.is_thread_reply {
            self.resolve_thread_reply(message).await
        } else {
            self.resolve_top_level(message).await
        };

        let (snapshot, parent_content, parent_author_name) = match resolved {
            Ok(Some(parts)) => parts,
            Ok(None) => {
                warn!(
                    message_ts = %message.message_ts,
                    channel = %message.channel_id,
                    "message not visible upstream; record stays a placeholder"
                );
                return Ok(BackfillOutcome::Skipped);
            }
            Err(error) => {
                warn!(
                    message_ts = %message.message_ts,
                    channel = %message.channel_id,
                    %error,
                    "backfill fetch failed; record stays a placeholder"
                );
                return Ok(BackfillOutcome::Skipped);
            }
        };

        let (Some(author_id), Some(content)) = (snapshot.user.clone(), snapshot.text.clone())
        else {
            warn!(
                message_ts = %message.message_ts,
                "upstream message is missing author or body; record stays a placeholder"
            );
            return Ok(BackfillOutcome::Skipped);
        };

        if self.opt_outs.contains(&author_id).await? {
            // Remember who wrote it so later events short-circuit at the
            // opt-out check instead of re-fetching.
            self.messages.record_author(&message.message_ts, &author_id).await?;
            debug!(
                message_ts = %message.message_ts,
                "author opted out; record stays a placeholder permanently"
            );
            return Ok(BackfillOutcome::AuthorOptedOut);
        }

        let profile = match self.gateway.user_profile(&author_id).await {
            Ok(profile) => profile,
            Err(error) => {
                warn!(
                    message_ts = %message.message_ts,
                    author = %author_id,
                    %error,
                    "author lookup failed; record stays a placeholder"
                );
                return Ok(BackfillOutcome::Skipped);
            }
        };

        let channel_name = match self.gateway.channel_name(&message.channel_id).await {
            Ok(Some(name)) if !name.is_empty() => name,
            Ok(_) => UNKNOWN_CHANNEL_NAME.to_string(),
            Err(error) => {
                debug!(channel = %message.channel_id, %error, "channel name lookup failed");
                UNKNOWN_CHANNEL_NAME.to_string()
            }
        };

        let context = MessageContext {
            channel_name,
            author_id,
            author_name: profile.resolved_name(),
            avatar_url: profile.avatar_url,
            content,
            parent_content,
            parent_author_name,
        };
        self.messages.fill_context(&message.message_ts, &context).await?;
        debug!(message_ts = %message.message_ts, "placeholder backfilled");
        Ok(BackfillOutcome::Filled)
    }

    async fn resolve_top_level(
        &self,
        message: &TrackedMessage,
    ) -> Result<Option<(MessageSnapshot, Option<String>, Option<String>)>, SlackApiError> {
        let snapshot =
            self.gateway.history_message(&message.channel_id, &message.message_ts).await?;
        Ok(snapshot.map(|snapshot| (snapshot, None, None)))
    }

    /// Locate the reply inside its thread and capture the parent's body and
    /// author display name for context.
    async fn resolve_thread_reply(
        &self,
        message: &TrackedMessage,
    ) -> Result<Option<(MessageSnapshot, Option<String>, Option<String>)>, SlackApiError> {
        let Some(thread_ts) = message.thread_ts.clone() else {
            return Ok(None);
        };

        let thread = self.gateway.thread_messages(&message.channel_id, &thread_ts).await?;
        let Some(reply) = thread.iter().find(|entry| entry.ts == message.message_ts).cloned()
        else {
            return Ok(None);
        };

        let parent = thread.iter().find(|entry| entry.ts == thread_ts).cloned();
        let parent_content = parent.as_ref().and_then(|parent| parent.text.clone());
        let parent_author_name = match parent.and_then(|parent| parent.user) {
            Some(user_id) => match self.gateway.user_profile(&user_id).await {
                Ok(profile) => Some(profile.resolved_name()),
                Err(error) => {
                    debug!(%error, "parent author lookup failed");
                    None
                }
            },
            None => None,
        };

        Ok(Some((reply, parent_content, parent_author_name)))
    }

    /// Recompute every counter from the authoritative reaction list and write
    /// them in one full replace. A fetch failure keeps the previous values;
    /// the next event for this message re-derives them.
    async fn resync_counts(&self, event: &ReactionEvent) -> Result<(), PipelineError> {
        match self.gateway.reaction_tallies(&event.channel_id, &event.message_ts).await {
            Ok(tallies) => {
                let counts = derive_counts(&tallies);
                self.messages.replace_counts(&event.message_ts, &counts).await?;
            }
            Err(error) => {
                warn!(
                    message_ts = %event.message_ts,
                    channel = %event.channel_id,
                    %error,
                    "reaction re-sync failed; keeping previous counters"
                );
            }
        }
        Ok(())
    }

    /// Apply the acting user's signed given-stats delta, creating their row
    /// lazily on the first reaction they give.
    async fn update_given_stats(&self, event: &ReactionEvent) -> Result<(), PipelineError> {
        let target = GivenTarget::for_reaction(&event.reaction);
        let now = Utc::now();

        if let Some(mut stats) = self.user_stats.find_by_user(&event.user_id).await? {
            stats.apply(&target, event.kind.delta(), now);
            self.user_stats.save(&stats).await?;
            return Ok(());
        }

        // No row yet: a removal has nothing to decrement.
        if event.kind == ReactionEventKind::Removed {
            return Ok(());
        }

        let profile = match self.gateway.user_profile(&event.user_id).await {
            Ok(profile) => profile,
            Err(error) => {
                warn!(
                    user = %event.user_id,
                    %error,
                    "acting user lookup failed; seeding with fallback identity"
                );
                UserProfile::default()
            }
        };

        let mut stats =
            UserStats::new(&event.user_id, profile.resolved_name(), profile.avatar_url, now);
        stats.apply(&target, 1, now);

        if !self.user_stats.insert_if_absent(&stats).await? {
            // Lost a concurrent seed race; fold this delta into the winner.
            if let Some(mut existing) = self.user_stats.find_by_user(&event.user_id).await? {
                existing.apply(&target, 1, now);
                self.user_stats.save(&existing).await?;
            }
        }

        Ok(())
    }
}
