//! Post fan-out: one queued job per enabled channel, one published status
//! per job.

use tracing::{debug, info};

use crate::external::{DocumentBlob, StatusPoster, ThumbnailRenderer};
use crate::posts::{new_case_template, template_for_channel, TemplateFields};
use crate::queue::{EnqueueOptions, Job, PostJob};
use crate::store::RecordStore;
use crate::types::{FilingEventId, NewPost, SubscriptionId};

use super::{Pipeline, PipelineError};

/// Pages to thumbnail for a posted document.
///
/// When the status carries an inline text image, that image takes one of the
/// four attachment slots, leaving three for document pages.
pub fn thumbnail_pages(has_text_image: bool) -> &'static [u32] {
    if has_text_image {
        &[1, 2, 3]
    } else {
        &[1, 2, 3, 4]
    }
}

/// Queues one [`Job::PostToChannel`] per enabled channel.
pub(super) async fn enqueue_posts(
    pipeline: &Pipeline,
    subscription: SubscriptionId,
    event: Option<FilingEventId>,
    document: Option<DocumentBlob>,
) -> Result<(), PipelineError> {
    let channels = pipeline.store.enabled_channels().await?;
    debug!(%subscription, channels = channels.len(), "fanning out posts");
    for channel in channels {
        pipeline.queue.enqueue(
            Job::PostToChannel(PostJob {
                channel: channel.id,
                subscription,
                event,
                document: document.clone(),
            }),
            EnqueueOptions {
                retry: pipeline.retry,
                ..Default::default()
            },
        );
    }
    Ok(())
}

/// Publishes one status on one channel and records the resulting post.
pub(super) async fn post_to_channel(
    pipeline: &Pipeline,
    post: &PostJob,
) -> Result<(), PipelineError> {
    let channel = pipeline.store.channel(post.channel).await?;
    if !channel.enabled {
        debug!(channel = %channel.id, "channel disabled; skipping post");
        return Ok(());
    }

    // A retried job may have published before failing; never post the same
    // event to the same channel twice.
    if let Some(event) = post.event {
        let existing = pipeline.store.posts_for_event(event).await?;
        if existing.iter().any(|p| p.channel == channel.id) {
            debug!(%event, channel = %channel.id, "already posted; skipping");
            return Ok(());
        }
    }

    let subscription = pipeline.store.subscription(post.subscription).await?;
    let docket = subscription.name_with_summary();
    let docket_link = subscription.docket_url();

    let (message, image) = match post.event {
        Some(id) => {
            let event = pipeline.store.filing_event(id).await?;
            let pdf_link = event.document_url();
            let template = template_for_channel(channel.service, event.document_number);
            template.render(&TemplateFields {
                docket: &docket,
                description: event.description(),
                doc_num: event.document_number,
                pdf_link: &pdf_link,
                docket_link: &docket_link,
            })
        }
        None => new_case_template(channel.service).render(&TemplateFields {
            docket: &docket,
            description: "",
            doc_num: None,
            pdf_link: "",
            docket_link: &docket_link,
        }),
    };

    let attachments = match &post.document {
        Some(blob) => {
            let pages = thumbnail_pages(image.is_some());
            pipeline.thumbnails.render_thumbnails(blob, pages).await?
        }
        None => Vec::new(),
    };

    let external_id = pipeline
        .poster
        .add_status(&channel, &message, image.as_ref(), &attachments)
        .await?;
    info!(channel = %channel.id, %external_id, "status published");

    pipeline
        .store
        .create_post(NewPost {
            filing_event: post.event,
            channel: channel.id,
            external_id,
            text: message,
        })
        .await?;
    Ok(())
}
