//! Filing-event resolution and fetch-completion handling.

use tracing::{debug, info, warn};

use crate::external::{DocumentStore, DocumentStoreError};
use crate::posts::do_not_post;
use crate::queue::FetchTarget;
use crate::store::RecordStore;
use crate::types::{
    purchase_amount_cents, DocumentId, FilingEventId, FilingStatus, NewTransaction,
};

use super::{fanout, Pipeline, PipelineError};

/// Resolves a freshly ingested filing event: link it to a subscription (or
/// fail it), then either leave it for the posting check or start a purchase.
pub(super) async fn process_filing(
    pipeline: &Pipeline,
    id: FilingEventId,
) -> Result<(), PipelineError> {
    let mut event = pipeline.store.filing_event(id).await?;
    if event.status != FilingStatus::New {
        // Already resolved by an earlier attempt.
        debug!(event = %id, status = %event.status, "skipping resolved event");
        return Ok(());
    }

    let Some(docket) = event.docket else {
        warn!(event = %id, "filing event has no docket; leaving unresolved");
        return Ok(());
    };

    let Some(subscription) = pipeline.store.subscription_by_docket(docket).await? else {
        info!(event = %id, %docket, "docket is not followed");
        event
            .transition(FilingStatus::Failed)
            .map_err(crate::store::StoreError::from)?;
        pipeline.store.update_filing_event(&event).await?;
        return Ok(());
    };

    event.subscription = Some(subscription.id);
    event
        .transition(FilingStatus::Successful)
        .map_err(crate::store::StoreError::from)?;
    pipeline.store.update_filing_event(&event).await?;
    info!(event = %id, subscription = %subscription.id, "filing event resolved");

    if do_not_post(event.description()) {
        debug!(event = %id, "junk entry; no purchase needed");
        return Ok(());
    }

    let metadata = pipeline.documents.lookup_document(event.document).await?;
    if metadata.filepath_local.is_some() {
        // Free copy already archived; the posting check will pick it up.
        return Ok(());
    }

    // No archived copy. Buy one if a sponsor is paying and the document is
    // purchasable; the fetch-completion webhook continues from there.
    if event.pacer_doc_id.is_some()
        && pipeline.store.active_sponsorship().await?.is_some()
    {
        info!(event = %id, document = %event.document, "purchasing document");
        pipeline.documents.purchase_document(event.document).await?;
    }
    Ok(())
}

/// Runs after resolution: posts the filing unless it was filtered out or a
/// purchase is still in flight.
pub(super) async fn check_before_posting(
    pipeline: &Pipeline,
    id: FilingEventId,
) -> Result<(), PipelineError> {
    let event = pipeline.store.filing_event(id).await?;
    if event.status != FilingStatus::Successful {
        debug!(event = %id, status = %event.status, "not posting");
        return Ok(());
    }
    if do_not_post(event.description()) {
        info!(event = %id, "junk entry; posts suppressed");
        return Ok(());
    }
    let Some(subscription) = event.subscription else {
        warn!(event = %id, "successful event has no subscription link");
        return Ok(());
    };

    let metadata = pipeline.documents.lookup_document(event.document).await?;
    if let Some(path) = metadata.filepath_local {
        let blob = pipeline.documents.download_document(&path).await?;
        fanout::enqueue_posts(pipeline, subscription, Some(event.id), Some(blob)).await?;
        return Ok(());
    }

    if event.pacer_doc_id.is_some()
        && pipeline.store.active_sponsorship().await?.is_some()
    {
        // A purchase was started; the fetch-completion webhook posts.
        debug!(event = %id, "purchase in flight; deferring posts");
        return Ok(());
    }

    // Not purchasable: post without the document.
    fanout::enqueue_posts(pipeline, subscription, Some(event.id), None).await?;
    Ok(())
}

/// Handles a successful fetch-completion: download the now-archived
/// document, charge the sponsor, and fan out posts carrying it.
pub(super) async fn process_fetch(
    pipeline: &Pipeline,
    target: &FetchTarget,
) -> Result<(), PipelineError> {
    match target {
        FetchTarget::Filing { event } => {
            let event = pipeline.store.filing_event(*event).await?;
            let Some(subscription) = event.subscription else {
                warn!(event = %event.id, "fetched document for unlinked event");
                return Ok(());
            };
            let blob = download_and_charge(pipeline, event.document).await?;
            fanout::enqueue_posts(pipeline, subscription, Some(event.id), Some(blob)).await?;
        }
        FetchTarget::Subscription {
            subscription,
            document,
        } => {
            let blob = download_and_charge(pipeline, *document).await?;
            fanout::enqueue_posts(pipeline, *subscription, None, Some(blob)).await?;
        }
    }
    Ok(())
}

async fn download_and_charge(
    pipeline: &Pipeline,
    document: DocumentId,
) -> Result<crate::external::DocumentBlob, PipelineError> {
    let metadata = pipeline.documents.lookup_document(document).await?;
    let Some(path) = metadata.filepath_local else {
        return Err(DocumentStoreError::NoLocalFile(document).into());
    };
    let blob = pipeline.documents.download_document(&path).await?;

    if let Some(sponsorship) = pipeline.store.active_sponsorship().await? {
        let amount_cents = purchase_amount_cents(metadata.page_count.unwrap_or(0));
        pipeline
            .store
            .create_transaction(NewTransaction {
                user: sponsorship.user.clone(),
                sponsorship: sponsorship.id,
                amount_cents,
            })
            .await?;
        info!(%document, amount_cents, "purchase charged to sponsor");
    }
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Fixture;
    use crate::types::DocketId;

    #[tokio::test]
    async fn unfollowed_docket_fails_the_event() {
        let fx = Fixture::new();
        let event = fx.seed_event(DocketId(999), 1, None).await;

        process_filing(&fx.pipeline, event.id).await.unwrap();

        let after = fx.store.filing_event(event.id).await.unwrap();
        assert_eq!(after.status, FilingStatus::Failed);
        assert_eq!(after.subscription, None);
    }

    #[tokio::test]
    async fn followed_docket_links_and_succeeds() {
        let fx = Fixture::new();
        fx.seed_subscription(100);
        let event = fx.seed_event(DocketId(100), 1, None).await;
        fx.docs.set_metadata(event.document, Some("recap/doc.pdf"), Some(4));

        process_filing(&fx.pipeline, event.id).await.unwrap();

        let after = fx.store.filing_event(event.id).await.unwrap();
        assert_eq!(after.status, FilingStatus::Successful);
        assert!(after.subscription.is_some());
        assert!(fx.docs.purchases().is_empty());
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let fx = Fixture::new();
        fx.seed_subscription(100);
        let event = fx.seed_event(DocketId(100), 1, None).await;
        fx.docs.set_metadata(event.document, Some("recap/doc.pdf"), Some(4));

        process_filing(&fx.pipeline, event.id).await.unwrap();
        process_filing(&fx.pipeline, event.id).await.unwrap();

        let after = fx.store.filing_event(event.id).await.unwrap();
        assert_eq!(after.status, FilingStatus::Successful);
    }

    #[tokio::test]
    async fn unarchived_purchasable_document_is_purchased_when_sponsored() {
        let fx = Fixture::new();
        fx.seed_subscription(100);
        fx.seed_sponsorship();
        let event = fx.seed_event(DocketId(100), 1, Some("0331")).await;
        fx.docs.set_metadata(event.document, None, None);

        process_filing(&fx.pipeline, event.id).await.unwrap();

        assert_eq!(fx.docs.purchases(), vec![event.document]);
    }

    #[tokio::test]
    async fn no_sponsorship_means_no_purchase() {
        let fx = Fixture::new();
        fx.seed_subscription(100);
        let event = fx.seed_event(DocketId(100), 1, Some("0331")).await;
        fx.docs.set_metadata(event.document, None, None);

        process_filing(&fx.pipeline, event.id).await.unwrap();

        assert!(fx.docs.purchases().is_empty());
    }

    #[tokio::test]
    async fn junk_entry_is_resolved_but_never_purchased() {
        let fx = Fixture::new();
        fx.seed_subscription(100);
        fx.seed_sponsorship();
        let mut event = fx.seed_event(DocketId(100), 1, Some("0331")).await;
        event.long_description = "NOTICE of Appearance by J. Doe".to_string();
        fx.store.update_filing_event(&event).await.unwrap();
        fx.docs.set_metadata(event.document, None, None);

        process_filing(&fx.pipeline, event.id).await.unwrap();

        let after = fx.store.filing_event(event.id).await.unwrap();
        assert_eq!(after.status, FilingStatus::Successful);
        assert!(fx.docs.purchases().is_empty());
    }

    #[tokio::test]
    async fn junk_document_description_is_filtered_when_entry_has_none() {
        let fx = Fixture::new();
        fx.seed_subscription(100);
        fx.seed_sponsorship();
        fx.seed_channels(1);
        let mut event = fx.seed_event(DocketId(100), 1, Some("0331")).await;
        event.long_description = String::new();
        event.short_description = "Corporate Disclosure Statement".to_string();
        fx.store.update_filing_event(&event).await.unwrap();
        fx.docs.set_metadata(event.document, None, None);

        process_filing(&fx.pipeline, event.id).await.unwrap();
        check_before_posting(&fx.pipeline, event.id).await.unwrap();
        fx.drain().await;

        assert!(fx.docs.purchases().is_empty());
        assert!(fx.poster.posted().is_empty());
    }

    #[tokio::test]
    async fn check_posts_archived_document_to_every_enabled_channel() {
        let fx = Fixture::new();
        fx.seed_subscription(100);
        fx.seed_channels(2);
        let event = fx.seed_event(DocketId(100), 1, None).await;
        fx.docs
            .set_metadata(event.document, Some("recap/doc.pdf"), Some(4));
        fx.docs.set_blob("recap/doc.pdf", b"pdf".to_vec());

        process_filing(&fx.pipeline, event.id).await.unwrap();
        check_before_posting(&fx.pipeline, event.id).await.unwrap();
        fx.drain().await;

        assert_eq!(fx.poster.posted().len(), 2);
        assert_eq!(fx.store.posts().len(), 2);
    }

    #[tokio::test]
    async fn check_defers_while_purchase_is_in_flight() {
        let fx = Fixture::new();
        fx.seed_subscription(100);
        fx.seed_sponsorship();
        fx.seed_channels(1);
        let event = fx.seed_event(DocketId(100), 1, Some("0331")).await;
        fx.docs.set_metadata(event.document, None, None);

        process_filing(&fx.pipeline, event.id).await.unwrap();
        check_before_posting(&fx.pipeline, event.id).await.unwrap();
        fx.drain().await;

        assert!(fx.poster.posted().is_empty());
    }

    #[tokio::test]
    async fn check_posts_without_document_when_not_purchasable() {
        let fx = Fixture::new();
        fx.seed_subscription(100);
        fx.seed_channels(1);
        // No pacer id: the document cannot be bought.
        let event = fx.seed_event(DocketId(100), 1, None).await;
        fx.docs.set_metadata(event.document, None, None);

        process_filing(&fx.pipeline, event.id).await.unwrap();
        check_before_posting(&fx.pipeline, event.id).await.unwrap();
        fx.drain().await;

        let posted = fx.poster.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].attachment_count, 0);
    }

    #[tokio::test]
    async fn failed_event_is_never_posted() {
        let fx = Fixture::new();
        fx.seed_channels(1);
        let event = fx.seed_event(DocketId(999), 1, None).await;

        process_filing(&fx.pipeline, event.id).await.unwrap();
        check_before_posting(&fx.pipeline, event.id).await.unwrap();
        fx.drain().await;

        assert!(fx.poster.posted().is_empty());
    }

    #[tokio::test]
    async fn fetch_completion_charges_sponsor_and_posts() {
        let fx = Fixture::new();
        let subscription = fx.seed_subscription(100);
        fx.seed_sponsorship();
        fx.seed_channels(2);
        let mut event = fx.seed_event(DocketId(100), 1, Some("0331")).await;
        event.subscription = Some(subscription);
        event.transition(FilingStatus::Successful).unwrap();
        fx.store.update_filing_event(&event).await.unwrap();
        fx.docs
            .set_metadata(event.document, Some("recap/doc.pdf"), Some(12));
        fx.docs.set_blob("recap/doc.pdf", b"pdf".to_vec());

        process_fetch(
            &fx.pipeline,
            &FetchTarget::Filing { event: event.id },
        )
        .await
        .unwrap();
        fx.drain().await;

        let transactions = fx.store.transactions();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].amount_cents, 120);
        assert_eq!(fx.poster.posted().len(), 2);
    }

    #[tokio::test]
    async fn fetch_charge_is_capped_for_long_documents() {
        let fx = Fixture::new();
        let subscription = fx.seed_subscription(100);
        fx.seed_sponsorship();
        fx.seed_channels(1);
        let mut event = fx.seed_event(DocketId(100), 1, Some("0331")).await;
        event.subscription = Some(subscription);
        event.transition(FilingStatus::Successful).unwrap();
        fx.store.update_filing_event(&event).await.unwrap();
        fx.docs
            .set_metadata(event.document, Some("recap/doc.pdf"), Some(250));
        fx.docs.set_blob("recap/doc.pdf", b"pdf".to_vec());

        process_fetch(
            &fx.pipeline,
            &FetchTarget::Filing { event: event.id },
        )
        .await
        .unwrap();

        assert_eq!(fx.store.transactions()[0].amount_cents, 300);
    }

    #[tokio::test]
    async fn subscription_fetch_posts_new_case_announcements() {
        let fx = Fixture::new();
        let subscription = fx.seed_subscription(100);
        fx.seed_channels(1);
        fx.docs
            .set_metadata(DocumentId(9), Some("recap/doc.pdf"), Some(2));
        fx.docs.set_blob("recap/doc.pdf", b"pdf".to_vec());

        process_fetch(
            &fx.pipeline,
            &FetchTarget::Subscription {
                subscription,
                document: DocumentId(9),
            },
        )
        .await
        .unwrap();
        fx.drain().await;

        let posted = fx.poster.posted();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].message.contains("is now on the docket"));
        // New-case posts are not tied to a filing event.
        assert_eq!(fx.store.posts()[0].filing_event, None);
    }

    #[tokio::test]
    async fn fetch_without_archived_copy_is_an_error_for_retry() {
        let fx = Fixture::new();
        let subscription = fx.seed_subscription(100);
        fx.docs.set_metadata(DocumentId(9), None, None);

        let err = process_fetch(
            &fx.pipeline,
            &FetchTarget::Subscription {
                subscription,
                document: DocumentId(9),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Documents(DocumentStoreError::NoLocalFile(_))
        ));
    }
}
