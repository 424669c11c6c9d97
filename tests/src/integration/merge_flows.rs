//! # Merge Flows
//!
//! Merging file identities while repairs are in flight.
//!
//! ```text
//! repair(f1) x2 ──► lookup(f1@g1) ....................► result
//!                        merge(f2 ◄ f1)                    │
//!                        f1 proxies to f2@g2 ◄─────────────┘ forwarded
//! ```

#[cfg(test)]
mod tests {
    use futures::future::join_all;

    use refkeeper_engine::{FileId, FileReferenceApi, RepairError, ResolverError};

    use crate::integration::fixtures::TestEngine;

    fn failure() -> ResolverError {
        ResolverError::Other("lookup failed".to_string())
    }

    #[tokio::test]
    async fn test_merge_redirects_pending_repairs() {
        let mut engine = TestEngine::start();
        let ctx = engine.handle.store().create_web_page_source("https://x");
        engine.handle.add_usage_context(FileId(1), ctx).await.unwrap();

        let first = engine.handle.repair(FileId(1));
        let second = engine.handle.repair(FileId(1));
        let lookup = engine.next_lookup().await;

        engine.handle.merge(FileId(2), FileId(1)).await.unwrap();
        assert!(engine.no_pending_lookup());

        lookup.respond(Ok(()));
        assert_eq!(join_all([first, second]).await, vec![Ok(()), Ok(())]);
        assert_eq!(
            engine
                .handle
                .get_some_usage_contexts(FileId(2))
                .await
                .unwrap(),
            vec![ctx]
        );
        assert!(engine
            .handle
            .get_some_usage_contexts(FileId(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_merged_failure_continues_with_target_contexts() {
        let mut engine = TestEngine::start();
        let store = engine.handle.store().clone();
        let from_ctx = store.create_web_page_source("https://from");
        let to_ctx = store.create_web_page_source("https://to");
        engine.handle.add_usage_context(FileId(1), from_ctx).await.unwrap();
        engine.handle.add_usage_context(FileId(2), to_ctx).await.unwrap();

        let ticket = engine.handle.repair(FileId(1));
        let lookup = engine.next_lookup().await;
        engine.handle.merge(FileId(2), FileId(1)).await.unwrap();

        lookup.respond(Err(failure()));
        let fallback = engine.next_lookup().await;
        assert_eq!(fallback.file_id, FileId(2));
        assert_eq!(fallback.context_id, to_ctx);
        fallback.respond(Ok(()));

        assert_eq!(ticket.await, Ok(()));
    }

    #[tokio::test]
    async fn test_merge_of_two_live_repairs_needs_one_success() {
        let mut engine = TestEngine::start();
        let store = engine.handle.store().clone();
        let from_ctx = store.create_web_page_source("https://from");
        let to_ctx = store.create_web_page_source("https://to");
        engine.handle.add_usage_context(FileId(1), from_ctx).await.unwrap();
        engine.handle.add_usage_context(FileId(2), to_ctx).await.unwrap();

        let from_ticket = engine.handle.repair(FileId(1));
        let from_lookup = engine.next_lookup().await;
        let to_ticket = engine.handle.repair(FileId(2));
        let to_lookup = engine.next_lookup().await;

        engine.handle.merge(FileId(2), FileId(1)).await.unwrap();

        to_lookup.respond(Err(failure()));
        from_lookup.respond(Ok(()));
        assert_eq!(join_all([from_ticket, to_ticket]).await, vec![Ok(()), Ok(())]);
        assert!(engine.no_pending_lookup());
    }

    #[tokio::test]
    async fn test_repair_of_merged_identity_joins_target() {
        let mut engine = TestEngine::start();
        let ctx = engine.handle.store().create_app_config_source();
        engine.handle.add_usage_context(FileId(1), ctx).await.unwrap();

        let first = engine.handle.repair(FileId(1));
        let lookup = engine.next_lookup().await;
        engine.handle.merge(FileId(2), FileId(1)).await.unwrap();

        let via_old = engine.handle.repair(FileId(1));
        let via_new = engine.handle.repair(FileId(2));
        // Round-trip a command so both repairs have been queued behind the merge.
        engine.handle.get_some_usage_contexts(FileId(2)).await.unwrap();
        assert!(engine.no_pending_lookup());

        lookup.respond(Ok(()));
        assert_eq!(
            join_all([first, via_old, via_new]).await,
            vec![Ok(()), Ok(()), Ok(())]
        );
    }

    #[tokio::test]
    async fn test_stale_forwarded_result_is_not_applied() {
        let mut engine = TestEngine::start();
        let store = engine.handle.store().clone();
        let (a, b, e) = (FileId(1), FileId(2), FileId(3));
        let a_ctx = store.create_web_page_source("https://a");
        let b_ctx = store.create_web_page_source("https://b");
        let e_ctx = store.create_web_page_source("https://e");
        engine.handle.add_usage_context(a, a_ctx).await.unwrap();
        engine.handle.add_usage_context(b, b_ctx).await.unwrap();
        engine.handle.add_usage_context(e, e_ctx).await.unwrap();

        let a_ticket = engine.handle.repair(a);
        let a_lookup = engine.next_lookup().await;
        let b_ticket = engine.handle.repair(b);
        let b_lookup = engine.next_lookup().await;

        engine.handle.merge(b, a).await.unwrap();
        b_lookup.respond(Ok(()));
        assert_eq!(join_all([a_ticket, b_ticket]).await, vec![Ok(()), Ok(())]);

        // `b` moves on to a new query generation through a second merge.
        let mut e_ticket = engine.handle.repair(e);
        let e_lookup = engine.next_lookup().await;
        engine.handle.merge(b, e).await.unwrap();

        // The very late result of `a` must not complete `e`'s repair.
        a_lookup.respond(Ok(()));
        engine
            .wait_for(|handle| handle.stats().stale_results == 1)
            .await;
        assert_eq!(e_ticket.try_outcome(), None);
        assert!(engine.no_pending_lookup());

        e_lookup.respond(Ok(()));
        assert_eq!(e_ticket.await, Ok(()));
    }

    #[tokio::test]
    async fn test_chained_merges_deliver_to_last_identity() {
        let mut engine = TestEngine::start();
        let ctx = engine.handle.store().create_favorite_stickers_source();
        engine.handle.add_usage_context(FileId(1), ctx).await.unwrap();

        let ticket = engine.handle.repair(FileId(1));
        let lookup = engine.next_lookup().await;
        engine.handle.merge(FileId(2), FileId(1)).await.unwrap();
        engine.handle.merge(FileId(3), FileId(2)).await.unwrap();

        lookup.respond(Err(failure()));
        assert_eq!(
            ticket.await,
            Err(RepairError::AllSourcesExhausted {
                file_id: FileId(3),
                attempts: 1,
                last_error: Some(failure()),
            })
        );
        assert_eq!(
            engine
                .handle
                .get_some_usage_contexts(FileId(3))
                .await
                .unwrap(),
            vec![ctx]
        );
    }

    #[tokio::test]
    async fn test_merge_into_forwarding_identity_tries_every_context() {
        let mut engine = TestEngine::start();
        let store = engine.handle.store().clone();
        let (a, b, c) = (FileId(1), FileId(2), FileId(3));
        let a_ctx = store.create_web_page_source("https://a");
        let c_old = store.create_web_page_source("https://c/old");
        let c_new = store.create_web_page_source("https://c/new");
        engine.handle.add_usage_context(a, a_ctx).await.unwrap();
        engine.handle.add_usage_context(c, c_old).await.unwrap();
        engine.handle.add_usage_context(c, c_new).await.unwrap();

        let a_ticket = engine.handle.repair(a);
        let a_lookup = engine.next_lookup().await;
        engine.handle.merge(b, a).await.unwrap();

        let c_ticket = engine.handle.repair(c);
        let c_lookup = engine.next_lookup().await;
        assert_eq!(c_lookup.context_id, c_new);

        // `a` forwards to `b`, so `c`'s repair lands on `b`'s query.
        engine.handle.merge(a, c).await.unwrap();
        a_lookup.respond(Err(failure()));
        c_lookup.respond(Err(failure()));

        let fallback = engine.next_lookup().await;
        assert_eq!(fallback.file_id, b);
        assert_eq!(fallback.context_id, c_old);
        fallback.respond(Ok(()));

        assert_eq!(join_all([a_ticket, c_ticket]).await, vec![Ok(()), Ok(())]);
    }

    #[tokio::test]
    async fn test_merge_without_repairs_only_unions_contexts() {
        let mut engine = TestEngine::start();
        let store = engine.handle.store().clone();
        let shared = store.create_saved_animations_source();
        let own = store.create_saved_ringtones_source();
        let extra = store.create_app_config_source();
        engine.handle.add_usage_context(FileId(2), own).await.unwrap();
        engine.handle.add_usage_context(FileId(2), shared).await.unwrap();
        engine.handle.add_usage_context(FileId(1), shared).await.unwrap();
        engine.handle.add_usage_context(FileId(1), extra).await.unwrap();

        engine.handle.merge(FileId(2), FileId(1)).await.unwrap();

        assert_eq!(
            engine
                .handle
                .get_some_usage_contexts(FileId(2))
                .await
                .unwrap(),
            vec![own, shared, extra]
        );
        assert!(engine.no_pending_lookup());
        assert_eq!(engine.handle.stats().merges, 1);
    }
}
