//! # Persistence and Caller Flows
//!
//! Usage contexts surviving a restart, and the file layer deciding from a
//! remote error which file to repair.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use refkeeper_engine::{
        decode_context, encode_context, error_position, is_reference_error, restore_store,
        save_store, BackgroundId, DialogId, FileId, FileReferenceApi, FileReferenceService,
        MessageFullId, MessageId, MockSourceResolver, MockTimeSource, RemoteError, RepairConfig,
        UsageContext, UsageContextStore, UserId,
    };

    use crate::integration::fixtures::{init_test_tracing, TestEngine};

    #[tokio::test]
    async fn test_restored_store_repairs_with_saved_ids() {
        init_test_tracing();
        let original = UsageContextStore::new();
        let message = MessageFullId::new(DialogId(7), MessageId(70));
        let photo = original.create_user_photo_source(UserId(1), 11);
        let post = original.create_message_source(message);
        let snapshot = save_store(&original).unwrap();

        let restored = Arc::new(restore_store(&snapshot).unwrap());
        assert_eq!(restored.get(post), Some(UsageContext::Message { message }));

        let resolver = Arc::new(MockSourceResolver::new().succeed_on(photo));
        let handle = FileReferenceService::spawn(
            RepairConfig::for_testing(),
            restored,
            resolver.clone(),
            Arc::new(MockTimeSource::new(0)),
        );
        handle.add_usage_context(FileId(1), photo).await.unwrap();
        handle.add_usage_context(FileId(1), post).await.unwrap();

        assert_eq!(handle.repair(FileId(1)).await, Ok(()));
        // The message context was tried first and is unknown to the resolver.
        assert_eq!(resolver.calls(), vec![(FileId(1), post), (FileId(1), photo)]);
        assert_eq!(
            handle.get_some_message_contexts(FileId(1)).await.unwrap(),
            vec![message]
        );
    }

    #[tokio::test]
    async fn test_context_saved_with_owner_is_reloaded() {
        let mut engine = TestEngine::start();
        let source = UsageContextStore::new();
        let id = source.create_background_source(BackgroundId(3), 99);
        let stored_with_owner = encode_context(&source, id).unwrap();

        let store = engine.handle.store().clone();
        store.create_app_config_source();
        let reloaded = decode_context(&store, &stored_with_owner).unwrap();
        engine
            .handle
            .add_usage_context(FileId(9), reloaded)
            .await
            .unwrap();

        let ticket = engine.handle.repair(FileId(9));
        let lookup = engine.next_lookup().await;
        assert_eq!(
            lookup.context,
            UsageContext::Background {
                background_id: BackgroundId(3),
                access_hash: 99,
            }
        );
        lookup.respond(Ok(()));
        assert_eq!(ticket.await, Ok(()));
    }

    /// A request carrying several files, as the file layer would send it.
    struct MultiFileRequest {
        files: Vec<FileId>,
    }

    impl MultiFileRequest {
        fn file_to_repair(&self, error: &RemoteError) -> Option<FileId> {
            if !is_reference_error(error) {
                return None;
            }
            match error_position(error) {
                Some(position) => self.files.get(position).copied(),
                None if self.files.len() == 1 => self.files.first().copied(),
                None => None,
            }
        }
    }

    #[tokio::test]
    async fn test_remote_error_selects_file_to_repair() {
        let mut engine = TestEngine::start();
        let store = engine.handle.store().clone();
        let request = MultiFileRequest {
            files: vec![FileId(10), FileId(11), FileId(12)],
        };
        for (index, file_id) in request.files.iter().enumerate() {
            let ctx = store.create_web_page_source(format!("https://page/{index}"));
            engine
                .handle
                .add_usage_context(*file_id, ctx)
                .await
                .unwrap();
        }

        let unrelated = RemoteError::new(400, "MESSAGE_TOO_LONG");
        assert_eq!(request.file_to_repair(&unrelated), None);

        let error = RemoteError::new(400, "FILE_REFERENCE_1_EXPIRED");
        let file_id = request.file_to_repair(&error).unwrap();
        assert_eq!(file_id, FileId(11));

        let ticket = engine.handle.repair(file_id);
        let lookup = engine.next_lookup().await;
        assert_eq!(lookup.file_id, FileId(11));
        lookup.respond(Ok(()));
        assert_eq!(ticket.await, Ok(()));
    }
}
