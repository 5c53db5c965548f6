#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::directory::models::Entitlement;
    use crate::errors::{AuthxError, ConflictKind};
    use crate::observability::metrics::get_metrics;
    use crate::tests::common::{json, InMemoryDirectory};
    use crate::workflow::token::generate_token;
    use crate::workflow::{
        ConsumeEffect, DirectoryTokenRepository, WorkflowKind, WorkflowTokenEngine,
        WorkflowTokenEntry, WorkflowTokenRepository,
    };

    fn engine_over(directory: &Arc<InMemoryDirectory>) -> WorkflowTokenEngine {
        let repository = Arc::new(DirectoryTokenRepository::new(directory.clone()));
        WorkflowTokenEngine::new(repository)
    }

    fn entitlement(kind: &str, display: &str, value: &str) -> Entitlement {
        serde_json::from_value(json!({"type": kind, "display": display, "value": value})).unwrap()
    }

    fn pending(directory: &InMemoryDirectory, user_id: &str, kind: WorkflowKind) -> Vec<WorkflowTokenEntry> {
        directory
            .user(user_id)
            .unwrap()
            .entitlements
            .iter()
            .filter_map(WorkflowTokenEntry::from_entitlement)
            .filter(|entry| entry.kind == kind && !entry.consumed)
            .collect()
    }

    #[tokio::test]
    async fn token_lifecycle_generate_resolve_consume() {
        let directory = InMemoryDirectory::new();
        let user_id = directory.insert("alice@example.com", false, vec![]);
        let engine = engine_over(&directory);

        let token = engine.generate(&user_id, WorkflowKind::Activation).await.unwrap();
        assert_eq!(token.len(), 32);

        let resolved = engine.resolve(WorkflowKind::Activation, &token).await.unwrap();
        assert_eq!(resolved.id, user_id);
        // resolve does not consume
        assert_eq!(pending(&directory, &user_id, WorkflowKind::Activation).len(), 1);

        let activated = engine
            .consume(WorkflowKind::Activation, &token, ConsumeEffect::Activate)
            .await
            .unwrap();
        assert_eq!(activated.active, Some(true));
        assert!(pending(&directory, &user_id, WorkflowKind::Activation).is_empty());

        for result in [
            engine.resolve(WorkflowKind::Activation, &token).await.map(|_| ()),
            engine
                .consume(WorkflowKind::Activation, &token, ConsumeEffect::Activate)
                .await
                .map(|_| ()),
        ] {
            assert!(matches!(result, Err(AuthxError::InvalidToken)));
        }
    }

    #[tokio::test]
    async fn kinds_do_not_cross() {
        let directory = InMemoryDirectory::new();
        let user_id = directory.insert("bob@example.com", true, vec![]);
        let engine = engine_over(&directory);

        let token = engine.generate(&user_id, WorkflowKind::PasswordReset).await.unwrap();
        let err = engine
            .consume(WorkflowKind::Activation, &token, ConsumeEffect::Activate)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthxError::InvalidToken));

        engine
            .consume(
                WorkflowKind::PasswordReset,
                &token,
                ConsumeEffect::SetPassword("n3w-pass".to_owned()),
            )
            .await
            .unwrap();
        assert_eq!(directory.password(&user_id).as_deref(), Some("n3w-pass"));
    }

    #[tokio::test]
    async fn malformed_tokens_never_reach_the_directory() {
        let directory = InMemoryDirectory::new();
        let engine = engine_over(&directory);

        for token in ["", "short", "\" or userName pr", "Z".repeat(32).as_str()] {
            let err = engine.resolve(WorkflowKind::Activation, token).await.unwrap_err();
            assert!(matches!(err, AuthxError::InvalidToken));
        }
        assert_eq!(directory.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generating_again_retires_the_previous_token() {
        let directory = InMemoryDirectory::new();
        let user_id = directory.insert(
            "carol@example.com",
            true,
            vec![entitlement("premium", "gold", "yes")],
        );
        let engine = engine_over(&directory);

        let first = engine.generate(&user_id, WorkflowKind::PasswordReset).await.unwrap();
        let second = engine.generate(&user_id, WorkflowKind::PasswordReset).await.unwrap();
        assert_ne!(first, second);

        let open = pending(&directory, &user_id, WorkflowKind::PasswordReset);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].token, second);
        assert!(matches!(
            engine.resolve(WorkflowKind::PasswordReset, &first).await,
            Err(AuthxError::InvalidToken)
        ));

        // unrelated entitlements survive
        let user = directory.user(&user_id).unwrap();
        assert!(user.entitlements.iter().any(|e| e.kind.as_deref() == Some("premium")));
    }

    #[tokio::test]
    async fn filter_matches_across_elements_are_not_a_match() {
        let token = generate_token();
        let directory = InMemoryDirectory::new();
        // each clause is satisfied by a different element, none is the pending entry
        directory.insert(
            "dave@example.com",
            false,
            vec![
                entitlement("activation", &token, "true"),
                entitlement("activation", &generate_token(), "false"),
            ],
        );
        let engine = engine_over(&directory);

        let err = engine.resolve(WorkflowKind::Activation, &token).await.unwrap_err();
        assert!(matches!(err, AuthxError::InvalidToken));
    }

    #[tokio::test]
    async fn duplicate_pending_token_uses_first_user_and_reports_violation() {
        let token = generate_token();
        let directory = InMemoryDirectory::new();
        let first = directory.insert("erin@example.com", false, vec![entitlement("activation", &token, "false")]);
        let second = directory.insert("frank@example.com", false, vec![entitlement("activation", &token, "false")]);
        let engine = engine_over(&directory);
        let violations_before = get_metrics().await.workflow_policy_violations.get();

        let user = engine
            .consume(WorkflowKind::Activation, &token, ConsumeEffect::Activate)
            .await
            .unwrap();
        assert_eq!(user.id, first);
        assert_eq!(directory.user(&second).unwrap().active, Some(false));
        assert!(get_metrics().await.workflow_policy_violations.get() > violations_before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumes_have_exactly_one_winner() {
        let directory = InMemoryDirectory::new();
        let user_id = directory.insert("gina@example.com", false, vec![]);
        let engine = Arc::new(engine_over(&directory));
        let token = engine.generate(&user_id, WorkflowKind::Activation).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .consume(WorkflowKind::Activation, &token, ConsumeEffect::Activate)
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(AuthxError::InvalidToken) => {}
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn conditional_write_settles_races_between_instances() {
        let directory = InMemoryDirectory::new();
        let user_id = directory.insert("hank@example.com", false, vec![]);
        let token = engine_over(&directory)
            .generate(&user_id, WorkflowKind::Activation)
            .await
            .unwrap();

        // two repositories share no lock; both read before either writes
        directory.set_list_delay(Duration::from_millis(150));
        let a = Arc::new(DirectoryTokenRepository::new(directory.clone()));
        let b = Arc::new(DirectoryTokenRepository::new(directory.clone()));

        let effect = || ConsumeEffect::Activate.into_operations();
        let (ra, rb) = tokio::join!(
            a.consume_if_pending(WorkflowKind::Activation, &token, effect()),
            b.consume_if_pending(WorkflowKind::Activation, &token, effect()),
        );

        let outcomes = [ra.is_ok(), rb.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let loser = if ra.is_ok() { rb } else { ra };
        assert!(matches!(loser, Err(AuthxError::InvalidToken)));
        assert_eq!(directory.user(&user_id).unwrap().active, Some(true));
    }

    #[tokio::test]
    async fn directory_rejection_on_consume_is_not_an_invalid_token() {
        let directory = InMemoryDirectory::new();
        let user_id = directory.insert("erin@example.com", true, vec![]);
        let engine = engine_over(&directory);
        let token = engine.generate(&user_id, WorkflowKind::PasswordReset).await.unwrap();

        directory.reject_next_modify("password violates policy");
        let err = engine
            .consume(
                WorkflowKind::PasswordReset,
                &token,
                ConsumeEffect::SetPassword("short".to_owned()),
            )
            .await
            .unwrap_err();
        match &err {
            AuthxError::UpstreamConflict { detail, kind, .. } => {
                assert_eq!(detail, "password violates policy");
                assert_eq!(*kind, ConflictKind::Validation);
            }
            other => panic!("unexpected error {:?}", other),
        }

        // the token is still pending and usable
        let resolved = engine.resolve(WorkflowKind::PasswordReset, &token).await.unwrap();
        assert_eq!(resolved.id, user_id);
        engine
            .consume(
                WorkflowKind::PasswordReset,
                &token,
                ConsumeEffect::SetPassword("long-enough".to_owned()),
            )
            .await
            .unwrap();
        assert_eq!(directory.password(&user_id).as_deref(), Some("long-enough"));
    }
}
