// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the external DNS updater.

#[cfg(test)]
mod tests {
    use crate::diff::ChangeAction;
    use crate::dns_errors::{Provider, SyncError};
    use crate::policy::{AuthorityEntry, AuthorityPolicy, ZoneAuthorityResolver};
    use crate::reconcile::{SkipReason, UpdateOutcome};
    use crate::retry::CallError;
    use crate::route53::*;
    use crate::testing::{exposing_resolver, fast_retry, RecordedChange, RecordingZoneProvider};
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    const FORWARDED: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 7);

    fn zones() -> Vec<ExternalHostedZone> {
        vec![ExternalHostedZone::new("example.com.", "/hostedzone/Z1")]
    }

    fn updater(provider: Arc<RecordingZoneProvider>) -> ExternalDnsUpdater {
        ExternalDnsUpdater::new(
            Arc::new(exposing_resolver("example.com", true, &["public"])),
            provider,
            FORWARDED,
            fast_retry(),
        )
    }

    #[test]
    fn test_zone_match_ignores_trailing_dot() {
        let zones = zones();

        assert_eq!(
            find_hosted_zone(&zones, "public.example.com").map(|zone| zone.id.as_str()),
            Some("/hostedzone/Z1")
        );
        assert!(find_hosted_zone(&zones, "public.example.org").is_none());
    }

    #[test]
    fn test_first_matching_zone_wins() {
        let zones = vec![
            ExternalHostedZone::new("example.com.", "/hostedzone/Z1"),
            ExternalHostedZone::new("sub.example.com.", "/hostedzone/Z2"),
        ];

        let zone = find_hosted_zone(&zones, "a.sub.example.com").unwrap();

        assert_eq!(zone.id, "/hostedzone/Z1");
    }

    #[tokio::test]
    async fn test_disabled_provider_skips_without_any_check() {
        let updater =
            ExternalDnsUpdater::disabled(Arc::new(exposing_resolver("example.com", true, &[])));

        assert!(!updater.is_enabled());
        assert_eq!(updater.list_zones().await, Ok(None));
        assert_eq!(
            updater.upsert(None, "uncovered.example.org").await,
            Ok(UpdateOutcome::Skipped(SkipReason::ProviderDisabled))
        );
        assert_eq!(
            updater.delete(None, "public.example.com").await,
            Ok(UpdateOutcome::Skipped(SkipReason::ProviderDisabled))
        );
    }

    #[tokio::test]
    async fn test_upsert_exposed_host() {
        let provider = Arc::new(RecordingZoneProvider::with_zones(zones()));
        let updater = updater(provider.clone());

        let zones = updater.list_zones().await.unwrap();
        let outcome = updater
            .upsert(zones.as_deref(), "public.example.com")
            .await;

        assert_eq!(outcome, Ok(UpdateOutcome::Applied));
        assert_eq!(
            provider.changes(),
            vec![RecordedChange {
                zone_id: "/hostedzone/Z1".to_string(),
                action: ChangeAction::Upsert,
                name: "public.example.com.".to_string(),
                value: FORWARDED,
            }]
        );
    }

    #[tokio::test]
    async fn test_upsert_uncovered_host_is_denied() {
        let provider = Arc::new(RecordingZoneProvider::with_zones(zones()));

        let outcome = updater(provider.clone())
            .upsert(Some(zones().as_slice()), "public.example.org")
            .await;

        assert_eq!(
            outcome,
            Err(SyncError::AuthorityDenied {
                host: "public.example.org".to_string()
            })
        );
        assert!(provider.changes().is_empty());
    }

    #[tokio::test]
    async fn test_unexposed_host_is_skipped() {
        let provider = Arc::new(RecordingZoneProvider::with_zones(zones()));

        let outcome = updater(provider.clone())
            .upsert(Some(zones().as_slice()), "internal.example.com")
            .await;

        assert_eq!(outcome, Ok(UpdateOutcome::Skipped(SkipReason::NotExposed)));
        assert!(provider.changes().is_empty());
    }

    #[tokio::test]
    async fn test_absent_zone_listing_is_skipped() {
        let provider = Arc::new(RecordingZoneProvider::with_zones(zones()));

        let outcome = updater(provider.clone())
            .upsert(None, "public.example.com")
            .await;

        assert_eq!(
            outcome,
            Ok(UpdateOutcome::Skipped(SkipReason::ProviderDisabled))
        );
    }

    #[tokio::test]
    async fn test_empty_zone_listing_means_no_zone() {
        let provider = Arc::new(RecordingZoneProvider::default());

        let outcome = updater(provider.clone())
            .upsert(Some(&[][..]), "public.example.com")
            .await;

        assert_eq!(
            outcome,
            Ok(UpdateOutcome::Skipped(SkipReason::NoAuthoritativeZone))
        );
        assert!(provider.changes().is_empty());
    }

    #[tokio::test]
    async fn test_delete_skips_certificate_check() {
        let provider = Arc::new(RecordingZoneProvider::with_zones(zones()));
        let exposure = AuthorityPolicy::new(vec![AuthorityEntry {
            zone: "example.com".to_string(),
            name_patterns: vec!["public".to_string()],
            apex_covered: false,
        }])
        .unwrap();
        let updater = ExternalDnsUpdater::new(
            Arc::new(ZoneAuthorityResolver::new(AuthorityPolicy::default(), exposure)),
            provider.clone(),
            FORWARDED,
            fast_retry(),
        );

        let outcome = updater.delete(Some(zones().as_slice()), "public.example.com").await;

        assert_eq!(outcome, Ok(UpdateOutcome::Applied));
        assert_eq!(provider.changes()[0].action, ChangeAction::Delete);
        assert_eq!(provider.changes()[0].name, "public.example.com.");
    }

    #[tokio::test]
    async fn test_rejected_change_carries_provider_payload() {
        let provider = Arc::new(
            RecordingZoneProvider::with_zones(zones()).with_change_responses(vec![Err(
                CallError::permanent("InvalidChangeBatch: record not found")
                    .with_code("InvalidChangeBatch"),
            )]),
        );

        let err = updater(provider.clone())
            .delete(Some(zones().as_slice()), "public.example.com")
            .await
            .unwrap_err();

        let SyncError::Provider(provider_err) = &err else {
            panic!("expected provider error, got {err:?}");
        };
        assert_eq!(provider_err.provider, Provider::External);
        assert_eq!(provider_err.code.as_deref(), Some("InvalidChangeBatch"));
        assert_eq!(
            err.to_string(),
            "Error external dns delete for host public.example.com: InvalidChangeBatch: record not found"
        );
        assert_eq!(provider.changes().len(), 1);
    }

    #[tokio::test]
    async fn test_throttled_change_is_retried() {
        let provider = Arc::new(
            RecordingZoneProvider::with_zones(zones()).with_change_responses(vec![Err(
                CallError::transient("Rate exceeded").with_code("Throttling"),
            )]),
        );

        let outcome = updater(provider.clone())
            .upsert(Some(zones().as_slice()), "public.example.com")
            .await;

        assert_eq!(outcome, Ok(UpdateOutcome::Applied));
        assert_eq!(provider.changes().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_listing_is_source_unavailable() {
        let provider = Arc::new(RecordingZoneProvider::failing_list(CallError::transient(
            "dispatch failure",
        )));

        let result = updater(provider.clone()).list_zones().await;

        assert!(matches!(
            result,
            Err(SyncError::SourceUnavailable {
                source_name: "external hosted zones",
                ..
            })
        ));
        assert_eq!(provider.list_calls(), 3);
    }
}
