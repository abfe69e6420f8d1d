// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the internal DNS updater.

#[cfg(test)]
mod tests {
    use crate::bind9::*;
    use crate::dns_errors::{Provider, SyncError};
    use crate::domains::AuthoritativeDomain;
    use crate::reconcile::{SkipReason, UpdateOutcome};
    use crate::retry::{CallError, RetryPolicy};
    use crate::testing::{covering_resolver, fast_retry, RecordingTransport};
    use hickory_client::op::{ResponseCode, UpdateMessage};
    use hickory_client::rr::{DNSClass, RData};
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    const TARGET: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

    fn domains(names: &[&str]) -> Vec<AuthoritativeDomain> {
        names.iter().map(|name| AuthoritativeDomain::new(*name)).collect()
    }

    fn updater(transport: Arc<RecordingTransport>) -> InternalDnsUpdater {
        InternalDnsUpdater::new(
            Arc::new(covering_resolver("example.com", true)),
            transport,
            TARGET,
            fast_retry(),
        )
    }

    // ========== Zone selection ==========

    #[test]
    fn test_first_suffix_match_wins() {
        let domains = domains(&["example.com", "svc.example.com"]);

        let zone = find_authoritative_domain(&domains, "api.svc.example.com").unwrap();

        assert_eq!(zone.domain, "example.com");
    }

    #[test]
    fn test_list_order_decides_match() {
        let domains = domains(&["svc.example.com", "example.com"]);

        let zone = find_authoritative_domain(&domains, "api.svc.example.com").unwrap();

        assert_eq!(zone.domain, "svc.example.com");
    }

    #[test]
    fn test_no_matching_domain() {
        assert!(find_authoritative_domain(&domains(&["example.org"]), "svc.example.com").is_none());
    }

    #[test]
    fn test_suffix_match_is_not_label_aware() {
        let domains = domains(&["example.com"]);

        assert!(find_authoritative_domain(&domains, "notexample.com").is_some());
    }

    #[test]
    fn test_relative_record_names() {
        assert_eq!(relative_record_name("svc.example.com", "example.com"), "svc");
        assert_eq!(relative_record_name("a.b.example.com", "example.com"), "a.b");
        assert_eq!(relative_record_name("example.com", "example.com"), "@");
        assert_eq!(
            relative_record_name("notexample.com", "example.com"),
            "notexample.com"
        );
    }

    // ========== Upsert ==========

    #[tokio::test]
    async fn test_upsert_replaces_record_with_target() {
        let transport = Arc::new(RecordingTransport::default());

        let outcome = updater(transport.clone())
            .upsert(&domains(&["example.com"]), "svc.example.com")
            .await;

        assert_eq!(outcome, Ok(UpdateOutcome::Applied));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].zones()[0].name().to_string(), "example.com.");

        let updates = sent[0].updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].dns_class(), DNSClass::ANY);
        assert_eq!(updates[1].name().to_string(), "svc.example.com.");
        assert_eq!(updates[1].ttl(), 300);
        assert_eq!(updates[1].data(), Some(&RData::A(TARGET.into())));
    }

    #[tokio::test]
    async fn test_upsert_uncovered_host_is_denied_without_network() {
        let transport = Arc::new(RecordingTransport::default());

        let outcome = updater(transport.clone())
            .upsert(&domains(&["example.org"]), "svc.example.org")
            .await;

        assert_eq!(
            outcome,
            Err(SyncError::AuthorityDenied {
                host: "svc.example.org".to_string()
            })
        );
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_outside_authoritative_domains_is_skipped() {
        let transport = Arc::new(RecordingTransport::default());

        let outcome = updater(transport.clone())
            .upsert(&domains(&["example.net"]), "svc.example.com")
            .await;

        assert_eq!(
            outcome,
            Ok(UpdateOutcome::Skipped(SkipReason::NoAuthoritativeZone))
        );
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_refused_update_reports_response_code() {
        let transport = Arc::new(RecordingTransport::with_responses(vec![Ok(
            ResponseCode::NotAuth,
        )]));

        let err = updater(transport.clone())
            .upsert(&domains(&["example.com"]), "svc.example.com")
            .await
            .unwrap_err();

        let SyncError::Provider(provider_err) = &err else {
            panic!("expected provider error, got {err:?}");
        };
        assert_eq!(provider_err.provider, Provider::Internal);
        assert_eq!(provider_err.code.as_deref(), Some("NotAuth"));
        assert!(!provider_err.transient);
        assert_eq!(
            err.to_string(),
            "Error internal dns update for host svc.example.com: NotAuth"
        );
        assert_eq!(transport.sent().len(), 1, "NOTAUTH must not be retried");
    }

    #[tokio::test]
    async fn test_servfail_is_retried() {
        let transport = Arc::new(RecordingTransport::with_responses(vec![
            Ok(ResponseCode::ServFail),
            Ok(ResponseCode::NoError),
        ]));

        let outcome = updater(transport.clone())
            .upsert(&domains(&["example.com"]), "svc.example.com")
            .await;

        assert_eq!(outcome, Ok(UpdateOutcome::Applied));
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_primary_exhausts_attempts() {
        let transport = Arc::new(RecordingTransport::with_responses(vec![
            Err(CallError::transient("connection refused")),
            Err(CallError::transient("connection refused")),
            Err(CallError::transient("connection refused")),
        ]));
        let updater = InternalDnsUpdater::new(
            Arc::new(covering_resolver("example.com", true)),
            transport.clone(),
            TARGET,
            RetryPolicy {
                max_attempts: 3,
                ..fast_retry()
            },
        );

        let err = updater
            .upsert(&domains(&["example.com"]), "svc.example.com")
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_timed_out_attempt_resends_same_replace() {
        let transport = Arc::new(RecordingTransport::with_responses(vec![Err(
            CallError::Timeout(fast_retry().attempt_timeout),
        )]));

        let outcome = updater(transport.clone())
            .upsert(&domains(&["example.com"]), "svc.example.com")
            .await;

        assert_eq!(outcome, Ok(UpdateOutcome::Applied));
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].updates(), sent[1].updates());
        assert_eq!(sent[1].updates()[0].dns_class(), DNSClass::ANY);
    }

    // ========== Delete ==========

    #[tokio::test]
    async fn test_delete_apex_uses_zone_name() {
        let transport = Arc::new(RecordingTransport::default());

        let outcome = updater(transport.clone())
            .delete(&domains(&["example.com"]), "example.com")
            .await;

        assert_eq!(outcome, Ok(UpdateOutcome::Applied));

        let sent = transport.sent();
        let updates = sent[0].updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].name().to_string(), "example.com.");
        assert_eq!(updates[0].dns_class(), DNSClass::ANY);
    }

    #[tokio::test]
    async fn test_delete_skips_certificate_check() {
        let transport = Arc::new(RecordingTransport::default());

        let outcome = updater(transport.clone())
            .delete(&domains(&["example.org"]), "old.example.org")
            .await;

        assert_eq!(outcome, Ok(UpdateOutcome::Applied));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_error_message_uses_delete_verb() {
        let transport = Arc::new(RecordingTransport::with_responses(vec![Ok(
            ResponseCode::Refused,
        )]));

        let err = updater(transport)
            .delete(&domains(&["example.com"]), "svc.example.com")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Error internal dns delete for host svc.example.com: Refused"
        );
    }
}
