//! `_include` resolution through the request pipeline.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::fixtures::{ObservationFixture, linked_patient, observation, patient, practitioner};
use common::{InMemorySearchService, factory, include_pipeline, include_pipeline_with};
use helios_search::bundle::{Issue, IssueType};
use helios_search::context::RequestContext;
use helios_search::error::{ExecutionError, IncludeError, SearchError};
use helios_search::pipeline::{SearchResourceHandler, SearchResourceRequest};
use helios_search::types::SearchEntryMode;
use helios_search::{SearchConfig, SearchResourceService};

fn ctx() -> RequestContext {
    common::init_tracing();
    RequestContext::new("include-test")
}

fn entry_keys(response: &helios_search::pipeline::SearchResourceResponse) -> Vec<(String, String, SearchEntryMode)> {
    response
        .bundle
        .entries()
        .iter()
        .filter_map(|e| {
            let (rt, id) = e.resource_key()?;
            Some((rt.to_string(), id.to_string(), e.search_mode?))
        })
        .collect()
}

#[tokio::test]
async fn test_include_appends_referenced_resource() {
    let search = Arc::new(InMemorySearchService::new(vec![
        observation("obs-1", "Patient/42"),
        patient("42"),
        patient("99"),
    ]));
    let pipeline = include_pipeline(search.clone());

    let response = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new(
                "Observation",
                [("code", "8480-6"), ("_include", "Observation:subject")],
            ),
        )
        .await
        .unwrap();

    assert_eq!(
        entry_keys(&response),
        vec![
            ("Observation".into(), "obs-1".into(), SearchEntryMode::Match),
            ("Patient".into(), "42".into(), SearchEntryMode::Include),
        ]
    );
    assert_eq!(
        response.bundle.entries()[1].full_url.as_deref(),
        Some("http://localhost:8080/Patient/42")
    );

    let calls = search.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].resource_type, "Observation");
    assert_eq!(
        calls[0].queries,
        vec![("code".to_string(), "8480-6".to_string())]
    );
    assert_eq!(calls[1].resource_type, "Patient");
    assert_eq!(
        calls[1].queries,
        vec![
            ("_id".to_string(), "42".to_string()),
            ("_count".to_string(), "1".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_self_link_keeps_include_directive() {
    let search = Arc::new(InMemorySearchService::new(vec![observation(
        "obs-1",
        "Patient/42",
    )]));
    let pipeline = include_pipeline(search);

    let response = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new("Observation", [("_include", "Observation:subject")]),
        )
        .await
        .unwrap();

    assert_eq!(
        response.bundle.self_link(),
        "http://localhost:8080/Observation?_include=Observation%3Asubject"
    );
}

#[tokio::test]
async fn test_references_are_batched_per_target_type() {
    let search = Arc::new(InMemorySearchService::new(vec![
        observation("obs-1", "Patient/42"),
        observation("obs-2", "Patient/43"),
        observation("obs-3", "Patient/42"),
        patient("42"),
        patient("43"),
    ]));
    let pipeline = include_pipeline(search.clone());

    let response = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new(
                "Observation",
                [
                    ("_include", "Observation:subject"),
                    ("_include", "Observation:patient"),
                ],
            ),
        )
        .await
        .unwrap();

    let patient_calls = search.calls_for("Patient");
    assert_eq!(patient_calls.len(), 1);
    assert_eq!(
        patient_calls[0].queries,
        vec![
            ("_id".to_string(), "42,43".to_string()),
            ("_count".to_string(), "2".to_string()),
        ]
    );

    let included: Vec<_> = entry_keys(&response)
        .into_iter()
        .filter(|(_, _, mode)| *mode == SearchEntryMode::Include)
        .map(|(_, id, _)| id)
        .collect();
    assert_eq!(included, vec!["42", "43"]);
}

#[tokio::test]
async fn test_included_resources_are_not_deduplicated_against_matches() {
    let search = Arc::new(InMemorySearchService::new(vec![
        patient("42"),
        linked_patient("43", "Patient/42"),
    ]));
    let pipeline = include_pipeline(search);

    let response = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new("Patient", [("_include", "Patient:link")]),
        )
        .await
        .unwrap();

    assert_eq!(
        entry_keys(&response),
        vec![
            ("Patient".into(), "42".into(), SearchEntryMode::Match),
            ("Patient".into(), "43".into(), SearchEntryMode::Match),
            ("Patient".into(), "42".into(), SearchEntryMode::Include),
        ]
    );
}

#[tokio::test]
async fn test_without_include_passes_through() {
    let resources = vec![observation("obs-1", "Patient/42"), patient("42")];
    let direct = Arc::new(
        InMemorySearchService::new(resources.clone())
            .with_continuation_token("abc")
            .with_total(7),
    );
    let wrapped = Arc::new(
        InMemorySearchService::new(resources)
            .with_continuation_token("abc")
            .with_total(7),
    );
    let request = SearchResourceRequest::new("Observation", [("status", "final")]);

    let plain = SearchResourceService::new(direct, factory())
        .handle(&ctx(), request.clone())
        .await
        .unwrap();
    let through = include_pipeline(wrapped.clone())
        .handle(&ctx(), request)
        .await
        .unwrap();

    assert_eq!(through.bundle.entries(), plain.bundle.entries());
    assert_eq!(through.bundle.self_link(), plain.bundle.self_link());
    assert_eq!(through.bundle.next_link(), plain.bundle.next_link());
    assert_eq!(through.bundle.total(), Some(7));
    assert_eq!(wrapped.calls().len(), 1);
}

#[tokio::test]
async fn test_paging_metadata_is_that_of_the_original_search() {
    let search = Arc::new(
        InMemorySearchService::new(vec![observation("obs-1", "Patient/42"), patient("42")])
            .with_continuation_token("abc")
            .with_total(3),
    );
    let pipeline = include_pipeline(search);

    let response = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new("Observation", [("_include", "Observation:subject")]),
        )
        .await
        .unwrap();

    assert_eq!(response.bundle.total(), Some(3));
    assert_eq!(response.continuation_token.as_deref(), Some("abc"));
    let next = response.bundle.next_link().unwrap();
    assert!(next.contains("_include=Observation%3Asubject"));
    assert!(next.ends_with("ct=YWJj"));
}

#[tokio::test]
async fn test_original_outcome_entries_are_kept_once() {
    let search = Arc::new(
        InMemorySearchService::new(vec![observation("obs-1", "Patient/42"), patient("42")])
            .with_partial()
            .with_unsupported("foo"),
    );
    let pipeline = include_pipeline(search);

    let response = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new(
                "Observation",
                [("foo", "bar"), ("_include", "Observation:subject")],
            ),
        )
        .await
        .unwrap();

    let modes: Vec<_> = response
        .bundle
        .entries()
        .iter()
        .map(|e| e.search_mode)
        .collect();
    assert_eq!(
        modes,
        vec![
            Some(SearchEntryMode::Outcome),
            Some(SearchEntryMode::Match),
            Some(SearchEntryMode::Outcome),
            Some(SearchEntryMode::Include),
        ]
    );
    assert!(!response.bundle.self_link().contains("foo"));
}

#[tokio::test]
async fn test_explicit_target_filters_references() {
    let search = Arc::new(InMemorySearchService::new(vec![
        ObservationFixture::new("obs-1")
            .with_performer("Practitioner/p1")
            .with_performer("Patient/42")
            .build(),
        practitioner("p1"),
        patient("42"),
    ]));
    let pipeline = include_pipeline(search.clone());

    let response = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new(
                "Observation",
                [("_include", "Observation:performer:Practitioner")],
            ),
        )
        .await
        .unwrap();

    assert!(search.calls_for("Patient").is_empty());
    assert_eq!(
        entry_keys(&response).last(),
        Some(&(
            "Practitioner".to_string(),
            "p1".to_string(),
            SearchEntryMode::Include
        ))
    );
}

#[tokio::test]
async fn test_ambiguous_target_type_fails() {
    let search = Arc::new(InMemorySearchService::new(vec![observation(
        "obs-1",
        "Patient/42",
    )]));
    let pipeline = include_pipeline(search.clone());

    let err = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new("Observation", [("_include", "Observation:performer")]),
        )
        .await
        .unwrap_err();

    match err {
        SearchError::Include(IncludeError::AmbiguousTargetType { targets, .. }) => {
            assert_eq!(targets, vec!["Practitioner", "Patient", "Organization"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(search.calls().is_empty());
}

#[tokio::test]
async fn test_directive_validation_errors() {
    let search = Arc::new(InMemorySearchService::new(Vec::new()));
    let pipeline = include_pipeline(search);

    let cases = [
        ("Observation::Patient", "invalid"),
        ("Observation:unknown", "unknown"),
        ("Observation:device", "no-target"),
    ];
    for (directive, expected) in cases {
        let err = pipeline
            .handle(
                &ctx(),
                SearchResourceRequest::new("Observation", [("_include", directive)]),
            )
            .await
            .unwrap_err();
        let matched = match (&err, expected) {
            (SearchError::Include(IncludeError::InvalidDirective { .. }), "invalid") => true,
            (SearchError::Include(IncludeError::UnknownSearchParameter { .. }), "unknown") => true,
            (SearchError::Include(IncludeError::NoTargetType { .. }), "no-target") => true,
            _ => false,
        };
        assert!(matched, "{directive}: unexpected error {err:?}");
    }
}

#[tokio::test]
async fn test_secondary_search_failure_propagates() {
    let search = Arc::new(
        InMemorySearchService::new(vec![observation("obs-1", "Patient/42")])
            .failing_for("Patient"),
    );
    let pipeline = include_pipeline(search);

    let err = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new("Observation", [("_include", "Observation:subject")]),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SearchError::Execution(ExecutionError::Backend { .. })
    ));
}

#[tokio::test]
async fn test_cancellation_fails_include_phase() {
    let search = Arc::new(
        InMemorySearchService::new(vec![observation("obs-1", "Patient/42"), patient("42")])
            .slow_for("Patient"),
    );
    let pipeline = include_pipeline(search);

    let token = CancellationToken::new();
    let ctx = RequestContext::new("cancelled").with_cancellation(token.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.handle(
            &ctx,
            SearchResourceRequest::new("Observation", [("_include", "Observation:subject")]),
        ),
    )
    .await
    .expect("cancellation should end the include phase")
    .unwrap_err();

    assert!(err.is_cancelled());
    assert!(matches!(
        err,
        SearchError::Include(IncludeError::Cancelled { resolved: 0, total: 1 })
    ));
}

#[tokio::test]
async fn test_cancelled_before_include_phase() {
    let search = Arc::new(InMemorySearchService::new(vec![observation(
        "obs-1",
        "Patient/42",
    )]));
    let pipeline = include_pipeline(search.clone());

    let token = CancellationToken::new();
    token.cancel();
    let ctx = RequestContext::new("cancelled").with_cancellation(token);

    let err = pipeline
        .handle(
            &ctx,
            SearchResourceRequest::new("Observation", [("_include", "Observation:subject")]),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(search.calls_for("Patient").is_empty());
}

#[tokio::test]
async fn test_include_groups_respect_concurrency_limit() {
    let config = SearchConfig {
        max_concurrent_includes: 1,
        ..SearchConfig::default()
    };
    let search = Arc::new(InMemorySearchService::new(vec![
        ObservationFixture::new("obs-1")
            .with_subject("Patient/42")
            .with_performer("Practitioner/p1")
            .build(),
        patient("42"),
        practitioner("p1"),
    ]));
    let pipeline = include_pipeline_with(search.clone(), &config);

    let response = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new(
                "Observation",
                [
                    ("_include", "Observation:subject"),
                    ("_include", "Observation:performer:Practitioner"),
                ],
            ),
        )
        .await
        .unwrap();

    // group order follows first-seen references, whatever order the
    // secondary searches finish in
    let included: Vec<_> = entry_keys(&response)
        .into_iter()
        .filter(|(_, _, mode)| *mode == SearchEntryMode::Include)
        .map(|(rt, id, _)| format!("{rt}/{id}"))
        .collect();
    assert_eq!(included, vec!["Patient/42", "Practitioner/p1"]);
    assert_eq!(search.calls().len(), 3);
}

fn observations_with_own_patients(count: usize) -> Vec<helios_search::types::ResourceWrapper> {
    (0..count)
        .flat_map(|i| {
            [
                observation(&format!("obs-{i}"), &format!("Patient/p{i}")),
                patient(&format!("p{i}")),
            ]
        })
        .collect()
}

#[tokio::test]
async fn test_include_group_larger_than_page() {
    let search = Arc::new(
        InMemorySearchService::new(observations_with_own_patients(25))
            .with_continuation_token("matches")
            .id_page_size_for("Patient", 10),
    );
    let pipeline = include_pipeline(search.clone());

    let response = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new("Observation", [("_include", "Observation:subject")]),
        )
        .await
        .unwrap();

    let included: Vec<_> = entry_keys(&response)
        .into_iter()
        .filter(|(_, _, mode)| *mode == SearchEntryMode::Include)
        .map(|(_, id, _)| id)
        .collect();
    let expected: Vec<_> = (0..25).map(|i| format!("p{i}")).collect();
    assert_eq!(included, expected);

    let patient_calls = search.calls_for("Patient");
    assert_eq!(patient_calls.len(), 3);
    assert!(
        patient_calls[0]
            .queries
            .contains(&("_count".to_string(), "25".to_string()))
    );
    assert!(
        patient_calls[1]
            .queries
            .contains(&("ct".to_string(), "MTA=".to_string()))
    );

    // the outer search's paging survives the include paging
    assert!(response.bundle.next_link().unwrap().ends_with("ct=bWF0Y2hlcw%3D%3D"));
    assert_eq!(
        response
            .bundle
            .entries_with_mode(SearchEntryMode::Outcome)
            .count(),
        0
    );
}

#[tokio::test]
async fn test_partial_include_search_fails() {
    let search = Arc::new(
        InMemorySearchService::new(observations_with_own_patients(3)).partial_ids_for("Patient"),
    );
    let pipeline = include_pipeline(search);

    let err = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new("Observation", [("_include", "Observation:subject")]),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SearchError::Include(IncludeError::Incomplete { ref resource_type, .. })
            if resource_type == "Patient"
    ));
}

#[tokio::test]
async fn test_include_paging_that_never_advances_fails() {
    let search = Arc::new(
        InMemorySearchService::new(observations_with_own_patients(3)).stuck_ids_for("Patient"),
    );
    let pipeline = include_pipeline(search.clone());

    let err = pipeline
        .handle(
            &ctx(),
            SearchResourceRequest::new("Observation", [("_include", "Observation:subject")]),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SearchError::Include(IncludeError::Incomplete { .. })
    ));
    assert_eq!(search.calls_for("Patient").len(), 2);
}

#[tokio::test]
async fn test_request_diagnostics_lead_the_included_bundle() {
    let search = Arc::new(InMemorySearchService::new(vec![
        observation("obs-1", "Patient/42"),
        patient("42"),
    ]));
    let pipeline = include_pipeline(search);

    let request = SearchResourceRequest::new("Observation", [("_include", "Observation:subject")])
        .with_diagnostic(Issue::information(IssueType::Informational, "served from replica"));
    let response = pipeline.handle(&ctx(), request).await.unwrap();

    let modes: Vec<_> = response
        .bundle
        .entries()
        .iter()
        .filter_map(|e| e.search_mode)
        .collect();
    assert_eq!(
        modes,
        vec![
            SearchEntryMode::Outcome,
            SearchEntryMode::Match,
            SearchEntryMode::Include
        ]
    );
    let outcome = response
        .bundle
        .entries_with_mode(SearchEntryMode::Outcome)
        .next()
        .and_then(|e| e.resource.as_ref())
        .unwrap();
    assert_eq!(outcome["issue"][0]["diagnostics"], "served from replica");
}
