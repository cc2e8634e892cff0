//! Bulk contact upload: validation, deduplication and DNC screening

mod common;

use std::collections::HashMap;

use rvoip_dialer_engine::prelude::*;

use common::*;

fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

async fn empty_list(dialer: &TestDialer) -> DataList {
    let campaign = dialer
        .engine
        .campaigns()
        .create_campaign(campaign_params(DialMethod::Progressive))
        .await
        .unwrap();
    dialer
        .engine
        .lists()
        .create_list("uploads", 100, Some(&campaign.id))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_upload_classifies_every_row() {
    let dialer = test_dialer().await;
    let list = empty_list(&dialer).await;
    dialer
        .engine
        .contacts()
        .add_to_dnc("+1 555 999 0000", Some("regulator"))
        .await
        .unwrap();

    let rows = vec![
        row(&[("first_name", "Ada"), ("phone", "+1 (555) 100-0001")]),
        row(&[("first_name", "Grace"), ("phone", "+15551000002")]),
        // Same number as the first row once canonicalized
        row(&[("first_name", "Ada"), ("phone", "+1.555.100.0001")]),
        row(&[("first_name", "Linus"), ("phone", "call me")]),
        row(&[("email", "nobody@example.com")]),
        row(&[("first_name", "Blocked"), ("phone", "+15559990000")]),
    ];

    let report = dialer
        .engine
        .upload_contacts(&list.id, &rows, &IngestOptions::default())
        .await
        .unwrap();

    assert_eq!(report.accepted, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.invalid, 2);
    assert_eq!(report.dnc_rejected, 1);
    assert_eq!(report.total(), rows.len());

    let reasons: Vec<_> = report.rejected_rows.iter().map(|r| (r.row, r.reason.clone())).collect();
    assert_eq!(
        reasons,
        vec![
            (2, RejectReason::Duplicate),
            (3, RejectReason::InvalidPhone("call me".to_string())),
            (4, RejectReason::MissingContactDetails),
            (5, RejectReason::DoNotCall),
        ]
    );

    let stored = dialer.engine.contacts().contacts_in_list(&list.id).await.unwrap();
    let phones: Vec<_> = stored.iter().filter_map(|c| c.phone.clone()).collect();
    assert_eq!(phones.len(), 2);
    assert!(phones.contains(&"+15551000001".to_string()));
    assert!(stored.iter().all(|c| c.status == ContactStatus::Pending && c.attempt_count == 0));
}

#[tokio::test]
async fn test_reupload_is_deduplicated_against_the_list() {
    let dialer = test_dialer().await;
    let list = empty_list(&dialer).await;
    let rows = contact_rows(3, 5);

    let first = dialer
        .engine
        .upload_contacts(&list.id, &rows, &IngestOptions::default())
        .await
        .unwrap();
    assert_eq!(first.accepted, 5);

    let second = dialer
        .engine
        .upload_contacts(&list.id, &rows, &IngestOptions::default())
        .await
        .unwrap();
    assert_eq!(second.accepted, 0);
    assert_eq!(second.duplicates, 5);
    assert_eq!(dialer.engine.contacts().count_in_list(&list.id).await.unwrap(), 5);

    let keep_all = IngestOptions {
        skip_duplicates: false,
        ..IngestOptions::default()
    };
    let third = dialer.engine.upload_contacts(&list.id, &rows[..2], &keep_all).await.unwrap();
    assert_eq!(third.accepted, 2);
    assert_eq!(dialer.engine.contacts().count_in_list(&list.id).await.unwrap(), 7);
}

#[tokio::test]
async fn test_same_number_in_another_list_is_accepted() {
    let dialer = test_dialer().await;
    let first = empty_list(&dialer).await;
    let second = empty_list(&dialer).await;
    let rows = contact_rows(4, 3);

    for list in [&first, &second] {
        let report = dialer
            .engine
            .upload_contacts(&list.id, &rows, &IngestOptions::default())
            .await
            .unwrap();
        assert_eq!(report.accepted, 3);
    }
}

#[tokio::test]
async fn test_required_fields() {
    let dialer = test_dialer().await;
    let list = empty_list(&dialer).await;
    let options = IngestOptions {
        require_email: true,
        ..IngestOptions::default()
    };

    let rows = vec![
        row(&[("first_name", "Ada"), ("phone", "+15552000001"), ("email", "Ada@Example.com")]),
        row(&[("first_name", "Grace"), ("phone", "+15552000002")]),
        row(&[("first_name", "Edsger"), ("phone", "+15552000003"), ("email", "edsger@")]),
        row(&[("first_name", "Barbara")]),
    ];
    let report = dialer.engine.upload_contacts(&list.id, &rows, &options).await.unwrap();

    assert_eq!(report.accepted, 1);
    assert_eq!(report.invalid, 3);
    assert_eq!(report.rejected_rows[0].reason, RejectReason::MissingEmail);
    assert!(matches!(report.rejected_rows[1].reason, RejectReason::InvalidEmail(_)));
    assert_eq!(report.rejected_rows[2].reason, RejectReason::MissingPhone);

    let stored = dialer.engine.contacts().contacts_in_list(&list.id).await.unwrap();
    assert_eq!(stored[0].email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn test_phone_optional_contacts_are_stored_but_never_queued() {
    let dialer = test_dialer().await;
    let list = empty_list(&dialer).await;
    let options = IngestOptions {
        require_phone: false,
        ..IngestOptions::default()
    };

    let report = dialer
        .engine
        .upload_contacts(&list.id, &[row(&[("first_name", "Offline"), ("last_name", "Lead")])], &options)
        .await
        .unwrap();
    assert_eq!(report.accepted, 1);

    let campaign_id = list.campaign_id.clone().unwrap();
    let generation = dialer.engine.generate_queue(&campaign_id, 10).await.unwrap();
    assert_eq!(generation.signal, GenerationSignal::NoEligibleContacts);
}

#[tokio::test]
async fn test_custom_field_mapping_and_alternates() {
    let dialer = test_dialer().await;
    let list = empty_list(&dialer).await;
    let options = IngestOptions {
        mapping: FieldMapping {
            first_name: Some("Given".into()),
            last_name: Some("Surname".into()),
            email: None,
            phone: Some("Mobile".into()),
            alternate_phones: vec!["Home".into(), "Work".into(), "Fax".into()],
        },
        ..IngestOptions::default()
    };

    let rows = vec![row(&[
        ("Given", " Katherine "),
        ("Surname", "Johnson"),
        ("Mobile", "555-300-0001"),
        ("Home", "(555) 300-0002"),
        ("Work", "5553000001"),
        ("Fax", "not a number"),
        ("email", "ignored@example.com"),
    ])];
    let report = dialer.engine.upload_contacts(&list.id, &rows, &options).await.unwrap();
    assert_eq!(report.accepted, 1);

    let contact = dialer.engine.contacts().contacts_in_list(&list.id).await.unwrap().remove(0);
    assert_eq!(contact.first_name.as_deref(), Some("Katherine"));
    assert_eq!(contact.last_name.as_deref(), Some("Johnson"));
    assert_eq!(contact.phone.as_deref(), Some("5553000001"));
    assert_eq!(contact.alternate_phones, vec!["5553000002".to_string()]);
    assert_eq!(contact.email, None);
}

#[tokio::test]
async fn test_upload_limits() {
    let mut config = DialerConfig::default();
    config.ingest.max_rows_per_upload = 5;
    config.ingest.default_max_attempts = 4;
    let dialer = test_dialer_with(config).await;
    let list = empty_list(&dialer).await;

    let oversized = dialer
        .engine
        .upload_contacts(&list.id, &contact_rows(5, 6), &IngestOptions::default())
        .await;
    assert!(matches!(oversized, Err(DialerError::Validation(_))));
    assert_eq!(dialer.engine.contacts().count_in_list(&list.id).await.unwrap(), 0);

    let no_attempts = IngestOptions {
        max_attempts: Some(0),
        ..IngestOptions::default()
    };
    assert!(matches!(
        dialer.engine.upload_contacts(&list.id, &contact_rows(5, 2), &no_attempts).await,
        Err(DialerError::Validation(_))
    ));

    dialer
        .engine
        .upload_contacts(&list.id, &contact_rows(5, 5), &IngestOptions::default())
        .await
        .unwrap();
    let stored = dialer.engine.contacts().contacts_in_list(&list.id).await.unwrap();
    assert!(stored.iter().all(|c| c.max_attempts == 4));
}

#[tokio::test]
async fn test_upload_into_missing_list_fails() {
    let dialer = test_dialer().await;
    let result = dialer
        .engine
        .upload_contacts(&ListId::from("missing"), &contact_rows(6, 1), &IngestOptions::default())
        .await;
    assert!(matches!(result, Err(DialerError::NotFound(_))));
}

#[tokio::test]
async fn test_upload_is_published() {
    let dialer = test_dialer().await;
    let list = empty_list(&dialer).await;
    let mut events = dialer.engine.events().subscribe();

    let mut rows = contact_rows(7, 3);
    rows.push(row(&[("phone", "bogus")]));
    dialer
        .engine
        .upload_contacts(&list.id, &rows, &IngestOptions::default())
        .await
        .unwrap();

    let event = events.try_receive().unwrap().expect("upload event");
    assert_eq!(
        event.event,
        DialerEvent::ContactsUploaded {
            list_id: list.id.clone(),
            accepted: 3,
            rejected: 1,
        }
    );
}
