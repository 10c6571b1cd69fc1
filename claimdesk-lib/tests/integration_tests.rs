use chrono::NaiveDate;
use claimdesk::queries::{claims, notes, users};
use claimdesk::search::{ClaimFilter, StatusFilter};
use claimdesk::*;
use rust_decimal::Decimal;
use sqlx::SqlitePool;

async fn pool() -> SqlitePool {
    DatabaseConnection::open_and_migrate("sqlite::memory:")
        .await
        .unwrap()
        .into_pool()
}

fn new_claim(claim_id: &str, patient: &str, insurer: &str, status: ClaimStatus) -> models::NewClaim {
    models::NewClaim {
        claim_id: claim_id.to_string(),
        patient_name: patient.to_string(),
        billed_amount: Decimal::new(100_000, 2),
        paid_amount: Decimal::new(25_000, 2),
        status,
        insurer: insurer.to_string(),
        discharge_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        cpt_codes: "99213,82947".to_string(),
        denial_reason: None,
    }
}

async fn seed(pool: &SqlitePool, count: usize) {
    let mut conn = pool.acquire().await.unwrap();
    for i in 0..count {
        let (insurer, status) = match i % 3 {
            0 => ("Blue Cross", ClaimStatus::Denied),
            1 => ("Aetna", ClaimStatus::Paid),
            _ => ("United Healthcare", ClaimStatus::UnderReview),
        };
        let claim = new_claim(&format!("{}", 30000 + i), &format!("Patient {}", i), insurer, status);
        claims::insert_claim(&mut conn, &claim).await.unwrap();
    }
}

#[tokio::test]
async fn test_pagination_uses_page_size_and_keeps_filter() {
    let pool = pool().await;
    seed(&pool, 60).await;

    let all = ClaimFilter::new();
    let first = claims::paginate_claims(&pool, &all, None, 25).await.unwrap();
    assert_eq!(first.items.len(), 25);
    assert_eq!(first.num_pages, 3);
    assert_eq!(first.items[0].claim_id, "30000");

    let last = claims::paginate_claims(&pool, &all, Some("99"), 25).await.unwrap();
    assert_eq!(last.number, 3);
    assert_eq!(last.items.len(), 10);

    let filter = ClaimFilter::from_params(Some("blue"), Some("denied"));
    let page = claims::paginate_claims(&pool, &filter, Some("1"), 5).await.unwrap();
    assert_eq!(page.total, 20);
    assert_eq!(page.items.len(), 5);
    assert!(page.items.iter().all(|c| c.insurer == "Blue Cross"));
    assert_eq!(filter.query_string(page.next_page_number()), "search=blue&status=denied&page=2");
}

#[tokio::test]
async fn test_search_is_case_insensitive_substring() {
    let pool = pool().await;
    seed(&pool, 9).await;

    for term in ["UNITED", "united health", "nited"] {
        let filter = ClaimFilter::new().search(term);
        assert_eq!(claims::count_claims(&pool, &filter).await.unwrap(), 3, "term {term}");
    }

    let by_patient = ClaimFilter::new().search("patient 4");
    let found = claims::list_claims(&pool, &by_patient, 25, 0).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].claim_id, "30004");

    let by_status = ClaimFilter::new().search("under_");
    assert_eq!(claims::count_claims(&pool, &by_status).await.unwrap(), 3);

    // LIKE wildcards typed by the user match literally.
    let wildcard = ClaimFilter::new().search("%");
    assert_eq!(claims::count_claims(&pool, &wildcard).await.unwrap(), 0);

    let mut conn = pool.acquire().await.unwrap();
    let accented = new_claim("39999", "élise Durand", "Cigna", ClaimStatus::Paid);
    claims::insert_claim(&mut conn, &accented).await.unwrap();
    drop(conn);
    // Case folding covers ASCII letters; accented ones match as stored.
    for (term, expected) in [("DURAND", 1), ("élise", 1), ("ÉLISE", 0)] {
        let filter = ClaimFilter::new().search(term);
        assert_eq!(claims::count_claims(&pool, &filter).await.unwrap(), expected, "term {term}");
    }
}

#[tokio::test]
async fn test_flag_set_is_idempotent() {
    let pool = pool().await;
    seed(&pool, 2).await;

    let first = claims::set_claim_flag(&pool, "30000", true).await.unwrap().unwrap();
    let second = claims::set_claim_flag(&pool, "30000", true).await.unwrap().unwrap();
    assert!(first.is_flagged);
    assert!(second.is_flagged);

    let flagged = ClaimFilter::new().status(StatusFilter::Flagged);
    assert_eq!(claims::count_claims(&pool, &flagged).await.unwrap(), 1);

    let toggled = claims::toggle_claim_flag(&pool, "30000").await.unwrap().unwrap();
    assert!(!toggled.is_flagged);
    assert!(claims::set_claim_flag(&pool, "nope", true).await.unwrap().is_none());
}

#[tokio::test]
async fn test_notes_append_to_existing_claim() {
    let pool = pool().await;
    seed(&pool, 1).await;
    let claim = claims::find_claim_by_claim_id(&pool, "30000").await.unwrap().unwrap();

    let author = users::create_user(
        &pool,
        &users::NewUser {
            username: "rhea".to_string(),
            password_hash: "x".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    notes::insert_note(&pool, claim.id, NoteType::User, "first", None).await.unwrap();
    notes::insert_note(&pool, claim.id, NoteType::Admin, "second", None).await.unwrap();
    notes::insert_note(&pool, claim.id, NoteType::System, "third", None).await.unwrap();
    notes::insert_note(&pool, claim.id, NoteType::User, "fourth", Some(author.id))
        .await
        .unwrap();

    let newest_first = notes::list_notes_for_claim(&pool, claim.id, true).await.unwrap();
    let contents: Vec<&str> = newest_first.iter().map(|n| n.content.as_str()).collect();
    assert_eq!(contents, ["fourth", "third", "second", "first"]);
    let names: Vec<String> = newest_first.iter().map(|n| n.display_name()).collect();
    assert_eq!(names, ["rhea", "System Flag", "Admin Note", "User Note"]);

    // Notes cannot point at a claim that does not exist.
    assert!(notes::insert_note(&pool, 9999, NoteType::User, "orphan", None).await.is_err());
    assert_eq!(notes::count_notes(&pool).await.unwrap(), 4);
}

#[tokio::test]
async fn test_load_json_file() {
    let pool = pool().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("claims.json");
    std::fs::write(
        &path,
        r#"[
  {"id": "40001", "patient_name": "Ada Park", "billed_amount": "250.00", "paid_amount": "100", "status": "paid", "insurer_name": "Cigna", "discharge_date": "2024-01-05"},
  {"claim_id": "40001", "denial_reason": "N/A", "cpt_codes": "99213"}
]"#,
    )
    .unwrap();

    let summary = load_file(&pool, &path, DataFormat::Json).await.unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.errors, 0);

    let claim = claims::find_claim_by_claim_id(&pool, "40001").await.unwrap().unwrap();
    assert_eq!(claim.status, ClaimStatus::Paid);
    assert_eq!(claim.underpayment(), Decimal::new(15_000, 2));
    assert_eq!(claim.cpt_code_list(), ["99213"]);
}

#[tokio::test]
async fn test_settings_validation() {
    let mut settings = yaml_parser::parse_yaml_string("debug: false\n").unwrap();
    assert!(yaml_parser::validate_settings(&mut settings).is_err());

    let mut settings = yaml_parser::parse_yaml_string("debug: true\npage_size: 10\n").unwrap();
    yaml_parser::validate_settings(&mut settings).unwrap();
    assert!(!settings.secret_key.is_empty());
    assert_eq!(settings.page_size, 10);
}
