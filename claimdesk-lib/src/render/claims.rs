use super::{esc, format_date, format_datetime, format_money, format_percent, page, status_badge, Layout};
use crate::models::{Claim, ClaimNote, ClaimStatus, NoteType, User};
use crate::pagination::Page;
use crate::report::ClaimReport;
use crate::search::{ClaimFilter, StatusFilter};
use crate::utils::encode_path_segment;

fn claim_path(claim: &Claim) -> String {
    encode_path_segment(&claim.claim_id)
}

fn status_options(filter: &ClaimFilter) -> String {
    let current = filter.status_filter();
    let mut options = vec![
        (StatusFilter::Any, "All statuses".to_string()),
        (StatusFilter::Flagged, "Flagged for review".to_string()),
    ];
    for status in ClaimStatus::ALL {
        options.push((
            StatusFilter::Status(status.as_str().to_string()),
            status.label().to_string(),
        ));
    }

    options
        .into_iter()
        .map(|(value, label)| {
            format!(
                r##"<option value="{}"{}>{}</option>"##,
                esc(value.as_param()),
                if &value == current { " selected" } else { "" },
                esc(&label)
            )
        })
        .collect()
}

fn page_link(filter: &ClaimFilter, number: u32, label: &str) -> String {
    let query = esc(&filter.query_string(Some(number)));
    format!(
        r##"<li class="page-item"><a class="page-link" href="/?{q}" hx-get="/api/search/?{q}" hx-target="#claims-table" hx-swap="innerHTML">{label}</a></li>"##,
        q = query,
        label = label
    )
}

fn pagination(page: &Page<Claim>, filter: &ClaimFilter) -> String {
    if !page.is_paginated() {
        return String::new();
    }

    let mut items = String::new();
    if let Some(previous) = page.previous_page_number() {
        items.push_str(&page_link(filter, 1, "&laquo; First"));
        items.push_str(&page_link(filter, previous, "Previous"));
    }
    items.push_str(&format!(
        r##"<li class="page-item active"><span class="page-link">Page {} of {}</span></li>"##,
        page.number, page.num_pages
    ));
    if let Some(next) = page.next_page_number() {
        items.push_str(&page_link(filter, next, "Next"));
        items.push_str(&page_link(filter, page.num_pages, "Last &raquo;"));
    }

    format!(
        r##"<nav aria-label="Claims pages"><ul class="pagination justify-content-center">{}</ul></nav>"##,
        items
    )
}

/// Results table with its pagination; swapped into `#claims-table`
pub fn claims_table(page: &Page<Claim>, filter: &ClaimFilter) -> String {
    let mut rows = String::new();
    for claim in &page.items {
        rows.push_str(&format!(
            r##"<tr class="{row_class}" hx-get="/claim/{path}/" hx-target="#claim-modal-body" hx-swap="innerHTML">
  <td>{flag}{id}</td>
  <td>{patient}</td>
  <td>{insurer}</td>
  <td class="text-end">{billed}</td>
  <td class="text-end">{paid}</td>
  <td>{status}</td>
  <td>{discharge}</td>
</tr>
"##,
            row_class = if claim.is_flagged { "flagged" } else { "" },
            path = claim_path(claim),
            flag = if claim.is_flagged { "🚩 " } else { "" },
            id = esc(&claim.claim_id),
            patient = esc(&claim.patient_name),
            insurer = esc(&claim.insurer),
            billed = format_money(claim.billed_amount),
            paid = format_money(claim.paid_amount),
            status = status_badge(claim.status),
            discharge = format_date(claim.discharge_date),
        ));
    }
    if page.items.is_empty() {
        rows.push_str(
            r##"<tr><td colspan="7" class="text-center text-muted py-4">No claims match your search.</td></tr>"##,
        );
    }

    format!(
        r##"<p class="text-muted small">Showing {start}&ndash;{end} of {total} claims</p>
<div class="table-responsive">
<table class="table table-hover align-middle claims-table bg-white">
  <thead class="table-light">
    <tr><th>Claim ID</th><th>Patient</th><th>Insurer</th><th class="text-end">Billed</th><th class="text-end">Paid</th><th>Status</th><th>Discharged</th></tr>
  </thead>
  <tbody>
{rows}  </tbody>
</table>
</div>
{pagination}"##,
        start = page.start_index(),
        end = page.end_index(),
        total = page.total,
        rows = rows,
        pagination = pagination(page, filter),
    )
}

/// The claims list page: search form, results and the detail modal
pub fn claims_list_page(layout: &Layout<'_>, page: &Page<Claim>, filter: &ClaimFilter) -> String {
    let body = format!(
        r##"<div class="d-flex justify-content-between align-items-center mb-3">
  <h1 class="h3 mb-0">Claims</h1>
</div>
<form class="row g-2 mb-3" action="/" method="get" hx-get="/api/search/" hx-target="#claims-table" hx-swap="innerHTML"
      hx-trigger="submit, input changed delay:300ms from:#search-input, change from:#status-select">
  <div class="col-md-7">
    <input id="search-input" type="search" name="search" class="form-control" value="{search}"
           placeholder="Search by claim ID, patient, insurer or status" autocomplete="off">
  </div>
  <div class="col-md-3">
    <select id="status-select" name="status" class="form-select">{options}</select>
  </div>
  <div class="col-md-2 d-grid">
    <button type="submit" class="btn btn-primary">Search <span class="htmx-indicator spinner-border spinner-border-sm"></span></button>
  </div>
</form>
<div id="claims-table">
{table}
</div>
<div class="modal fade" id="claim-modal" tabindex="-1" aria-hidden="true">
  <div class="modal-dialog modal-lg modal-dialog-scrollable">
    <div class="modal-content">
      <div class="modal-header">
        <h5 class="modal-title">Claim details</h5>
        <button type="button" class="btn-close" data-bs-dismiss="modal" aria-label="Close"></button>
      </div>
      <div class="modal-body" id="claim-modal-body"></div>
    </div>
  </div>
</div>"##,
        search = esc(filter.search_term()),
        options = status_options(filter),
        table = claims_table(page, filter),
    );
    super::page(layout, &body)
}

/// Flag control; the button posts the state it will switch to
pub fn flag_button(claim: &Claim) -> String {
    let (class, next_state, label) = if claim.is_flagged {
        ("btn-danger", "false", "🚩 Remove Flag")
    } else {
        ("btn-outline-secondary", "true", "🏳️ Flag for Review")
    };
    format!(
        r##"<button type="button" class="btn {class}" hx-post="/api/flag/{path}/" hx-vals='{{"flagged": "{next}"}}' hx-target="#flag-button-container" hx-swap="innerHTML">{label}</button>"##,
        class = class,
        path = claim_path(claim),
        next = next_state,
        label = label
    )
}

/// A single note
pub fn note_item(note: &ClaimNote) -> String {
    let class = match note.note_type {
        NoteType::Admin => "note-admin",
        NoteType::System => "note-system",
        NoteType::User => "note-user",
    };
    format!(
        r##"<div class="note-item {class}">
  <div class="small text-muted"><strong>{author}</strong> &middot; {at}</div>
  <div class="note-content">{content}</div>
</div>
"##,
        class = class,
        author = esc(&note.display_name()),
        at = format_datetime(note.created_at),
        content = esc(&note.content).replace('\n', "<br>"),
    )
}

/// Fragment returned after a note was added: the note plus cleared feedback
pub fn note_added(note: &ClaimNote) -> String {
    format!(
        r##"{}<div id="note-feedback" hx-swap-oob="true"></div><p id="no-notes" hx-swap-oob="true" class="d-none"></p>"##,
        note_item(note)
    )
}

pub fn note_warning(message: &str) -> String {
    format!(
        r##"<div class="alert alert-warning py-2 mb-2">{}</div>"##,
        esc(message)
    )
}

/// Claim details; rendered into the modal or inside [`claim_detail_page`]
pub fn claim_detail_partial(claim: &Claim, notes: &[ClaimNote], user: &User) -> String {
    let cpt_codes: String = claim
        .cpt_code_list()
        .iter()
        .map(|code| format!(r##"<span class="badge bg-secondary me-1">{}</span>"##, esc(code)))
        .collect();
    let notes_html: String = notes.iter().map(note_item).collect();
    let path = claim_path(claim);

    format!(
        r##"<div class="claim-detail">
  <div class="d-flex justify-content-between align-items-start mb-3">
    <div>
      <h4 class="mb-1">Claim {id}</h4>
      <div class="text-muted">{patient}</div>
    </div>
    {status}
  </div>
  <dl class="row">
    <dt class="col-sm-4">Insurer</dt><dd class="col-sm-8">{insurer}</dd>
    <dt class="col-sm-4">Billed amount</dt><dd class="col-sm-8">{billed}</dd>
    <dt class="col-sm-4">Paid amount</dt><dd class="col-sm-8">{paid}</dd>
    <dt class="col-sm-4">Underpayment</dt><dd class="col-sm-8">{under}</dd>
    <dt class="col-sm-4">Discharge date</dt><dd class="col-sm-8">{discharge}</dd>
    <dt class="col-sm-4">CPT codes</dt><dd class="col-sm-8">{cpt}</dd>
    <dt class="col-sm-4">Denial reason</dt><dd class="col-sm-8">{denial}</dd>
  </dl>
  <div class="d-flex gap-2 mb-4">
    <div id="flag-button-container">{flag}</div>
    <a class="btn btn-outline-primary" href="/report/{path}/" target="_blank">View report</a>
    <a class="btn btn-outline-primary" href="/report/{path}/?format=pdf" target="_blank">Printable report</a>
  </div>
  <h5>Notes</h5>
  <form class="mb-3" hx-post="/api/add-note/{path}/" hx-target="#notes-list" hx-swap="afterbegin"
        hx-on::after-request="if (event.detail.successful) this.reset()">
    <div id="note-feedback"></div>
    <textarea name="content" class="form-control mb-2" rows="3" placeholder="{placeholder}"></textarea>
    <button type="submit" class="btn btn-primary btn-sm">Add note</button>
  </form>
  {empty}
  <div id="notes-list">
{notes}  </div>
</div>"##,
        id = esc(&claim.claim_id),
        patient = esc(&claim.patient_name),
        status = status_badge(claim.status),
        insurer = esc(&claim.insurer),
        billed = format_money(claim.billed_amount),
        paid = format_money(claim.paid_amount),
        under = format_money(claim.underpayment()),
        discharge = format_date(claim.discharge_date),
        cpt = if cpt_codes.is_empty() { "&mdash;".to_string() } else { cpt_codes },
        denial = claim
            .denial_reason
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .map(esc)
            .unwrap_or_else(|| "&mdash;".to_string()),
        flag = flag_button(claim),
        path = path,
        placeholder = if user.is_staff { "Add an admin note" } else { "Add a note" },
        empty = if notes.is_empty() {
            r##"<p id="no-notes" class="text-muted">No notes yet.</p>"##
        } else {
            ""
        },
        notes = notes_html,
    )
}

/// Standalone detail page for direct (non-htmx) visits
pub fn claim_detail_page(layout: &Layout<'_>, claim: &Claim, notes: &[ClaimNote], user: &User) -> String {
    let body = format!(
        r##"<p><a href="/">&larr; Back to claims</a></p>
<div class="card"><div class="card-body">{}</div></div>"##,
        claim_detail_partial(claim, notes, user)
    );
    page(layout, &body)
}

/// Printable claim report
pub fn report_page(report: &ClaimReport) -> String {
    let claim = &report.claim;
    let cpt_codes = if report.cpt_codes.is_empty() {
        "<p class=\"text-muted\">No CPT codes recorded.</p>".to_string()
    } else {
        let items: String = report
            .cpt_codes
            .iter()
            .map(|code| format!("<li>{}</li>", esc(code)))
            .collect();
        format!("<ul>{}</ul>", items)
    };
    let notes = if report.notes.is_empty() {
        "<p class=\"text-muted\">No notes recorded.</p>".to_string()
    } else {
        report.notes.iter().map(note_item).collect()
    };

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Claim Report - {id}</title>
  <link rel="stylesheet" href="{bootstrap_css}">
  <link rel="stylesheet" href="/static/css/claimdesk.css">
</head>
<body class="bg-white">
<main class="container py-4">
  <div class="d-flex justify-content-between align-items-center mb-4">
    <h1 class="h3 mb-0">Claim Report &ndash; {id}</h1>
    <button type="button" class="btn btn-outline-secondary no-print" onclick="window.print()">Print</button>
  </div>
  <p class="text-muted small">Generated by {generated_by} on {generated_at}</p>
  <h2 class="h5">Claim</h2>
  <table class="table table-sm">
    <tr><th>Patient</th><td>{patient}</td></tr>
    <tr><th>Insurer</th><td>{insurer}</td></tr>
    <tr><th>Status</th><td>{status}</td></tr>
    <tr><th>Discharge date</th><td>{discharge}</td></tr>
    <tr><th>Flagged for review</th><td>{flagged}</td></tr>
    <tr><th>Denial reason</th><td>{denial}</td></tr>
  </table>
  <h2 class="h5">Financial summary</h2>
  <table class="table table-sm">
    <tr><th>Billed amount</th><td>{billed}</td></tr>
    <tr><th>Paid amount</th><td>{paid}</td></tr>
    <tr><th>Underpayment</th><td>{under}</td></tr>
    <tr><th>Underpayment percentage</th><td>{percent}</td></tr>
  </table>
  <h2 class="h5">CPT codes</h2>
  {cpt}
  <h2 class="h5">Notes</h2>
  {notes}
</main>
</body>
</html>
"##,
        id = esc(&claim.claim_id),
        bootstrap_css = super::BOOTSTRAP_CSS,
        generated_by = esc(&report.generated_by),
        generated_at = format_datetime(report.generated_at),
        patient = esc(&claim.patient_name),
        insurer = esc(&claim.insurer),
        status = claim.status.label(),
        discharge = format_date(claim.discharge_date),
        flagged = if claim.is_flagged { "Yes" } else { "No" },
        denial = esc(claim.denial_reason.as_deref().unwrap_or("")),
        billed = format_money(claim.billed_amount),
        paid = format_money(claim.paid_amount),
        under = format_money(report.underpayment),
        percent = format_percent(report.underpayment_percentage),
        cpt = cpt_codes,
        notes = notes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    fn claim(flagged: bool) -> Claim {
        Claim {
            id: 1,
            claim_id: "30001".to_string(),
            patient_name: "Ann <b>".to_string(),
            billed_amount: Decimal::from(100),
            paid_amount: Decimal::from(40),
            status: ClaimStatus::Denied,
            insurer: "Aetna".to_string(),
            discharge_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            cpt_codes: "99213".to_string(),
            denial_reason: None,
            is_flagged: flagged,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_flag_button_posts_next_state() {
        let unflagged = flag_button(&claim(false));
        assert!(unflagged.contains(r##"hx-vals='{"flagged": "true"}'"##));
        assert!(unflagged.contains("Flag for Review"));

        let flagged = flag_button(&claim(true));
        assert!(flagged.contains(r##"hx-vals='{"flagged": "false"}'"##));
        assert!(flagged.contains("Remove Flag"));
    }

    #[test]
    fn test_table_escapes_and_links() {
        let page = Page {
            items: vec![claim(true)],
            number: 1,
            num_pages: 2,
            total: 30,
            page_size: 25,
        };
        let filter = ClaimFilter::new().search("ann").status(StatusFilter::Flagged);
        let html = claims_table(&page, &filter);
        assert!(html.contains("Ann &lt;b&gt;"));
        assert!(html.contains(r##"hx-get="/claim/30001/""##));
        assert!(html.contains("/api/search/?search=ann&amp;status=flagged&amp;page=2"));
        assert!(html.contains("Page 1 of 2"));
    }
}
