use super::{esc, format_date, format_datetime, format_money, format_percent, page, status_badge, Layout};
use crate::loader::LoadSummary;
use crate::models::User;
use crate::queries::users::UserCounts;
use crate::stats::{DashboardStats, SystemStats};
use crate::utils::{encode_path_segment, to_title_case};

/// Actions offered on the user management page
pub const USER_ACTIONS: [&str; 4] = ["make_staff", "remove_staff", "deactivate", "activate"];

fn admin_nav(active: &str) -> String {
    let links = [
        ("/admin-dashboard/", "Dashboard"),
        ("/admin-dashboard/csv-upload/", "CSV upload"),
        ("/admin-dashboard/manage-users/", "Users"),
        ("/admin-dashboard/system-stats/", "System stats"),
    ];
    let items: String = links
        .iter()
        .map(|(href, label)| {
            format!(
                r##"<li class="nav-item"><a class="nav-link{}" href="{}">{}</a></li>"##,
                if *href == active { " active" } else { "" },
                href,
                label
            )
        })
        .collect();
    format!(r##"<ul class="nav nav-pills mb-4">{}</ul>"##, items)
}

fn stat_card(label: &str, value: &str) -> String {
    format!(
        r##"<div class="col-sm-6 col-lg-3"><div class="card stat-card h-100"><div class="card-body"><div class="text-muted small">{}</div><div class="stat-value">{}</div></div></div></div>"##,
        esc(label),
        value
    )
}

fn user_cards(users: &UserCounts) -> String {
    format!(
        "{}{}{}{}",
        stat_card("Users", &users.total.to_string()),
        stat_card("Active", &users.active.to_string()),
        stat_card("Inactive", &(users.total - users.active).to_string()),
        stat_card("Staff", &users.staff.to_string()),
    )
}

pub fn dashboard_page(layout: &Layout<'_>, stats: &DashboardStats) -> String {
    let status_rows: String = stats
        .status_stats
        .iter()
        .map(|share| {
            format!(
                r##"<tr><td>{}</td><td class="text-end">{}</td><td class="text-end">{}</td></tr>"##,
                status_badge(share.status),
                share.count,
                format_percent(share.percentage)
            )
        })
        .collect();

    let notes: String = stats
        .recent_notes
        .iter()
        .map(|recent| {
            format!(
                r##"<li class="list-group-item"><div class="small text-muted">{} &middot; claim <a href="/claim/{}/">{}</a> &middot; {}</div>{}</li>"##,
                esc(&recent.note.display_name()),
                encode_path_segment(&recent.claim_id),
                esc(&recent.claim_id),
                format_datetime(recent.note.created_at),
                esc(&recent.note.content)
            )
        })
        .collect();

    let claims: String = stats
        .recent_claims
        .iter()
        .map(|claim| {
            format!(
                r##"<li class="list-group-item d-flex justify-content-between"><span><a href="/claim/{}/">{}</a> &middot; {}</span>{}</li>"##,
                encode_path_segment(&claim.claim_id),
                esc(&claim.claim_id),
                esc(&claim.patient_name),
                status_badge(claim.status)
            )
        })
        .collect();

    let body = format!(
        r##"<h1 class="h3 mb-3">Admin dashboard</h1>
{nav}
<div class="row g-3 mb-4">
{total}{flagged}{avg}{sum}
</div>
<div class="row g-3 mb-4">{users}</div>
<div class="row g-4">
  <div class="col-lg-4">
    <h2 class="h5">Status distribution</h2>
    <table class="table table-sm bg-white"><thead><tr><th>Status</th><th class="text-end">Claims</th><th class="text-end">Share</th></tr></thead><tbody>{status_rows}</tbody></table>
  </div>
  <div class="col-lg-4">
    <h2 class="h5">Recent notes</h2>
    <ul class="list-group">{notes}</ul>
  </div>
  <div class="col-lg-4">
    <h2 class="h5">Recent claims</h2>
    <ul class="list-group">{claims}</ul>
  </div>
</div>"##,
        nav = admin_nav("/admin-dashboard/"),
        total = stat_card("Total claims", &stats.total_claims.to_string()),
        flagged = stat_card("Flagged", &stats.flagged_claims.to_string()),
        avg = stat_card("Avg. underpayment", &format_money(stats.avg_underpayment)),
        sum = stat_card("Total underpayment", &format_money(stats.total_underpayment)),
        users = user_cards(&stats.users),
        status_rows = status_rows,
        notes = if notes.is_empty() {
            r##"<li class="list-group-item text-muted">No notes yet.</li>"##.to_string()
        } else {
            notes
        },
        claims = if claims.is_empty() {
            r##"<li class="list-group-item text-muted">No claims yet.</li>"##.to_string()
        } else {
            claims
        },
    );
    page(layout, &body)
}

pub fn csv_upload_page(layout: &Layout<'_>, max_bytes: usize) -> String {
    let body = format!(
        r##"<h1 class="h3 mb-3">Upload claims</h1>
{nav}
<div class="card"><div class="card-body">
<p class="text-muted">Upload one or two CSV exports (comma or pipe separated, {mib} MB each at most).
New claim ids are created; existing claims only have missing values (N/A, 0 or under review) filled in.</p>
<form method="post" action="/admin-dashboard/process-csv/" enctype="multipart/form-data">
  <div class="mb-3">
    <label class="form-label" for="csv_file_1">Claims file</label>
    <input class="form-control" type="file" id="csv_file_1" name="csv_file_1" accept=".csv">
  </div>
  <div class="mb-3">
    <label class="form-label" for="csv_file_2">Details file</label>
    <input class="form-control" type="file" id="csv_file_2" name="csv_file_2" accept=".csv">
  </div>
  <button class="btn btn-primary" type="submit">Upload</button>
</form>
</div></div>"##,
        nav = admin_nav("/admin-dashboard/csv-upload/"),
        mib = max_bytes / (1024 * 1024),
    );
    page(layout, &body)
}

pub fn csv_results_page(layout: &Layout<'_>, summary: &LoadSummary) -> String {
    let details: String = summary
        .error_details
        .iter()
        .map(|detail| format!("<li>{}</li>", esc(detail)))
        .collect();
    let body = format!(
        r##"<h1 class="h3 mb-3">Upload results</h1>
{nav}
<div class="row g-3 mb-4">{created}{updated}{skipped}{errors}</div>
{details}
<a class="btn btn-primary" href="/admin-dashboard/csv-upload/">Upload more</a>
<a class="btn btn-outline-secondary" href="/">View claims</a>"##,
        nav = admin_nav("/admin-dashboard/csv-upload/"),
        created = stat_card("Created", &summary.created.to_string()),
        updated = stat_card("Updated", &summary.updated.to_string()),
        skipped = stat_card("Unchanged", &summary.skipped.to_string()),
        errors = stat_card("Errors", &summary.errors.to_string()),
        details = if details.is_empty() {
            String::new()
        } else {
            format!(
                r##"<div class="alert alert-warning"><strong>First errors</strong><ul class="mb-0">{}</ul></div>"##,
                details
            )
        },
    );
    page(layout, &body)
}

fn user_actions(user: &User, current_user_id: i64) -> String {
    if user.is_superuser {
        return r##"<span class="text-muted small">Superuser</span>"##.to_string();
    }
    if user.id == current_user_id {
        return r##"<span class="text-muted small">You</span>"##.to_string();
    }

    let available = USER_ACTIONS.iter().filter(|action| match **action {
        "make_staff" => !user.is_staff,
        "remove_staff" => user.is_staff,
        "deactivate" => user.is_active,
        "activate" => !user.is_active,
        _ => false,
    });
    available
        .map(|action| {
            format!(
                r##"<form method="post" action="/admin-dashboard/manage-users/" class="d-inline"><input type="hidden" name="user_id" value="{}"><input type="hidden" name="action" value="{}"><button class="btn btn-sm btn-outline-{}" type="submit">{}</button></form> "##,
                user.id,
                action,
                if matches!(*action, "deactivate" | "remove_staff") { "danger" } else { "primary" },
                to_title_case(action)
            )
        })
        .collect()
}

pub fn manage_users_page(
    layout: &Layout<'_>,
    users: &[User],
    counts: &UserCounts,
    current_user_id: i64,
) -> String {
    let rows: String = users
        .iter()
        .map(|user| {
            format!(
                r##"<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"##,
                esc(&user.username),
                esc(user.full_name().as_deref().unwrap_or("")),
                esc(&user.email),
                if user.is_staff { "Staff" } else { "User" },
                if user.is_active {
                    r##"<span class="badge bg-success">Active</span>"##
                } else {
                    r##"<span class="badge bg-secondary">Inactive</span>"##
                },
                format_date(user.date_joined.date_naive()),
                user_actions(user, current_user_id)
            )
        })
        .collect();

    let body = format!(
        r##"<h1 class="h3 mb-3">Manage users</h1>
{nav}
<div class="row g-3 mb-4">{cards}</div>
<div class="table-responsive">
<table class="table table-sm align-middle bg-white">
<thead><tr><th>Username</th><th>Name</th><th>Email</th><th>Role</th><th>Status</th><th>Joined</th><th>Actions</th></tr></thead>
<tbody>{rows}</tbody>
</table>
</div>"##,
        nav = admin_nav("/admin-dashboard/manage-users/"),
        cards = user_cards(counts),
        rows = rows,
    );
    page(layout, &body)
}

fn count_rows<'a, I>(rows: I) -> String
where
    I: IntoIterator<Item = (String, &'a i64)>,
{
    rows.into_iter()
        .map(|(label, count)| {
            format!(
                r##"<tr><td>{}</td><td class="text-end">{}</td></tr>"##,
                esc(&label),
                count
            )
        })
        .collect()
}

pub fn system_stats_page(layout: &Layout<'_>, stats: &SystemStats) -> String {
    let by_status = count_rows(
        stats
            .by_status
            .iter()
            .map(|(status, count)| (status.label().to_string(), count)),
    );
    let by_insurer = count_rows(
        stats
            .by_insurer
            .iter()
            .map(|(insurer, count)| (insurer.clone(), count)),
    );
    let by_note_type = count_rows(
        stats
            .notes_by_type
            .iter()
            .map(|(note_type, count)| (note_type.label().to_string(), count)),
    );

    let body = format!(
        r##"<h1 class="h3 mb-3">System statistics</h1>
{nav}
<h2 class="h5">Claims</h2>
<div class="row g-3 mb-4">{total}{flagged}</div>
<div class="row g-4 mb-4">
  <div class="col-md-6"><h3 class="h6">By status</h3><table class="table table-sm bg-white"><tbody>{by_status}</tbody></table></div>
  <div class="col-md-6"><h3 class="h6">Top insurers</h3><table class="table table-sm bg-white"><tbody>{by_insurer}</tbody></table></div>
</div>
<h2 class="h5">Financial</h2>
<div class="row g-3 mb-4">{billed}{paid}{avg}</div>
<h2 class="h5">Users</h2>
<div class="row g-3 mb-4">{users}</div>
<h2 class="h5">Activity</h2>
<div class="row g-3 mb-4">{notes}</div>
<table class="table table-sm bg-white w-auto"><tbody>{by_note_type}</tbody></table>"##,
        nav = admin_nav("/admin-dashboard/system-stats/"),
        total = stat_card("Total claims", &stats.total_claims.to_string()),
        flagged = stat_card("Flagged", &stats.flagged_claims.to_string()),
        by_status = by_status,
        by_insurer = by_insurer,
        billed = stat_card("Total billed", &format_money(stats.total_billed)),
        paid = stat_card("Total paid", &format_money(stats.total_paid)),
        avg = stat_card("Avg. claim amount", &format_money(stats.avg_claim_amount)),
        users = user_cards(&stats.users),
        notes = stat_card("Notes", &stats.total_notes.to_string()),
        by_note_type = by_note_type,
    );
    page(layout, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i64, is_staff: bool, is_superuser: bool) -> User {
        User {
            id,
            username: format!("user{}", id),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: String::new(),
            is_staff,
            is_superuser,
            is_active: true,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_user_actions() {
        let html = user_actions(&user(2, false, false), 1);
        assert!(html.contains(r#"value="make_staff""#));
        assert!(html.contains("Make Staff"));
        assert!(html.contains(r#"value="deactivate""#));
        assert!(!html.contains(r#"value="activate""#));

        assert!(!user_actions(&user(3, true, true), 1).contains("<form"));
        assert!(!user_actions(&user(1, true, false), 1).contains("<form"));
    }
}
