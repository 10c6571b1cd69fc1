//! Server-side HTML.
//!
//! Full pages go through [`page`], which wraps a body in the site layout;
//! fragments returned to htmx are plain strings built by the submodules.
//! Every interpolated value passes through [`esc`] unless it is markup we
//! produced ourselves.

pub mod admin;
pub mod auth;
pub mod claims;
pub mod profile;

use crate::models::{ClaimStatus, User};
use crate::utils::escape_html;
use crate::web::flash::Flash;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

pub use crate::accounts::SITE_NAME;

const HTMX_SRC: &str = "https://unpkg.com/htmx.org@1.9.12";
const BOOTSTRAP_CSS: &str = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css";
const BOOTSTRAP_JS: &str = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/js/bootstrap.bundle.min.js";

/// Page chrome: title, signed-in user and pending messages
#[derive(Debug, Clone, Copy)]
pub struct Layout<'a> {
    pub title: &'a str,
    pub user: Option<&'a User>,
    pub messages: &'a [Flash],
}

impl<'a> Layout<'a> {
    pub fn new(title: &'a str) -> Self {
        Self {
            title,
            user: None,
            messages: &[],
        }
    }

    pub fn user(mut self, user: Option<&'a User>) -> Self {
        self.user = user;
        self
    }

    pub fn messages(mut self, messages: &'a [Flash]) -> Self {
        self.messages = messages;
        self
    }
}

pub fn esc(s: &str) -> String {
    escape_html(s)
}

/// `$1,234.50`, with a leading minus for negative amounts
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, grouped, fraction)
}

pub fn format_percent(value: Decimal) -> String {
    format!(
        "{:.1}%",
        value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    )
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

pub fn format_datetime(at: DateTime<Utc>) -> String {
    at.format("%b %d, %Y %H:%M UTC").to_string()
}

pub fn status_badge(status: ClaimStatus) -> String {
    let class = match status {
        ClaimStatus::Denied => "bg-danger",
        ClaimStatus::Paid => "bg-success",
        ClaimStatus::UnderReview => "bg-warning text-dark",
    };
    format!(
        r##"<span class="badge status-badge {}">{}</span>"##,
        class,
        status.label()
    )
}

pub fn messages_block(messages: &[Flash]) -> String {
    let mut html = String::new();
    for message in messages {
        html.push_str(&format!(
            r##"<div class="alert alert-{} alert-dismissible fade show" role="alert">{}<button type="button" class="btn-close" data-bs-dismiss="alert" aria-label="Close"></button></div>"##,
            message.level.css_class(),
            esc(&message.text)
        ));
    }
    html
}

fn navbar(user: Option<&User>) -> String {
    let mut links = String::new();
    match user {
        Some(user) => {
            links.push_str(r##"<li class="nav-item"><a class="nav-link" href="/">Claims</a></li>"##);
            if user.is_staff {
                links.push_str(
                    r##"<li class="nav-item"><a class="nav-link" href="/admin-dashboard/">Admin</a></li>"##,
                );
            }
            links.push_str(&format!(
                r##"<li class="nav-item"><a class="nav-link" href="/profile/">{}</a></li>"##,
                esc(&user.display_name())
            ));
            links.push_str(
                r##"<li class="nav-item"><a class="nav-link" href="/auth/logout/">Log out</a></li>"##,
            );
        }
        None => {
            links.push_str(r##"<li class="nav-item"><a class="nav-link" href="/auth/login/">Log in</a></li>"##);
            links.push_str(r##"<li class="nav-item"><a class="nav-link" href="/auth/signup/">Sign up</a></li>"##);
        }
    }

    format!(
        r##"<nav class="navbar navbar-expand navbar-dark bg-dark mb-4 no-print">
  <div class="container">
    <a class="navbar-brand" href="/">{}</a>
    <ul class="navbar-nav ms-auto">{}</ul>
  </div>
</nav>"##,
        SITE_NAME, links
    )
}

/// Wrap `body` in the site layout
pub fn page(layout: &Layout<'_>, body: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title} | {site}</title>
  <link rel="stylesheet" href="{bootstrap_css}">
  <link rel="stylesheet" href="/static/css/claimdesk.css">
  <script src="{htmx}"></script>
</head>
<body>
{navbar}
<main class="container">
{messages}
{body}
</main>
<script src="{bootstrap_js}"></script>
<script src="/static/js/claimdesk.js"></script>
</body>
</html>
"##,
        title = esc(layout.title),
        site = SITE_NAME,
        bootstrap_css = BOOTSTRAP_CSS,
        htmx = HTMX_SRC,
        navbar = navbar(layout.user),
        messages = messages_block(layout.messages),
        body = body,
        bootstrap_js = BOOTSTRAP_JS,
    )
}

fn error_page(title: &str, message: &str) -> String {
    page(
        &Layout::new(title),
        &format!(
            r##"<div class="text-center py-5"><h1 class="display-6">{}</h1><p class="text-muted">{}</p><a class="btn btn-primary" href="/">Back to claims</a></div>"##,
            esc(title),
            esc(message)
        ),
    )
}

pub fn not_found_page() -> String {
    error_page("Not found", "The page you were looking for does not exist.")
}

pub fn forbidden_page() -> String {
    error_page("Access denied", "This area is restricted to staff members.")
}

pub fn bad_request_page(message: &str) -> String {
    error_page("Bad request", message)
}

pub fn server_error_page() -> String {
    error_page("Server error", "Something went wrong. Please try again later.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::flash::FlashLevel;
    use std::str::FromStr;

    #[test]
    fn test_format_money() {
        let d = |s: &str| Decimal::from_str(s).unwrap();
        assert_eq!(format_money(d("0")), "$0.00");
        assert_eq!(format_money(d("1234.5")), "$1,234.50");
        assert_eq!(format_money(d("1234567.891")), "$1,234,567.89");
        assert_eq!(format_money(d("-50")), "-$50.00");
        assert_eq!(format_money(d("999")), "$999.00");
    }

    #[test]
    fn test_page_escapes_messages() {
        let messages = vec![Flash {
            level: FlashLevel::Error,
            text: "<script>".to_string(),
        }];
        let html = page(&Layout::new("Claims").messages(&messages), "<p>body</p>");
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("<p>body</p>"));
        assert!(html.contains("alert-danger"));
        assert!(html.contains("Log in"));
    }
}
