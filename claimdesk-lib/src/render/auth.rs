use super::{esc, page, Layout};
use crate::utils::encode_query_component;

fn auth_card(title: &str, inner: &str) -> String {
    format!(
        r##"<div class="row justify-content-center">
  <div class="col-md-6 col-lg-5">
    <div class="card shadow-sm">
      <div class="card-body p-4">
        <h1 class="h4 mb-3 text-center">{}</h1>
        {}
      </div>
    </div>
  </div>
</div>"##,
        esc(title),
        inner
    )
}

pub fn login_page(layout: &Layout<'_>, next: Option<&str>, username: &str) -> String {
    let action = match next {
        Some(next) => format!("/auth/login/?next={}", encode_query_component(next)),
        None => "/auth/login/".to_string(),
    };
    let form = format!(
        r##"<form method="post" action="{action}">
  <div class="mb-3">
    <label class="form-label" for="username">Username</label>
    <input class="form-control" id="username" name="username" value="{username}" required autofocus>
  </div>
  <div class="mb-3">
    <label class="form-label" for="password">Password</label>
    <input class="form-control" id="password" name="password" type="password" required>
  </div>
  <button class="btn btn-primary w-100" type="submit">Log in</button>
</form>
<div class="mt-3 text-center small">
  <a href="/auth/password-reset/">Forgot your password?</a> &middot; <a href="/auth/signup/">Create an account</a>
</div>"##,
        action = esc(&action),
        username = esc(username),
    );
    page(layout, &auth_card("Log in", &form))
}

pub fn signup_page(layout: &Layout<'_>, username: &str, email: &str) -> String {
    let form = format!(
        r##"<form method="post" action="/auth/signup/">
  <div class="mb-3">
    <label class="form-label" for="username">Username</label>
    <input class="form-control" id="username" name="username" value="{username}" required>
  </div>
  <div class="mb-3">
    <label class="form-label" for="email">Email</label>
    <input class="form-control" id="email" name="email" type="email" value="{email}" required>
  </div>
  <div class="mb-3">
    <label class="form-label" for="password1">Password</label>
    <input class="form-control" id="password1" name="password1" type="password" required>
    <div class="form-text">{rules}</div>
  </div>
  <div class="mb-3">
    <label class="form-label" for="password2">Confirm password</label>
    <input class="form-control" id="password2" name="password2" type="password" required>
  </div>
  <button class="btn btn-primary w-100" type="submit">Sign up</button>
</form>
<div class="mt-3 text-center small"><a href="/auth/login/">Already have an account? Log in</a></div>"##,
        username = esc(username),
        email = esc(email),
        rules = password_rules(),
    );
    page(layout, &auth_card("Create an account", &form))
}

fn password_rules() -> String {
    format!(
        "At least {} characters with an uppercase letter, a lowercase letter, a number and a special character ({}).",
        crate::auth::MIN_PASSWORD_LEN,
        esc(crate::auth::PASSWORD_SPECIALS)
    )
}

pub fn password_reset_page(layout: &Layout<'_>, email: &str) -> String {
    let form = format!(
        r##"<p class="text-muted">Enter the email address of your account and we will send you a link to choose a new password.</p>
<form method="post" action="/auth/password-reset/">
  <div class="mb-3">
    <label class="form-label" for="email">Email</label>
    <input class="form-control" id="email" name="email" type="email" value="{}" required>
  </div>
  <button class="btn btn-primary w-100" type="submit">Send reset link</button>
</form>"##,
        esc(email)
    );
    page(layout, &auth_card("Reset password", &form))
}

pub fn password_reset_done_page(layout: &Layout<'_>) -> String {
    let inner = r##"<p>If an account exists for that address, an email with instructions is on its way.</p>
<p class="text-muted small">The link expires after a day. Check your spam folder if it does not arrive.</p>
<a class="btn btn-primary w-100" href="/auth/login/">Back to log in</a>"##;
    page(layout, &auth_card("Check your email", inner))
}

/// New-password form, or an explanation when the link is invalid
pub fn password_reset_confirm_page(layout: &Layout<'_>, valid_link: bool, action: &str) -> String {
    let inner = if valid_link {
        format!(
            r##"<form method="post" action="{}">
  <div class="mb-3">
    <label class="form-label" for="password1">New password</label>
    <input class="form-control" id="password1" name="password1" type="password" required>
    <div class="form-text">{}</div>
  </div>
  <div class="mb-3">
    <label class="form-label" for="password2">Confirm new password</label>
    <input class="form-control" id="password2" name="password2" type="password" required>
  </div>
  <button class="btn btn-primary w-100" type="submit">Set password</button>
</form>"##,
            esc(action),
            password_rules()
        )
    } else {
        r##"<p>This password reset link is invalid, possibly because it has already been used or has expired.</p>
<a class="btn btn-primary w-100" href="/auth/password-reset/">Request a new link</a>"##
            .to_string()
    };
    page(layout, &auth_card("Choose a new password", &inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_form_keeps_next() {
        let html = login_page(&Layout::new("Log in"), Some("/claim/1/?a=b"), "dana\"");
        assert!(html.contains(r#"action="/auth/login/?next=%2Fclaim%2F1%2F%3Fa%3Db""#));
        assert!(html.contains("dana&quot;"));
    }
}
