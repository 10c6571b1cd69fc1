use super::{esc, format_date, page, Layout};
use crate::models::{User, UserProfile};

pub fn profile_page(layout: &Layout<'_>, user: &User, profile: &UserProfile, media_url: &str) -> String {
    let body = format!(
        r##"<h1 class="h3 mb-4">My profile</h1>
<div class="row g-4">
  <div class="col-md-4">
    <div class="card text-center">
      <div class="card-body">
        <img id="profile-picture" class="profile-picture mb-3" src="{picture}" alt="Profile picture">
        <h2 class="h5 mb-0">{name}</h2>
        <p class="text-muted small">@{username}{role}</p>
        <p class="text-muted small">Member since {joined}</p>
        <form id="picture-form" action="/profile/upload-picture/" method="post" enctype="multipart/form-data">
          <input class="form-control form-control-sm mb-2" type="file" name="profile_picture" accept="image/jpeg,image/png" required>
          <button class="btn btn-outline-primary btn-sm" type="submit">Upload picture</button>
          <div id="picture-status" class="small mt-2"></div>
        </form>
        <p class="form-text">JPEG or PNG, 2MB at most.</p>
      </div>
    </div>
  </div>
  <div class="col-md-8">
    <div class="card">
      <div class="card-body">
        <form method="post" action="/profile/">
          <div class="row g-3">
            <div class="col-md-6">
              <label class="form-label" for="first_name">First name</label>
              <input class="form-control" id="first_name" name="first_name" maxlength="30" value="{first_name}">
            </div>
            <div class="col-md-6">
              <label class="form-label" for="last_name">Last name</label>
              <input class="form-control" id="last_name" name="last_name" maxlength="30" value="{last_name}">
            </div>
            <div class="col-12">
              <label class="form-label" for="email">Email</label>
              <input class="form-control" id="email" name="email" type="email" value="{email}" required>
            </div>
            <div class="col-12">
              <label class="form-label" for="phone_number">Phone number</label>
              <input class="form-control" id="phone_number" name="phone_number" maxlength="15" placeholder="+1 (555) 123-4567" value="{phone}">
            </div>
            <div class="col-12">
              <label class="form-label" for="bio">Bio</label>
              <textarea class="form-control" id="bio" name="bio" rows="4" maxlength="500" placeholder="Tell us about yourself...">{bio}</textarea>
            </div>
          </div>
          <button class="btn btn-primary mt-3" type="submit">Save changes</button>
        </form>
      </div>
    </div>
  </div>
</div>"##,
        picture = esc(&profile.picture_url(media_url)),
        name = esc(&user.display_name()),
        username = esc(&user.username),
        role = if user.is_staff { " &middot; Staff" } else { "" },
        joined = format_date(user.date_joined.date_naive()),
        first_name = esc(&user.first_name),
        last_name = esc(&user.last_name),
        email = esc(&user.email),
        phone = esc(&profile.phone_number),
        bio = esc(&profile.bio),
    );
    page(layout, &body)
}
