//! Server-rendered pages.
//!
//! Every interpolated value goes through [`escape`].

use axum::response::Html;
use url::form_urlencoded;

use crate::models::{Order, OrderRequest};
use crate::store::format_timestamp;

/// Escape HTML entities
pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
</head>
<body>
<nav><a href="/">Home</a> | <a href="/patient">Patient</a> | <a href="/medicalStaff">Staff</a> | <a href="/orders">Orders</a> | <a href="/login">Login</a> | <a href="/logout">Logout</a></nav>
<main>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
        body = body,
    ))
}

fn pager(path: &str, next_cursor: Option<&str>, limit: usize) -> String {
    match next_cursor {
        Some(cursor) => {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("cursor", cursor)
                .append_pair("limit", &limit.to_string())
                .finish();
            format!(r#"<p><a class="next" href="{}?{}">Next page</a></p>"#, path, escape(&query))
        }
        None => String::new(),
    }
}

fn requested_at(request: &OrderRequest) -> String {
    request.requested_at.map(format_timestamp).unwrap_or_default()
}

pub fn home() -> Html<String> {
    layout(
        "Care Orders",
        "<h1>Care Orders</h1>\n<p>Patients request deliveries; medical staff review and fulfil them.</p>",
    )
}

pub fn login(dev_sign_in: bool) -> Html<String> {
    let body = if dev_sign_in {
        r#"<h1>Login</h1>
<form id="login">
<label>User id <input name="uid" required></label>
<label>Email <input name="email" type="email" required></label>
<label>Name <input name="name" required></label>
<button type="submit">Sign in</button>
</form>
<p id="status"></p>
<script>
async function signIn(form) {
  const identity = { uid: form.uid.value, email: form.email.value, name: form.name.value };
  const res = await fetch("/dev/signIn", {
    method: "POST",
    headers: { "content-type": "application/json" },
    body: JSON.stringify(identity),
  });
  const { idToken } = await res.json();
  const session = await fetch("/sessionLogin", {
    method: "POST",
    redirect: "manual",
    headers: { "content-type": "application/json" },
    body: JSON.stringify({ uid: identity.uid, idToken }),
  });
  if (!session.ok) throw new Error("session login failed");
  return session.json();
}
document.getElementById("login").onsubmit = async (event) => {
  event.preventDefault();
  try {
    const first = await signIn(event.target);
    // New role claims only reach tokens minted after they were issued
    if (first.refreshRequired) await signIn(event.target);
    window.location.replace("/");
  } catch (error) {
    document.getElementById("status").textContent = "Sign-in failed.";
  }
};
</script>"#
            .to_string()
    } else {
        r#"<h1>Login</h1>
<p>Sign in with your identity provider. The client posts <code>{"uid", "idToken"}</code> to <code>/sessionLogin</code>.</p>
<p class="notice">No sign-in client is configured on this server. Ask an administrator to connect an identity provider.</p>"#
            .to_string()
    };
    layout("Login", &body)
}

pub fn unauthorized() -> Html<String> {
    layout(
        "Unauthorized",
        "<h1>Unauthorized</h1>\n<p>You do not have access to this page.</p>",
    )
}

pub fn not_found() -> Html<String> {
    layout("Not Found", "<h1>Not Found</h1>\n<p>The page you requested does not exist.</p>")
}

pub fn error_page(title: &str, message: &str) -> Html<String> {
    layout(
        title,
        &format!("<h1>{}</h1>\n<p class=\"error\">{}</p>", escape(title), escape(message)),
    )
}

pub fn patient(records: &[OrderRequest]) -> Html<String> {
    let mut body = String::from(
        r#"<h1>Your requests</h1>
<form method="post" action="/patient">
<label>Symptoms <textarea name="symptoms" required></textarea></label>
<label>Days with symptoms <input name="symptomDays" type="number" min="0" required></label>
<label>Deliver to <input name="deliverTo" required></label>
<button type="submit">Request delivery</button>
</form>
"#,
    );

    if records.is_empty() {
        body.push_str("<p class=\"empty\">You have no pending requests.</p>\n");
    } else {
        body.push_str("<ul class=\"records\">\n");
        for record in records {
            body.push_str(&format!(
                "<li>{} &middot; {} day(s) &middot; deliver to {} &middot; {}</li>\n",
                escape(&record.symptoms),
                record.symptom_days,
                escape(&record.deliver_to),
                escape(&requested_at(record)),
            ));
        }
        body.push_str("</ul>\n");
    }

    layout("Patient", &body)
}

pub fn medical_staff(staff_name: &str, records: &[OrderRequest], next_cursor: Option<&str>, limit: usize) -> Html<String> {
    let mut body = format!("<h1>Pending requests</h1>\n<p>Signed in as {}</p>\n", escape(staff_name));

    if records.is_empty() {
        body.push_str("<p class=\"empty\">No pending requests.</p>\n");
    } else {
        body.push_str("<table class=\"records\">\n<tr><th>Patient</th><th>Email</th><th>Symptoms</th><th>Days</th><th>Deliver to</th><th>Requested</th><th></th></tr>\n");
        for record in records {
            let hidden = [
                ("docId", record.doc_id.clone()),
                ("name", record.name.clone()),
                ("email", record.email.clone()),
                ("deliverTo", record.deliver_to.clone()),
                ("symptoms", record.symptoms.clone()),
                ("symptomDays", record.symptom_days.to_string()),
                ("requestedAt", requested_at(record)),
            ]
            .iter()
            .map(|(name, value)| format!(r#"<input type="hidden" name="{}" value="{}">"#, name, escape(value)))
            .collect::<String>();

            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><form method=\"post\" action=\"/medicalStaff\">{}<button type=\"submit\">Prescribe</button></form></td></tr>\n",
                escape(&record.name),
                escape(&record.email),
                escape(&record.symptoms),
                record.symptom_days,
                escape(&record.deliver_to),
                escape(&requested_at(record)),
                hidden,
            ));
        }
        body.push_str("</table>\n");
    }

    body.push_str(&pager("/medicalStaff", next_cursor, limit));
    layout("Medical Staff", &body)
}

pub fn orders(records: &[Order], next_cursor: Option<&str>, limit: usize) -> Html<String> {
    let mut body = String::from("<h1>Orders</h1>\n");

    if records.is_empty() {
        body.push_str("<p class=\"empty\">No orders yet.</p>\n");
    } else {
        body.push_str("<table class=\"records\">\n<tr><th>Patient</th><th>Email</th><th>Symptoms</th><th>Deliver to</th><th>Prescribed by</th></tr>\n");
        for order in records {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{} ({})</td></tr>\n",
                escape(&order.request.name),
                escape(&order.request.email),
                escape(&order.request.symptoms),
                escape(&order.request.deliver_to),
                escape(&order.prescribed_by_name),
                escape(&order.prescribed_by_email),
            ));
        }
        body.push_str("</table>\n");
    }

    body.push_str(&pager("/orders", next_cursor, limit));
    layout("Orders", &body)
}
