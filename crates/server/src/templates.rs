//! HTML pages.
//!
//! Plain `format!` templates. Every interpolated value goes through
//! [`html_escape`].

use coffer_metadata::FileModel;
use coffer_service::UserInfo;

const STYLES: &str = r#"
    body {
        font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Arial, sans-serif;
        max-width: 960px;
        margin: 40px auto;
        padding: 0 20px;
        background: #f5f5f5;
        color: #333;
    }
    .container {
        background: white;
        padding: 30px;
        border-radius: 8px;
        box-shadow: 0 2px 4px rgba(0,0,0,0.1);
    }
    nav { margin-bottom: 20px; }
    nav a { margin-right: 16px; color: #0066cc; text-decoration: none; }
    nav form { display: inline; float: right; }
    h1 { border-bottom: 2px solid #0066cc; padding-bottom: 10px; }
    label { display: block; font-weight: bold; margin: 10px 0 4px; }
    input[type="text"], input[type="password"], input[type="email"] {
        width: 100%;
        padding: 8px;
        border: 1px solid #ddd;
        border-radius: 4px;
        box-sizing: border-box;
    }
    button {
        background: #0066cc;
        color: white;
        padding: 8px 16px;
        border: none;
        border-radius: 4px;
        cursor: pointer;
    }
    button.danger { background: #c9302c; }
    table { width: 100%; border-collapse: collapse; margin: 20px 0; }
    th, td { text-align: left; padding: 10px; border-bottom: 1px solid #ddd; }
    td form { display: inline; }
    .code { font-family: monospace; }
    .error { color: #a94442; background: #f2dede; padding: 10px; border-radius: 4px; }
    .info { color: #3c763d; background: #dff0d8; padding: 10px; border-radius: 4px; }
"#;

/// A one-line message shown above a page's content.
pub enum Notice {
    Error(String),
    Info(String),
}

impl Notice {
    fn render(notice: Option<&Notice>) -> String {
        match notice {
            Some(Notice::Error(msg)) => format!(r#"<p class="error">{}</p>"#, html_escape(msg)),
            Some(Notice::Info(msg)) => format!(r#"<p class="info">{}</p>"#, html_escape(msg)),
            None => String::new(),
        }
    }
}

/// Hidden CSRF field for a form.
fn csrf_field(csrf: &str) -> String {
    format!(
        r#"<input type="hidden" name="csrf" value="{}">"#,
        html_escape(csrf)
    )
}

fn layout(title: &str, user: Option<&UserInfo>, csrf: &str, body: &str) -> String {
    let nav = match user {
        Some(user) => {
            let admin_link = if user.is_admin {
                r#"<a href="/admin/users">Users</a>"#
            } else {
                ""
            };
            format!(
                r#"<nav>
            <a href="/files">Files</a>
            <a href="/account">Account</a>
            {admin_link}
            <form method="POST" action="/logout">{csrf}<button type="submit">Log out {name}</button></form>
        </nav>"#,
                csrf = csrf_field(csrf),
                name = html_escape(&user.name),
            )
        }
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>coffer - {title}</title>
    <style>{STYLES}</style>
</head>
<body>
    <div class="container">
        {nav}
        <h1>{title}</h1>
        {body}
    </div>
</body>
</html>"#,
        title = html_escape(title),
    )
}

pub fn login_page(csrf: &str, notice: Option<&Notice>) -> String {
    let body = format!(
        r#"{notice}
        <form method="POST" action="/login">
            {csrf}
            <label for="name">User name</label>
            <input type="text" id="name" name="name" required autofocus>
            <label for="password">Password</label>
            <input type="password" id="password" name="password" required>
            <p><button type="submit">Log in</button></p>
        </form>"#,
        notice = Notice::render(notice),
        csrf = csrf_field(csrf),
    );
    layout("Log in", None, csrf, &body)
}

pub fn files_page(user: &UserInfo, files: &[FileModel], csrf: &str) -> String {
    let body = if files.is_empty() {
        r#"<p><em>No files are visible to you.</em></p>"#.to_string()
    } else {
        let rows: String = files
            .iter()
            .map(|file| {
                format!(
                    r#"<tr>
                <td><a href="/files/{href}">{name}</a></td>
                <td class="code">{access}</td>
            </tr>"#,
                    href = url_escape(&file.name),
                    name = html_escape(&file.name),
                    access = html_escape(&file.access.join(", ")),
                )
            })
            .collect();
        format!(
            r#"<table>
            <tr><th>Name</th><th>Access</th></tr>
            {rows}
        </table>"#
        )
    };
    layout("Files", Some(user), csrf, &body)
}

pub fn account_page(user: &UserInfo, csrf: &str, notice: Option<&Notice>) -> String {
    let body = format!(
        r#"{notice}
        <table>
            <tr><th>Name</th><td>{name}</td></tr>
            <tr><th>Email</th><td>{email}</td></tr>
            <tr><th>Administrator</th><td>{admin}</td></tr>
            <tr><th>Access</th><td class="code">{access}</td></tr>
        </table>
        <h2>Change password</h2>
        <form method="POST" action="/account/password">
            {csrf}
            <label for="old_password">Current password</label>
            <input type="password" id="old_password" name="old_password" required>
            <label for="new_password">New password</label>
            <input type="password" id="new_password" name="new_password" required>
            <label for="confirm">Repeat new password</label>
            <input type="password" id="confirm" name="confirm" required>
            <p><button type="submit">Change password</button></p>
        </form>"#,
        notice = Notice::render(notice),
        name = html_escape(&user.name),
        email = html_escape(&user.email),
        admin = if user.is_admin { "yes" } else { "no" },
        access = html_escape(&user.access.join(", ")),
        csrf = csrf_field(csrf),
    );
    layout("Account", Some(user), csrf, &body)
}

pub fn admin_users_page(
    admin: &UserInfo,
    users: &[UserInfo],
    csrf: &str,
    notice: Option<&Notice>,
) -> String {
    let rows: String = users
        .iter()
        .map(|user| {
            let name = url_escape(&user.name);
            let toggle = if user.is_admin { "demote" } else { "promote" };
            format!(
                r#"<tr>
                <td>{display}</td>
                <td>{email}</td>
                <td>{is_admin}</td>
                <td>
                    <form method="POST" action="/admin/users/{name}/access">
                        {csrf}
                        <input type="text" name="access" value="{access}">
                        <button type="submit">Save</button>
                    </form>
                </td>
                <td>
                    <form method="POST" action="/admin/users/{name}/{toggle}">{csrf}<button type="submit">{toggle}</button></form>
                    <form method="POST" action="/admin/users/{name}/delete">{csrf}<button class="danger" type="submit">delete</button></form>
                </td>
            </tr>"#,
                display = html_escape(&user.name),
                email = html_escape(&user.email),
                is_admin = if user.is_admin { "yes" } else { "no" },
                access = html_escape(&user.access.join(", ")),
                csrf = csrf_field(csrf),
            )
        })
        .collect();

    let body = format!(
        r#"{notice}
        <table>
            <tr><th>Name</th><th>Email</th><th>Admin</th><th>Access</th><th></th></tr>
            {rows}
        </table>
        <h2>New user</h2>
        <form method="POST" action="/admin/users">
            {csrf}
            <label for="name">User name</label>
            <input type="text" id="name" name="name" required>
            <label for="email">Email</label>
            <input type="email" id="email" name="email">
            <label for="password">Password</label>
            <input type="password" id="password" name="password" required>
            <label for="access">Access labels (comma separated)</label>
            <input type="text" id="access" name="access">
            <label><input type="checkbox" name="is_admin" value="on"> Administrator</label>
            <p><button type="submit">Create user</button></p>
        </form>"#,
        notice = Notice::render(notice),
        csrf = csrf_field(csrf),
    );
    layout("Users", Some(admin), csrf, &body)
}

pub fn error_page(status: u16, message: &str) -> String {
    let body = format!(
        r#"<p class="error">{}</p>
        <p><a href="/">Back</a></p>"#,
        html_escape(message)
    );
    layout(&format!("Error {status}"), None, "", &body)
}

/// Escape text for HTML element content and quoted attributes.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Percent-encode a path segment.
fn url_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, is_admin: bool) -> UserInfo {
        UserInfo {
            name: name.to_string(),
            email: String::new(),
            is_admin,
            access: vec!["foo".to_string()],
        }
    }

    #[test]
    fn test_escaping() {
        assert_eq!(
            html_escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(url_escape("a b/ü.txt"), "a%20b%2F%C3%BC.txt");
    }

    #[test]
    fn test_files_page_escapes_names() {
        let files = vec![FileModel {
            name: "<script>.txt".to_string(),
            access: vec!["foo".to_string()],
        }];
        let html = files_page(&user("alice", false), &files, "tok");
        assert!(html.contains("&lt;script&gt;.txt"));
        assert!(html.contains("/files/%3Cscript%3E.txt"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_admin_link_only_for_admins() {
        assert!(!files_page(&user("alice", false), &[], "t").contains("/admin/users"));
        assert!(files_page(&user("root", true), &[], "t").contains("/admin/users"));
    }

    #[test]
    fn test_every_form_carries_csrf() {
        let html = admin_users_page(
            &user("root", true),
            &[user("alice", false)],
            "tok123",
            None,
        );
        let forms = html.matches("<form").count();
        let fields = html.matches(r#"name="csrf" value="tok123""#).count();
        assert_eq!(forms, fields);
        assert!(forms >= 4);
    }
}
