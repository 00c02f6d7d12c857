//! Server-rendered HTML for browsers that do not negotiate JSON.

use std::fmt::Write;

use crate::identity::Identity;
use crate::model::Todo;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n<body>\n{body}</body>\n</html>\n",
        escape(title)
    )
}

/// The collection view: the recent todos plus an add form.
pub fn todo_list(identity: &Identity, todos: &[Todo]) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<header><span>Signed in as {}</span> <a href=\"/logout/\">Log out</a></header>",
        escape(&identity.username)
    );
    body.push_str("<h1>Todos</h1>\n");
    body.push_str(
        "<form method=\"post\" action=\"/\">\n\
         <input type=\"text\" name=\"title\" required>\n\
         <button type=\"submit\">Add</button>\n</form>\n",
    );

    if todos.is_empty() {
        body.push_str("<p>No todos are available.</p>\n");
        return page("Todos", &body);
    }

    body.push_str("<ul>\n");
    for todo in todos {
        let (next_state, label) = if todo.state {
            ("false", "Reopen")
        } else {
            ("true", "Done")
        };
        let _ = writeln!(
            body,
            "<li class=\"{class}\"><a href=\"/{id}/\">{title}</a> \
             <form method=\"post\" action=\"/{id}/set_state\">\
             <input type=\"hidden\" name=\"state\" value=\"{next_state}\">\
             <button type=\"submit\">{label}</button></form> \
             <form method=\"post\" action=\"/{id}/delete\">\
             <button type=\"submit\">Delete</button></form></li>",
            class = if todo.state { "done" } else { "open" },
            id = todo.id,
            title = escape(&todo.title),
        );
    }
    body.push_str("</ul>\n");
    page("Todos", &body)
}

fn error_block(error: Option<&str>) -> String {
    error
        .map(|e| format!("<p class=\"error\">{}</p>\n", escape(e)))
        .unwrap_or_default()
}

pub fn login(error: Option<&str>, next: Option<&str>) -> String {
    let next_field = next
        .map(|n| format!("<input type=\"hidden\" name=\"next\" value=\"{}\">\n", escape(n)))
        .unwrap_or_default();
    let body = format!(
        "<h1>Log in</h1>\n{}<form method=\"post\" action=\"/login/\">\n{next_field}\
         <label>Username <input type=\"text\" name=\"username\"></label>\n\
         <label>Password <input type=\"password\" name=\"password\"></label>\n\
         <button type=\"submit\">Log in</button>\n</form>\n\
         <p><a href=\"/signup/\">Create an account</a></p>\n",
        error_block(error)
    );
    page("Log in", &body)
}

pub fn signup(error: Option<&str>) -> String {
    let body = format!(
        "<h1>Sign up</h1>\n{}<form method=\"post\" action=\"/signup/\">\n\
         <label>Username <input type=\"text\" name=\"username\"></label>\n\
         <label>Email <input type=\"email\" name=\"email\"></label>\n\
         <label>Password <input type=\"password\" name=\"password\"></label>\n\
         <label>Confirm password <input type=\"password\" name=\"password_confirm\"></label>\n\
         <button type=\"submit\">Sign up</button>\n</form>\n\
         <p><a href=\"/login/\">Already have an account?</a></p>\n",
        error_block(error)
    );
    page("Sign up", &body)
}
