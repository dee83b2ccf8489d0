//! Browser pages. Static HTML embedded at compile time; each page drives the
//! JSON API from the client side.

use crate::state::AppState;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

macro_rules! page {
    ($name:ident, $file:literal) => {
        async fn $name() -> Html<&'static str> {
            Html(include_str!(concat!("../../assets/", $file)))
        }
    };
}

page!(index, "index.html");
page!(upload, "upload.html");
page!(identify, "identify.html");
page!(persons, "persons.html");
page!(person_detail, "person.html");
page!(training, "training.html");
page!(login, "login.html");
page!(register, "register.html");
page!(admin_users, "admin_users.html");

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/upload", get(upload))
        .route("/identify", get(identify))
        .route("/persons", get(persons))
        .route("/persons/{id}", get(person_detail))
        .route("/training", get(training))
        .route("/login", get(login))
        .route("/register", get(register))
        .route("/admin/users", get(admin_users))
}
